use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sched::{unshare, CloneFlags};
use nix::sys::prctl;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{geteuid, Pid};

use crate::core::error::LaunchError;
use crate::core::id::{generate_id, MAX_ID_LEN};
use crate::core::model::{ContainerParams, ContainerResult};
use crate::platform::linux::init::InitArgs;
use crate::platform::linux::namespaces::{clone3, init_clone_flags, pidfd_open, CloneResult};
use crate::platform::linux::{cgroups, init, mounts, network, pipes, userns};

/// Default hostname inside the container.
const DEFAULT_HOSTNAME: &str = "tinyjail";

/// The launcher process (P1). Fills `result` in place; it never panics the
/// caller's error handling — every failure becomes a message in the record.
pub fn run(params: &ContainerParams, result: &mut ContainerResult) {
    if let Err(err) = launch(params, result) {
        result.fail(&err.to_string());
    }
}

fn launch(params: &ContainerParams, result: &mut ContainerResult) -> Result<(), LaunchError> {
    if !geteuid().is_root() {
        return Err(LaunchError::NotRoot);
    }

    // Everything the launcher mounts from here on — scratch cgroup2 and
    // procfs views at the container root — stays invisible to the host.
    unshare(CloneFlags::CLONE_NEWNS).map_err(LaunchError::UnshareMount)?;
    mounts::make_mount_tree_private().map_err(LaunchError::MountsPrivate)?;

    let container_dir = validate(params)?;
    let (uid, gid) = resolve_owner(params, &container_dir)?;
    let id = params.container_id.clone().unwrap_or_else(generate_id);
    let hostname = params.hostname.as_deref().unwrap_or(DEFAULT_HOSTNAME);

    let sync = pipes::new_pipe()?;
    let error = pipes::new_pipe()?;

    // If init dies, its orphaned descendants land here to be vacuumed up.
    prctl::set_child_subreaper(true).map_err(LaunchError::SubreaperSet)?;

    let flags = init_clone_flags(params.use_host_network);
    let child = match unsafe { clone3(flags) }.map_err(LaunchError::Clone)? {
        CloneResult::Child => {
            // Parent-only pipe ends go first: holding the sync write end
            // here would leave init waiting on itself if the launcher dies.
            drop(sync.tx);
            drop(error.rx);
            let init_args = InitArgs {
                container_dir: &container_dir,
                command: &params.command,
                environment: &params.environment,
                work_dir: params.work_dir.as_deref(),
                hostname,
            };
            init::run(init_args, sync.rx, error.tx)
        }
        CloneResult::Parent { child } => child,
    };
    drop(sync.rx);
    drop(error.tx);

    cgroups::create_subtree(&container_dir, &id)?;
    // The subtree exists now; there is a single exit point below so the
    // cleanup pass always runs.

    if let Err(err) = finish(
        params,
        result,
        &container_dir,
        &id,
        child,
        uid,
        gid,
        sync.tx,
        error.rx,
    ) {
        let _ = kill(child, Signal::SIGKILL);
        let mut status: libc::c_int = 0;
        unsafe { libc::waitpid(child.as_raw(), &mut status, libc::__WALL) };
        result.fail(&err.to_string());
    }

    // Vacuum up anything init left behind before declaring the pid gone.
    let mut status: libc::c_int = 0;
    while unsafe { libc::wait(&mut status) } > 0 {}

    cgroups::cleanup(&container_dir, &id);
    Ok(())
}

/// Parent-side setup after the clone: cgroup, id maps, network, barrier,
/// error-channel drain, wait. Any error here aborts the launch; the caller
/// kills and reaps init.
#[allow(clippy::too_many_arguments)]
fn finish(
    params: &ContainerParams,
    result: &mut ContainerResult,
    container_dir: &Path,
    id: &str,
    child: Pid,
    uid: u32,
    gid: u32,
    sync_tx: OwnedFd,
    error_rx: OwnedFd,
) -> Result<(), LaunchError> {
    cgroups::setup(container_dir, id, child, uid, gid, &params.cgroup_options)?;
    userns::configure(child, uid, gid)?;

    // The pidfd pins the child's identity for setns and stays open until
    // the child is waited on, so the pid cannot be recycled underneath us.
    let child_pidfd = if params.use_host_network {
        None
    } else {
        let pidfd = pidfd_open(child).map_err(LaunchError::PidfdOpen)?;
        network::setup(&pidfd, container_dir, id, params)?;
        Some(pidfd)
    };

    await_child(result, child, sync_tx, error_rx)?;
    drop(child_pidfd);
    Ok(())
}

fn await_child(
    result: &mut ContainerResult,
    child: Pid,
    sync_tx: OwnedFd,
    error_rx: OwnedFd,
) -> Result<(), LaunchError> {
    pipes::write_go_ahead(sync_tx)?;

    // Blocks until init either fails (a message arrives) or execs (the
    // CLOEXEC write end closes and this reads empty).
    if let Some(message) = pipes::read_init_error(error_rx) {
        return Err(LaunchError::InitFailed(
            String::from_utf8_lossy(&message).into_owned(),
        ));
    }

    let mut status: libc::c_int = 0;
    let rc = unsafe { libc::waitpid(child.as_raw(), &mut status, libc::__WALL) };
    if rc < 0 {
        return Err(LaunchError::WaitPid(Errno::last()));
    }
    result.exit_status = status;
    Ok(())
}

/// Parameter validation, in a fixed order so the first problem reported is
/// deterministic. Returns the canonicalized container root.
fn validate(params: &ContainerParams) -> Result<PathBuf, LaunchError> {
    if let Some(id) = &params.container_id {
        if id.len() > MAX_ID_LEN {
            return Err(LaunchError::InvalidId);
        }
    }
    if params.command.is_empty() {
        return Err(LaunchError::MissingCommand);
    }
    if params.container_dir.as_os_str().is_empty() {
        return Err(LaunchError::MissingRoot);
    }
    if params.network_bridge.is_some() && params.peer_ip_addr.is_some() {
        return Err(LaunchError::ConflictingNetwork);
    }
    let container_dir =
        std::fs::canonicalize(&params.container_dir).map_err(|source| LaunchError::ResolveRoot {
            path: params.container_dir.display().to_string(),
            source,
        })?;
    if container_dir == Path::new("/") {
        return Err(LaunchError::RootIsSlash);
    }
    Ok(container_dir)
}

/// The container maps host ids to container root; unset ids fall back to
/// the owner of the container directory.
fn resolve_owner(
    params: &ContainerParams,
    container_dir: &Path,
) -> Result<(u32, u32), LaunchError> {
    if let (Some(uid), Some(gid)) = (params.uid, params.gid) {
        return Ok((uid, gid));
    }
    let st = nix::sys::stat::stat(container_dir).map_err(|source| LaunchError::StatRoot {
        path: container_dir.display().to_string(),
        source,
    })?;
    Ok((
        params.uid.unwrap_or(st.st_uid),
        params.gid.unwrap_or(st.st_gid),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_params(dir: &Path) -> ContainerParams {
        ContainerParams {
            container_dir: dir.to_path_buf(),
            command: vec!["/bin/true".into()],
            ..Default::default()
        }
    }

    #[test]
    fn validate_accepts_minimal_params() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = validate(&minimal_params(tmp.path())).unwrap();
        assert_ne!(dir, Path::new("/"));
    }

    #[test]
    fn overlong_id_is_reported_first() {
        // The id check precedes the command check.
        let params = ContainerParams {
            container_id: Some("far-too-long-for-a-veth-name".into()),
            ..Default::default()
        };
        assert!(matches!(validate(&params), Err(LaunchError::InvalidId)));
    }

    #[test]
    fn empty_command_is_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut params = minimal_params(tmp.path());
        params.command.clear();
        assert!(matches!(
            validate(&params),
            Err(LaunchError::MissingCommand)
        ));
    }

    #[test]
    fn empty_root_is_missing() {
        let mut params = minimal_params(Path::new(""));
        params.container_dir = PathBuf::new();
        assert!(matches!(validate(&params), Err(LaunchError::MissingRoot)));
    }

    #[test]
    fn bridge_and_peer_address_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let mut params = minimal_params(tmp.path());
        params.network_bridge = Some("br0".into());
        params.peer_ip_addr = Some("10.0.0.1/24".into());
        assert!(matches!(
            validate(&params),
            Err(LaunchError::ConflictingNetwork)
        ));
    }

    #[test]
    fn slash_is_refused_as_root_dir() {
        let params = minimal_params(Path::new("/"));
        assert!(matches!(validate(&params), Err(LaunchError::RootIsSlash)));
    }

    #[test]
    fn root_dir_resolving_to_slash_is_refused() {
        // Symlinks do not sneak past the canonicalize step.
        let tmp = tempfile::tempdir().unwrap();
        let link = tmp.path().join("rootlink");
        std::os::unix::fs::symlink("/", &link).unwrap();
        let params = minimal_params(&link);
        assert!(matches!(validate(&params), Err(LaunchError::RootIsSlash)));
    }

    #[test]
    fn missing_root_dir_fails_to_resolve() {
        let params = minimal_params(Path::new("/nonexistent/jail/root"));
        assert!(matches!(
            validate(&params),
            Err(LaunchError::ResolveRoot { .. })
        ));
    }

    #[test]
    fn owner_falls_back_to_directory_owner() {
        let tmp = tempfile::tempdir().unwrap();
        let params = minimal_params(tmp.path());
        let st = nix::sys::stat::stat(tmp.path()).unwrap();
        assert_eq!(
            resolve_owner(&params, tmp.path()).unwrap(),
            (st.st_uid, st.st_gid)
        );
    }

    #[test]
    fn explicit_owner_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let mut params = minimal_params(tmp.path());
        params.uid = Some(1234);
        params.gid = Some(5678);
        assert_eq!(resolve_owner(&params, tmp.path()).unwrap(), (1234, 5678));
    }
}
