use std::convert::Infallible;
use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd};
use std::panic::catch_unwind;
use std::path::Path;

use nix::errno::Errno;
use nix::sched::{unshare, CloneFlags};
use nix::sys::prctl;
use nix::unistd::{chdir, execve, pivot_root, sethostname, setgid, setuid, Gid, Uid};

use crate::core::error::LaunchError;
use crate::platform::linux::{mounts, pipes};

/// Everything init needs, resolved by the launcher before the clone.
pub struct InitArgs<'a> {
    pub container_dir: &'a Path,
    pub command: &'a [String],
    pub environment: &'a [String],
    pub work_dir: Option<&'a str>,
    pub hostname: &'a str,
}

/// The container init process. Runs in the freshly cloned namespaces and
/// never returns: it either `execve`s the entrypoint or writes one error
/// line to the error pipe and exits nonzero.
pub fn run(args: InitArgs<'_>, sync_rx: OwnedFd, error_tx: OwnedFd) -> ! {
    let outcome = catch_unwind(move || {
        let err = match enter(&args, sync_rx, &error_tx) {
            Ok(never) => match never {},
            Err(err) => err,
        };
        pipes::report_init_error(error_tx, &err);
    });
    match outcome {
        Ok(()) => unsafe { libc::_exit(1) },
        Err(_) => unsafe { libc::_exit(2) },
    }
}

fn enter(
    args: &InitArgs<'_>,
    sync_rx: OwnedFd,
    error_tx: &OwnedFd,
) -> Result<Infallible, LaunchError> {
    // Stay pinned in the empty new namespaces until the launcher confirms
    // cgroup membership, id maps, and network are all in place. If the
    // launcher dies first this read comes up short and we exit.
    pipes::read_go_ahead(sync_rx)?;

    // The user namespace is mapped now, so container root is reachable.
    setuid(Uid::from_raw(0)).map_err(LaunchError::SetIds)?;
    setgid(Gid::from_raw(0)).map_err(LaunchError::SetIds)?;

    // Most inits expect to inherit orphaned descendants.
    prctl::set_child_subreaper(true).map_err(LaunchError::SubreaperSet)?;

    // The launcher has already moved this process into the delegated
    // cgroup, so unsharing here makes that subtree the namespace root.
    unshare(CloneFlags::CLONE_NEWCGROUP).map_err(LaunchError::UnshareCgroup)?;

    // pivot_root needs the new root to be a mount point.
    mounts::bind_over_self(args.container_dir).map_err(LaunchError::BindMount)?;
    chdir(args.container_dir).map_err(LaunchError::Chdir)?;
    pivot_root(".", ".").map_err(LaunchError::PivotRoot)?;
    mounts::detach(Path::new(".")).map_err(LaunchError::UmountOld)?;

    if let Some(dir) = args.work_dir {
        chdir(Path::new(dir)).map_err(|source| LaunchError::WorkdirChdir {
            dir: dir.into(),
            source,
        })?;
    }

    sethostname(args.hostname).map_err(LaunchError::SetHostname)?;

    // After a successful execve the error pipe must close by itself so the
    // launcher reads EOF instead of blocking.
    let rc = unsafe { libc::fcntl(error_tx.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
    if rc < 0 {
        return Err(LaunchError::CloExec(Errno::last()));
    }

    let filename =
        CString::new(args.command[0].as_bytes()).map_err(|_| LaunchError::ExecString)?;
    let argv: Vec<CString> = args
        .command
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<Result<_, _>>()
        .map_err(|_| LaunchError::ExecString)?;
    let envp: Vec<CString> = args
        .environment
        .iter()
        .map(|var| CString::new(var.as_bytes()))
        .collect::<Result<_, _>>()
        .map_err(|_| LaunchError::ExecString)?;

    Ok(execve(&filename, &argv, &envp).map_err(LaunchError::Execve)?)
}
