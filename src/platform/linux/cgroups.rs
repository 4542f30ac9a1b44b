use std::fs::File;
use std::os::unix::fs::chown;
use std::path::Path;

use nix::sys::stat::Mode;
use nix::unistd::Pid;

use crate::core::error::LaunchError;
use crate::platform::linux::mounts;
use crate::util::fs::{is_plain_filename, write_once};

/// Control files whose ownership transfer constitutes cgroup delegation.
const DELEGATED_FILES: &[&str] = &["cgroup.procs", "cgroup.subtree_control", "cgroup.threads"];

/// Create the per-container subtree `<dir>/<id>` (mode 0770) through a
/// scratch cgroup2 view mounted at the container root. Once this returns
/// `Ok`, [`cleanup`] must run before the launcher returns.
pub fn create_subtree(dir: &Path, id: &str) -> Result<(), LaunchError> {
    mounts::mount_cgroup2(dir).map_err(LaunchError::CgroupMount)?;
    let mkdir_result = nix::unistd::mkdir(&dir.join(id), Mode::from_bits_truncate(0o770));
    let umount_result = mounts::detach(dir);
    mkdir_result.map_err(LaunchError::CgroupCreate)?;
    umount_result.map_err(LaunchError::CgroupUmount)?;
    Ok(())
}

/// Delegate the subtree to (uid, gid), apply the caller's cgroup options in
/// input order, and move `child` into the subtree. Runs against a scratch
/// cgroup2 mount that is detached again before returning.
pub fn setup(
    dir: &Path,
    id: &str,
    child: Pid,
    uid: u32,
    gid: u32,
    options: &[String],
) -> Result<(), LaunchError> {
    mounts::mount_cgroup2(dir).map_err(LaunchError::CgroupMount)?;
    let configure_result = configure(&dir.join(id), child, uid, gid, options);
    let umount_result = mounts::detach(dir);
    configure_result?;
    umount_result.map_err(LaunchError::CgroupUmount)?;
    Ok(())
}

fn configure(
    cgroup_path: &Path,
    child: Pid,
    uid: u32,
    gid: u32,
    options: &[String],
) -> Result<(), LaunchError> {
    std::fs::metadata(cgroup_path).map_err(|source| LaunchError::CgroupOpen {
        path: cgroup_path.display().to_string(),
        source,
    })?;

    // Delegation: ownership of the directory and its core control files
    // moves to the container user before any option is applied.
    chown(cgroup_path, Some(uid), Some(gid)).map_err(|source| LaunchError::CgroupDelegate {
        file: ".".into(),
        source,
    })?;
    for file in DELEGATED_FILES {
        chown(cgroup_path.join(file), Some(uid), Some(gid)).map_err(|source| {
            LaunchError::CgroupDelegate {
                file: (*file).into(),
                source,
            }
        })?;
    }

    for option in options {
        apply_option(cgroup_path, option)?;
    }

    // Only after the options are in place does the process move in; init
    // unshares its cgroup namespace once it is a member.
    let mut procs = File::options()
        .write(true)
        .open(cgroup_path.join("cgroup.procs"))
        .map_err(LaunchError::CgroupMoveProc)?;
    write_once(&mut procs, child.as_raw().to_string().as_bytes())
        .map_err(LaunchError::CgroupMoveProc)?;
    Ok(())
}

/// Split a `<filename>=<contents>` option and gate the filename. Rejection
/// happens before any filesystem access.
pub fn parse_option(option: &str) -> Result<(&str, &str), LaunchError> {
    let (name, value) = option
        .split_once('=')
        .ok_or_else(|| LaunchError::MalformedCgroupOption(option.to_string()))?;
    if !is_plain_filename(name) {
        return Err(LaunchError::InvalidCgroupOptionName(name.to_string()));
    }
    Ok((name, value))
}

fn apply_option(cgroup_path: &Path, option: &str) -> Result<(), LaunchError> {
    let (name, value) = parse_option(option)?;
    let mut file = File::options()
        .write(true)
        .open(cgroup_path.join(name))
        .map_err(|source| LaunchError::CgroupOptionWrite {
            name: name.into(),
            source,
        })?;
    // Contents go through verbatim; an empty value is a zero-byte write.
    write_once(&mut file, value.as_bytes()).map_err(|source| LaunchError::CgroupOptionWrite {
        name: name.into(),
        source,
    })
}

/// Best-effort removal of the container's cgroup subtree through a fresh
/// scratch view. All failures are swallowed; the launcher is already on its
/// way out.
pub fn cleanup(dir: &Path, id: &str) {
    if mounts::mount_cgroup2(dir).is_err() {
        return;
    }
    remove_subtree(&dir.join(id));
    let _ = mounts::detach(dir);
}

/// Depth-first removal: a cgroup directory cannot be rmdir'ed while it has
/// child cgroups. `file_type()` falls back to stat when the filesystem
/// reports an unknown entry type.
fn remove_subtree(path: &Path) {
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                remove_subtree(&entry.path());
            }
        }
    }
    let _ = std::fs::remove_dir(path);
}
