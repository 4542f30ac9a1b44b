use std::fs::File;
use std::path::PathBuf;

use nix::unistd::Pid;

use crate::core::error::LaunchError;
use crate::util::fs::write_once;

/// Write the single-user id mappings for the child's user namespace:
/// `uid_map` gets `"0 <uid> 1\n"`, `setgroups` gets `"deny"`, `gid_map`
/// gets `"0 <gid> 1\n"`.
///
/// The order is load-bearing: the kernel refuses `gid_map` writes once
/// `setgroups` is still `allow` for an unprivileged opener, so `setgroups`
/// is denied strictly before `gid_map`. Each map file accepts exactly one
/// write, and each write is checked before the next starts.
///
/// The launcher never unshared its PID namespace, so `/proc/<child_pid>`
/// resolves against the host's procfs.
pub fn configure(child: Pid, uid: u32, gid: u32) -> Result<(), LaunchError> {
    let proc_dir = PathBuf::from(format!("/proc/{}", child.as_raw()));
    std::fs::metadata(&proc_dir).map_err(|source| LaunchError::ProcOpen {
        pid: child.as_raw(),
        source,
    })?;

    let mut uid_map = File::options()
        .write(true)
        .open(proc_dir.join("uid_map"))
        .map_err(LaunchError::UidMap)?;
    write_once(&mut uid_map, format!("0 {uid} 1\n").as_bytes()).map_err(LaunchError::UidMap)?;
    drop(uid_map);

    let mut setgroups = File::options()
        .write(true)
        .open(proc_dir.join("setgroups"))
        .map_err(LaunchError::SetGroups)?;
    write_once(&mut setgroups, b"deny").map_err(LaunchError::SetGroups)?;
    drop(setgroups);

    let mut gid_map = File::options()
        .write(true)
        .open(proc_dir.join("gid_map"))
        .map_err(LaunchError::GidMap)?;
    write_once(&mut gid_map, format!("0 {gid} 1\n").as_bytes()).map_err(LaunchError::GidMap)?;
    Ok(())
}
