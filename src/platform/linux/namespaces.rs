use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::unistd::Pid;

/// Argument block for the `clone3(2)` syscall.
#[repr(C, align(8))]
#[derive(Debug, Default)]
struct CloneArgs {
    flags: u64,
    pidfd: u64,
    child_tid: u64,
    parent_tid: u64,
    exit_signal: u64,
    stack: u64,
    stack_size: u64,
    tls: u64,
    set_tid: u64,
    set_tid_size: u64,
    cgroup: u64,
}

pub enum CloneResult {
    Child,
    Parent { child: Pid },
}

/// Namespace set for the container init process: fresh mount, IPC, PID,
/// UTS, user, and time namespaces, plus a network namespace unless the
/// container shares the host's. The cgroup namespace is deliberately not in
/// this set; init unshares it itself once the launcher has moved it into
/// the delegated cgroup.
pub fn init_clone_flags(use_host_network: bool) -> u64 {
    let mut flags = (libc::CLONE_NEWNS
        | libc::CLONE_NEWIPC
        | libc::CLONE_NEWPID
        | libc::CLONE_NEWUTS
        | libc::CLONE_NEWUSER) as u64
        | libc::CLONE_NEWTIME as u64;
    if !use_host_network {
        flags |= libc::CLONE_NEWNET as u64;
    }
    flags
}

/// Spawn a child via `clone3(2)` with the given namespace flags and a
/// SIGCHLD exit signal. Legacy `clone(2)` is not an option here: the kernel
/// accepts `CLONE_NEWTIME` only through `unshare` and `clone3`. No child
/// stack is supplied, so the child runs on a copy-on-write image of the
/// parent, like `fork`.
///
/// # Safety
///
/// The caller must ensure the child only uses async-signal-safe state until
/// it execs or `_exit`s; in particular the child must not return into the
/// caller's frame.
pub unsafe fn clone3(flags: u64) -> Result<CloneResult, Errno> {
    let args = CloneArgs {
        flags,
        exit_signal: libc::SIGCHLD as u64,
        ..Default::default()
    };
    let res = libc::syscall(
        libc::SYS_clone3,
        &args as *const CloneArgs,
        core::mem::size_of::<CloneArgs>(),
    );
    Errno::result(res).map(|v| match v {
        0 => CloneResult::Child,
        v => CloneResult::Parent {
            child: Pid::from_raw(v as libc::pid_t),
        },
    })
}

/// Obtain a pidfd for `pid`. The launcher uses it both as a `setns` target
/// (no path resolution, so the child's pid cannot be recycled under us) and
/// as its hold on the child until `waitpid`.
pub fn pidfd_open(pid: Pid) -> Result<OwnedFd, Errno> {
    let res = unsafe { libc::syscall(libc::SYS_pidfd_open, pid.as_raw(), 0 as libc::c_uint) };
    Errno::result(res).map(|fd| unsafe { OwnedFd::from_raw_fd(fd as RawFd) })
}
