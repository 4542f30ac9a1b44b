use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Every way a launch can fail. The `Display` rendering of a variant is the
/// wire format: init-side errors cross the error pipe as this text, and the
/// launcher copies it into the result record's error buffer.
///
/// The first error on a call path wins; helpers return early with `?`, so a
/// recorded message is never overwritten by a later failure.
#[derive(Debug, Error)]
pub enum LaunchError {
    // Parameter validation.
    #[error("Container ID can be at most 12 characters long.")]
    InvalidId,
    #[error("Missing required parameter: command list.")]
    MissingCommand,
    #[error("Missing required parameter: container root directory.")]
    MissingRoot,
    #[error("Network bridge and peer IP address cannot both be set.")]
    ConflictingNetwork,
    #[error("Could not resolve path {path}: {source}")]
    ResolveRoot { path: String, source: io::Error },
    #[error("Container root dir cannot be /")]
    RootIsSlash,
    #[error("Launching a container requires root permissions.")]
    NotRoot,
    #[error("Could not stat {path}: {source}")]
    StatRoot { path: String, source: Errno },

    // Process and pipe resources.
    #[error("Unsharing mount namespace failed: {0}")]
    UnshareMount(Errno),
    #[error("Could not set all mounts to private: {0}")]
    MountsPrivate(Errno),
    #[error("pipe() failed: {0}")]
    PipeCreate(Errno),
    #[error("Could not set process as subreaper: {0}")]
    SubreaperSet(Errno),
    #[error("clone3() failed: {0}")]
    Clone(Errno),
    #[error("fork() failed: {0}")]
    Fork(Errno),

    // Cgroup delegation and configuration.
    #[error("Could not mount cgroupfs: {0}")]
    CgroupMount(Errno),
    #[error("Could not create cgroup: {0}")]
    CgroupCreate(Errno),
    #[error("Could not umount temporary cgroupfs mount: {0}")]
    CgroupUmount(Errno),
    #[error("Could not open cgroup {path}: {source}")]
    CgroupOpen { path: String, source: io::Error },
    #[error("Could not delegate container cgroup {file}: {source}")]
    CgroupDelegate { file: String, source: io::Error },
    #[error("Malformed cgroup option: {0} (missing =?)")]
    MalformedCgroupOption(String),
    #[error("Invalid cgroup option name: {0}")]
    InvalidCgroupOptionName(String),
    #[error("Failed to apply cgroup option {name}: {source}")]
    CgroupOptionWrite { name: String, source: io::Error },
    #[error("Could not move container process to cgroup: {0}")]
    CgroupMoveProc(io::Error),

    // User-namespace id maps.
    #[error("Could not open /proc/{pid}: {source}. Is /proc mounted?")]
    ProcOpen { pid: i32, source: io::Error },
    #[error("Could not set uid_map for child process: {0}")]
    UidMap(io::Error),
    #[error("Could not set setgroups for child process: {0}")]
    SetGroups(io::Error),
    #[error("Could not set gid_map for child process: {0}")]
    GidMap(io::Error),

    // Veth networking.
    #[error("Could not mount temporary procfs: {0}")]
    ProcMount(Errno),
    #[error("Could not umount temporary procfs mount: {0}")]
    ProcUmount(Errno),
    #[error("Could not open /proc/self/ns/net: {0}")]
    NetNsOpen(Errno),
    #[error("pidfd_open() on child PID failed: {0}")]
    PidfdOpen(Errno),
    #[error("setns() into the container network namespace failed: {0}")]
    SetNsChild(Errno),
    #[error("setns() back to the host network namespace failed: {0}")]
    SetNsSelf(Errno),
    #[error("Could not run the ip tool: {0}")]
    IpInvoke(io::Error),
    #[error("Failed to create veth pair {inside}-{outside}.")]
    VethCreate { inside: String, outside: String },
    #[error("Failed to move interface {0} to the host network namespace.")]
    VethMove(String),
    #[error("Failed to bring up interface {0}.")]
    IfUp(String),
    #[error("Could not add address {addr} to interface {interface}.")]
    AddrAdd { addr: String, interface: String },
    #[error("Could not add default route via {via} to interface {interface}.")]
    RouteAdd { via: String, interface: String },
    #[error("Could not attach interface {interface} to bridge {bridge}.")]
    BridgeAttach { interface: String, bridge: String },

    // Init-side failures, marshalled through the error pipe.
    #[error("Could not read the go-ahead signal from the launcher: {0}")]
    SyncRead(io::Error),
    #[error("Launcher sent an unexpected go-ahead message.")]
    SyncMessage,
    #[error("Could not switch UID or GID: {0}")]
    SetIds(Errno),
    #[error("Unsharing cgroup namespace failed: {0}")]
    UnshareCgroup(Errno),
    #[error("Could not bind-mount container root dir: {0}")]
    BindMount(Errno),
    #[error("Could not chdir to container root dir: {0}")]
    Chdir(Errno),
    #[error("pivot_root() to container root dir failed: {0}")]
    PivotRoot(Errno),
    #[error("Could not unmount old root dir: {0}")]
    UmountOld(Errno),
    #[error("Could not chdir to workdir {dir}: {source}")]
    WorkdirChdir { dir: String, source: Errno },
    #[error("Could not set container hostname: {0}")]
    SetHostname(Errno),
    #[error("fcntl() on error pipe failed: {0}")]
    CloExec(Errno),
    #[error("Command or environment string contains an interior NUL byte.")]
    ExecString,
    #[error("execve() failed: {0}")]
    Execve(Errno),

    // Launch lifecycle.
    #[error("Could not give the child the go-ahead signal: {0}")]
    SyncWrite(io::Error),
    #[error("{0}")]
    InitFailed(String),
    #[error("waitpid() failed: {0}")]
    WaitPid(Errno),
    #[error("Could not waitpid() on launcher: {0}")]
    LauncherWait(Errno),
    #[error("Could not read() result back from launcher: {0}")]
    ResultRead(io::Error),
}
