use std::path::Path;

use nix::errno::Errno;
use nix::mount::{mount, umount2, MntFlags, MsFlags};

/// Make the entire mount tree private so nothing the launcher mounts
/// propagates to the host. Must run right after `unshare(CLONE_NEWNS)` and
/// before any other mount.
pub fn make_mount_tree_private() -> Result<(), Errno> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
}

/// Bind-mount the container root over itself so it becomes a mount point,
/// which `pivot_root` requires.
pub fn bind_over_self(dir: &Path) -> Result<(), Errno> {
    mount(
        Some(dir),
        dir,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_PRIVATE | MsFlags::MS_REC | MsFlags::MS_NOSUID,
        None::<&str>,
    )
}

/// Mount a fresh cgroup2 view at `dir`. The unified hierarchy is shared
/// kernel state, so a subtree created through this scratch view is the real
/// thing; only the mount itself is private to the launcher.
pub fn mount_cgroup2(dir: &Path) -> Result<(), Errno> {
    mount(
        Some("none"),
        dir,
        Some("cgroup2"),
        MsFlags::empty(),
        None::<&str>,
    )
}

/// Mount a scratch procfs at `dir` for the duration of network setup.
pub fn mount_scratch_proc(dir: &Path) -> Result<(), Errno> {
    mount(
        Some("proc"),
        dir,
        Some("proc"),
        MsFlags::empty(),
        None::<&str>,
    )
}

/// Lazy-detach whatever is mounted at `path`.
pub fn detach(path: &Path) -> Result<(), Errno> {
    umount2(path, MntFlags::MNT_DETACH)
}
