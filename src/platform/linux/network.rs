use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
use std::path::Path;
use std::process::Command;

use nix::fcntl::OFlag;
use nix::sched::{setns, CloneFlags};
use nix::sys::stat::Mode;

use crate::core::error::LaunchError;
use crate::core::model::ContainerParams;
use crate::platform::linux::mounts;

/// Interface names for a container's veth pair: `i_<id>` lives inside the
/// container netns, `o_<id>` in the host netns. The 12-byte cap on ids
/// keeps both within the kernel's 15-byte interface name limit.
pub fn veth_names(id: &str) -> (String, String) {
    (format!("i_{id}"), format!("o_{id}"))
}

/// Wire the container's network: build a veth pair from inside the child's
/// netns, migrate the outside end to the launcher's netns, then configure
/// addressing, routing, and the bridge attachment.
///
/// A scratch procfs is mounted at the container root for the duration so
/// `/proc/self/ns/net` resolves even on hosts with an unusual proc setup.
pub fn setup(
    child_pidfd: &OwnedFd,
    dir: &Path,
    id: &str,
    params: &ContainerParams,
) -> Result<(), LaunchError> {
    mounts::mount_scratch_proc(dir).map_err(LaunchError::ProcMount)?;
    let configure_result = enter_and_configure(child_pidfd, id, params);
    let umount_result = mounts::detach(dir);
    configure_result?;
    umount_result.map_err(LaunchError::ProcUmount)?;
    Ok(())
}

fn enter_and_configure(
    child_pidfd: &OwnedFd,
    id: &str,
    params: &ContainerParams,
) -> Result<(), LaunchError> {
    // The fd number is substituted into `ip … netns /proc/self/fd/<N>`, so
    // it must survive the exec of `ip`: open it without CLOEXEC.
    let raw = nix::fcntl::open("/proc/self/ns/net", OFlag::O_RDONLY, Mode::empty())
        .map_err(LaunchError::NetNsOpen)?;
    let my_netns = unsafe { OwnedFd::from_raw_fd(raw) };

    let result = configure(child_pidfd, &my_netns, id, params);
    // No parent-side step may run in the child's netns: switch back even on
    // the error path.
    let _ = setns(my_netns.as_fd(), CloneFlags::CLONE_NEWNET);
    result
}

fn configure(
    child_pidfd: &OwnedFd,
    my_netns: &OwnedFd,
    id: &str,
    params: &ContainerParams,
) -> Result<(), LaunchError> {
    let (inside, outside) = veth_names(id);

    // The pair is created inside the container netns; when init dies the
    // netns collapses and the kernel reclaims both ends, so the failure
    // path needs no explicit teardown.
    setns(child_pidfd.as_fd(), CloneFlags::CLONE_NEWNET).map_err(LaunchError::SetNsChild)?;
    if !ip(&["link", "add", "dev", &inside, "type", "veth", "peer", &outside])? {
        return Err(LaunchError::VethCreate { inside, outside });
    }
    let netns_path = format!("/proc/self/fd/{}", my_netns.as_raw_fd());
    if !ip(&["link", "set", &outside, "netns", &netns_path])? {
        return Err(LaunchError::VethMove(outside));
    }
    if !ip(&["link", "set", &inside, "up"])? {
        return Err(LaunchError::IfUp(inside));
    }
    if let Some(addr) = &params.ip_addr {
        if !ip(&["addr", "add", addr, "dev", &inside])? {
            return Err(LaunchError::AddrAdd {
                addr: addr.clone(),
                interface: inside,
            });
        }
    }
    if let Some(via) = &params.default_route {
        if !ip(&["route", "add", "default", "via", via, "dev", &inside])? {
            return Err(LaunchError::RouteAdd {
                via: via.clone(),
                interface: inside,
            });
        }
    }

    setns(my_netns.as_fd(), CloneFlags::CLONE_NEWNET).map_err(LaunchError::SetNsSelf)?;

    if let Some(addr) = &params.peer_ip_addr {
        if !ip(&["addr", "add", addr, "dev", &outside])? {
            return Err(LaunchError::AddrAdd {
                addr: addr.clone(),
                interface: outside,
            });
        }
    }
    if let Some(bridge) = &params.network_bridge {
        if !ip(&["link", "set", &outside, "master", bridge])? {
            return Err(LaunchError::BridgeAttach {
                interface: outside,
                bridge: bridge.clone(),
            });
        }
    }
    if !ip(&["link", "set", &outside, "up"])? {
        return Err(LaunchError::IfUp(outside));
    }
    Ok(())
}

/// Run one `ip` invocation; `Ok(false)` is a nonzero exit from the tool.
fn ip(args: &[&str]) -> Result<bool, LaunchError> {
    let status = Command::new("ip")
        .args(args)
        .status()
        .map_err(LaunchError::IpInvoke)?;
    Ok(status.success())
}
