//! tinyjail — a minimal Linux container launcher.
//!
//! Given a root directory, an entrypoint command, an environment, cgroup-v2
//! settings, and an optional veth attachment, [`launch_container`] creates a
//! fully isolated process: fresh mount, PID, IPC, UTS, user, time, network,
//! and cgroup namespaces, a pivoted filesystem root, a delegated cgroup
//! subtree, and an optional veth link into a host bridge. When the contained
//! process exits, the launcher reaps it, removes the cgroup subtree, and
//! reports the exit status or the first error.
//!
//! Three processes cooperate: the caller, which only forks and reads one
//! result record back; the launcher, which does all host-side setup inside
//! a private mount namespace; and the container init, which waits for the
//! launcher's go-ahead, transforms its namespaces, and execs the
//! entrypoint.

pub mod cli;
pub mod core;
pub mod platform;
pub mod util;

pub use crate::core::error::LaunchError;
pub use crate::core::model::{ContainerParams, ContainerResult, ERROR_INFO_SIZE};

#[cfg(target_os = "linux")]
pub use crate::platform::linux::entry::launch_container;
