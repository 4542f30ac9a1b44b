//! End-to-end launch tests.
//!
//! The privileged tests require:
//! 1. Running on Linux as root (namespaces, cgroup v2, pivot_root).
//! 2. An extracted rootfs (e.g. Alpine minirootfs) at `tests/rootfs/`, or
//!    the path set in `JAIL_TEST_ROOTFS`:
//!
//! ```bash
//! mkdir -p tests/rootfs
//! curl -L https://dl-cdn.alpinelinux.org/alpine/v3.20/releases/x86_64/alpine-minirootfs-3.20.3-x86_64.tar.gz \
//!     | tar -xz -C tests/rootfs
//! ```
//!
//! Each privileged test is skipped when the prerequisites are missing.

use std::path::Path;
use std::process::Command;

use tinyjail::{launch_container, ContainerParams};

/// Return the rootfs path to use for the privileged tests.
fn rootfs_path() -> String {
    std::env::var("JAIL_TEST_ROOTFS").unwrap_or_else(|_| "tests/rootfs".to_string())
}

fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Check whether the privileged end-to-end tests can run.
fn can_run() -> bool {
    if !is_root() {
        eprintln!("SKIP: not running as root (euid != 0)");
        return false;
    }
    let rfs = rootfs_path();
    if !Path::new(&rfs).join("bin").exists() {
        eprintln!("SKIP: rootfs not found at {rfs}/bin");
        return false;
    }
    true
}

fn jail(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_jail"))
        .args(args)
        .output()
        .expect("failed to run jail")
}

#[test]
fn true_exits_zero_and_leaves_no_cgroup_residue() {
    if !can_run() {
        return;
    }
    let rootfs = rootfs_path();

    let output = jail(&["--root", &rootfs, "--id", "jailtest1", "--", "/bin/true"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");

    // The subtree was created in the shared unified hierarchy; after the
    // launch nothing named after the container may remain in the host view.
    assert!(
        !Path::new("/sys/fs/cgroup/jailtest1").exists(),
        "cgroup subtree left behind"
    );
}

#[test]
fn container_exit_code_is_propagated() {
    if !can_run() {
        return;
    }
    let rootfs = rootfs_path();

    let output = jail(&["--root", &rootfs, "--", "/bin/sh", "-c", "exit 7"]);
    assert_eq!(
        output.status.code(),
        Some(7),
        "exit code should be propagated from the container"
    );
}

#[test]
fn missing_entrypoint_reports_execve_failure() {
    if !can_run() {
        return;
    }
    let rootfs = rootfs_path();

    let output = jail(&["--root", &rootfs, "--id", "jailtest3", "--", "/nonexistent"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("execve() failed"),
        "stderr should carry the init-side execve error, got: {stderr}"
    );
    assert!(!Path::new("/sys/fs/cgroup/jailtest3").exists());
}

#[test]
fn slash_is_refused_as_container_root() {
    if !is_root() {
        eprintln!("SKIP: not running as root (euid != 0)");
        return;
    }

    let output = jail(&["--root", "/", "--", "/bin/true"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Container root dir cannot be /"),
        "got: {stderr}"
    );
}

#[test]
fn cgroup_options_are_applied() {
    if !can_run() {
        return;
    }
    let rootfs = rootfs_path();

    let output = jail(&[
        "--root",
        &rootfs,
        "--cgroup",
        "memory.max=100000000",
        "--cgroup",
        "pids.max=50",
        "--",
        "/bin/true",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");
}

#[test]
fn bad_cgroup_option_name_is_rejected() {
    if !can_run() {
        return;
    }
    let rootfs = rootfs_path();

    let output = jail(&[
        "--root",
        &rootfs,
        "--id",
        "jailtest6",
        "--cgroup",
        "../memory.max=1",
        "--",
        "/bin/true",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid cgroup option name"),
        "got: {stderr}"
    );
    assert!(!Path::new("/sys/fs/cgroup/jailtest6").exists());
}

#[test]
fn environment_reaches_the_entrypoint() {
    if !can_run() {
        return;
    }
    let rootfs = rootfs_path();

    let output = jail(&[
        "--root",
        &rootfs,
        "--env",
        "ANSWER=42",
        "--",
        "/bin/sh",
        "-c",
        "test \"$ANSWER\" = 42",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");
}

#[test]
fn hostname_is_set_inside_the_container() {
    if !can_run() {
        return;
    }
    let rootfs = rootfs_path();

    let output = jail(&[
        "--root",
        &rootfs,
        "--hostname",
        "boxtest",
        "--",
        "/bin/sh",
        "-c",
        "test \"$(hostname)\" = boxtest",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");
}

#[test]
fn workdir_is_entered_before_exec() {
    if !can_run() {
        return;
    }
    let rootfs = rootfs_path();

    let output = jail(&[
        "--root",
        &rootfs,
        "--workdir",
        "/tmp",
        "--",
        "/bin/sh",
        "-c",
        "test \"$PWD\" = /tmp",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");
}

#[test]
fn host_network_skips_veth_setup() {
    if !can_run() {
        return;
    }

    // With the host's netns shared there is no veth wiring at all, so this
    // must succeed even where the `ip` tool is unavailable.
    let params = ContainerParams {
        container_dir: rootfs_path().into(),
        command: vec!["/bin/true".into()],
        use_host_network: true,
        ..Default::default()
    };
    let result = launch_container(&params);
    assert!(result.container_started(), "{}", result.error_message());
    assert!(result.exited());
    assert_eq!(result.exit_code(), 0);
}

#[test]
fn library_call_reports_container_exit() {
    if !can_run() {
        return;
    }
    let params = ContainerParams {
        container_dir: rootfs_path().into(),
        command: vec!["/bin/sh".into(), "-c".into(), "exit 5".into()],
        ..Default::default()
    };

    let result = launch_container(&params);
    assert!(result.container_started(), "{}", result.error_message());
    assert!(result.exited());
    assert_eq!(result.exit_code(), 5);
}

#[test]
fn unprivileged_launch_reports_root_requirement() {
    if is_root() {
        eprintln!("SKIP: running as root");
        return;
    }

    // Exercises the whole caller/launcher record pipe without privileges:
    // the launcher starts, refuses to work, and its message comes back
    // through the fixed-size record.
    let params = ContainerParams {
        container_dir: "/tmp".into(),
        command: vec!["/bin/true".into()],
        ..Default::default()
    };
    let result = launch_container(&params);
    assert!(!result.container_started());
    assert!(
        result.error_message().contains("root permissions"),
        "got: {}",
        result.error_message()
    );
}
