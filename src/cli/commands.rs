use crate::cli::Cli;
use crate::core::model::ContainerParams;

/// Run the container described by the CLI arguments and map the outcome to
/// a process exit code: the container's own exit code when it ran to
/// completion, nonzero with a message on stderr otherwise.
pub fn dispatch(cli: Cli) -> i32 {
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cli;
        eprintln!("jail only runs on Linux");
        1
    }

    #[cfg(target_os = "linux")]
    {
        let params = params_from_cli(cli);
        let result = crate::platform::linux::entry::launch_container(&params);

        if !result.container_started() {
            let message = result.error_message();
            if message.is_empty() {
                eprintln!("Error when starting container: (no error info)");
            } else {
                eprintln!("Error when starting container: {message}");
            }
            1
        } else if result.exited() {
            result.exit_code()
        } else if result.signaled() {
            eprintln!("Container killed by signal {}", result.term_signal());
            1
        } else {
            eprintln!("Container exit info: {:x}", result.exit_status);
            1
        }
    }
}

fn params_from_cli(cli: Cli) -> ContainerParams {
    ContainerParams {
        container_id: cli.id,
        container_dir: cli.root.into(),
        command: cli.command,
        environment: cli.env,
        work_dir: cli.workdir,
        uid: None,
        gid: None,
        cgroup_options: cli.cgroup,
        use_host_network: false,
        network_bridge: cli.network_bridge,
        ip_addr: cli.ip_address,
        peer_ip_addr: cli.peer_ip_address,
        default_route: cli.default_route,
        hostname: cli.hostname,
    }
}
