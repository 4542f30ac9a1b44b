pub mod commands;

use clap::Parser;

/// jail — a minimal Linux container launcher.
#[derive(Parser, Debug)]
#[command(name = "jail", version, about)]
pub struct Cli {
    /// Path to the directory that becomes the container root. Must be
    /// writable and must not resolve to /.
    #[arg(long)]
    pub root: String,

    /// Container ID, at most 12 characters. A random hex ID is generated
    /// when omitted.
    #[arg(long)]
    pub id: Option<String>,

    /// Environment variable for the container, as KEY=VALUE. Repeatable.
    #[arg(long = "env")]
    pub env: Vec<String>,

    /// Working directory inside the container to change into before exec.
    #[arg(long)]
    pub workdir: Option<String>,

    /// Cgroup option as <name>=<value>, written to that file in the
    /// container's cgroup (e.g. memory.max=100000000). Repeatable.
    #[arg(long = "cgroup")]
    pub cgroup: Vec<String>,

    /// Attach the host end of the veth pair to this bridge. Conflicts with
    /// --peer-ip-address.
    #[arg(long = "network-bridge")]
    pub network_bridge: Option<String>,

    /// IP address (with prefix length) for the container's interface.
    #[arg(long = "ip-address")]
    pub ip_address: Option<String>,

    /// IP address for the host end of the veth pair. Conflicts with
    /// --network-bridge.
    #[arg(long = "peer-ip-address")]
    pub peer_ip_address: Option<String>,

    /// Next-hop address for the container's default route.
    #[arg(long = "default-route")]
    pub default_route: Option<String>,

    /// Hostname inside the container (default: "tinyjail").
    #[arg(long)]
    pub hostname: Option<String>,

    /// The command (and arguments) to execute inside the container.
    /// Everything after `--` is treated as the command.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Parse CLI arguments. Called from `main`.
pub fn parse() -> Cli {
    Cli::parse()
}
