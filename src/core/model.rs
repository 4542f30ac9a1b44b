use std::path::PathBuf;

/// Capacity of the error buffer carried in a [`ContainerResult`], including
/// the terminating NUL. Messages longer than this are truncated.
pub const ERROR_INFO_SIZE: usize = 240;

/// Size of a serialized result record: two little-endian `i32`s followed by
/// the error buffer. Kept well under `PIPE_BUF` so one pipe write is atomic.
pub const RESULT_RECORD_SIZE: usize = 8 + ERROR_INFO_SIZE;

/// Parameters for launching a container. Constructed by the caller (CLI or
/// library user), validated once by the launcher, never mutated.
#[derive(Debug, Clone, Default)]
pub struct ContainerParams {
    /// Explicit container ID, at most 12 bytes (it is embedded in veth
    /// interface names, which the kernel caps at 15 bytes, and in the cgroup
    /// subtree name). If `None`, a random 12-hex-char ID is generated.
    pub container_id: Option<String>,
    /// Path to a writable directory that becomes the container root.
    pub container_dir: PathBuf,
    /// Entrypoint command; element 0 is the executable path as seen inside
    /// the container.
    pub command: Vec<String>,
    /// `KEY=VALUE` environment strings. An empty environment is legal.
    pub environment: Vec<String>,
    /// Directory inside the container to change into before exec.
    pub work_dir: Option<String>,
    /// Host UID mapped to container UID 0. `None` means: use the owner of
    /// `container_dir`.
    pub uid: Option<u32>,
    /// Host GID mapped to container GID 0. `None` means: use the group of
    /// `container_dir`.
    pub gid: Option<u32>,
    /// `<filename>=<contents>` pairs written into the container's cgroup
    /// directory, in order.
    pub cgroup_options: Vec<String>,
    /// Keep the host network namespace; suppresses all veth setup.
    pub use_host_network: bool,
    /// Bridge to attach the outside veth end to. Mutually exclusive with
    /// `peer_ip_addr`.
    pub network_bridge: Option<String>,
    /// Address assigned to the inside veth end.
    pub ip_addr: Option<String>,
    /// Address assigned to the outside veth end. Mutually exclusive with
    /// `network_bridge`.
    pub peer_ip_addr: Option<String>,
    /// Next-hop for the container's default route.
    pub default_route: Option<String>,
    /// Hostname inside the container. Defaults to `tinyjail`.
    pub hostname: Option<String>,
}

/// Outcome of a container launch. A fixed-size record so it crosses the
/// launcher's result pipe in a single atomic write.
#[derive(Debug, Clone, Copy)]
pub struct ContainerResult {
    /// 0 if the contained process was successfully `execve`d, nonzero
    /// otherwise.
    pub start_status: i32,
    /// Raw wait status of the init process, valid when `start_status == 0`.
    pub exit_status: i32,
    /// NUL-terminated human-readable first-failure message.
    pub error_info: [u8; ERROR_INFO_SIZE],
}

impl Default for ContainerResult {
    fn default() -> Self {
        Self {
            start_status: 0,
            exit_status: 0,
            error_info: [0; ERROR_INFO_SIZE],
        }
    }
}

impl ContainerResult {
    pub fn new() -> Self {
        Default::default()
    }

    /// True if the contained process reached `execve` successfully.
    pub fn container_started(&self) -> bool {
        self.start_status == 0
    }

    /// Mark the launch as failed with the given message. The first recorded
    /// error wins; later calls on an already-failed result are ignored.
    pub fn fail(&mut self, message: &str) {
        if self.start_status != 0 {
            return;
        }
        self.start_status = -1;
        self.set_error(message.as_bytes());
    }

    /// Copy a message into the error buffer, truncated to 239 bytes + NUL.
    pub fn set_error(&mut self, message: &[u8]) {
        let len = message.len().min(ERROR_INFO_SIZE - 1);
        self.error_info[..len].copy_from_slice(&message[..len]);
        self.error_info[len..].fill(0);
    }

    /// The stored error message, up to the first NUL.
    pub fn error_message(&self) -> std::borrow::Cow<'_, str> {
        let end = self
            .error_info
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(ERROR_INFO_SIZE);
        String::from_utf8_lossy(&self.error_info[..end])
    }

    /// True if the container process terminated normally.
    pub fn exited(&self) -> bool {
        libc::WIFEXITED(self.exit_status)
    }

    /// Exit code of the container process; meaningful when `exited()`.
    pub fn exit_code(&self) -> i32 {
        libc::WEXITSTATUS(self.exit_status)
    }

    /// True if the container process was killed by a signal.
    pub fn signaled(&self) -> bool {
        libc::WIFSIGNALED(self.exit_status)
    }

    /// Terminating signal number; meaningful when `signaled()`.
    pub fn term_signal(&self) -> i32 {
        libc::WTERMSIG(self.exit_status)
    }

    /// Serialize into the wire record sent over the result pipe.
    pub fn to_bytes(&self) -> [u8; RESULT_RECORD_SIZE] {
        let mut buf = [0u8; RESULT_RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.start_status.to_le_bytes());
        buf[4..8].copy_from_slice(&self.exit_status.to_le_bytes());
        buf[8..].copy_from_slice(&self.error_info);
        buf
    }

    /// Deserialize a wire record read from the result pipe.
    pub fn from_bytes(buf: &[u8; RESULT_RECORD_SIZE]) -> Self {
        let mut error_info = [0u8; ERROR_INFO_SIZE];
        error_info.copy_from_slice(&buf[8..]);
        Self {
            start_status: i32::from_le_bytes(buf[0..4].try_into().unwrap()),
            exit_status: i32::from_le_bytes(buf[4..8].try_into().unwrap()),
            error_info,
        }
    }
}
