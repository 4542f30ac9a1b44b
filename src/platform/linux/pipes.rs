use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::OwnedFd;

use crate::core::error::LaunchError;
use crate::core::model::{ContainerResult, ERROR_INFO_SIZE, RESULT_RECORD_SIZE};

/// The 2-byte go-ahead message the launcher sends once every parent-side
/// setup step (cgroup membership, id maps, network) is in place.
const GO_AHEAD: &[u8; 2] = b"OK";

/// A pipe with both ends owned. Each end is consumed by its single use, so
/// the fd is closed exactly once on every path.
pub struct Pipe {
    pub rx: OwnedFd,
    pub tx: OwnedFd,
}

pub fn new_pipe() -> Result<Pipe, LaunchError> {
    let (rx, tx) = nix::unistd::pipe().map_err(LaunchError::PipeCreate)?;
    Ok(Pipe { rx, tx })
}

/// Launcher side of the barrier. A short write is fatal; a dead init
/// surfaces as EPIPE here (Rust ignores SIGPIPE).
pub fn write_go_ahead(tx: OwnedFd) -> Result<(), LaunchError> {
    let mut file = File::from(tx);
    match file.write(GO_AHEAD) {
        Ok(n) if n == GO_AHEAD.len() => Ok(()),
        Ok(_) => Err(LaunchError::SyncWrite(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "short write on sync pipe",
        ))),
        Err(err) => Err(LaunchError::SyncWrite(err)),
    }
}

/// Init side of the barrier: block until the launcher's go-ahead arrives.
/// If the launcher dies first, its write end closes and the read comes up
/// short, so init exits instead of orphaning.
pub fn read_go_ahead(rx: OwnedFd) -> Result<(), LaunchError> {
    let mut buf = [0u8; GO_AHEAD.len()];
    let mut file = File::from(rx);
    file.read_exact(&mut buf).map_err(LaunchError::SyncRead)?;
    if &buf != GO_AHEAD {
        return Err(LaunchError::SyncMessage);
    }
    Ok(())
}

/// Init side of the error channel: one message, then the process exits.
/// Failures to report are unreportable; they are ignored.
pub fn report_init_error(tx: OwnedFd, err: &LaunchError) {
    let mut file = File::from(tx);
    let _ = file.write(err.to_string().as_bytes());
}

/// Launcher side of the error channel. Blocks until init either fails
/// (bytes arrive) or execs (CLOEXEC closes the write end and the read
/// returns empty). Init messages fit one pipe write, so one read suffices.
pub fn read_init_error(rx: OwnedFd) -> Option<Vec<u8>> {
    let mut buf = [0u8; ERROR_INFO_SIZE - 1];
    let mut file = File::from(rx);
    match file.read(&mut buf) {
        Ok(n) if n > 0 => Some(buf[..n].to_vec()),
        _ => None,
    }
}

/// Launcher side of the result pipe: one atomic write of the whole record.
/// The launcher is about to exit either way, so failures are ignored.
pub fn write_result_record(tx: OwnedFd, result: &ContainerResult) {
    let mut file = File::from(tx);
    let _ = file.write(&result.to_bytes());
}

/// Caller side of the result pipe: exactly one record, or an error if the
/// launcher died before writing it.
pub fn read_result_record(rx: OwnedFd) -> Result<ContainerResult, LaunchError> {
    let mut buf = [0u8; RESULT_RECORD_SIZE];
    let mut file = File::from(rx);
    file.read_exact(&mut buf).map_err(LaunchError::ResultRead)?;
    Ok(ContainerResult::from_bytes(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_ahead_round_trip() {
        let pipe = new_pipe().unwrap();
        write_go_ahead(pipe.tx).unwrap();
        read_go_ahead(pipe.rx).unwrap();
    }

    #[test]
    fn go_ahead_read_fails_when_writer_dies_silently() {
        let pipe = new_pipe().unwrap();
        drop(pipe.tx);
        assert!(matches!(
            read_go_ahead(pipe.rx),
            Err(LaunchError::SyncRead(_))
        ));
    }

    #[test]
    fn error_channel_carries_one_message() {
        let pipe = new_pipe().unwrap();
        report_init_error(pipe.tx, &LaunchError::Execve(nix::errno::Errno::ENOENT));
        let msg = read_init_error(pipe.rx).expect("message expected");
        assert!(String::from_utf8_lossy(&msg).starts_with("execve() failed"));
    }

    #[test]
    fn error_channel_is_empty_after_cloexec_fires() {
        let pipe = new_pipe().unwrap();
        // Simulates a successful execve: the write end just closes.
        drop(pipe.tx);
        assert!(read_init_error(pipe.rx).is_none());
    }

    #[test]
    fn result_record_round_trip() {
        let pipe = new_pipe().unwrap();
        let mut result = ContainerResult::new();
        result.exit_status = 7 << 8;
        write_result_record(pipe.tx, &result);

        let back = read_result_record(pipe.rx).unwrap();
        assert!(back.container_started());
        assert_eq!(back.exit_code(), 7);
    }

    #[test]
    fn result_read_fails_when_launcher_dies_first() {
        let pipe = new_pipe().unwrap();
        drop(pipe.tx);
        assert!(matches!(
            read_result_record(pipe.rx),
            Err(LaunchError::ResultRead(_))
        ));
    }
}
