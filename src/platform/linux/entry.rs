use std::panic::{catch_unwind, AssertUnwindSafe};

use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::{fork, ForkResult};

use crate::core::error::LaunchError;
use crate::core::model::{ContainerParams, ContainerResult};
use crate::platform::linux::{launcher, pipes};

/// Launch a container and wait for it to finish.
///
/// The actual work happens in a forked launcher process: the launcher
/// permanently joins a private mount namespace and flags itself as a
/// subreaper, and neither may leak into the caller. The caller only sets up
/// a result pipe, forks, and reads one fixed-size record back.
pub fn launch_container(params: &ContainerParams) -> ContainerResult {
    let mut result = ContainerResult::new();

    let pipe = match pipes::new_pipe() {
        Ok(pipe) => pipe,
        Err(err) => {
            result.fail(&err.to_string());
            return result;
        }
    };

    // SAFETY: the child never returns from this match arm; it writes the
    // result record and `_exit`s without touching the caller's state.
    match unsafe { fork() } {
        Err(errno) => {
            result.fail(&LaunchError::Fork(errno).to_string());
            result
        }
        Ok(ForkResult::Child) => {
            drop(pipe.rx);
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                launcher::run(params, &mut result);
            }));
            if outcome.is_err() {
                result.fail("Launcher panicked.");
            }
            pipes::write_result_record(pipe.tx, &result);
            unsafe { libc::_exit(0) }
        }
        Ok(ForkResult::Parent { child }) => {
            drop(pipe.tx);
            // The record is read before the launcher is reaped, so the
            // record is observed even if the launcher exits abnormally.
            let record = pipes::read_result_record(pipe.rx);
            let waited = waitpid(child, Some(WaitPidFlag::__WALL));
            match record {
                Err(err) => result.fail(&err.to_string()),
                Ok(record) => match waited {
                    Err(errno) => result.fail(&LaunchError::LauncherWait(errno).to_string()),
                    Ok(_) => result = record,
                },
            }
            result
        }
    }
}
