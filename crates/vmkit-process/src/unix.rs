//! Unix signal delivery.

use std::io;

use rustix::process::{Pid, Signal, kill_process};

use crate::error::{ProcessError, Result};

/// Hangup.
pub const SIGHUP: i32 = 1;
/// Interrupt (Ctrl+C).
pub const SIGINT: i32 = 2;
/// Kill (cannot be caught).
pub const SIGKILL: i32 = 9;
/// Cooperative termination request.
pub const SIGTERM: i32 = 15;

/// Deliver `signal` to the process `pid`.
pub fn send_signal(pid: u32, signal: i32) -> Result<()> {
    let target = Pid::from_raw(pid as i32).ok_or_else(|| ProcessError::Signal {
        signal,
        source: io::Error::new(io::ErrorKind::InvalidInput, "invalid pid"),
    })?;

    let sig = Signal::from_named_raw(signal).ok_or_else(|| ProcessError::Signal {
        signal,
        source: io::Error::new(io::ErrorKind::InvalidInput, "invalid signal"),
    })?;

    tracing::debug!(pid, signal, "delivering signal");
    kill_process(target, sig).map_err(|e| ProcessError::Signal {
        signal,
        source: io::Error::from_raw_os_error(e.raw_os_error()),
    })
}
