//! Error types for the vmkit-process crate.
//!
//! This module provides [`ProcessError`], covering spawn failures, stream
//! failures and lifecycle misuse of a supervised process.

use std::io;

/// The error type for supervised process operations.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The executable could not be located or exec failed.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// The program that was being spawned.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An I/O error occurred on one of the child's streams.
    #[error("{context}: {source}")]
    Io {
        /// What operation was being performed.
        context: &'static str,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Input was sent but stdin is not piped.
    #[error("process input is not piped")]
    InputNotPiped,

    /// The input stream has been closed.
    #[error("process input is closed")]
    InputClosed,

    /// Output was requested but stdout is not piped.
    #[error("process output is not piped")]
    OutputNotPiped,

    /// The supervisor has not started a process yet.
    #[error("no process has been started")]
    NotStarted,

    /// `start` was called on a supervisor that already owns a process.
    #[error("a process has already been started by this supervisor")]
    AlreadyStarted,

    /// The process has already exited.
    #[error("process has exited")]
    Exited,

    /// Waiting for the process failed.
    #[error("failed to wait for process: {reason}")]
    Wait {
        /// Description of the failure.
        reason: String,
    },

    /// Delivering a signal failed.
    #[cfg(unix)]
    #[error("failed to deliver signal {signal}: {source}")]
    Signal {
        /// The signal number.
        signal: i32,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// A specialized Result type for supervised process operations.
pub type Result<T> = std::result::Result<T, ProcessError>;

impl ProcessError {
    /// Create a spawn error.
    pub fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Create an I/O error with context.
    #[must_use]
    pub const fn io(context: &'static str, source: io::Error) -> Self {
        Self::Io { context, source }
    }

    /// Check whether this is a spawn failure because the executable was not found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// Check whether the error is a spawn failure.
    #[must_use]
    pub const fn is_spawn(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_display() {
        let err = ProcessError::spawn(
            "/nonexistent/qemu",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/nonexistent/qemu"));
        assert!(msg.contains("No such file"));
        assert!(err.is_not_found());
        assert!(err.is_spawn());
    }

    #[test]
    fn io_error_keeps_context() {
        let err = ProcessError::io("writing to process input", io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(err.to_string().starts_with("writing to process input"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn lifecycle_errors_display() {
        assert_eq!(ProcessError::Exited.to_string(), "process has exited");
        assert_eq!(ProcessError::InputNotPiped.to_string(), "process input is not piped");
    }
}
