//! Error types for vmkit.
//!
//! Process-level failures (spawn, stream I/O, lifecycle misuse) come from
//! `vmkit-process` and are wrapped in [`VmkitError::Process`]. The
//! remaining variants cover readiness timeouts, patterns, configuration and
//! sinks.
//!
//! An expectation that never matches is not an error: it stays parked at
//! the head of the watcher queue. Bounded waiting is the caller's job, see
//! [`Console::with_deadline`](crate::console::Console::with_deadline).

use std::time::Duration;

use thiserror::Error;
use vmkit_process::ProcessError;

/// The main error type for vmkit operations.
#[derive(Debug, Error)]
pub enum VmkitError {
    /// A supervised process operation failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A bounded wait ran out of time.
    #[error("timed out after {duration:?} waiting for {target}")]
    Timeout {
        /// The timeout that elapsed.
        duration: Duration,
        /// What was being waited for.
        target: String,
    },

    /// Invalid regex pattern.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Invalid pattern specification.
    #[error("invalid pattern: {message}")]
    InvalidPattern {
        /// Description of what's wrong with the pattern.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// An awaited expectation was dropped before it fired.
    #[error("expectation was dropped before it matched")]
    WatchClosed,
}

/// Result type alias for vmkit operations.
pub type Result<T> = std::result::Result<T, VmkitError>;

impl VmkitError {
    /// Create a timeout error.
    pub fn timeout(duration: Duration, target: impl Into<String>) -> Self {
        Self::Timeout {
            duration,
            target: target.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid pattern error.
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The elapsed timeout, if this is a timeout error.
    #[must_use]
    pub const fn timeout_duration(&self) -> Option<Duration> {
        match self {
            Self::Timeout { duration, .. } => Some(*duration),
            _ => None,
        }
    }

    /// Check if the underlying failure was a process spawn error.
    #[must_use]
    pub const fn is_spawn(&self) -> bool {
        matches!(self, Self::Process(err) if err.is_spawn())
    }
}
