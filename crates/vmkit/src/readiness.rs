//! Readiness polling.
//!
//! Waits for a TCP service inside the guest (typically a forwarded SSH
//! port) to accept connections. Refused connections are retried after a
//! fixed backoff until the overall deadline passes.

use std::io;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use vmkit_process::ProcessSupervisor;

use crate::config::ReadinessConfig;
use crate::error::{Result, VmkitError};

/// A bounded TCP connect retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessProbe {
    target: String,
    interval: Duration,
    timeout: Duration,
}

impl ReadinessProbe {
    /// Probe `target` (`host:port`) with the default interval.
    #[must_use]
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self::from_config(target, &ReadinessConfig::new(timeout))
    }

    /// Probe `target` with the given configuration.
    #[must_use]
    pub fn from_config(target: impl Into<String>, config: &ReadinessConfig) -> Self {
        Self {
            target: target.into(),
            interval: config.interval,
            timeout: config.timeout,
        }
    }

    /// Set the backoff between attempts.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The probed endpoint.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The overall deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll until the endpoint accepts a connection.
    ///
    /// Returns the time it took. Fails with [`VmkitError::Timeout`] once the
    /// deadline has passed, or with an I/O error for failures other than a
    /// refused or reset connection.
    pub async fn poll(&self) -> Result<Duration> {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                tracing::warn!(
                    endpoint = %self.target,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "endpoint did not become ready"
                );
                return Err(VmkitError::timeout(self.timeout, self.target.clone()));
            }

            attempts += 1;
            let remaining = self.timeout - elapsed;
            match tokio::time::timeout(remaining, TcpStream::connect(self.target.as_str())).await {
                Ok(Ok(_stream)) => {
                    let elapsed = start.elapsed();
                    tracing::info!(
                        endpoint = %self.target,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "endpoint is ready"
                    );
                    return Ok(elapsed);
                }
                Ok(Err(error)) if is_retryable(&error) => {
                    tracing::trace!(endpoint = %self.target, %error, "endpoint not ready yet");
                }
                Ok(Err(error)) => {
                    return Err(VmkitError::io_context(
                        format!("connecting to {}", self.target),
                        error,
                    ));
                }
                // The attempt used up the remaining time; the deadline check
                // at the top of the loop reports it.
                Err(_) => continue,
            }

            let remaining = self.timeout.saturating_sub(start.elapsed());
            tokio::time::sleep(self.interval.min(remaining)).await;
        }
    }

    /// Poll until ready, killing the supervised process on timeout.
    pub async fn wait(&self, supervisor: &ProcessSupervisor) -> Result<Duration> {
        match self.poll().await {
            Err(error) if error.is_timeout() => {
                if let Err(kill_error) = supervisor.kill().await {
                    tracing::warn!(%kill_error, "killing process after readiness timeout failed");
                }
                Err(error)
            }
            other => other,
        }
    }
}

fn is_retryable(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}
