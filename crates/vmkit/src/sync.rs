//! Synchronous wrapper for console sessions.
//!
//! [`SyncConsole`] owns a small multi-threaded Tokio runtime so output keeps
//! being read and matched between blocking calls.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::config::ConsoleConfig;
use crate::console::Console;
use crate::error::{Result, VmkitError};
use crate::watch::{Pattern, PendingMatch, WatchMatch};

/// A blocking console session.
pub struct SyncConsole {
    // Dropped before the runtime so the kill-on-drop reaches a live driver.
    inner: Console,
    runtime: Runtime,
}

impl SyncConsole {
    /// Launch a console on a dedicated runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built or launching fails.
    pub fn launch(config: ConsoleConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("vmkit-console")
            .enable_all()
            .build()
            .map_err(|e| VmkitError::io_context("creating tokio runtime", e))?;

        let inner = {
            let _guard = runtime.enter();
            Console::launch(config)?
        };

        Ok(Self { inner, runtime })
    }

    /// Queue an expectation with a callback.
    pub fn expect<P, F>(&self, pattern: P, callback: F)
    where
        P: Into<Pattern>,
        F: FnOnce(&WatchMatch) + Send + 'static,
    {
        self.inner.expect(pattern, callback);
    }

    /// Block until `pattern` matches. Waits forever if it never does.
    pub fn wait_for(&self, pattern: impl Into<Pattern>) -> Result<WatchMatch> {
        self.runtime.block_on(self.inner.wait_for(pattern))
    }

    /// Block until `pattern` matches or `timeout` passes.
    ///
    /// On timeout the process is killed.
    pub fn wait_for_within(
        &self,
        pattern: impl Into<Pattern>,
        timeout: Duration,
    ) -> Result<WatchMatch> {
        self.runtime
            .block_on(self.inner.with_deadline(timeout, self.inner.wait_for(pattern)))
    }

    /// Block until an already queued expectation fires or `timeout` passes.
    ///
    /// Queue it with [`Console::wait_for`] through [`console`](Self::console)
    /// before sending the input that provokes it. On timeout the process is
    /// killed.
    pub fn wait_pending(&self, pending: PendingMatch, timeout: Duration) -> Result<WatchMatch> {
        self.runtime
            .block_on(self.inner.with_deadline(timeout, pending))
    }

    /// Send bytes to the process.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.runtime.block_on(self.inner.send(data))
    }

    /// Send a line followed by the configured line ending.
    pub fn send_line(&self, line: &str) -> Result<()> {
        self.runtime.block_on(self.inner.send_line(line))
    }

    /// Wait for a TCP endpoint to accept connections.
    pub fn wait_ready(&self, target: impl Into<String>) -> Result<Duration> {
        self.runtime.block_on(self.inner.wait_ready(target))
    }

    /// Kill the process and wait until it is reaped.
    pub fn kill(&self) -> Result<ExitStatus> {
        self.runtime.block_on(self.inner.kill())
    }

    /// Wait for the process to exit.
    pub fn wait(&self) -> Result<ExitStatus> {
        self.runtime.block_on(self.inner.wait())
    }

    /// The async console.
    #[must_use]
    pub const fn console(&self) -> &Console {
        &self.inner
    }
}

impl std::fmt::Debug for SyncConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConsole")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
