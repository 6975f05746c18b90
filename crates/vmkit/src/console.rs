//! The console control surface.
//!
//! A [`Console`] wires one supervised process to a [`StreamWatcher`] and an
//! optional [`OutputSink`], and exposes the operations a provisioning
//! script needs: queue expectations, send input, wait for readiness and
//! terminate.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use vmkit::prelude::*;
//!
//! let config = ConsoleConfig::new("qemu-system-x86_64")
//!     .args(["-nographic", "-hda", "hd.qcow2"])
//!     .output("console.log");
//! let console = Console::launch(config)?;
//!
//! console
//!     .with_deadline(Duration::from_secs(120), async {
//!         console.wait_for("login: ").await?;
//!         let shell = console.wait_for("# ");
//!         console.send_line("root").await?;
//!         shell.await?;
//!         console.send_line("poweroff").await
//!     })
//!     .await?;
//! console.wait().await?;
//! ```

use std::future::Future;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use vmkit_process::{InputHandle, KillSwitch, ProcessError, ProcessHandle, ProcessSupervisor};

use crate::config::ConsoleConfig;
use crate::error::{Result, VmkitError};
use crate::readiness::ReadinessProbe;
use crate::sink::OutputSink;
use crate::watch::{Pattern, PendingMatch, StreamWatcher, WatchMatch};

/// A running console session.
///
/// Dropping the console kills the process if it is still running.
#[derive(Debug)]
pub struct Console {
    supervisor: ProcessSupervisor,
    watcher: StreamWatcher,
    sink: Option<Arc<OutputSink>>,
    handle: ProcessHandle,
    config: ConsoleConfig,
}

impl Console {
    /// Validate `config`, attach the sink and watcher, then start the process.
    ///
    /// The sink is registered before the watcher, so a chunk is on disk
    /// before any expectation callback sees it. Must be called from within a
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, output is not
    /// piped, the transcript cannot be opened or the process cannot be
    /// spawned.
    pub fn launch(config: ConsoleConfig) -> Result<Self> {
        config.validate()?;
        if !config.process.pipe_output {
            return Err(ProcessError::OutputNotPiped.into());
        }

        let supervisor = ProcessSupervisor::new();
        let sink = config
            .sink
            .as_ref()
            .map(|sink| OutputSink::attach(&supervisor, sink))
            .transpose()?;
        let watcher = StreamWatcher::attach(&supervisor, config.watcher.window);
        let handle = supervisor.start(&config.process)?;

        tracing::info!(
            program = %config.process.program,
            pid = ?handle.pid,
            window = config.watcher.window,
            transcript = ?sink.as_ref().map(|s| s.path().display().to_string()),
            "console launched"
        );

        Ok(Self {
            supervisor,
            watcher,
            sink,
            handle,
            config,
        })
    }

    /// Queue an expectation with a callback.
    ///
    /// The callback runs on the output reader; see [`StreamWatcher`].
    pub fn expect<P, F>(&self, pattern: P, callback: F)
    where
        P: Into<Pattern>,
        F: FnOnce(&WatchMatch) + Send + 'static,
    {
        self.watcher.expect(pattern, callback);
    }

    /// Queue a regex expectation with a callback.
    pub fn expect_regex<F>(&self, pattern: &str, callback: F) -> Result<()>
    where
        F: FnOnce(&WatchMatch) + Send + 'static,
    {
        self.watcher.expect_regex(pattern, callback)
    }

    /// Queue an expectation and return a future that resolves when it fires.
    ///
    /// The expectation is queued by this call, not on first poll, so it is
    /// safe to create it before sending the input that triggers the output.
    /// There is no timeout: an expectation that never matches stays pending
    /// forever. Wrap the session in [`with_deadline`](Self::with_deadline)
    /// for bounded behaviour.
    pub fn wait_for(&self, pattern: impl Into<Pattern>) -> PendingMatch {
        self.watcher.wait_for(pattern)
    }

    /// Queue a regex expectation; see [`wait_for`](Self::wait_for).
    pub fn wait_for_regex(&self, pattern: &str) -> Result<PendingMatch> {
        Ok(self.watcher.wait_for(Pattern::regex(pattern)?))
    }

    /// Write bytes to the process and wait until they are flushed.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        self.supervisor.send(data).await?;
        Ok(())
    }

    /// Write a string to the process.
    pub async fn send_str(&self, s: &str) -> Result<()> {
        self.send(s.as_bytes()).await
    }

    /// Write a line followed by the configured line ending.
    pub async fn send_line(&self, line: &str) -> Result<()> {
        let mut data = String::with_capacity(line.len() + 2);
        data.push_str(line);
        data.push_str(self.config.line_ending.as_str());
        self.send(data.as_bytes()).await
    }

    /// A weak input handle for typing from inside callbacks.
    pub fn input_handle(&self) -> Result<InputHandle> {
        Ok(self.supervisor.input_handle()?)
    }

    /// A kill trigger for use inside callbacks.
    #[must_use]
    pub fn kill_switch(&self) -> KillSwitch {
        self.supervisor.kill_switch()
    }

    /// Close the process's stdin.
    pub fn close_input(&self) -> Result<()> {
        Ok(self.supervisor.close_input()?)
    }

    /// Kill the process and wait until it is reaped. Idempotent.
    pub async fn kill(&self) -> Result<ExitStatus> {
        Ok(self.supervisor.kill().await?)
    }

    /// Wait for the process to exit.
    pub async fn wait(&self) -> Result<ExitStatus> {
        Ok(self.supervisor.wait().await?)
    }

    /// Wait for `target` to accept TCP connections, using the configured
    /// readiness interval and timeout. Kills the process on timeout.
    pub async fn wait_ready(&self, target: impl Into<String>) -> Result<Duration> {
        ReadinessProbe::from_config(target, &self.config.readiness)
            .wait(&self.supervisor)
            .await
    }

    /// Run `session` with an overall deadline.
    ///
    /// If the deadline passes first, the process is killed and
    /// [`VmkitError::Timeout`] is returned.
    pub async fn with_deadline<F, T>(&self, deadline: Duration, session: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(deadline, session).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    pid = ?self.handle.pid,
                    pending = self.watcher.pending(),
                    deadline_ms = deadline.as_millis() as u64,
                    "console session deadline passed; killing process"
                );
                if let Err(error) = self.supervisor.kill().await {
                    tracing::warn!(%error, "kill after session deadline failed");
                }
                Err(VmkitError::timeout(deadline, "console session"))
            }
        }
    }

    /// The watcher attached to this console.
    #[must_use]
    pub const fn watcher(&self) -> &StreamWatcher {
        &self.watcher
    }

    /// The underlying supervisor.
    #[must_use]
    pub const fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// The transcript sink, if one was configured.
    #[must_use]
    pub fn sink(&self) -> Option<&OutputSink> {
        self.sink.as_deref()
    }

    /// The configuration this console was launched with.
    #[must_use]
    pub const fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// The process handle.
    #[must_use]
    pub const fn handle(&self) -> ProcessHandle {
        self.handle
    }

    /// The process id.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.handle.pid
    }

    /// Check whether the process is still running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.supervisor.is_alive()
    }
}
