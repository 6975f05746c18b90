//! Process supervision.
//!
//! A [`ProcessSupervisor`] owns exactly one child process and runs up to
//! three background tasks for it:
//!
//! - the **reader**, the only task that reads the child's stdout; it
//!   delivers each chunk to the observer list before reading the next one;
//! - the **writer**, which owns the child's stdin and writes queued input
//!   in submission order, flushing after every write;
//! - the **lifecycle** task, the only place the child is waited on. It
//!   reaps the process exactly once, either on natural exit or after a kill
//!   request, and publishes the exit status.
//!
//! Kill requests are a flag flip on a watch channel, so they never block and
//! can be issued from inside an observer running on the reader task.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::ProcessConfig;
use crate::error::{ProcessError, Result};
use crate::observer::{ObserverList, OutputObserver};

/// Outcome published by the lifecycle task.
type ExitOutcome = std::result::Result<ExitStatus, String>;

/// Identity of a started process.
///
/// The streams themselves stay owned by the supervisor; the handle only
/// describes what was set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    /// OS process identifier, if the platform reported one.
    pub pid: Option<u32>,
    /// Whether stdin is piped to the supervisor.
    pub input_piped: bool,
    /// Whether stdout is piped to the supervisor.
    pub output_piped: bool,
}

/// A cloneable, non-blocking trigger for forced termination.
///
/// Safe to use from any thread, including from inside an output observer.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    tx: Arc<watch::Sender<bool>>,
}

impl KillSwitch {
    /// Request forced termination. Repeated requests are no-ops.
    pub fn kill(&self) {
        self.tx.send_replace(true);
    }
}

/// A weak handle for queueing input from synchronous code.
///
/// Holding an `InputHandle` does not keep the process or its stdin alive,
/// so it can be captured by callbacks stored inside the supervisor's own
/// observers without creating a reference cycle.
#[derive(Debug, Clone)]
pub struct InputHandle {
    running: Weak<Running>,
}

impl InputHandle {
    /// Queue bytes for the writer task without waiting for the write.
    pub fn queue(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        let running = self.running.upgrade().ok_or(ProcessError::Exited)?;
        running.enqueue(data.into(), None)
    }
}

struct InputCommand {
    data: Vec<u8>,
    ack: Option<oneshot::Sender<io::Result<()>>>,
}

struct Running {
    handle: ProcessHandle,
    program: String,
    input: Mutex<Option<mpsc::UnboundedSender<InputCommand>>>,
    exit_rx: watch::Receiver<Option<ExitOutcome>>,
    reader: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    drain_timeout: std::time::Duration,
}

impl Running {
    fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    fn enqueue(&self, data: Vec<u8>, ack: Option<oneshot::Sender<io::Result<()>>>) -> Result<()> {
        if !self.handle.input_piped {
            return Err(ProcessError::InputNotPiped);
        }
        if self.has_exited() {
            return Err(ProcessError::Exited);
        }
        let guard = self.input.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(ProcessError::InputClosed)?;
        tx.send(InputCommand { data, ack })
            .map_err(|_| ProcessError::InputClosed)
    }

    /// Give the reader a bounded chance to deliver what is left in the pipe.
    async fn drain_output(&self) {
        let mut reader = self.reader.lock().await;
        if let Some(mut task) = reader.take() {
            if tokio::time::timeout(self.drain_timeout, &mut task).await.is_err() {
                tracing::warn!(
                    program = %self.program,
                    pid = ?self.handle.pid,
                    "output reader still running after drain timeout; aborting it"
                );
                task.abort();
            }
        }
    }
}

/// Supervisor for a single child process.
///
/// Create it with [`ProcessSupervisor::new`], register observers, then
/// [`start`](Self::start) the process. Observers may also be registered
/// after start; they only see chunks read after registration.
///
/// Dropping the supervisor kills the child if it is still running.
pub struct ProcessSupervisor {
    observers: Arc<ObserverList>,
    kill_tx: Arc<watch::Sender<bool>>,
    running: Mutex<Option<Arc<Running>>>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    /// Create a supervisor with no process and no observers.
    #[must_use]
    pub fn new() -> Self {
        let (kill_tx, _) = watch::channel(false);
        Self {
            observers: Arc::new(ObserverList::new()),
            kill_tx: Arc::new(kill_tx),
            running: Mutex::new(None),
        }
    }

    /// Spawn the configured process.
    ///
    /// Must be called from within a Tokio runtime: the reader, writer and
    /// lifecycle tasks are spawned onto it.
    pub fn start(&self, config: &ProcessConfig) -> Result<ProcessHandle> {
        let mut slot = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(ProcessError::AlreadyStarted);
        }

        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(if config.pipe_input { Stdio::piped() } else { Stdio::inherit() })
            .stdout(if config.pipe_output { Stdio::piped() } else { Stdio::inherit() })
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ProcessError::spawn(&config.program, e))?;
        let pid = child.id();
        tracing::info!(program = %config.program, ?pid, args = ?config.args, "process started");

        let input = child.stdin.take().map(|stdin| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(write_input(stdin, rx, pid));
            tx
        });

        let reader = child.stdout.take().map(|stdout| {
            let observers = Arc::clone(&self.observers);
            tokio::spawn(pump_output(stdout, observers, config.chunk_size.max(1), pid))
        });

        let (exit_tx, exit_rx) = watch::channel(None);
        self.kill_tx.send_replace(false);
        let kill_rx = self.kill_tx.subscribe();
        tokio::spawn(supervise(child, kill_rx, exit_tx, pid));

        let handle = ProcessHandle {
            pid,
            input_piped: input.is_some(),
            output_piped: reader.is_some(),
        };
        *slot = Some(Arc::new(Running {
            handle,
            program: config.program.clone(),
            input: Mutex::new(input),
            exit_rx,
            reader: tokio::sync::Mutex::new(reader),
            drain_timeout: config.drain_timeout,
        }));

        Ok(handle)
    }

    /// Spawn `program` with `args`, choosing which streams to pipe.
    pub fn start_with<I, S>(
        &self,
        program: &str,
        args: I,
        pipe_input: bool,
        pipe_output: bool,
    ) -> Result<ProcessHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = ProcessConfig::new(program)
            .args(args)
            .pipe_input(pipe_input)
            .pipe_output(pipe_output);
        self.start(&config)
    }

    fn running(&self) -> Result<Arc<Running>> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ProcessError::NotStarted)
    }

    /// The handle of the started process.
    pub fn handle(&self) -> Result<ProcessHandle> {
        Ok(self.running()?.handle)
    }

    /// The OS process identifier, once started.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.running().ok().and_then(|r| r.handle.pid)
    }

    /// Check whether the process has been started and not yet reaped.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.running().is_ok_and(|r| !r.has_exited())
    }

    /// The exit status, if the process has been reaped.
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        let running = self.running().ok()?;
        let outcome = running.exit_rx.borrow();
        outcome.as_ref().and_then(|o| o.as_ref().ok().copied())
    }

    /// Append an observer. It sees only chunks read after this call.
    pub fn register_observer(&self, observer: Arc<dyn OutputObserver>) {
        self.observers.register(observer);
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Write `data` to the child's stdin and wait until it is flushed.
    ///
    /// Writes issued concurrently are applied in the order they were queued.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        let running = self.running()?;
        let (ack_tx, ack_rx) = oneshot::channel();
        running.enqueue(data.to_vec(), Some(ack_tx))?;
        match ack_rx.await {
            Ok(result) => result.map_err(|e| ProcessError::io("writing to process input", e)),
            Err(_) => Err(ProcessError::InputClosed),
        }
    }

    /// Queue `data` for the writer without waiting.
    ///
    /// Intended for synchronous callers such as watcher callbacks; write
    /// failures are logged by the writer task.
    pub fn queue_input(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.running()?.enqueue(data.into(), None)
    }

    /// A weak handle for queueing input from callbacks.
    pub fn input_handle(&self) -> Result<InputHandle> {
        Ok(InputHandle {
            running: Arc::downgrade(&self.running()?),
        })
    }

    /// Close the child's stdin once all queued input has been written.
    pub fn close_input(&self) -> Result<()> {
        let running = self.running()?;
        if !running.handle.input_piped {
            return Err(ProcessError::InputNotPiped);
        }
        let mut input = running.input.lock().unwrap_or_else(PoisonError::into_inner);
        if input.take().is_none() {
            return Err(ProcessError::InputClosed);
        }
        tracing::debug!(pid = ?running.handle.pid, "process input closed");
        Ok(())
    }

    /// A cloneable trigger for forced termination.
    #[must_use]
    pub fn kill_switch(&self) -> KillSwitch {
        KillSwitch {
            tx: Arc::clone(&self.kill_tx),
        }
    }

    /// Request forced termination without waiting for it.
    ///
    /// Never blocks; safe to call from inside an observer.
    pub fn request_kill(&self) {
        self.kill_tx.send_replace(true);
    }

    /// Forcefully terminate the process and wait until it is reaped.
    ///
    /// Calling this on a process that has already exited returns its
    /// recorded exit status.
    pub async fn kill(&self) -> Result<ExitStatus> {
        let running = self.running()?;
        if !running.has_exited() {
            tracing::debug!(program = %running.program, pid = ?running.handle.pid, "killing process");
            self.request_kill();
        }
        self.wait().await
    }

    /// Wait until the process has exited and been reaped.
    ///
    /// Once the exit is observed the reader is given up to the configured
    /// drain timeout to deliver what is still in the pipe. Safe to call more
    /// than once and after [`kill`](Self::kill).
    pub async fn wait(&self) -> Result<ExitStatus> {
        let running = self.running()?;
        let mut exit_rx = running.exit_rx.clone();
        let outcome = exit_rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ProcessError::Wait {
                reason: "lifecycle task ended without reporting an exit status".to_string(),
            })?
            .clone();

        running.drain_output().await;

        match outcome {
            Some(Ok(status)) => Ok(status),
            Some(Err(reason)) => Err(ProcessError::Wait { reason }),
            None => Err(ProcessError::Wait {
                reason: "exit status missing".to_string(),
            }),
        }
    }

    /// Deliver a signal to the process.
    #[cfg(unix)]
    pub fn signal(&self, signal: i32) -> Result<()> {
        let running = self.running()?;
        if running.has_exited() {
            return Err(ProcessError::Exited);
        }
        let pid = running.handle.pid.ok_or(ProcessError::Exited)?;
        crate::unix::send_signal(pid, signal)
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if self.is_alive() {
            tracing::debug!(pid = ?self.pid(), "supervisor dropped; killing process");
            self.request_kill();
        }
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("pid", &self.pid())
            .field("alive", &self.is_alive())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Sole waiter on the child: reaps it exactly once.
async fn supervise(
    mut child: Child,
    mut kill_rx: watch::Receiver<bool>,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
    pid: Option<u32>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        () = async {
            // Release the watch guard before awaiting the child.
            let _ = kill_rx.wait_for(|requested| *requested).await;
        } => {
            if let Err(error) = child.start_kill() {
                // Already exited between the request and the signal.
                tracing::debug!(?pid, %error, "kill signal not delivered");
            }
            child.wait().await
        }
    };

    let outcome = match status {
        Ok(status) => {
            tracing::info!(?pid, %status, "process exited");
            Ok(status)
        }
        Err(error) => {
            tracing::warn!(?pid, %error, "waiting for process failed");
            Err(error.to_string())
        }
    };
    exit_tx.send_replace(Some(outcome));
}

/// Sole reader of the child's stdout.
async fn pump_output(
    mut stdout: ChildStdout,
    observers: Arc<ObserverList>,
    chunk_size: usize,
    pid: Option<u32>,
) {
    let mut buf = vec![0u8; chunk_size];
    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!(?pid, "process output reached end of stream");
                break;
            }
            Ok(n) => {
                tracing::trace!(?pid, bytes = n, "delivering output chunk");
                observers.deliver(&buf[..n]);
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => {
                tracing::warn!(?pid, %error, "reading process output failed");
                break;
            }
        }
    }
}

/// Sole writer of the child's stdin.
async fn write_input(
    mut stdin: ChildStdin,
    mut rx: mpsc::UnboundedReceiver<InputCommand>,
    pid: Option<u32>,
) {
    while let Some(InputCommand { data, ack }) = rx.recv().await {
        let result = write_flushed(&mut stdin, &data).await;
        match ack {
            Some(ack) => {
                let _ = ack.send(result);
            }
            None => {
                if let Err(error) = result {
                    tracing::warn!(?pid, bytes = data.len(), %error, "queued input write failed");
                }
            }
        }
    }
    tracing::trace!(?pid, "input writer finished");
}

async fn write_flushed(stdin: &mut ChildStdin, data: &[u8]) -> io::Result<()> {
    stdin.write_all(data).await?;
    stdin.flush().await
}
