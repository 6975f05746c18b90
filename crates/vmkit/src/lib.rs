//! vmkit: expect-style console automation for headless virtual machines
//!
//! vmkit drives an interactive process (usually a VM with its serial
//! console on stdio) as a scriptable console. Output is scanned for an
//! ordered queue of expected prompts; each match fires a callback that can
//! type a response, queue the next expectation or stop the machine.
//!
//! # Components
//!
//! - [`ProcessSupervisor`] (from `vmkit-process`) owns the child and fans
//!   its output out to observers.
//! - [`StreamWatcher`] matches expectations against that output in FIFO
//!   order, with a bounded retained window across chunk boundaries.
//! - [`OutputSink`] persists the raw transcript.
//! - [`ReadinessProbe`] waits for a guest TCP service such as SSH.
//! - [`Console`] ties them together; [`SyncConsole`] is its blocking form.
//!
//! # Example
//!
//! ```ignore
//! use vmkit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let console = Console::launch(ConsoleConfig::new("qemu-system-x86_64")
//!         .args(["-nographic", "-hda", "hd.qcow2"]))?;
//!
//!     let input = console.input_handle()?;
//!     console.expect("login: ", move |_| {
//!         let _ = input.queue(b"root\n".to_vec());
//!     });
//!     console.wait_for("# ").await?;
//!     console.send_line("poweroff").await?;
//!     console.wait().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod readiness;
pub mod sink;
pub mod sync;
pub mod watch;

pub use config::{
    ConsoleConfig, Durability, EnvConfig, LineEnding, LogFormat, LoggingConfig, ReadinessConfig,
    SinkConfig, WatcherConfig,
};
pub use console::Console;
pub use error::{Result, VmkitError};
pub use readiness::ReadinessProbe;
pub use sink::OutputSink;
pub use sync::SyncConsole;
pub use watch::{Pattern, PendingMatch, StreamWatcher, WatchMatch};

pub use vmkit_process::{
    InputHandle, KillSwitch, ObserveResult, OutputObserver, ProcessConfig, ProcessError,
    ProcessHandle, ProcessSupervisor,
};
