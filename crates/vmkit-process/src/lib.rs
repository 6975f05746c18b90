//! vmkit-process: supervised child processes for console automation
//!
//! This crate owns the lifecycle of a single child process (typically a
//! headless virtual machine) and exposes its streams:
//!
//! - **Input** is written by a dedicated writer task, so `send` can be
//!   awaited from a control task while `queue_input` can be called from
//!   synchronous code running on the reader task.
//! - **Output** is read in fixed-size chunks by one background reader and
//!   delivered, in arrival order, to every registered [`OutputObserver`].
//! - **Termination** is detached from delivery: [`ProcessSupervisor::request_kill`]
//!   never blocks, so an observer callback can stop the process it is
//!   watching.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use vmkit_process::{ProcessConfig, ProcessSupervisor};
//!
//! #[tokio::main]
//! async fn main() -> vmkit_process::Result<()> {
//!     let supervisor = ProcessSupervisor::new();
//!     supervisor.register_observer(Arc::new(|chunk: &[u8]| {
//!         print!("{}", String::from_utf8_lossy(chunk));
//!     }));
//!
//!     let config = ProcessConfig::new("/bin/cat").pipe_input(true).pipe_output(true);
//!     supervisor.start(&config)?;
//!     supervisor.send(b"hello\n").await?;
//!     supervisor.kill().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod observer;
pub mod supervisor;

#[cfg(unix)]
pub mod unix;

// Re-export primary types
pub use config::{DEFAULT_CHUNK_SIZE, DEFAULT_DRAIN_TIMEOUT, ProcessConfig};
pub use error::{ProcessError, Result};
pub use observer::{ObserveError, ObserveResult, ObserverList, OutputObserver};
pub use supervisor::{InputHandle, KillSwitch, ProcessHandle, ProcessSupervisor};
