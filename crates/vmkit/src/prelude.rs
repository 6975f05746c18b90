//! Convenient re-exports for common vmkit usage.
//!
//! ```ignore
//! use vmkit::prelude::*;
//! ```

pub use crate::config::{ConsoleConfig, Durability, LineEnding, ReadinessConfig, SinkConfig};
pub use crate::console::Console;
pub use crate::error::{Result, VmkitError};
pub use crate::readiness::ReadinessProbe;
pub use crate::sink::OutputSink;
pub use crate::sync::SyncConsole;
pub use crate::watch::{Pattern, PendingMatch, StreamWatcher, WatchMatch};

pub use vmkit_process::{ProcessConfig, ProcessSupervisor};
