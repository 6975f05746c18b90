//! Stream watching.
//!
//! A [`StreamWatcher`] scans output for an ordered queue of expectations
//! and fires a callback for each match. Patterns are [`Pattern`]s; each
//! fired callback receives a [`WatchMatch`].

mod pattern;
mod watcher;
mod window;

pub use pattern::{CompiledRegex, Pattern, PatternMatch};
pub use watcher::{PendingMatch, StreamWatcher, WatchMatch};
