//! Output observers and ordered fan-out delivery.
//!
//! Every chunk read from the child's stdout is handed to each registered
//! [`OutputObserver`], one observer at a time, in registration order. The
//! list is snapshotted at the start of each delivery, so observers may
//! register further observers without deadlocking; those see only later
//! chunks.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

/// Error returned by a failing observer.
pub type ObserveError = Box<dyn std::error::Error + Send + Sync>;

/// Result of delivering one chunk to one observer.
pub type ObserveResult = std::result::Result<(), ObserveError>;

/// A consumer of process output.
///
/// Observers run synchronously on the reader task. An observer that blocks
/// stalls delivery to every other observer and all future chunks.
///
/// Any `Fn(&[u8]) + Send + Sync` closure is an observer that never fails.
pub trait OutputObserver: Send + Sync {
    /// Handle one chunk of output.
    fn observe(&self, chunk: &[u8]) -> ObserveResult;
}

impl<F> OutputObserver for F
where
    F: Fn(&[u8]) + Send + Sync,
{
    fn observe(&self, chunk: &[u8]) -> ObserveResult {
        self(chunk);
        Ok(())
    }
}

/// An ordered, thread-safe list of observers.
#[derive(Default)]
pub struct ObserverList {
    observers: RwLock<Vec<Arc<dyn OutputObserver>>>,
}

impl ObserverList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer.
    pub fn register(&self, observer: Arc<dyn OutputObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no observers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current list, taken under the lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<dyn OutputObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deliver a chunk to every observer in the current snapshot.
    ///
    /// A failing or panicking observer is logged and skipped; the remaining
    /// observers still receive the chunk. Returns the number of observers
    /// that failed.
    pub fn deliver(&self, chunk: &[u8]) -> usize {
        let mut failed = 0;
        for (index, observer) in self.snapshot().iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| observer.observe(chunk))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    failed += 1;
                    tracing::warn!(observer = index, bytes = chunk.len(), %error, "output observer failed");
                }
                Err(_) => {
                    failed += 1;
                    tracing::error!(observer = index, bytes = chunk.len(), "output observer panicked");
                }
            }
        }
        failed
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.len())
            .finish()
    }
}
