//! Ordered expectation matching over a chunked output stream.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::oneshot;
use vmkit_process::{ObserveResult, OutputObserver, ProcessSupervisor};

use super::pattern::Pattern;
use super::window::RetainedWindow;
use crate::error::{Result, VmkitError};

/// Details of a fired expectation.
///
/// Positions are relative to the active buffer the match was found in
/// (retained tail plus the current sub-chunk); `offset` is the absolute
/// stream position of the first matched byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchMatch {
    /// Display form of the pattern that matched.
    pub pattern: String,
    /// Start of the match in the active buffer.
    pub start: usize,
    /// End of the match in the active buffer.
    pub end: usize,
    /// Absolute stream offset of the match start.
    pub offset: u64,
    /// The matched bytes.
    pub matched: Bytes,
    /// Unconsumed bytes between the previous match (or the start of the
    /// active buffer) and this one.
    pub before: Bytes,
    /// Capture groups 1.., `None` for groups that did not participate.
    pub captures: Vec<Option<Bytes>>,
    /// Named capture groups that participated.
    pub named: HashMap<String, Bytes>,
}

impl WatchMatch {
    /// The matched bytes as text (lossy).
    #[must_use]
    pub fn as_str_lossy(&self) -> String {
        String::from_utf8_lossy(&self.matched).into_owned()
    }

    /// Capture group `index`; 0 is the whole match.
    #[must_use]
    pub fn group(&self, index: usize) -> Option<&[u8]> {
        if index == 0 {
            return Some(&self.matched);
        }
        self.captures.get(index - 1)?.as_deref()
    }

    /// A named capture group.
    #[must_use]
    pub fn name(&self, name: &str) -> Option<&[u8]> {
        self.named.get(name).map(|b| &b[..])
    }

    /// Length of the match.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the match is zero-length.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An expectation queued by [`StreamWatcher::wait_for`].
///
/// Resolves to the match once the expectation fires, or to
/// [`VmkitError::WatchClosed`] if it is dropped unfired. Dropping the
/// future does not dequeue the expectation.
#[derive(Debug)]
#[must_use = "the expectation is queued either way; await it to observe the match"]
pub struct PendingMatch {
    rx: oneshot::Receiver<WatchMatch>,
}

impl Future for PendingMatch {
    type Output = Result<WatchMatch>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|fired| fired.map_err(|_| VmkitError::WatchClosed))
    }
}

type Callback = Box<dyn FnOnce(&WatchMatch) + Send>;

struct Expectation {
    pattern: Pattern,
    callback: Callback,
}

struct Shared {
    window: usize,
    queue: Mutex<VecDeque<Expectation>>,
    retained: Mutex<RetainedWindow>,
    retained_len: AtomicUsize,
    matches_fired: AtomicU64,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, VecDeque<Expectation>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Matches a FIFO queue of expectations against arriving output.
///
/// Only the head of the queue is ever searched. When it matches, it is
/// removed, its callback runs, and the scan resumes right after the match,
/// so one chunk can satisfy several expectations in turn. At most `window`
/// unconsumed bytes are carried from one chunk to the next.
///
/// Callbacks run on the thread delivering output (the supervisor's reader
/// task). They may call [`expect`](Self::expect), queue input and request a
/// kill, but must not block and must not feed this watcher through
/// [`on_chunk`](Self::on_chunk).
///
/// Clones share the same queue and buffer.
#[derive(Clone)]
pub struct StreamWatcher {
    shared: Arc<Shared>,
}

impl StreamWatcher {
    /// Create an unattached watcher; feed it with [`on_chunk`](Self::on_chunk).
    ///
    /// A window of 0 is treated as 1.
    #[must_use]
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            shared: Arc::new(Shared {
                window,
                queue: Mutex::new(VecDeque::new()),
                retained: Mutex::new(RetainedWindow::new(window)),
                retained_len: AtomicUsize::new(0),
                matches_fired: AtomicU64::new(0),
            }),
        }
    }

    /// Create a watcher and register it as an observer on `supervisor`.
    #[must_use]
    pub fn attach(supervisor: &ProcessSupervisor, window: usize) -> Self {
        let watcher = Self::new(window);
        supervisor.register_observer(Arc::new(watcher.clone()));
        watcher
    }

    /// Append an expectation to the queue.
    pub fn expect<P, F>(&self, pattern: P, callback: F)
    where
        P: Into<Pattern>,
        F: FnOnce(&WatchMatch) + Send + 'static,
    {
        let pattern = pattern.into();
        tracing::debug!(pattern = ?pattern, "expectation queued");
        self.shared.queue().push_back(Expectation {
            pattern,
            callback: Box::new(callback),
        });
    }

    /// Append a regex expectation to the queue.
    pub fn expect_regex<F>(&self, pattern: &str, callback: F) -> Result<()>
    where
        F: FnOnce(&WatchMatch) + Send + 'static,
    {
        self.expect(Pattern::regex(pattern)?, callback);
        Ok(())
    }

    /// Queue an expectation and return a future for its match.
    ///
    /// The expectation joins the queue immediately, before the future is
    /// first polled, so output arriving in the meantime is not missed.
    pub fn wait_for(&self, pattern: impl Into<Pattern>) -> PendingMatch {
        let (tx, rx) = oneshot::channel();
        self.expect(pattern, move |m: &WatchMatch| {
            let _ = tx.send(m.clone());
        });
        PendingMatch { rx }
    }

    /// Process one chunk of output.
    pub fn on_chunk(&self, data: &[u8]) {
        let shared = &*self.shared;
        let mut retained = shared.retained.lock().unwrap_or_else(PoisonError::into_inner);

        for piece in data.chunks(shared.window) {
            retained.push(piece);

            loop {
                // The queue lock is released before the callback runs.
                let (expectation, found) = {
                    let mut queue = shared.queue();
                    let Some(head) = queue.front() else {
                        break;
                    };
                    let Some(found) = head.pattern.find(retained.as_slice()) else {
                        break;
                    };
                    match queue.pop_front() {
                        Some(expectation) => (expectation, found),
                        None => break,
                    }
                };

                let offset = retained.offset() + found.start as u64;
                let consumed = retained.consume(found.end);
                let slice = |range: std::ops::Range<usize>| consumed.slice(range);
                let fired = WatchMatch {
                    pattern: expectation.pattern.describe(),
                    start: found.start,
                    end: found.end,
                    offset,
                    matched: slice(found.start..found.end),
                    before: slice(0..found.start),
                    captures: found.captures.iter().cloned().map(|r| r.map(slice)).collect(),
                    named: found
                        .named
                        .iter()
                        .map(|(name, range)| (name.clone(), slice(range.clone())))
                        .collect(),
                };
                shared.retained_len.store(retained.len(), Ordering::Release);
                shared.matches_fired.fetch_add(1, Ordering::AcqRel);
                tracing::debug!(pattern = %fired.pattern, offset, len = fired.len(), "expectation matched");

                let callback = expectation.callback;
                if catch_unwind(AssertUnwindSafe(|| callback(&fired))).is_err() {
                    tracing::error!(pattern = %fired.pattern, "expectation callback panicked");
                }
            }

            retained.retain_tail();
            shared.retained_len.store(retained.len(), Ordering::Release);
        }
    }

    /// Number of expectations still queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue().len()
    }

    /// Number of bytes currently retained.
    #[must_use]
    pub fn retained_len(&self) -> usize {
        self.shared.retained_len.load(Ordering::Acquire)
    }

    /// Total number of expectations that have fired.
    #[must_use]
    pub fn matches_fired(&self) -> u64 {
        self.shared.matches_fired.load(Ordering::Acquire)
    }

    /// The retention window in bytes.
    #[must_use]
    pub fn window(&self) -> usize {
        self.shared.window
    }

    /// Drop every queued expectation without firing it. Returns how many
    /// were dropped.
    pub fn clear(&self) -> usize {
        let dropped: Vec<_> = self.shared.queue().drain(..).collect();
        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), "expectations cleared");
        }
        dropped.len()
    }
}

impl OutputObserver for StreamWatcher {
    fn observe(&self, chunk: &[u8]) -> ObserveResult {
        self.on_chunk(chunk);
        Ok(())
    }
}

impl fmt::Debug for StreamWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamWatcher")
            .field("window", &self.window())
            .field("pending", &self.pending())
            .field("retained", &self.retained_len())
            .field("fired", &self.matches_fired())
            .finish()
    }
}
