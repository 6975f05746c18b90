//! Bounded retention of unconsumed output.

use bytes::{Buf, Bytes, BytesMut};

/// The active buffer of a watcher: the retained tail followed by the
/// sub-chunk being scanned.
///
/// Consumed bytes are split off the front; [`retain_tail`](Self::retain_tail)
/// then cuts whatever is left down to the last `limit` bytes.
#[derive(Debug)]
pub(crate) struct RetainedWindow {
    buf: BytesMut,
    limit: usize,
    /// Absolute stream offset of `buf[0]`.
    offset: u64,
}

impl RetainedWindow {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit.saturating_mul(2)),
            limit,
            offset: 0,
        }
    }

    pub(crate) fn push(&mut self, piece: &[u8]) {
        self.buf.extend_from_slice(piece);
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) const fn offset(&self) -> u64 {
        self.offset
    }

    /// Split off and return the first `n` bytes.
    pub(crate) fn consume(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buf.len());
        self.offset += n as u64;
        self.buf.split_to(n).freeze()
    }

    /// Keep only the last `limit` bytes.
    pub(crate) fn retain_tail(&mut self) {
        let excess = self.buf.len().saturating_sub(self.limit);
        if excess > 0 {
            self.buf.advance(excess);
            self.offset += excess as u64;
        }
    }
}
