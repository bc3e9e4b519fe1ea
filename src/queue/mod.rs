//! Lock-free transport boundary for blobs in transit
//!
//! Producer threads hand [`RawBlob`]s to consumer threads through a bounded,
//! lock-free multi-producer/multi-consumer queue. The transport stores plain
//! `pointer + length` values and runs no per-element cleanup, which is the
//! reason the unmanaged blob variant exists at all - a reference-counted
//! buffer cannot cross this boundary.
//!
//! Ownership contract at the boundary:
//!
//! - **Push**: a successful [`try_push`](BlobQueue::try_push) transfers the
//!   buffer to the queue. The move consumes the producer's handle, so there
//!   is nothing left to touch. On a full queue the blob is handed back
//!   unreleased and the producer still owns it.
//! - **Pop**: [`try_pop`](BlobQueue::try_pop) transfers full, exclusive
//!   ownership to the caller, who must eventually release (or adopt) the
//!   blob. Forgetting it leaks; releasing it twice is the usual fatal
//!   contract violation.
//!
//! Push and pop never block and fail only on the queue's own
//! capacity/empty conditions, never because of blob state.

use crossbeam::queue::ArrayQueue;

use crate::RawBlob;

/// Bounded lock-free MPMC queue of blobs in transit.
///
/// Dropping the queue releases any blobs still inside it, so an abandoned
/// pipeline tears down without leaking.
#[derive(Debug)]
pub struct BlobQueue {
    inner: ArrayQueue<RawBlob>,
}

impl BlobQueue {
    /// Creates a queue holding at most `capacity` blobs.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a zero-capacity transport is a
    /// configuration error, not a runtime condition).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity),
        }
    }

    /// Attempts to hand `blob` to the transport.
    ///
    /// On success the queue owns the buffer. On a full queue the blob comes
    /// back to the caller, still live, still the caller's responsibility.
    pub fn try_push(&self, blob: RawBlob) -> Result<(), RawBlob> {
        self.inner.push(blob)
    }

    /// Attempts to take the oldest queued blob, transferring full ownership
    /// to the caller.
    pub fn try_pop(&self) -> Option<RawBlob> {
        self.inner.pop()
    }

    /// Number of blobs currently in transit.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// True when a push would currently fail.
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    /// The fixed capacity chosen at construction.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl Drop for BlobQueue {
    fn drop(&mut self) {
        // The transport cannot run destructors; the adapter can. Anything
        // still in transit at teardown is released here.
        while let Some(mut blob) = self.inner.pop() {
            blob.release();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
