//! Manually released blob variant for lock-free transit

use std::fmt;
use std::ptr;
use std::slice;

use super::{alloc_bytes, dealloc_bytes};
use crate::error::Result;
use crate::SharedBlob;

/// An owned byte buffer with no attached lifetime tracking.
///
/// `RawBlob` is a plain `pointer + length` pair. It exists because the
/// lock-free queue between producer and consumer threads stores fixed-layout
/// elements and never runs destructors, so nothing inside the transport can
/// release memory on the blob's behalf. Whoever holds the value owns the
/// buffer and must call [`release`](Self::release) exactly once.
///
/// There is deliberately no `Drop` impl and no `Clone`: dropping a live
/// `RawBlob` leaks its buffer, and ownership moves with the value. Pushing a
/// blob onto the transport consumes it, which is the handoff point - after a
/// successful push the producer has no handle left to touch.
///
/// The buffer pointer is null exactly when the blob has been released (or
/// was created in the empty state); `len` is fixed at creation and remains
/// readable after release.
///
/// Releasing twice is a contract violation: it fails a debug assertion and
/// trips the test allocator under test builds, and is a no-op in release
/// builds where the transit path pays no checking cost.
pub struct RawBlob {
    buf: *mut u8,
    len: usize,
}

// SAFETY: RawBlob exclusively owns its buffer and carries no thread-affine
// state, so ownership may move between threads. It is not Sync: concurrent
// access requires the transport handoff as the synchronization point.
unsafe impl Send for RawBlob {}

impl RawBlob {
    /// Allocates a zero-initialized buffer of `len` bytes.
    ///
    /// `len == 0` is valid and never touches the allocator. An allocation
    /// failure surfaces as [`Error::AllocationFailed`](crate::Error); a
    /// smaller buffer is never returned silently.
    pub fn alloc(len: usize) -> Result<Self> {
        Ok(Self {
            buf: alloc_bytes(len)?,
            len,
        })
    }

    /// Allocates a buffer holding a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let mut blob = Self::alloc(data.len())?;
        blob.as_mut_slice().copy_from_slice(data);
        Ok(blob)
    }

    /// An empty, already-released blob (null handle, zero length).
    pub fn empty() -> Self {
        Self {
            buf: ptr::null_mut(),
            len: 0,
        }
    }

    /// The byte count fixed at creation.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for zero-length blobs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once the buffer has been released (the handle is null).
    #[inline]
    pub fn is_released(&self) -> bool {
        self.buf.is_null()
    }

    /// The buffer contents.
    ///
    /// Must not be called after [`release`](Self::release).
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        debug_assert!(!self.is_released(), "reading a released blob");
        if self.len == 0 {
            return &[];
        }
        // SAFETY: buf points to exactly len live bytes while not released.
        unsafe { slice::from_raw_parts(self.buf, self.len) }
    }

    /// The buffer contents, mutably.
    ///
    /// Must not be called after [`release`](Self::release).
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        debug_assert!(!self.is_released(), "writing a released blob");
        if self.len == 0 {
            return &mut [];
        }
        // SAFETY: buf points to exactly len live bytes while not released,
        // and &mut self guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.buf, self.len) }
    }

    /// Fills the entire buffer with `value`.
    pub fn fill(&mut self, value: u8) {
        self.as_mut_slice().fill(value);
    }

    /// Frees the buffer and nulls the handle.
    ///
    /// Calling this twice on the same logical allocation is a contract
    /// violation - it fails a debug assertion under test builds.
    pub fn release(&mut self) {
        debug_assert!(!self.is_released(), "blob released twice");
        if !self.buf.is_null() {
            // SAFETY: buf/len came from alloc_bytes and are released once;
            // the null check plus the nulling below keep this exact-once.
            unsafe { dealloc_bytes(self.buf, self.len) };
            self.buf = ptr::null_mut();
        }
    }

    /// Transfers responsibility for the buffer into the automatically
    /// released wrapper.
    pub fn into_shared(self) -> SharedBlob {
        SharedBlob::adopt(self)
    }

    /// Decomposes the blob into its parts, leaving nothing to release.
    pub(crate) fn take_parts(&mut self) -> (*mut u8, usize) {
        let parts = (self.buf, self.len);
        self.buf = ptr::null_mut();
        parts
    }

    /// Reassembles a blob from parts produced by [`take_parts`] or an
    /// unwrapped [`SharedBlob`].
    pub(crate) fn from_parts(buf: *mut u8, len: usize) -> Self {
        Self { buf, len }
    }
}

impl fmt::Debug for RawBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBlob")
            .field("len", &self.len)
            .field("released", &self.is_released())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
