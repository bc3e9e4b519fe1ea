//! Reference-counted blob variant

use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;

use super::{alloc_bytes, dealloc_bytes};
use crate::error::Result;
use crate::RawBlob;

/// An owned byte buffer released automatically when the last owner drops.
///
/// Cloning a `SharedBlob` shares the underlying buffer and a thread-safe
/// reference count; the bytes are never duplicated. The release routine runs
/// exactly once, when the final clone goes out of scope, so a `SharedBlob`
/// can be handed to any number of readers and simply forgotten.
///
/// Mutation requires unique ownership: [`as_mut_slice`](Self::as_mut_slice)
/// returns `None` once any clone exists. Fill the buffer first, share after.
///
/// This variant cannot travel through the lock-free transport - its drop
/// glue is exactly what the transport cannot run. Convert with
/// [`try_into_raw`](Self::try_into_raw) (sole owner only) when a buffer must
/// enter the transit path.
#[derive(Clone)]
pub struct SharedBlob {
    inner: Arc<Inner>,
}

struct Inner {
    buf: NonNull<u8>,
    len: usize,
}

// SAFETY: Inner exclusively owns its allocation; the bytes are only mutated
// through unique access (Arc::get_mut), so shared references may be read
// from any thread.
unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

impl Drop for Inner {
    fn drop(&mut self) {
        // SAFETY: buf/len came from alloc_bytes; Arc guarantees this runs
        // exactly once, after the last owner is gone.
        unsafe { dealloc_bytes(self.buf.as_ptr(), self.len) };
    }
}

impl SharedBlob {
    /// Allocates a zero-initialized buffer of `len` bytes under shared
    /// ownership.
    ///
    /// An allocation failure surfaces as
    /// [`Error::AllocationFailed`](crate::Error); a half-initialized
    /// ownership state is never observable.
    pub fn new(len: usize) -> Result<Self> {
        let buf = alloc_bytes(len)?;
        // SAFETY: alloc_bytes never returns null.
        let buf = unsafe { NonNull::new_unchecked(buf) };
        Ok(Self {
            inner: Arc::new(Inner { buf, len }),
        })
    }

    /// Allocates a shared buffer holding a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let raw = RawBlob::from_slice(data)?;
        Ok(raw.into_shared())
    }

    /// Adopts a manually managed blob, transferring release responsibility
    /// into the reference count.
    ///
    /// Adopting an already-released blob is a contract violation; under test
    /// builds it fails a debug assertion, otherwise the result is an empty
    /// blob.
    pub fn adopt(mut raw: RawBlob) -> Self {
        debug_assert!(!raw.is_released(), "adopting a released blob");
        let (ptr, len) = raw.take_parts();
        let (buf, len) = match NonNull::new(ptr) {
            Some(buf) => (buf, len),
            None => (NonNull::dangling(), 0),
        };
        Self {
            inner: Arc::new(Inner { buf, len }),
        }
    }

    /// The byte count fixed at creation.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// True for zero-length blobs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Number of owners currently sharing the buffer.
    pub fn owner_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// The buffer contents.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        if self.inner.len == 0 {
            return &[];
        }
        // SAFETY: buf points to exactly len bytes for the Arc's lifetime.
        unsafe { slice::from_raw_parts(self.inner.buf.as_ptr(), self.inner.len) }
    }

    /// The buffer contents, mutably - only while this is the sole owner.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        let inner = Arc::get_mut(&mut self.inner)?;
        if inner.len == 0 {
            return Some(&mut []);
        }
        // SAFETY: get_mut proves unique ownership; buf points to len bytes.
        Some(unsafe { slice::from_raw_parts_mut(inner.buf.as_ptr(), inner.len) })
    }

    /// Detaches the buffer back into manual ownership.
    ///
    /// Succeeds only while this is the sole owner; otherwise the blob is
    /// returned unchanged so no owner ever observes a half-detached buffer.
    pub fn try_into_raw(self) -> std::result::Result<RawBlob, SharedBlob> {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => {
                // Keep Drop from freeing the buffer we are handing over.
                let inner = ManuallyDrop::new(inner);
                Ok(RawBlob::from_parts(inner.buf.as_ptr(), inner.len))
            }
            Err(inner) => Err(SharedBlob { inner }),
        }
    }
}

impl AsRef<[u8]> for SharedBlob {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for SharedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBlob")
            .field("len", &self.inner.len)
            .field("owners", &self.owner_count())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
