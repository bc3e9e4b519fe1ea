//! Owned byte buffers with explicit ownership disciplines
//!
//! A blob is a fixed-size, heap-allocated byte buffer whose contents the
//! pipeline never interprets. The same conceptual entity comes in two
//! mutually exclusive variants, chosen by construction path:
//!
//! - [`SharedBlob`] - reference-counted; the backing memory is freed exactly
//!   once, when the last clone drops. Safe to hold long-term and to hand to
//!   any number of readers.
//! - [`RawBlob`] - a plain handle + length with no destructor, required
//!   because the lock-free transport between producer and consumer threads
//!   stores fixed-layout elements and never runs per-element cleanup. The
//!   holder is responsible for calling [`RawBlob::release`] exactly once.
//!
//! Copying either variant never duplicates the underlying bytes: a
//! `SharedBlob` clone shares the buffer, and a `RawBlob` moves through the
//! pipeline by value.
//!
//! Lifecycle of a single buffer:
//!
//! ```text
//! alloc ──▶ filled by producer ──▶ (queued, RawBlob only) ──▶ released
//! ```
//!
//! `released` is terminal. Releasing twice, or touching a buffer after
//! pushing it to the transport, is a programming error; it is caught by
//! debug assertions and the test allocator rather than paying a per-element
//! runtime check on the transit path.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::{Error, Result};

mod raw;
mod shared;

pub use raw::RawBlob;
pub use shared::SharedBlob;

// =============================================================================
// Allocation plumbing
// =============================================================================

/// Allocates `len` zero-initialized bytes, or a dangling sentinel for
/// zero-sized blobs (the allocator is never touched for `len == 0`).
pub(crate) fn alloc_bytes(len: usize) -> Result<*mut u8> {
    if len == 0 {
        return Ok(NonNull::<u8>::dangling().as_ptr());
    }

    let layout = Layout::from_size_align(len, 1).map_err(|e| Error::AllocationFailed {
        size: len,
        reason: e.to_string(),
    })?;

    // SAFETY: layout has non-zero size, validated above.
    let ptr = unsafe { alloc::alloc_zeroed(layout) };
    if ptr.is_null() {
        return Err(Error::AllocationFailed {
            size: len,
            reason: "allocator returned null".into(),
        });
    }

    #[cfg(test)]
    track::on_alloc(ptr);

    Ok(ptr)
}

/// Frees memory obtained from [`alloc_bytes`].
///
/// # Safety
///
/// `ptr` must have come from `alloc_bytes(len)` with the same `len` and must
/// not have been freed already.
pub(crate) unsafe fn dealloc_bytes(ptr: *mut u8, len: usize) {
    if len == 0 {
        return;
    }

    #[cfg(test)]
    track::on_dealloc(ptr);

    // SAFETY: caller guarantees ptr/len match a live alloc_bytes allocation.
    unsafe {
        alloc::dealloc(ptr, Layout::from_size_align_unchecked(len, 1));
    }
}

// =============================================================================
// Test allocator tracking
// =============================================================================
