//! Thread-safe unique identifier generation
//!
//! Every entity and blob flowing through the pipeline is keyed by a 128-bit
//! identifier drawn from a cryptographically strong random source. Producers
//! on arbitrary threads request identifiers concurrently, so the generation
//! strategy matters:
//!
//! - **Shared generator + lock**: one generator behind a mutex. Simple, but
//!   every call serializes and identifier generation becomes a contention
//!   point under load.
//! - **Per-thread generator, no lock** (chosen here): each OS thread owns an
//!   independently seeded generator, so calls never block and share no
//!   mutable state.
//!
//! This module uses the per-thread design: `rand`'s thread-local RNG is a
//! ChaCha-based CSPRNG seeded from OS entropy and periodically reseeded, at
//! the cost of one generator instance per thread. Uniqueness is statistical
//! (122 random bits per identifier), not algebraic.
//!
//! Failure of the underlying entropy source is an unrecoverable environment
//! failure and panics; it is never retried or surfaced as an error value.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use uuid::Uuid;

// =============================================================================
// Generation
// =============================================================================

/// Draws a fresh random 128-bit value with the UUID v4 version/variant bits.
///
/// Safe to call from any number of threads concurrently; calls never block
/// or contend.
pub fn generate_uuid() -> Uuid {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// Draws a fresh identifier wrapped in the opaque handle type entities use.
pub fn generate_id() -> EntityId {
    EntityId::from(generate_uuid())
}

/// Explicit handle for identifier generation.
///
/// The handle stores no generator state itself; each call reaches the
/// calling thread's own RNG. It exists so components can take identifier
/// generation as an explicitly passed dependency rather than reaching for a
/// hidden global, while staying `Copy` and free to share across threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdGenerator;

impl IdGenerator {
    /// Create a new generator handle.
    pub fn new() -> Self {
        Self
    }

    /// See [`generate_uuid`].
    pub fn generate(&self) -> Uuid {
        generate_uuid()
    }

    /// See [`generate_id`].
    pub fn generate_id(&self) -> EntityId {
        generate_id()
    }
}

// =============================================================================
// EntityId
// =============================================================================

/// A 128-bit identifier with both binary and canonical string forms.
///
/// Immutable once created. Compares, hashes, and sorts by its binary value.
/// The string form is the standard lowercase hyphenated hexadecimal
/// representation, used for logging and interop only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(Uuid);

impl EntityId {
    /// The all-zero identifier, used as a "no entity" sentinel.
    pub const EMPTY: EntityId = EntityId(Uuid::nil());

    /// The size of the binary form in bytes.
    pub const SIZE: usize = 16;

    /// The raw 128-bit value.
    pub fn value(&self) -> Uuid {
        self.0
    }

    /// The raw 16 bytes, in the order produced by the random source.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Reconstructs an identifier from its raw 16 bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        EntityId(Uuid::from_bytes(bytes))
    }

    /// True for the [`EMPTY`](Self::EMPTY) sentinel.
    pub fn is_empty(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for EntityId {
    fn from(value: Uuid) -> Self {
        EntityId(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Uuid's Display is already the canonical lowercase hyphenated form
        self.0.fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(EntityId)
    }
}

// =============================================================================
// Tests
// =============================================================================
