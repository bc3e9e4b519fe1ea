//! Blobstage - Persisted-Buffer Staging Pipeline
//!
//! Blobstage moves raw, variable-length byte buffers ("blobs") from the
//! threads that produce them to a dedicated writer thread that persists
//! them, with no data races, no double frees, and no leaks under any
//! interleaving. Payload bytes are opaque end to end.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Blobstage Pipeline                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  producer threads          transit           writer thread      │
//! │  ┌─────────────┐      ┌──────────────┐      ┌──────────────┐    │
//! │  │  RawBlob    │ ───▶ │  BlobQueue   │ ───▶ │  BlobSink    │    │
//! │  │ (fill once) │      │ (lock-free)  │      │ (journal)    │    │
//! │  └─────────────┘      └──────────────┘      └──────────────┘    │
//! │                                                    │            │
//! │                                             release exactly     │
//! │                                                  once           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transit queue stores fixed-layout values and runs no per-element
//! cleanup, which forces the two-variant blob design: [`RawBlob`] (manual,
//! exactly-once release, queue-safe) and [`SharedBlob`] (reference-counted,
//! released automatically with the last owner). Identifiers for tagging
//! blobs and entities come from a per-thread generator that never contends.
//!
//! # Modules
//!
//! - [`blob`] - the two-variant owned byte buffer
//! - [`queue`] - lock-free transport boundary for blobs in transit
//! - [`stage`] - separate-thread consumer draining the queue into a sink
//! - [`journal`] - rotating append-only record files and their importer
//! - [`id`] - thread-safe 128-bit identifier generation
//! - [`error`] - error types

pub mod blob;
pub mod error;
pub mod id;
pub mod journal;
pub mod queue;
pub mod stage;

// Re-export commonly used types
pub use blob::{RawBlob, SharedBlob};
pub use error::{Error, Result};
pub use id::{generate_id, generate_uuid, EntityId, IdGenerator};
pub use journal::{FileAppender, ImportStats, JournalConfig, JournalImporter, JournalSink};
pub use queue::BlobQueue;
pub use stage::{BlobSink, StageConfig, StageConsumer, StageStatsSnapshot};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
