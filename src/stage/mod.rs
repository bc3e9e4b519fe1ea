//! Separate-thread blob consumer
//!
//! Producers on any thread hand blobs to [`StageConsumer::enqueue`]; a
//! dedicated writer thread drains the lock-free queue in batches and feeds
//! them to a [`BlobSink`]. The queue handoff is the only synchronization
//! point for blob memory - a buffer is touched by exactly one thread at any
//! moment, and the consumer releases every blob it pops exactly once,
//! whether or not the sink succeeded.
//!
//! ```text
//!  producer threads                         writer thread
//!  ┌──────────┐  enqueue   ┌───────────┐  drain    ┌──────────┐
//!  │ fill blob│ ─────────▶ │ BlobQueue │ ────────▶ │ BlobSink │
//!  └──────────┘  (lock-    └───────────┘  batches  │ consume  │
//!       ...       free)         ▲                  └──────────┘
//!  ┌──────────┐                 │ condvar nudge         │
//!  │ fill blob│ ────────────────┘                   release()
//!  └──────────┘
//! ```
//!
//! A full queue never drops data: `enqueue` retries with escalating backoff
//! (spin, then yield, then sleep) until a slot frees up. Shutdown stops the
//! writer after a final drain, so no blob is left unreleased.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::queue::BlobQueue;
use crate::RawBlob;

// =============================================================================
// Constants
// =============================================================================

/// Default queue capacity (blobs in transit)
pub const DEFAULT_QUEUE_CAPACITY: usize = 131_072;

/// Default maximum blobs handed to the sink per batch
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Push attempts that spin before starting to yield
const SPIN_RETRIES: u32 = 64;

/// Push attempts that yield before starting to sleep
const YIELD_RETRIES: u32 = 256;

/// Sleep between push attempts once spinning and yielding both failed
const RETRY_SLEEP: Duration = Duration::from_millis(1);

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the staging consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Capacity of the lock-free transit queue
    pub queue_capacity: usize,

    /// Maximum number of blobs delivered to the sink in one batch
    pub batch_size: usize,

    /// How long the writer thread waits for a nudge before ticking idle
    pub tick: Duration,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            tick: Duration::from_millis(100),
        }
    }
}

// =============================================================================
// Sink
// =============================================================================

/// Batch consumer running on the writer thread.
///
/// The sink reads blob contents but never manages their memory: the consumer
/// releases every blob after `consume` returns. A sink error is logged and
/// counted; it does not stop the pipeline and never changes blob ownership.
pub trait BlobSink: Send {
    /// Handle a batch of live blobs, oldest first.
    fn consume(&mut self, blobs: &[RawBlob]) -> Result<()>;

    /// Called when a wait tick elapses with nothing queued.
    fn on_idle(&mut self) {}

    /// Called once after the final drain, before the writer thread exits.
    fn on_finish(&mut self) {}
}

// =============================================================================
// Stats
// =============================================================================

/// Atomic counters tracking pipeline activity.
#[derive(Debug, Default)]
pub struct StageStats {
    enqueued: AtomicU64,
    push_retries: AtomicU64,
    consumed: AtomicU64,
    bytes_consumed: AtomicU64,
    sink_errors: AtomicU64,
}

/// Point-in-time copy of [`StageStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageStatsSnapshot {
    pub enqueued: u64,
    pub push_retries: u64,
    pub consumed: u64,
    pub bytes_consumed: u64,
    pub sink_errors: u64,
}

impl StageStats {
    pub fn snapshot(&self) -> StageStatsSnapshot {
        StageStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            push_retries: self.push_retries.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            bytes_consumed: self.bytes_consumed.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Consumer
// =============================================================================

struct Shared {
    queue: BlobQueue,
    stop: AtomicBool,
    nudge: Condvar,
    nudge_lock: Mutex<()>,
    stats: StageStats,
}

/// Owns the transit queue and the writer thread consuming it.
///
/// Dropping the consumer shuts it down: the writer drains whatever is still
/// queued, the sink sees a final `on_finish`, and the thread is joined.
pub struct StageConsumer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl StageConsumer {
    /// Starts the writer thread and returns the producer-facing handle.
    pub fn spawn<S>(config: StageConfig, sink: S) -> Result<Self>
    where
        S: BlobSink + 'static,
    {
        let shared = Arc::new(Shared {
            queue: BlobQueue::new(config.queue_capacity),
            stop: AtomicBool::new(false),
            nudge: Condvar::new(),
            nudge_lock: Mutex::new(()),
            stats: StageStats::default(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("blobstage-writer".into())
            .spawn(move || writer_loop(worker_shared, sink, config.batch_size, config.tick))?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Hands `blob` to the writer thread. Callable from any thread.
    ///
    /// Retries with escalating backoff while the queue is full. After a
    /// successful return the buffer belongs to the pipeline; the producer
    /// has nothing left to release. If the consumer has already stopped the
    /// blob is released here and `Err(ConsumerStopped)` is returned - no
    /// path out of this function leaks.
    pub fn enqueue(&self, blob: RawBlob) -> Result<()> {
        let mut pending = blob;
        let mut failures: u32 = 0;

        loop {
            if self.shared.stop.load(Ordering::Acquire) {
                pending.release();
                return Err(Error::ConsumerStopped);
            }

            match self.shared.queue.try_push(pending) {
                Ok(()) => break,
                Err(back) => {
                    pending = back;
                    self.shared.stats.push_retries.fetch_add(1, Ordering::Relaxed);
                    backoff(failures, self.shared.queue.capacity());
                    failures = failures.saturating_add(1);
                }
            }
        }

        self.shared.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.shared.nudge.notify_one();
        Ok(())
    }

    /// Non-blocking variant: on a full queue the blob is handed back to the
    /// caller, still live.
    pub fn try_enqueue(&self, blob: RawBlob) -> std::result::Result<(), RawBlob> {
        self.shared.queue.try_push(blob)?;
        self.shared.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.shared.nudge.notify_one();
        Ok(())
    }

    /// Number of blobs currently waiting in the queue.
    pub fn backlog(&self) -> usize {
        self.shared.queue.len()
    }

    /// Activity counters.
    pub fn stats(&self) -> StageStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Stops accepting blobs, drains the queue, and joins the writer.
    ///
    /// Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.nudge.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("writer thread panicked during shutdown");
            }
        }
    }
}

impl Drop for StageConsumer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Escalating wait between push attempts against a full queue.
fn backoff(failures: u32, capacity: usize) {
    if failures < SPIN_RETRIES {
        std::hint::spin_loop();
    } else if failures < YIELD_RETRIES {
        thread::yield_now();
    } else {
        if failures == YIELD_RETRIES {
            warn!(capacity, "staging queue saturated, producer sleeping between retries");
        }
        thread::sleep(RETRY_SLEEP);
    }
}

fn writer_loop<S: BlobSink>(shared: Arc<Shared>, mut sink: S, batch_size: usize, tick: Duration) {
    let mut batch: Vec<RawBlob> = Vec::with_capacity(batch_size);

    loop {
        let stopping = shared.stop.load(Ordering::Acquire);

        while batch.len() < batch_size {
            match shared.queue.try_pop() {
                Some(blob) => batch.push(blob),
                None => break,
            }
        }

        if !batch.is_empty() {
            deliver(&shared, &mut sink, &mut batch);
            continue;
        }

        if stopping {
            break;
        }

        let mut guard = shared.nudge_lock.lock();
        if shared.queue.is_empty() && !shared.stop.load(Ordering::Acquire) {
            let timed_out = shared.nudge.wait_for(&mut guard, tick).timed_out();
            drop(guard);
            if timed_out && shared.queue.is_empty() {
                sink.on_idle();
            }
        }
    }

    sink.on_finish();
    debug!("writer thread finished");
}

fn deliver<S: BlobSink>(shared: &Shared, sink: &mut S, batch: &mut Vec<RawBlob>) {
    if let Err(e) = sink.consume(batch) {
        shared.stats.sink_errors.fetch_add(1, Ordering::Relaxed);
        error!(error = %e, blobs = batch.len(), "sink failed to consume batch");
    }

    for mut blob in batch.drain(..) {
        shared
            .stats
            .bytes_consumed
            .fetch_add(blob.len() as u64, Ordering::Relaxed);
        shared.stats.consumed.fetch_add(1, Ordering::Relaxed);
        blob.release();
    }
}

// =============================================================================
// Tests
// =============================================================================
