//! Blobstage pipeline driver
//!
//! Runs a complete staging pipeline end to end: producer threads allocate
//! and fill blobs, hand them to the lock-free transit queue, and a writer
//! thread journals them to disk. Optionally re-imports the journal
//! afterwards to verify every record survived intact.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  producers (N threads)  ──▶  BlobQueue  ──▶  writer ──▶ journal │
//! │                                                          │      │
//! │                              verify: importer ◀──────────┘      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blobstage::{
    generate_id, JournalConfig, JournalImporter, JournalSink, RawBlob, Result, StageConfig,
    StageConsumer,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Blobstage - staged persistence pipeline for raw byte buffers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Journal destination folder (created if missing)
    #[arg(long, env = "JOURNAL_DIR", default_value = "./journal")]
    journal_dir: PathBuf,

    /// Number of producer threads
    #[arg(long, env = "PRODUCERS", default_value = "4")]
    producers: usize,

    /// Blobs produced per thread
    #[arg(long, env = "BLOBS_PER_PRODUCER", default_value = "1000")]
    blobs_per_producer: usize,

    /// Size of each blob in bytes
    #[arg(long, env = "BLOB_SIZE", default_value = "1024")]
    blob_size: usize,

    /// Transit queue capacity
    #[arg(long, env = "QUEUE_CAPACITY", default_value = "131072")]
    queue_capacity: usize,

    /// Maximum blobs written per batch
    #[arg(long, env = "BATCH_SIZE", default_value = "1024")]
    batch_size: usize,

    /// Seconds between journal file rotations
    #[arg(long, env = "ROTATE_SECONDS", default_value = "3600")]
    rotate_seconds: u64,

    /// Re-import the journal afterwards and verify record counts
    #[arg(long, env = "VERIFY")]
    verify: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(args) {
        error!("pipeline failed: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    info!("Starting blobstage pipeline");
    info!("  Journal folder: {}", args.journal_dir.display());
    info!("  Producers: {}", args.producers);
    info!("  Blobs per producer: {}", args.blobs_per_producer);
    info!("  Blob size: {} bytes", args.blob_size);

    std::fs::create_dir_all(&args.journal_dir)?;

    let mut journal_config = JournalConfig::new(&args.journal_dir);
    journal_config.rotate_every = Duration::from_secs(args.rotate_seconds);

    let stage_config = StageConfig {
        queue_capacity: args.queue_capacity,
        batch_size: args.batch_size,
        tick: Duration::from_millis(100),
    };

    let sink = JournalSink::new(&journal_config)?;
    let consumer = StageConsumer::spawn(stage_config, sink)?;

    let started = Instant::now();
    let total = produce(&consumer, args.producers, args.blobs_per_producer, args.blob_size);

    let mut consumer = consumer;
    consumer.shutdown();

    let stats = consumer.stats();
    let elapsed = started.elapsed();
    info!(
        enqueued = stats.enqueued,
        consumed = stats.consumed,
        bytes = stats.bytes_consumed,
        push_retries = stats.push_retries,
        sink_errors = stats.sink_errors,
        elapsed_ms = elapsed.as_millis() as u64,
        "pipeline finished"
    );

    if args.verify {
        verify_journal(&args.journal_dir, total, args.blob_size)?;
    }
    Ok(())
}

/// Spawns the producer threads and waits for them; returns the number of
/// blobs successfully handed to the pipeline.
fn produce(consumer: &StageConsumer, producers: usize, per_producer: usize, blob_size: usize) -> u64 {
    thread::scope(|scope| {
        let mut handles = Vec::new();
        for worker in 0..producers {
            handles.push(scope.spawn(move || {
                let mut produced = 0u64;
                for sequence in 0..per_producer {
                    let blob = match fill_blob(blob_size, sequence) {
                        Ok(blob) => blob,
                        Err(e) => {
                            error!(worker, sequence, error = %e, "blob allocation failed");
                            continue;
                        }
                    };
                    match consumer.enqueue(blob) {
                        Ok(()) => produced += 1,
                        Err(e) => {
                            error!(worker, sequence, error = %e, "enqueue failed");
                            break;
                        }
                    }
                }
                produced
            }));
        }
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .sum()
    })
}

/// Allocates one blob tagged with a fresh identifier and a repeating
/// sequence byte.
fn fill_blob(size: usize, sequence: usize) -> Result<RawBlob> {
    let mut blob = RawBlob::alloc(size)?;
    let id = generate_id();
    let bytes = blob.as_mut_slice();

    let tag_len = bytes.len().min(id.as_bytes().len());
    bytes[..tag_len].copy_from_slice(&id.as_bytes()[..tag_len]);
    for byte in bytes[tag_len..].iter_mut() {
        *byte = (sequence % 251) as u8;
    }
    Ok(blob)
}

/// Re-imports the journal and checks that every produced blob came back.
fn verify_journal(dir: &std::path::Path, expected_records: u64, blob_size: usize) -> Result<()> {
    let importer = JournalImporter::new(true);
    let mut wrong_sized = 0u64;
    let stats = importer.import(dir, |payload| {
        if payload.len() != blob_size {
            wrong_sized += 1;
        }
    })?;

    info!(
        files = stats.files,
        records = stats.records,
        bytes = stats.bytes,
        checksum_failures = stats.checksum_failures,
        "journal verified"
    );

    if stats.records != expected_records || stats.checksum_failures > 0 || wrong_sized > 0 {
        error!(
            expected = expected_records,
            found = stats.records,
            wrong_sized,
            "journal verification failed"
        );
        std::process::exit(1);
    }
    Ok(())
}
