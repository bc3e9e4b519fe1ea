//! Pipeline Integration Tests
//!
//! End-to-end coverage of the public surface: blobs produced on many
//! threads, staged through the lock-free queue, journaled to disk, and
//! imported back intact.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use blobstage::{
    generate_id, BlobQueue, EntityId, JournalConfig, JournalImporter, JournalSink, RawBlob,
    SharedBlob, StageConfig, StageConsumer,
};

// =============================================================================
// Queue Handoff Tests
// =============================================================================

/// The canonical handoff scenario: a 1024-byte blob filled with 0xAB crosses
/// from thread A to thread B unchanged.
#[test]
fn test_cross_thread_blob_handoff() {
    let queue = Arc::new(BlobQueue::new(4));

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut blob = RawBlob::alloc(1024).expect("alloc failed");
            blob.fill(0xAB);
            queue.try_push(blob).expect("push failed");
        })
    };
    producer.join().expect("producer panicked");

    let consumer = thread::spawn(move || {
        let mut blob = queue.try_pop().expect("pop failed");
        assert_eq!(blob.len(), 1024);
        assert!(blob.as_slice().iter().all(|&b| b == 0xAB));
        blob.release();
    });
    consumer.join().expect("consumer panicked");
}

/// A popped blob can be adopted into shared ownership and read from several
/// threads at once.
#[test]
fn test_popped_blob_fans_out_as_shared() {
    let queue = BlobQueue::new(1);
    let mut blob = RawBlob::alloc(256).expect("alloc failed");
    blob.fill(0x3C);
    queue.try_push(blob).expect("push failed");

    let shared: SharedBlob = queue.try_pop().expect("pop failed").into_shared();

    let mut readers = Vec::new();
    for _ in 0..4 {
        let clone = shared.clone();
        readers.push(thread::spawn(move || {
            assert!(clone.as_slice().iter().all(|&b| b == 0x3C));
        }));
    }
    for reader in readers {
        reader.join().expect("reader panicked");
    }
}

// =============================================================================
// Full Pipeline Tests
// =============================================================================

#[test]
fn test_multi_producer_pipeline_journals_every_blob() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 250;
    const BLOB_SIZE: usize = 512;

    let dir = tempfile::tempdir().expect("tempdir failed");
    let journal_config = JournalConfig::new(dir.path());
    let sink = JournalSink::new(&journal_config).expect("sink failed");

    let stage_config = StageConfig {
        queue_capacity: 64,
        batch_size: 16,
        tick: Duration::from_millis(10),
    };
    let consumer = Arc::new(StageConsumer::spawn(stage_config, sink).expect("spawn failed"));

    let mut producers = Vec::new();
    for worker in 0..PRODUCERS {
        let consumer = Arc::clone(&consumer);
        producers.push(thread::spawn(move || {
            for _ in 0..PER_PRODUCER {
                let mut blob = RawBlob::alloc(BLOB_SIZE).expect("alloc failed");
                blob.fill(worker as u8);
                consumer.enqueue(blob).expect("enqueue failed");
            }
        }));
    }
    for producer in producers {
        producer.join().expect("producer panicked");
    }

    let mut consumer = match Arc::try_unwrap(consumer) {
        Ok(consumer) => consumer,
        Err(_) => panic!("producer handles still alive"),
    };
    consumer.shutdown();

    let stats = consumer.stats();
    assert_eq!(stats.enqueued, (PRODUCERS * PER_PRODUCER) as u64);
    assert_eq!(stats.consumed, (PRODUCERS * PER_PRODUCER) as u64);
    assert_eq!(stats.sink_errors, 0);

    // Every blob must come back out of the journal, sized and filled as
    // written, with per-producer counts intact.
    let importer = JournalImporter::new(true);
    let mut per_worker: HashMap<u8, usize> = HashMap::new();
    let import_stats = importer
        .import(dir.path(), |payload| {
            assert_eq!(payload.len(), BLOB_SIZE);
            let tag = payload[0];
            assert!(payload.iter().all(|&b| b == tag));
            *per_worker.entry(tag).or_default() += 1;
        })
        .expect("import failed");

    assert_eq!(import_stats.records, (PRODUCERS * PER_PRODUCER) as u64);
    assert_eq!(import_stats.checksum_failures, 0);
    assert_eq!(per_worker.len(), PRODUCERS);
    for worker in 0..PRODUCERS {
        assert_eq!(per_worker[&(worker as u8)], PER_PRODUCER);
    }
}

#[test]
fn test_pipeline_handles_empty_and_odd_sized_blobs() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let sink = JournalSink::new(&JournalConfig::new(dir.path())).expect("sink failed");
    let mut consumer =
        StageConsumer::spawn(StageConfig::default(), sink).expect("spawn failed");

    let sizes = [0usize, 1, 7, 13, 4096];
    for &size in &sizes {
        let mut blob = RawBlob::alloc(size).expect("alloc failed");
        blob.fill(0x77);
        consumer.enqueue(blob).expect("enqueue failed");
    }
    consumer.shutdown();

    let (payloads, stats) = JournalImporter::new(true)
        .import_all(dir.path())
        .expect("import failed");
    assert_eq!(stats.records, sizes.len() as u64);

    let mut read_sizes: Vec<usize> = payloads.iter().map(|p| p.len()).collect();
    read_sizes.sort_unstable();
    let mut expected = sizes.to_vec();
    expected.sort_unstable();
    assert_eq!(read_sizes, expected);
}

// =============================================================================
// Identifier Tests
// =============================================================================

/// Identifiers drawn concurrently while the pipeline is under load stay
/// unique and parse back from their string form.
#[test]
fn test_identifiers_stay_unique_under_pipeline_load() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 500;

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            thread::spawn(|| (0..PER_THREAD).map(|_| generate_id()).collect::<Vec<_>>())
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().expect("id thread panicked"));
    }

    let mut deduped = all.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), THREADS * PER_THREAD);

    let id = all[0];
    let parsed: EntityId = id.to_string().parse().expect("parse failed");
    assert_eq!(parsed, id);
}
