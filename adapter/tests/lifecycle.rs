//! End-to-end queue lifecycle over the filesystem store.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chaind_adapter::{
    AdapterBuilder, AdapterError, BlockFilter, DispatchProcessor, FsAdapter, RetryPolicy,
};
use chaind_nullables::NullDispatcher;
use chaind_store::{QueueStore, StoreError};
use chaind_store_fs::FsQueueStore;
use chaind_types::{BlockRef, ChainSpec, ObservedTx, Status, TxHash};
use tempfile::TempDir;

fn policy() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        max_attempts: 0,
        deadline: Some(Duration::from_secs(30)),
    }
}

fn open(dir: &TempDir, dispatcher: &Arc<NullDispatcher>) -> FsAdapter<Arc<NullDispatcher>> {
    let root = dir.path().join(ChainSpec::default().path_segment());
    AdapterBuilder::new(ChainSpec::default(), Arc::clone(dispatcher))
        .retry(policy())
        .open(|| FsQueueStore::create(&root))
        .expect("open adapter")
}

fn queued(adapter: &FsAdapter<Arc<NullDispatcher>>, payload: &[u8]) -> TxHash {
    let hash = adapter.put(payload).unwrap();
    adapter.enqueue(&hash).unwrap();
    hash
}

#[test]
fn put_then_get_is_pending() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = open(&dir, &Arc::new(NullDispatcher::new()));

    let hash = adapter.put(b"\x02\xf8\x70").unwrap();
    let record = adapter.get(&hash).unwrap().unwrap();

    assert_eq!(record.state(), Some(Status::Pending));
    assert_eq!(record.payload, b"\x02\xf8\x70");
}

#[test]
fn dispatch_of_unknown_hash_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = AdapterBuilder::new(ChainSpec::default(), NullDispatcher::new())
        .retry(RetryPolicy::immediate(3))
        .open(|| FsQueueStore::create(dir.path()))
        .unwrap();

    let err = adapter.dispatch(&TxHash::of(b"never stored")).unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[test]
fn dispatched_then_succeeded_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Arc::new(NullDispatcher::new());
    let adapter = open(&dir, &dispatcher);
    let hash = queued(&adapter, b"\x01\x02\x03");

    assert!(adapter.dispatch(&hash).unwrap());
    assert_eq!(
        adapter.get(&hash).unwrap().unwrap().state(),
        Some(Status::InNetwork)
    );
    assert_eq!(dispatcher.sent(), vec!["0x010203"]);

    adapter
        .succeed(BlockRef::new(123), &ObservedTx::new(hash, 0, true))
        .unwrap();

    assert!(adapter.pending().unwrap().is_empty());
    assert!(adapter.failed().unwrap().is_empty());
    assert!(adapter.deferred().unwrap().is_empty());
    assert!(!adapter.contains(&hash).unwrap());
}

#[test]
fn rpc_failure_lands_in_failed() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Arc::new(NullDispatcher::rejecting(-32000, "insufficient funds"));
    let adapter = open(&dir, &dispatcher);
    let hash = queued(&adapter, b"\xaa");

    assert!(!adapter.dispatch(&hash).unwrap());

    assert_eq!(adapter.failed().unwrap(), vec![hash]);
    assert!(!adapter.pending().unwrap().contains(&hash));
}

#[test]
fn purge_twice_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = open(&dir, &Arc::new(NullDispatcher::new()));
    let hash = queued(&adapter, b"\xbb");
    let tx = ObservedTx::new(hash, 4, true);
    adapter
        .store()
        .finalize(&hash, BlockRef::new(7), &tx, false)
        .unwrap();

    assert!(adapter.store().purge(&hash).unwrap());
    assert!(!adapter.store().purge(&hash).unwrap());
}

#[test]
fn upcoming_is_bounded_by_in_flight() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = open(&dir, &Arc::new(NullDispatcher::new()));
    let hashes: Vec<_> = (0u8..5).map(|i| queued(&adapter, &[0xc0, i])).collect();

    assert!(adapter.dispatch(&hashes[0]).unwrap());
    assert!(adapter.dispatch(&hashes[1]).unwrap());

    assert_eq!(adapter.upcoming(3).unwrap(), vec![hashes[2]]);
    assert!(adapter.upcoming(2).unwrap().is_empty());
    assert!(adapter.upcoming(1).unwrap().is_empty());
    assert_eq!(adapter.upcoming(0).unwrap(), hashes[2..].to_vec());
}

#[test]
fn block_filter_retires_what_the_block_settled() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Arc::new(NullDispatcher::new());
    let adapter = open(&dir, &dispatcher);
    let a = queued(&adapter, b"\xd0");
    let b = queued(&adapter, b"\xd1");
    let c = queued(&adapter, b"\xd2");
    let report = DispatchProcessor::new(0).process(&adapter).unwrap();
    assert_eq!(report.sent, 3);

    let block = BlockRef::new(1000);
    let settled = BlockFilter
        .filter(
            &adapter,
            block,
            &[ObservedTx::new(a, 0, true), ObservedTx::new(b, 1, false)],
        )
        .unwrap();

    assert_eq!(settled.succeeded, vec![a]);
    assert_eq!(settled.failed, vec![b]);
    assert_eq!(adapter.in_flight().unwrap(), 1);
    assert!(adapter.contains(&c).unwrap());
}

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Arc::new(NullDispatcher::new());
    let first = {
        let adapter = open(&dir, &dispatcher);
        queued(&adapter, b"\xe0")
    };

    let root = dir.path().join(ChainSpec::default().path_segment());
    let adapter = AdapterBuilder::new(ChainSpec::default(), Arc::clone(&dispatcher))
        .retry(policy())
        .store_sync(true)
        .open(|| FsQueueStore::open(&root))
        .unwrap();
    let second = queued(&adapter, b"\xe1");

    assert_eq!(adapter.upcoming(0).unwrap(), vec![first, second]);
}

#[test]
fn open_without_store_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("not-yet");
    let result = AdapterBuilder::new(ChainSpec::default(), NullDispatcher::new())
        .retry(RetryPolicy::immediate(2))
        .open(|| FsQueueStore::open(&missing));

    match result {
        Err(AdapterError::RetryExhausted { op, source, .. }) => {
            assert_eq!(op, "open");
            assert!(matches!(source, StoreError::NotFound(_)));
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("store should not exist"),
    }
}

#[test]
fn concurrent_schedulers_send_each_record_once() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Arc::new(NullDispatcher::new());
    let hashes: Vec<_> = {
        let adapter = open(&dir, &dispatcher);
        (0u8..24).map(|i| queued(&adapter, &[0xf0, i])).collect()
    };

    let workers: Vec<_> = (0..3)
        .map(|_| {
            let adapter = open(&dir, &dispatcher);
            thread::spawn(move || {
                let processor = DispatchProcessor::new(0);
                while !adapter.upcoming(0).unwrap().is_empty() {
                    processor.process(&adapter).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut sent = dispatcher.sent();
    assert_eq!(sent.len(), hashes.len());
    sent.sort();
    sent.dedup();
    assert_eq!(sent.len(), hashes.len());

    let adapter = open(&dir, &dispatcher);
    assert_eq!(adapter.in_flight().unwrap(), hashes.len());
}

#[test]
fn concurrent_settlers_and_reaper_retire_each_record() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Arc::new(NullDispatcher::new());
    let txs: Vec<ObservedTx> = {
        let adapter = open(&dir, &dispatcher);
        (0u8..24)
            .map(|i| {
                let hash = queued(&adapter, &[0xe0, i]);
                assert!(adapter.dispatch(&hash).unwrap());
                ObservedTx::new(hash, u32::from(i), i % 4 != 0)
            })
            .collect()
    };
    let txs = Arc::new(txs);

    let settlers: Vec<_> = (0..3)
        .map(|_| {
            let adapter = open(&dir, &dispatcher);
            let txs = Arc::clone(&txs);
            thread::spawn(move || BlockFilter.filter(&adapter, BlockRef::new(77), &txs))
        })
        .collect();
    let reaper = {
        let root = dir.path().join(ChainSpec::default().path_segment());
        let adapter = AdapterBuilder::new(ChainSpec::default(), Arc::clone(&dispatcher))
            .retry(policy())
            .pending_retry_threshold(1)
            .open(|| FsQueueStore::open(&root))
            .expect("open reaper");
        thread::spawn(move || -> Result<(), AdapterError> {
            for _ in 0..50 {
                adapter.reap()?;
                adapter.stalled()?;
            }
            Ok(())
        })
    };

    let mut retired = Vec::new();
    for settler in settlers {
        let report = settler.join().unwrap().expect("settle pass");
        assert!(report.locked.is_empty());
        retired.extend(report.succeeded);
        retired.extend(report.failed);
    }
    reaper.join().unwrap().expect("reap pass");

    assert!(retired.iter().all(|h| txs.iter().any(|tx| tx.hash == *h)));

    let adapter = open(&dir, &dispatcher);
    for tx in txs.iter() {
        assert!(!adapter.contains(&tx.hash).unwrap(), "{} left behind", tx.hash);
    }
    assert_eq!(adapter.in_flight().unwrap(), 0);
    assert!(adapter.failed().unwrap().is_empty());
}

#[test]
fn settling_while_scheduling_surfaces_no_store_races() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Arc::new(NullDispatcher::new());
    let txs: Vec<ObservedTx> = {
        let adapter = open(&dir, &dispatcher);
        (0u8..24)
            .map(|i| ObservedTx::new(queued(&adapter, &[0xd0, i]), u32::from(i), true))
            .collect()
    };

    let scheduler = {
        let adapter = open(&dir, &dispatcher);
        thread::spawn(move || -> Result<(), AdapterError> {
            let processor = DispatchProcessor::new(0);
            while !adapter.upcoming(0)?.is_empty() {
                processor.process(&adapter)?;
            }
            Ok(())
        })
    };
    let settler = {
        let adapter = open(&dir, &dispatcher);
        thread::spawn(move || -> Result<usize, AdapterError> {
            let mut settled = 0;
            for _ in 0..1000 {
                let report = BlockFilter.filter(&adapter, BlockRef::new(78), &txs)?;
                settled += report.settled();
                if report.locked.is_empty() && report.unknown == txs.len() {
                    break;
                }
            }
            Ok(settled)
        })
    };

    scheduler.join().unwrap().expect("dispatch passes");
    let settled = settler.join().unwrap().expect("settle passes");
    assert_eq!(settled, 24);

    let adapter = open(&dir, &dispatcher);
    assert!(adapter.upcoming(0).unwrap().is_empty());
    assert_eq!(adapter.in_flight().unwrap(), 0);
}
