//! Nullable store: thread-safe in-memory queue storage for testing.

use chaind_store::queue::transition;
use chaind_store::{CacheAdapter, QueueStore, StoreError};
use chaind_types::{BlockRef, ObservedTx, StateFilter, StatusBits, TxHash, TxRecord};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::NullClock;

#[derive(Default)]
struct Records {
    by_seq: BTreeMap<u64, TxRecord>,
    index: HashMap<TxHash, u64>,
    next_seq: u64,
}

/// An in-memory queue store for testing.
/// Thread-safe for use from several dispatcher threads.
///
/// Failures can be injected: every operation first pops the next injected
/// error, if any, and returns it without touching the records.
pub struct NullQueueStore {
    records: Mutex<Records>,
    faults: Mutex<VecDeque<StoreError>>,
    selects: AtomicUsize,
    stale: Mutex<Vec<TxHash>>,
    vanishing: Mutex<HashSet<TxHash>>,
    clock: NullClock,
}

impl NullQueueStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Records::default()),
            faults: Mutex::new(VecDeque::new()),
            selects: AtomicUsize::new(0),
            stale: Mutex::new(Vec::new()),
            vanishing: Mutex::new(HashSet::new()),
            clock: NullClock::default(),
        }
    }

    /// Make the next `n` operations fail with a transient not-found error.
    pub fn inject_not_found(&self, n: usize) {
        let mut faults = self.faults.lock().unwrap();
        for _ in 0..n {
            faults.push_back(StoreError::NotFound("injected race".to_string()));
        }
    }

    /// Make the next `n` operations fail with a transient lock error.
    pub fn inject_locked(&self, n: usize) {
        let mut faults = self.faults.lock().unwrap();
        for _ in 0..n {
            faults.push_back(StoreError::Locked("injected lock".to_string()));
        }
    }

    /// Make the next operation fail with `err`.
    pub fn inject(&self, err: StoreError) {
        self.faults.lock().unwrap().push_back(err);
    }

    /// Overwrite the status bits of a record, bypassing the transition rules.
    pub fn force_status(&self, key: &TxHash, status: StatusBits) {
        let mut records = self.records.lock().unwrap();
        if let Some(seq) = records.index.get(key).copied() {
            if let Some(r) = records.by_seq.get_mut(&seq) {
                r.status = status;
            }
        }
    }

    /// Make every later `select` also list `key`, like a listing taken just
    /// before another process purged the record.
    pub fn list_stale(&self, key: TxHash) {
        self.stale.lock().unwrap().push(key);
    }

    /// Drop `key` from the working set just before its next keyed read or
    /// transition, like a record another process settled in between.
    /// `exists` and `select` still see it until then.
    pub fn vanish_on_next_use(&self, key: TxHash) {
        self.vanishing.lock().unwrap().insert(key);
    }

    /// Number of `select` calls served so far.
    pub fn select_calls(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    /// Number of records in the working set.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().by_seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clock(&self) -> &NullClock {
        &self.clock
    }

    fn fault(&self) -> Result<(), StoreError> {
        match self.faults.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn update<T>(
        &self,
        key: &TxHash,
        f: impl FnOnce(&mut TxRecord) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.fault()?;
        let mut records = self.records.lock().unwrap();
        if self.vanishing.lock().unwrap().remove(key) {
            if let Some(seq) = records.index.remove(key) {
                records.by_seq.remove(&seq);
            }
        }
        let seq = *records
            .index
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let record = records
            .by_seq
            .get_mut(&seq)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        // Work on a copy so a rejected transition leaves the record intact.
        let mut next = record.clone();
        let out = f(&mut next)?;
        *record = next;
        Ok(out)
    }
}

impl Default for NullQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStore for NullQueueStore {
    fn put(
        &self,
        payload: &[u8],
        cache: &dyn CacheAdapter,
    ) -> Result<(StatusBits, TxHash), StoreError> {
        self.fault()?;
        let cached = cache.digest(payload)?;
        let mut records = self.records.lock().unwrap();
        if records.index.contains_key(&cached.hash) {
            return Err(StoreError::Duplicate(cached.hash.to_string()));
        }
        let seq = records.next_seq;
        records.next_seq += 1;
        let mut record = TxRecord::new(cached.hash, seq, payload.to_vec(), self.clock.now());
        record.sender = cached.sender;
        record.nonce = cached.nonce;
        let status = record.status;
        records.index.insert(cached.hash, seq);
        records.by_seq.insert(seq, record);
        Ok((status, cached.hash))
    }

    fn get(&self, key: &TxHash) -> Result<TxRecord, StoreError> {
        let record = self.update(key, |r| Ok(r.clone()))?;
        transition::checked(&record)?;
        Ok(record)
    }

    fn exists(&self, key: &TxHash) -> Result<bool, StoreError> {
        self.fault()?;
        Ok(self.records.lock().unwrap().index.contains_key(key))
    }

    fn enqueue(&self, key: &TxHash) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.update(key, |r| transition::enqueue(r, now).map(|_| ()))
    }

    fn send_start(&self, key: &TxHash) -> Result<TxRecord, StoreError> {
        let now = self.clock.now();
        self.update(key, |r| {
            transition::send_start(r, now)?;
            Ok(r.clone())
        })
    }

    fn send_end(&self, key: &TxHash) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.update(key, |r| transition::send_end(r, now))
    }

    fn fail(&self, key: &TxHash) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.update(key, |r| transition::fail(r, now))
    }

    fn defer(&self, key: &TxHash) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.update(key, |r| transition::defer(r, now))
    }

    fn finalize(
        &self,
        key: &TxHash,
        block: BlockRef,
        tx: &ObservedTx,
        error: bool,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.update(key, |r| transition::finalize(r, block, tx, error, now))
    }

    fn purge(&self, key: &TxHash) -> Result<bool, StoreError> {
        self.fault()?;
        let mut records = self.records.lock().unwrap();
        let Some(seq) = records.index.get(key).copied() else {
            return Ok(false);
        };
        if let Some(record) = records.by_seq.get(&seq) {
            transition::purge(record)?;
        }
        records.by_seq.remove(&seq);
        records.index.remove(key);
        Ok(true)
    }

    fn is_reserved(&self, key: &TxHash) -> Result<bool, StoreError> {
        self.update(key, |r| Ok(r.status.is_reserved()))
    }

    fn select(&self, filter: StateFilter, limit: usize) -> Result<Vec<TxHash>, StoreError> {
        self.fault()?;
        self.selects.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().unwrap();
        let mut out: Vec<TxHash> = records
            .by_seq
            .values()
            .filter(|r| filter.matches(r.status))
            .map(|r| r.hash)
            .collect();
        out.extend(self.stale.lock().unwrap().iter().copied());
        if limit > 0 {
            out.truncate(limit);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaind_store::RawCacheAdapter;
    use chaind_types::Status;

    fn put(store: &NullQueueStore, payload: &[u8]) -> TxHash {
        store.put(payload, &RawCacheAdapter::default()).unwrap().1
    }

    #[test]
    fn put_get_record() {
        let store = NullQueueStore::new();
        let hash = put(&store, b"tx-a");
        let record = store.get(&hash).unwrap();
        assert_eq!(record.payload, b"tx-a");
        assert_eq!(record.state(), Some(Status::Pending));
    }

    #[test]
    fn duplicate_put_rejected() {
        let store = NullQueueStore::new();
        put(&store, b"tx-a");
        let err = store
            .put(b"tx-a", &RawCacheAdapter::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn injected_faults_are_consumed_in_order() {
        let store = NullQueueStore::new();
        let hash = put(&store, b"tx-a");
        store.inject_not_found(1);
        store.inject_locked(1);
        assert!(matches!(store.get(&hash), Err(StoreError::NotFound(_))));
        assert!(matches!(store.get(&hash), Err(StoreError::Locked(_))));
        assert!(store.get(&hash).is_ok());
    }

    #[test]
    fn rejected_transition_leaves_record() {
        let store = NullQueueStore::new();
        let hash = put(&store, b"tx-a");
        assert!(matches!(
            store.send_end(&hash),
            Err(StoreError::Transition { .. })
        ));
        assert_eq!(store.get(&hash).unwrap().state(), Some(Status::Pending));
    }

    #[test]
    fn invalid_bits_reported_on_get() {
        let store = NullQueueStore::new();
        let hash = put(&store, b"tx-a");
        store.force_status(&hash, StatusBits::QUEUED | StatusBits::FINAL);
        assert!(matches!(
            store.get(&hash),
            Err(StoreError::InvalidState { .. })
        ));
    }

    #[test]
    fn purge_twice_is_noop() {
        let store = NullQueueStore::new();
        let hash = put(&store, b"tx-a");
        store.send_start(&hash).unwrap();
        store.fail(&hash).unwrap();
        assert!(store.purge(&hash).unwrap());
        assert!(!store.purge(&hash).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn upcoming_is_fifo_and_limited() {
        let store = NullQueueStore::new();
        let hashes: Vec<TxHash> = (0u8..4).map(|i| put(&store, &[i + 1])).collect();
        for h in &hashes {
            store.enqueue(h).unwrap();
        }
        assert_eq!(store.upcoming(2).unwrap(), hashes[..2].to_vec());
        assert_eq!(store.upcoming(0).unwrap(), hashes);
    }

    #[test]
    fn stale_keys_are_listed_but_absent() {
        let store = NullQueueStore::new();
        let hash = put(&store, b"a");
        let gone = TxHash::of(b"purged elsewhere");
        store.list_stale(gone);

        assert_eq!(store.select(StateFilter::pending(), 0).unwrap(), vec![hash, gone]);
        assert_eq!(store.select(StateFilter::pending(), 1).unwrap(), vec![hash]);
        assert!(!store.exists(&gone).unwrap());
    }

    #[test]
    fn vanishing_record_is_gone_on_next_use() {
        let store = NullQueueStore::new();
        let hash = put(&store, b"a");
        store.vanish_on_next_use(hash);

        assert!(store.exists(&hash).unwrap());
        assert!(matches!(store.get(&hash), Err(StoreError::NotFound(_))));
        assert!(!store.exists(&hash).unwrap());
    }
}
