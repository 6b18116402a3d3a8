//! Filesystem implementation of QueueStore.

use std::path::Path;

use chaind_store::queue::transition;
use chaind_store::{CacheAdapter, CounterStore, IndexStore, QueueStore, StoreError};
use chaind_types::{BlockRef, ObservedTx, StateFilter, StatusBits, Timestamp, TxHash, TxRecord};

use crate::layout::{remove_temp_files, FsLayout};
use crate::lock::{clear_stale, FileLock};
use crate::state::{parse_state_key, state_key};
use crate::{FsCounterStore, FsIndexStore, FsStateStore};

pub struct FsQueueStore {
    layout: FsLayout,
    state: FsStateStore,
    index: FsIndexStore,
    counter: FsCounterStore,
}

impl FsQueueStore {
    /// Open an existing store. A root that does not exist yet is reported as
    /// not-found, which callers treat as transient.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_layout(FsLayout::open(root)?))
    }

    /// Create the store directories if needed, then open.
    pub fn create(root: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_layout(FsLayout::create(root)?))
    }

    fn from_layout(layout: FsLayout) -> Self {
        Self {
            state: FsStateStore::new(layout.clone()),
            index: FsIndexStore::new(layout.clone()),
            counter: FsCounterStore::new(layout.clone()),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    fn lock(&self, key: &TxHash) -> Result<FileLock, StoreError> {
        Ok(FileLock::acquire(&self.layout.lock_dir(), &key.to_hex())?)
    }

    /// Apply `f` to the record under its lock and persist the result. A
    /// rejected transition writes nothing.
    fn update<T>(
        &self,
        key: &TxHash,
        f: impl FnOnce(&mut TxRecord) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = self.lock(key)?;
        let state_key = self.index.get_index(key)?;
        let mut record = self.state.read(&state_key)?;
        let out = f(&mut record)?;
        self.state.write(&state_key, &record)?;
        Ok(out)
    }
}

impl QueueStore for FsQueueStore {
    fn put(
        &self,
        payload: &[u8],
        cache: &dyn CacheAdapter,
    ) -> Result<(StatusBits, TxHash), StoreError> {
        let cached = cache.digest(payload)?;
        let _lock = self.lock(&cached.hash)?;
        if self.index.has_index(&cached.hash)? {
            return Err(StoreError::Duplicate(cached.hash.to_string()));
        }
        let seq = self.counter.next()?;
        let mut record = TxRecord::new(cached.hash, seq, payload.to_vec(), Timestamp::now());
        record.sender = cached.sender;
        record.nonce = cached.nonce;
        let key = state_key(seq, &cached.hash);
        // State first: a crash before the index write is repaired by `sync`.
        self.state.write(&key, &record)?;
        self.index.put_index(&cached.hash, &key)?;
        tracing::debug!(hash = %cached.hash, seq, "stored queue record");
        Ok((record.status, cached.hash))
    }

    fn get(&self, key: &TxHash) -> Result<TxRecord, StoreError> {
        let state_key = self.index.get_index(key)?;
        let record = self.state.read(&state_key)?;
        transition::checked(&record)?;
        Ok(record)
    }

    fn exists(&self, key: &TxHash) -> Result<bool, StoreError> {
        self.index.has_index(key)
    }

    fn enqueue(&self, key: &TxHash) -> Result<(), StoreError> {
        let _lock = self.lock(key)?;
        let state_key = self.index.get_index(key)?;
        let mut record = self.state.read(&state_key)?;
        if transition::enqueue(&mut record, Timestamp::now())? {
            self.state.write(&state_key, &record)?;
        }
        Ok(())
    }

    fn send_start(&self, key: &TxHash) -> Result<TxRecord, StoreError> {
        self.update(key, |r| {
            transition::send_start(r, Timestamp::now())?;
            Ok(r.clone())
        })
    }

    fn send_end(&self, key: &TxHash) -> Result<(), StoreError> {
        self.update(key, |r| transition::send_end(r, Timestamp::now()))
    }

    fn fail(&self, key: &TxHash) -> Result<(), StoreError> {
        self.update(key, |r| transition::fail(r, Timestamp::now()))
    }

    fn defer(&self, key: &TxHash) -> Result<(), StoreError> {
        self.update(key, |r| transition::defer(r, Timestamp::now()))
    }

    fn finalize(
        &self,
        key: &TxHash,
        block: BlockRef,
        tx: &ObservedTx,
        error: bool,
    ) -> Result<(), StoreError> {
        self.update(key, |r| {
            transition::finalize(r, block, tx, error, Timestamp::now())
        })
    }

    fn purge(&self, key: &TxHash) -> Result<bool, StoreError> {
        let _lock = self.lock(key)?;
        let state_key = match self.index.get_index(key) {
            Ok(k) => k,
            Err(StoreError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let record = self.state.read(&state_key)?;
        transition::purge(&record)?;
        // Index first: the index defines membership of the working set.
        self.index.delete_index(key)?;
        self.state.remove(&state_key)?;
        tracing::debug!(hash = %key, "purged queue record");
        Ok(true)
    }

    fn is_reserved(&self, key: &TxHash) -> Result<bool, StoreError> {
        Ok(self.get(key)?.status.is_reserved())
    }

    fn select(&self, filter: StateFilter, limit: usize) -> Result<Vec<TxHash>, StoreError> {
        let mut out = Vec::new();
        for key in self.state.keys()? {
            let record = match self.state.read(&key) {
                Ok(r) => r,
                // Purged between listing and reading.
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if filter.matches(record.status) {
                out.push(record.hash);
                if limit > 0 && out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Recover from a crash: drop temp files and stale locks, re-index
    /// orphaned records, remove dangling index entries and move the counter
    /// past every allocated sequence.
    ///
    /// Must not run while another process is using the same root.
    fn sync(&self) -> Result<(), StoreError> {
        remove_temp_files(&self.layout.state_dir())?;
        remove_temp_files(&self.layout.index_dir())?;
        remove_temp_files(self.layout.root())?;
        clear_stale(&self.layout.lock_dir())?;

        let mut max_seq = None;
        let mut reindexed = 0usize;
        for key in self.state.keys()? {
            let Some((seq, hash)) = parse_state_key(&key) else {
                tracing::warn!(key, "ignoring unrecognised state file");
                continue;
            };
            max_seq = max_seq.max(Some(seq));
            let indexed = match self.index.get_index(&hash) {
                Ok(k) => k == key,
                Err(StoreError::NotFound(_)) => false,
                Err(e) => return Err(e),
            };
            if !indexed {
                self.index.put_index(&hash, &key)?;
                reindexed += 1;
            }
        }

        let mut dangling = 0usize;
        for name in self.index.names()? {
            let Ok(hash) = name.parse::<TxHash>() else {
                continue;
            };
            let key = self.index.get_index(&hash)?;
            if !self.layout.state_dir().join(&key).exists() {
                self.index.delete_index(&hash)?;
                dangling += 1;
            }
        }

        if let Some(seq) = max_seq {
            self.counter.ensure_at_least(seq + 1)?;
        }
        tracing::info!(reindexed, dangling, root = %self.layout.root().display(), "queue store synced");
        Ok(())
    }
}
