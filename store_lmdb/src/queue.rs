//! LMDB implementation of QueueStore.

use std::path::Path;

use heed::RwTxn;

use chaind_store::queue::transition;
use chaind_store::{CacheAdapter, QueueStore, StoreError};
use chaind_types::{BlockRef, ObservedTx, StateFilter, StatusBits, Timestamp, TxHash, TxRecord};

use crate::migration::Migrator;
use crate::{LmdbEnvironment, LmdbError};

pub(crate) const NEXT_SEQ_KEY: &[u8] = b"next_seq";

/// Default memory map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

pub struct LmdbQueueStore {
    env: LmdbEnvironment,
}

impl LmdbQueueStore {
    /// Open the store in the existing directory `path`. A missing directory
    /// is reported as not-found, which callers treat as transient.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, StoreError> {
        let env = LmdbEnvironment::open(path, map_size)?;
        Migrator::run(&env)?;
        Ok(Self { env })
    }

    /// Create the directory if needed, then open.
    pub fn create(path: &Path, map_size: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::Backend(e.to_string()))?;
        Self::open(path, map_size)
    }

    fn read_record(&self, txn: &heed::RoTxn<'_>, key: &TxHash) -> Result<TxRecord, LmdbError> {
        let bytes = self
            .env
            .records_db
            .get(txn, key.as_bytes())?
            .ok_or_else(|| LmdbError::NotFound(key.to_string()))?;
        Ok(bincode::deserialize(bytes)?)
    }

    fn write_record(&self, txn: &mut RwTxn<'_>, record: &TxRecord) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(record)?;
        self.env
            .records_db
            .put(txn, record.hash.as_bytes(), &bytes)?;
        Ok(())
    }

    fn next_seq(&self, txn: &mut RwTxn<'_>) -> Result<u64, LmdbError> {
        let current = self
            .env
            .meta_db
            .get(txn, NEXT_SEQ_KEY)?
            .map(|b| {
                b.try_into()
                    .map(u64::from_be_bytes)
                    .map_err(|_| LmdbError::Serialization("next_seq has unexpected byte length".to_string()))
            })
            .transpose()?
            .unwrap_or(0);
        self.env
            .meta_db
            .put(txn, NEXT_SEQ_KEY, &(current + 1).to_be_bytes())?;
        Ok(current)
    }

    /// Apply `f` in one write transaction. A rejected transition aborts the
    /// transaction.
    fn update<T>(
        &self,
        key: &TxHash,
        f: impl FnOnce(&mut TxRecord) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut wtxn = self.env.write_txn()?;
        let mut record = self.read_record(&wtxn, key)?;
        let out = f(&mut record)?;
        self.write_record(&mut wtxn, &record)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(out)
    }
}

impl QueueStore for LmdbQueueStore {
    fn put(
        &self,
        payload: &[u8],
        cache: &dyn CacheAdapter,
    ) -> Result<(StatusBits, TxHash), StoreError> {
        let cached = cache.digest(payload)?;
        let mut wtxn = self.env.write_txn()?;
        let exists = self
            .env
            .records_db
            .get(&wtxn, cached.hash.as_bytes())
            .map_err(LmdbError::from)?
            .is_some();
        if exists {
            return Err(StoreError::Duplicate(cached.hash.to_string()));
        }
        let seq = self.next_seq(&mut wtxn)?;
        let mut record = TxRecord::new(cached.hash, seq, payload.to_vec(), Timestamp::now());
        record.sender = cached.sender;
        record.nonce = cached.nonce;
        self.write_record(&mut wtxn, &record)?;
        self.env
            .sequence_db
            .put(&mut wtxn, &seq.to_be_bytes(), cached.hash.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::debug!(hash = %cached.hash, seq, "stored queue record");
        Ok((record.status, cached.hash))
    }

    fn get(&self, key: &TxHash) -> Result<TxRecord, StoreError> {
        let rtxn = self.env.read_txn()?;
        let record = self.read_record(&rtxn, key)?;
        transition::checked(&record)?;
        Ok(record)
    }

    fn exists(&self, key: &TxHash) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn()?;
        let found = self
            .env
            .records_db
            .get(&rtxn, key.as_bytes())
            .map_err(LmdbError::from)?
            .is_some();
        Ok(found)
    }

    fn enqueue(&self, key: &TxHash) -> Result<(), StoreError> {
        self.update(key, |r| transition::enqueue(r, Timestamp::now()).map(|_| ()))
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
        let mut wtxn = self.env.write_txn()?;
        let record = match self.read_record(&wtxn, key) {
            Ok(r) => r,
            Err(LmdbError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        transition::purge(&record)?;
        self.env
            .records_db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(LmdbError::from)?;
        self.env
            .sequence_db
            .delete(&mut wtxn, &record.seq.to_be_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::debug!(hash = %key, "purged queue record");
        Ok(true)
    }

    fn is_reserved(&self, key: &TxHash) -> Result<bool, StoreError> {
        Ok(self.get(key)?.status.is_reserved())
    }

    fn select(&self, filter: StateFilter, limit: usize) -> Result<Vec<TxHash>, StoreError> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        for entry in self.env.sequence_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_seq, hash_bytes) = entry.map_err(LmdbError::from)?;
            let arr: [u8; 32] = hash_bytes
                .try_into()
                .map_err(|_| StoreError::Backend("sequence entry has bad hash length".to_string()))?;
            let record = self.read_record(&rtxn, &TxHash::new(arr))?;
            if filter.matches(record.status) {
                out.push(record.hash);
                if limit > 0 && out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaind_store::RawCacheAdapter;
    use chaind_types::Status;

    fn temp_store() -> (tempfile::TempDir, LmdbQueueStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LmdbQueueStore::open(dir.path(), 16 * 1024 * 1024).expect("open store");
        (dir, store)
    }

    fn put(store: &LmdbQueueStore, payload: &[u8]) -> TxHash {
        store.put(payload, &RawCacheAdapter::default()).unwrap().1
    }

    #[test]
    fn put_then_get_is_pending() {
        let (_dir, store) = temp_store();
        let hash = put(&store, b"signed-a");
        let record = store.get(&hash).unwrap();
        assert_eq!(record.payload, b"signed-a");
        assert_eq!(record.state(), Some(Status::Pending));
        assert_eq!(record.seq, 0);
    }

    #[test]
    fn duplicate_put_rejected() {
        let (_dir, store) = temp_store();
        put(&store, b"signed-a");
        assert!(matches!(
            store.put(b"signed-a", &RawCacheAdapter::default()),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn dispatch_failure_is_listed_as_failed() {
        let (_dir, store) = temp_store();
        let hash = put(&store, b"signed-a");
        store.enqueue(&hash).unwrap();
        store.send_start(&hash).unwrap();
        store.fail(&hash).unwrap();
        assert_eq!(store.failed().unwrap(), vec![hash]);
        assert!(store.pending().unwrap().is_empty());
    }

    #[test]
    fn rejected_transition_is_rolled_back() {
        let (_dir, store) = temp_store();
        let hash = put(&store, b"signed-a");
        assert!(store.send_end(&hash).is_err());
        assert_eq!(store.get(&hash).unwrap().state(), Some(Status::Pending));
    }

    #[test]
    fn purge_removes_from_sequence() {
        let (_dir, store) = temp_store();
        let a = put(&store, b"signed-a");
        let b = put(&store, b"signed-b");
        store.enqueue(&a).unwrap();
        store.enqueue(&b).unwrap();
        store.send_start(&a).unwrap();
        store.send_end(&a).unwrap();
        let tx = ObservedTx::new(a, 0, true);
        store.finalize(&a, BlockRef::new(9), &tx, false).unwrap();
        assert!(store.purge(&a).unwrap());
        assert!(!store.purge(&a).unwrap());
        assert_eq!(store.upcoming(0).unwrap(), vec![b]);
        assert!(!store.exists(&a).unwrap());
    }

    #[test]
    fn missing_directory_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let err = LmdbQueueStore::open(&dir.path().join("later"), 1 << 20)
            .err()
            .unwrap();
        assert!(err.is_transient());
    }
}
