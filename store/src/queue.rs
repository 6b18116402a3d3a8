//! Queue store trait.

use chaind_types::{BlockRef, ObservedTx, StateFilter, StatusBits, TxHash, TxRecord};

use crate::{CacheAdapter, StoreError};

/// Durable storage for queue records keyed by transaction hash.
///
/// Implementations enforce the valid state transitions; an operation called
/// from a state that does not allow it fails with [`StoreError::Transition`]
/// and leaves the record unchanged. Nothing leaves `FINAL` except through
/// [`QueueStore::purge`].
pub trait QueueStore {
    /// Store a new `Pending` record for `payload`.
    ///
    /// The key is derived by the cache adapter. Returns the initial status
    /// and the key.
    fn put(
        &self,
        payload: &[u8],
        cache: &dyn CacheAdapter,
    ) -> Result<(StatusBits, TxHash), StoreError>;

    fn get(&self, key: &TxHash) -> Result<TxRecord, StoreError>;

    /// Whether a record for `key` is in the working set.
    fn exists(&self, key: &TxHash) -> Result<bool, StoreError>;

    /// `Pending` or `Deferred` → `Queued`. Queued records are left as is.
    fn enqueue(&self, key: &TxHash) -> Result<(), StoreError>;

    /// `Pending`, `Queued` or `Deferred` → `Reserved`. Counts an attempt and
    /// returns the updated record.
    fn send_start(&self, key: &TxHash) -> Result<TxRecord, StoreError>;

    /// `Reserved` → `InNetwork`.
    fn send_end(&self, key: &TxHash) -> Result<(), StoreError>;

    /// `Reserved` → `SendFailed`.
    fn fail(&self, key: &TxHash) -> Result<(), StoreError>;

    /// `Reserved` → `Deferred`.
    fn defer(&self, key: &TxHash) -> Result<(), StoreError>;

    /// Any non-final, non-reserved state → `Success`, or `Reverted` when
    /// `error` is set. Records the block and in-block index.
    fn finalize(
        &self,
        key: &TxHash,
        block: BlockRef,
        tx: &ObservedTx,
        error: bool,
    ) -> Result<(), StoreError>;

    /// Remove a `FINAL` record from the working set.
    ///
    /// Returns `false` if there was nothing to purge, so purging twice is a
    /// no-op.
    fn purge(&self, key: &TxHash) -> Result<bool, StoreError>;

    fn is_reserved(&self, key: &TxHash) -> Result<bool, StoreError>;

    /// Keys matching `filter` in ascending sequence order. A `limit` of 0
    /// means no limit.
    fn select(&self, filter: StateFilter, limit: usize) -> Result<Vec<TxHash>, StoreError>;

    /// Bring derived structures back in line with the records after a crash.
    fn sync(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn by_state(&self, state: StatusBits, not_state: StatusBits) -> Result<Vec<TxHash>, StoreError> {
        self.select(StateFilter::by_state(state, not_state), 0)
    }

    fn upcoming(&self, limit: usize) -> Result<Vec<TxHash>, StoreError> {
        self.select(StateFilter::upcoming(), limit)
    }

    fn pending(&self) -> Result<Vec<TxHash>, StoreError> {
        self.select(StateFilter::pending(), 0)
    }

    fn deferred(&self) -> Result<Vec<TxHash>, StoreError> {
        self.select(StateFilter::deferred(), 0)
    }

    fn failed(&self) -> Result<Vec<TxHash>, StoreError> {
        self.select(StateFilter::failed(), 0)
    }
}

impl<S: QueueStore + ?Sized> QueueStore for Box<S> {
    fn put(
        &self,
        payload: &[u8],
        cache: &dyn CacheAdapter,
    ) -> Result<(StatusBits, TxHash), StoreError> {
        (**self).put(payload, cache)
    }

    fn get(&self, key: &TxHash) -> Result<TxRecord, StoreError> {
        (**self).get(key)
    }

    fn exists(&self, key: &TxHash) -> Result<bool, StoreError> {
        (**self).exists(key)
    }

    fn enqueue(&self, key: &TxHash) -> Result<(), StoreError> {
        (**self).enqueue(key)
    }

    fn send_start(&self, key: &TxHash) -> Result<TxRecord, StoreError> {
        (**self).send_start(key)
    }

    fn send_end(&self, key: &TxHash) -> Result<(), StoreError> {
        (**self).send_end(key)
    }

    fn fail(&self, key: &TxHash) -> Result<(), StoreError> {
        (**self).fail(key)
    }

    fn defer(&self, key: &TxHash) -> Result<(), StoreError> {
        (**self).defer(key)
    }

    fn finalize(
        &self,
        key: &TxHash,
        block: BlockRef,
        tx: &ObservedTx,
        error: bool,
    ) -> Result<(), StoreError> {
        (**self).finalize(key, block, tx, error)
    }

    fn purge(&self, key: &TxHash) -> Result<bool, StoreError> {
        (**self).purge(key)
    }

    fn is_reserved(&self, key: &TxHash) -> Result<bool, StoreError> {
        (**self).is_reserved(key)
    }

    fn select(&self, filter: StateFilter, limit: usize) -> Result<Vec<TxHash>, StoreError> {
        (**self).select(filter, limit)
    }

    fn sync(&self) -> Result<(), StoreError> {
        (**self).sync()
    }
}

/// Shared transition rules, so every backend rejects the same moves.
pub mod transition {
    use chaind_types::{BlockRef, ObservedTx, Status, StatusBits, Timestamp, TxRecord};

    use crate::StoreError;

    fn reject(record: &TxRecord, op: &'static str) -> StoreError {
        StoreError::Transition {
            key: record.hash.to_string(),
            op,
            from: record.status,
        }
    }

    /// Validate the stored bits before any transition.
    pub fn checked(record: &TxRecord) -> Result<Status, StoreError> {
        record.state().ok_or_else(|| StoreError::InvalidState {
            key: record.hash.to_string(),
            bits: record.status,
        })
    }

    /// Returns `false` when the record was already queued.
    pub fn enqueue(record: &mut TxRecord, now: Timestamp) -> Result<bool, StoreError> {
        match checked(record)? {
            Status::Queued => Ok(false),
            Status::Pending | Status::Deferred => {
                record.status = StatusBits::QUEUED;
                record.updated = now;
                Ok(true)
            }
            _ => Err(reject(record, "enqueue")),
        }
    }

    pub fn send_start(record: &mut TxRecord, now: Timestamp) -> Result<(), StoreError> {
        match checked(record)? {
            Status::Pending | Status::Queued | Status::Deferred => {
                record.status = Status::Reserved.bits();
                record.attempts = record.attempts.saturating_add(1);
                record.updated = now;
                Ok(())
            }
            _ => Err(reject(record, "send_start")),
        }
    }

    fn from_reserved(
        record: &mut TxRecord,
        to: Status,
        op: &'static str,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        match checked(record)? {
            Status::Reserved => {
                record.status = to.bits();
                record.updated = now;
                Ok(())
            }
            _ => Err(reject(record, op)),
        }
    }

    pub fn send_end(record: &mut TxRecord, now: Timestamp) -> Result<(), StoreError> {
        from_reserved(record, Status::InNetwork, "send_end", now)
    }

    pub fn fail(record: &mut TxRecord, now: Timestamp) -> Result<(), StoreError> {
        from_reserved(record, Status::SendFailed, "fail", now)
    }

    pub fn defer(record: &mut TxRecord, now: Timestamp) -> Result<(), StoreError> {
        from_reserved(record, Status::Deferred, "defer", now)
    }

    pub fn finalize(
        record: &mut TxRecord,
        block: BlockRef,
        tx: &ObservedTx,
        error: bool,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        match checked(record)? {
            Status::Pending | Status::Queued | Status::InNetwork | Status::Deferred => {
                record.status = if error {
                    Status::Reverted.bits()
                } else {
                    Status::Success.bits()
                };
                record.block = Some(block);
                record.tx_index = Some(tx.index);
                record.updated = now;
                Ok(())
            }
            _ => Err(reject(record, "finalize")),
        }
    }

    pub fn purge(record: &TxRecord) -> Result<(), StoreError> {
        if checked(record)?.is_terminal() {
            Ok(())
        } else {
            Err(reject(record, "purge"))
        }
    }
}
