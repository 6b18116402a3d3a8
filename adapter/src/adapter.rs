//! The dispatch adapter: queue lifecycle on top of a [`QueueStore`].

use std::sync::Arc;

use chaind_store::{
    CacheAdapter, DispatchError, Dispatcher, QueueStore, RawCacheAdapter, StoreError, TxCache,
};
use chaind_store_fs::FsQueueStore;
use chaind_types::{
    BlockRef, ChainSpec, ObservedTx, StateFilter, Status, StatusBits, Timestamp, TxHash, TxRecord,
};

use crate::lock::{with_retry, RetryPolicy};
use crate::AdapterError;

/// Adapter over the filesystem store.
pub type FsAdapter<D> = ChaindAdapter<FsQueueStore, D>;

/// Collects adapter settings before the store is opened.
pub struct AdapterBuilder<D> {
    chain: ChainSpec,
    dispatcher: D,
    cache_adapter: Box<dyn CacheAdapter>,
    cache: Option<Arc<dyn TxCache>>,
    retry: RetryPolicy,
    pending_retry_threshold: u64,
    error_retry_threshold: u32,
    store_sync: bool,
}

impl<D: Dispatcher> AdapterBuilder<D> {
    pub fn new(chain: ChainSpec, dispatcher: D) -> Self {
        Self {
            cache_adapter: Box::new(RawCacheAdapter::new(chain.clone())),
            chain,
            dispatcher,
            cache: None,
            retry: RetryPolicy::default(),
            pending_retry_threshold: 0,
            error_retry_threshold: 0,
            store_sync: false,
        }
    }

    pub fn cache_adapter(mut self, cache_adapter: impl CacheAdapter + 'static) -> Self {
        self.cache_adapter = Box::new(cache_adapter);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn TxCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Seconds in network after which a record is reported as stalled.
    pub fn pending_retry_threshold(mut self, secs: u64) -> Self {
        self.pending_retry_threshold = secs;
        self
    }

    /// Send attempts after which an unreachable node fails the record.
    pub fn error_retry_threshold(mut self, attempts: u32) -> Self {
        self.error_retry_threshold = attempts;
        self
    }

    /// Run store recovery when opening.
    pub fn store_sync(mut self, enabled: bool) -> Self {
        self.store_sync = enabled;
        self
    }

    /// Connect the store and finish construction.
    ///
    /// `connect` is retried while it reports a transient condition, so a
    /// store that another process is still initializing is waited for.
    pub fn open<S: QueueStore>(
        self,
        connect: impl FnMut() -> Result<S, StoreError>,
    ) -> Result<ChaindAdapter<S, D>, AdapterError> {
        let store = with_retry(&self.retry, "open", connect)?;
        if self.store_sync {
            with_retry(&self.retry, "sync", || store.sync())?;
        }
        tracing::info!(
            chain = %self.chain,
            store_sync = self.store_sync,
            "adapter ready"
        );
        Ok(ChaindAdapter {
            chain: self.chain,
            store,
            dispatcher: self.dispatcher,
            cache_adapter: self.cache_adapter,
            cache: self.cache,
            retry: self.retry,
            pending_retry_threshold: self.pending_retry_threshold,
            error_retry_threshold: self.error_retry_threshold,
        })
    }
}

/// Moves signed transactions through the queue: stores them, hands them to
/// the dispatcher in FIFO order and retires them once a block settles them.
///
/// Every operation is a single store transition. Several processes may run
/// adapters over the same store; benign races surface as transient store
/// errors and are retried under the configured [`RetryPolicy`].
pub struct ChaindAdapter<S, D> {
    chain: ChainSpec,
    store: S,
    dispatcher: D,
    cache_adapter: Box<dyn CacheAdapter>,
    cache: Option<Arc<dyn TxCache>>,
    retry: RetryPolicy,
    pending_retry_threshold: u64,
    error_retry_threshold: u32,
}

impl<S: QueueStore, D: Dispatcher> ChaindAdapter<S, D> {
    pub fn chain(&self) -> &ChainSpec {
        &self.chain
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    fn retry<T>(
        &self,
        op: &'static str,
        f: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, AdapterError> {
        with_retry(&self.retry, op, f)
    }

    /// Like [`Self::retry`], but a miss on a record that has left the working
    /// set ends the loop with `None` instead of being waited out.
    fn retry_record<T>(
        &self,
        op: &'static str,
        hash: &TxHash,
        mut f: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<Option<T>, AdapterError> {
        self.retry(op, || match f() {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => {
                if self.store.exists(hash)? {
                    Err(e)
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(e),
        })
    }

    /// Store a signed payload as a new `Pending` record.
    pub fn put(&self, payload: &[u8]) -> Result<TxHash, AdapterError> {
        let (status, hash) = self.retry("put", || {
            self.store.put(payload, self.cache_adapter.as_ref())
        })?;
        tracing::debug!(hash = %hash, status = ?status, len = payload.len(), "stored transaction");
        if let Some(cache) = &self.cache {
            if let Some(record) = self.get(&hash)? {
                cache.on_put(&record);
            }
        }
        Ok(hash)
    }

    /// Read a record. `None` when the hash is not in the working set; a
    /// record whose stored status bits are not a valid status is logged and
    /// reported as absent too.
    pub fn get(&self, hash: &TxHash) -> Result<Option<TxRecord>, AdapterError> {
        match self.retry_record("get", hash, || self.store.get(hash)) {
            Ok(record) => Ok(record),
            Err(AdapterError::Store(StoreError::InvalidState { key, bits })) => {
                tracing::error!(hash = %key, bits = ?bits, "record has invalid state");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn contains(&self, hash: &TxHash) -> Result<bool, AdapterError> {
        self.retry("exists", || self.store.exists(hash))
    }

    /// Mark a record ready to send. Queuing a queued record does nothing.
    pub fn enqueue(&self, hash: &TxHash) -> Result<(), AdapterError> {
        self.retry("enqueue", || self.store.enqueue(hash))
    }

    /// Next records to send, oldest first.
    ///
    /// With a `limit`, records already in the network count against it, and
    /// nothing is selected once they fill it. The capacity check and the
    /// selection are separate reads, so concurrent schedulers may overshoot.
    pub fn upcoming(&self, limit: usize) -> Result<Vec<TxHash>, AdapterError> {
        let mut real_limit = limit;
        if limit > 0 {
            let in_flight = self.in_flight()?;
            if in_flight >= limit {
                tracing::debug!(in_flight, limit, "in-flight capacity reached");
                return Ok(Vec::new());
            }
            real_limit = limit - in_flight;
        }
        self.retry("upcoming", || self.store.upcoming(real_limit))
    }

    /// Records created or queued but not yet sent.
    pub fn pending(&self) -> Result<Vec<TxHash>, AdapterError> {
        self.retry("pending", || self.store.pending())
    }

    pub fn deferred(&self) -> Result<Vec<TxHash>, AdapterError> {
        self.retry("deferred", || self.store.deferred())
    }

    /// Final records carrying an error bit.
    pub fn failed(&self) -> Result<Vec<TxHash>, AdapterError> {
        self.retry("failed", || self.store.failed())
    }

    /// Number of records sent and not yet settled.
    pub fn in_flight(&self) -> Result<usize, AdapterError> {
        let hashes = self.retry("in_flight", || {
            self.store.by_state(StatusBits::IN_NETWORK, StatusBits::FINAL)
        })?;
        Ok(hashes.len())
    }

    /// In-network records older than the pending retry threshold.
    pub fn stalled(&self) -> Result<Vec<TxHash>, AdapterError> {
        self.stalled_at(Timestamp::now())
    }

    pub fn stalled_at(&self, now: Timestamp) -> Result<Vec<TxHash>, AdapterError> {
        if self.pending_retry_threshold == 0 {
            return Ok(Vec::new());
        }
        let hashes = self.retry("stalled", || {
            self.store.select(StateFilter::exact(Status::InNetwork), 0)
        })?;
        let mut stalled = Vec::new();
        for hash in hashes {
            let Some(record) = self.get(&hash)? else {
                continue;
            };
            if record.updated.has_expired(self.pending_retry_threshold, now) {
                stalled.push(hash);
            }
        }
        Ok(stalled)
    }

    fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.error_retry_threshold > 0 && attempts >= self.error_retry_threshold
    }

    /// Send one record.
    ///
    /// Returns `true` when the node accepted it (the record is then
    /// `InNetwork`) and `false` when the send failed, in which case the
    /// record is failed or, if the node was unreachable, deferred.
    pub fn dispatch(&self, hash: &TxHash) -> Result<bool, AdapterError> {
        let record = self
            .retry_record("send_start", hash, || self.store.send_start(hash))?
            .ok_or_else(|| StoreError::NotFound(hash.to_string()))?;
        let wire = record.to_wire();

        match self.dispatcher.send(&wire) {
            Ok(response) => {
                self.retry("send_end", || self.store.send_end(hash))?;
                tracing::info!(
                    hash = %hash,
                    attempt = record.attempts,
                    response = %response,
                    "transaction sent"
                );
                Ok(true)
            }
            Err(DispatchError::Unavailable(reason)) if !self.attempts_exhausted(record.attempts) => {
                tracing::warn!(hash = %hash, attempt = record.attempts, reason = %reason, "node unavailable, deferring");
                self.retry("defer", || self.store.defer(hash))?;
                Ok(false)
            }
            Err(err) => {
                tracing::warn!(hash = %hash, attempt = record.attempts, error = %err, "send failed");
                self.retry("fail", || self.store.fail(hash))?;
                Ok(false)
            }
        }
    }

    /// Retire a record that landed in `block` and succeeded.
    pub fn succeed(&self, block: BlockRef, tx: &ObservedTx) -> Result<TxRecord, AdapterError> {
        self.settle(block, tx, false)
    }

    /// Retire a record that landed in `block` and reverted.
    pub fn fail(&self, block: BlockRef, tx: &ObservedTx) -> Result<TxRecord, AdapterError> {
        self.settle(block, tx, true)
    }

    fn settle(
        &self,
        block: BlockRef,
        tx: &ObservedTx,
        error: bool,
    ) -> Result<TxRecord, AdapterError> {
        let hash = &tx.hash;
        let gone = || StoreError::NotFound(hash.to_string());

        let reserved = self
            .retry_record("is_reserved", hash, || self.store.is_reserved(hash))?
            .ok_or_else(gone)?;
        if reserved {
            return Err(AdapterError::QueueLocked(*hash));
        }

        // A crash between finalize and purge leaves a final record behind.
        let current = self
            .retry_record("get", hash, || self.store.get(hash))?
            .ok_or_else(gone)?;
        let wanted = if error { Status::Reverted } else { Status::Success };
        if current.status.is_final() {
            if current.state() != Some(wanted) {
                tracing::warn!(
                    hash = %hash,
                    status = ?current.state(),
                    settled_as = wanted.as_str(),
                    "record already final with another status"
                );
            } else {
                tracing::debug!(hash = %hash, "record already final");
            }
        } else {
            match self.retry_record("finalize", hash, || {
                self.store.finalize(hash, block, tx, error)
            }) {
                Ok(Some(())) => {}
                Ok(None) => return Err(gone().into()),
                // Another process got to the record since it was read.
                Err(AdapterError::Store(StoreError::Transition { from, .. }))
                    if from.is_reserved() =>
                {
                    return Err(AdapterError::QueueLocked(*hash));
                }
                Err(AdapterError::Store(StoreError::Transition { from, .. }))
                    if from.is_final() =>
                {
                    tracing::debug!(hash = %hash, "record finalized elsewhere");
                }
                Err(e) => return Err(e),
            }
        }

        let record = self
            .retry_record("get", hash, || self.store.get(hash))?
            .ok_or_else(gone)?;
        if let Some(cache) = &self.cache {
            cache.on_final(&record);
        }
        if !self.retry("purge", || self.store.purge(hash))? {
            tracing::debug!(hash = %hash, "record purged elsewhere");
        }
        tracing::info!(
            hash = %hash,
            block = block.number,
            index = tx.index,
            status = ?record.state(),
            "transaction settled"
        );
        Ok(record)
    }

    /// Purge settled records left over by an interrupted `succeed`/`fail`.
    /// Send failures have no block and are kept. Records purged by another
    /// process after the listing are skipped.
    pub fn reap(&self) -> Result<usize, AdapterError> {
        let finals = self.retry("reap", || {
            self.store.by_state(StatusBits::FINAL, StatusBits::EMPTY)
        })?;
        let mut reaped = 0;
        for hash in finals {
            let Some(record) = self.get(&hash)? else {
                continue;
            };
            if record.block.is_some() && self.retry("purge", || self.store.purge(&hash))? {
                reaped += 1;
            }
        }
        if reaped > 0 {
            tracing::info!(reaped, "purged settled records");
        }
        Ok(reaped)
    }
}
