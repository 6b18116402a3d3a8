//! Cache adapter and cache observer seams.

use chaind_types::{ChainSpec, TxHash, TxRecord};

use crate::StoreError;

/// What a cache adapter extracts from a signed payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedTx {
    pub hash: TxHash,
    pub sender: Option<String>,
    pub nonce: Option<u64>,
}

/// Decodes signed payloads for the store: derives the record key and any
/// metadata worth keeping next to the record.
pub trait CacheAdapter: Send + Sync {
    fn digest(&self, payload: &[u8]) -> Result<CachedTx, StoreError>;
}

/// Treats the payload as opaque bytes keyed by their Blake2b-256 hash.
#[derive(Clone, Debug, Default)]
pub struct RawCacheAdapter {
    chain: ChainSpec,
}

impl RawCacheAdapter {
    pub fn new(chain: ChainSpec) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &ChainSpec {
        &self.chain
    }
}

impl CacheAdapter for RawCacheAdapter {
    fn digest(&self, payload: &[u8]) -> Result<CachedTx, StoreError> {
        if payload.is_empty() {
            return Err(StoreError::Serialization(format!(
                "empty payload for {}",
                self.chain
            )));
        }
        Ok(CachedTx {
            hash: TxHash::of(payload),
            sender: None,
            nonce: None,
        })
    }
}

/// Optional secondary cache told about records entering and leaving the
/// working set.
pub trait TxCache: Send + Sync {
    fn on_put(&self, record: &TxRecord);

    fn on_final(&self, record: &TxRecord);
}
