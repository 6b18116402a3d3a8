//! Index and counter seams used by backends that split record storage.

use chaind_types::TxHash;

use crate::StoreError;

/// Maps a transaction hash to the key its state record is stored under.
pub trait IndexStore {
    fn put_index(&self, hash: &TxHash, state_key: &str) -> Result<(), StoreError>;

    fn get_index(&self, hash: &TxHash) -> Result<String, StoreError>;

    fn has_index(&self, hash: &TxHash) -> Result<bool, StoreError>;

    /// Returns whether an entry was removed.
    fn delete_index(&self, hash: &TxHash) -> Result<bool, StoreError>;
}

/// Monotonic sequence allocator.
pub trait CounterStore {
    /// Allocate and return the next value. The first value is 0.
    fn next(&self) -> Result<u64, StoreError>;

    /// The value the next call to [`CounterStore::next`] will return.
    fn peek(&self) -> Result<u64, StoreError>;
}
