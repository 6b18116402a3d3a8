//! Abstract storage and collaborator traits for chaind.
//!
//! Every queue backend (filesystem, LMDB, in-memory for testing) implements
//! [`QueueStore`]. Dispatchers and cache adapters are the other external
//! collaborators of the dispatch adapter; their seams live here too so that
//! backends and test doubles depend only on this crate.

pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod index;
pub mod queue;

pub use cache::{CacheAdapter, CachedTx, RawCacheAdapter, TxCache};
pub use dispatcher::{DispatchError, Dispatcher};
pub use error::StoreError;
pub use index::{CounterStore, IndexStore};
pub use queue::QueueStore;
