//! LMDB storage backend for chaind.
//!
//! Implements [`QueueStore`](chaind_store::QueueStore) using the `heed` LMDB
//! bindings. Every operation runs in a single LMDB transaction, so records
//! are never observed half-written and writers never see lock contention.

pub mod environment;
pub mod error;
pub mod migration;
pub mod queue;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use queue::{LmdbQueueStore, DEFAULT_MAP_SIZE};
