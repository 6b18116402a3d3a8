//! Nullable infrastructure for deterministic testing.
//!
//! Inspired by the "A-frame architecture" pattern from RsNano.
//! All external collaborators (clock, queue store, dispatcher, cache) are
//! abstracted behind traits. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically, including injected failures
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod cache;
pub mod clock;
pub mod dispatcher;
pub mod store;

pub use cache::MemoryTxCache;
pub use clock::NullClock;
pub use dispatcher::NullDispatcher;
pub use store::NullQueueStore;
