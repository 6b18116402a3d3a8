//! chaind dispatch adapter.
//!
//! Keeps a durable queue of signed transactions for one chain and drives
//! each record through its lifecycle:
//!
//! ```text
//! put        → Pending
//! enqueue    → Queued
//! dispatch   → Reserved → InNetwork   (node accepted)
//!                       → SendFailed  (node rejected)
//!                       → Deferred    (node unreachable, picked up again)
//! succeed    → Success  → purged
//! fail       → Reverted → purged
//! ```
//!
//! The queue lives in a [`QueueStore`](chaind_store::QueueStore) that may be
//! shared by several processes. Transient store conditions are retried under
//! a bounded [`RetryPolicy`]. [`DispatchProcessor`] runs scheduling passes and
//! [`BlockFilter`] retires records once a block includes them.

pub mod adapter;
pub mod config;
pub mod error;
pub mod filter;
pub mod lock;
pub mod processor;
pub mod registry;
pub mod rpc;

pub use adapter::{AdapterBuilder, ChaindAdapter, FsAdapter};
pub use config::{ChaindConfig, RetryConfig};
pub use error::AdapterError;
pub use filter::{BlockFilter, SettleReport};
pub use lock::{with_retry, RetryPolicy, StoreLock};
pub use processor::{DispatchProcessor, DispatchReport};
pub use registry::{open_adapter, DispatcherKind, DynAdapter, StoreBackend};
pub use rpc::{JsonRpcDispatcher, LogDispatcher};
