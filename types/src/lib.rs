//! Fundamental types for the chaind transaction queue.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! transaction and block hashes, queue status bits, queue records, chain specs and timestamps.

pub mod block;
pub mod chain;
pub mod error;
pub mod hash;
pub mod record;
pub mod state;
pub mod time;

pub use block::{BlockHash, BlockRef, ObservedTx};
pub use chain::ChainSpec;
pub use error::TypesError;
pub use hash::{blake2b_256, TxHash};
pub use record::TxRecord;
pub use state::{StateFilter, Status, StatusBits};
pub use time::Timestamp;
