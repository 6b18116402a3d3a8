//! Filesystem queue store for chaind.
//!
//! Layout under the store root:
//!
//! ```text
//! state/<seq:016x>_<hash>   JSON record, replaced atomically (temp file + rename)
//! index/<hash>              state key of the record, for lookups by hash
//! lock/<hash>               present while a process mutates the record
//! lock/_counter             present while a process allocates a sequence number
//! counter                   next sequence number, decimal
//! ```
//!
//! Several processes may share one root. Contention on a record surfaces as
//! [`StoreError::Locked`](chaind_store::StoreError::Locked) and a record read
//! while it is being purged surfaces as
//! [`StoreError::NotFound`](chaind_store::StoreError::NotFound); callers
//! retry both.

pub mod counter;
pub mod error;
pub mod index;
pub mod layout;
pub mod lock;
pub mod queue;
pub mod state;

pub use counter::FsCounterStore;
pub use error::FsError;
pub use index::FsIndexStore;
pub use layout::FsLayout;
pub use queue::FsQueueStore;
pub use state::FsStateStore;
