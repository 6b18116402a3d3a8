use chaind_types::StatusBits;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The key or one of its backing files is missing. Also raised while a
    /// concurrent writer is mid-way through replacing a record.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The record is locked by another process.
    #[error("state locked: {0}")]
    Locked(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Stored status bits do not name a known state.
    #[error("invalid state {bits:?} for {key}")]
    InvalidState { key: String, bits: StatusBits },

    /// The requested operation is not allowed from the record's state.
    #[error("cannot {op} {key} from {from:?}")]
    Transition {
        key: String,
        op: &'static str,
        from: StatusBits,
    },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Errors caused by benign concurrent access that resolve on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Locked(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
