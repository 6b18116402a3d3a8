use chaind_store::StoreError;
use chaind_types::TxHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A transient store condition outlived the retry policy.
    #[error("{op} gave up after {attempts} attempts: {source}")]
    RetryExhausted {
        op: &'static str,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// The record is reserved by an in-flight dispatch.
    #[error("queue record {0} is reserved by another operation")]
    QueueLocked(TxHash),

    #[error("config error: {0}")]
    Config(String),

    #[error("unknown dispatcher '{0}'")]
    UnknownDispatcher(String),

    #[error("unknown store backend '{0}'")]
    UnknownBackend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Whether the underlying cause is a missing record, including when the
    /// miss was retried until the policy gave up.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Store(e) => e.is_not_found(),
            Self::RetryExhausted { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
