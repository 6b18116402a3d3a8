use std::io;
use std::path::Path;

use chaind_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("locked: {0}")]
    Locked(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt store entry: {0}")]
    Corrupt(String),
}

impl FsError {
    /// Attach the path to an IO error, keeping not-found distinguishable.
    pub fn io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.display().to_string()),
            _ => Self::Io {
                path: path.display().to_string(),
                source,
            },
        }
    }
}

impl From<serde_json::Error> for FsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<FsError> for StoreError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(what) => StoreError::NotFound(what),
            FsError::Locked(what) => StoreError::Locked(what),
            FsError::Serialization(msg) => StoreError::Serialization(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
