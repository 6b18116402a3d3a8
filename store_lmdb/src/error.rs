use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        match e {
            heed::Error::Io(io) if io.kind() == io::ErrorKind::NotFound => {
                LmdbError::NotFound(io.to_string())
            }
            other => LmdbError::Heed(other.to_string()),
        }
    }
}

impl From<bincode::Error> for LmdbError {
    fn from(e: bincode::Error) -> Self {
        LmdbError::Serialization(e.to_string())
    }
}

impl From<LmdbError> for chaind_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::NotFound(what) => chaind_store::StoreError::NotFound(what),
            LmdbError::Serialization(msg) => chaind_store::StoreError::Serialization(msg),
            other => chaind_store::StoreError::Backend(other.to_string()),
        }
    }
}
