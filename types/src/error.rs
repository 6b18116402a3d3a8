//! Parse errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid chain spec '{spec}': {reason}")]
    InvalidChainSpec { spec: String, reason: String },

    #[error("unknown status name: {0}")]
    UnknownStatus(String),
}
