//! Dispatcher seam: performs the network send of a queued transaction.

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The node answered and rejected the transaction.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node could not be reached or gave no usable answer.
    #[error("node unavailable: {0}")]
    Unavailable(String),
}

/// Sends wire-encoded transactions to the network.
pub trait Dispatcher: Send + Sync {
    /// Send one transaction; returns the node's response (usually the hash
    /// it computed).
    fn send(&self, wire: &str) -> Result<String, DispatchError>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn send(&self, wire: &str) -> Result<String, DispatchError> {
        (**self).send(wire)
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    fn send(&self, wire: &str) -> Result<String, DispatchError> {
        (**self).send(wire)
    }
}
