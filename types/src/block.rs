//! Block references recorded when a queued transaction is observed on chain.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TxHash;

/// A 32-byte block hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHash([u8; 32]);

impl Default for BlockHash {
    fn default() -> Self {
        Self::ZERO
    }
}

impl BlockHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "\u{2026})")
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// The block a transaction was included in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub number: u64,
    /// Zero when the observer only knows the height.
    #[serde(default)]
    pub hash: BlockHash,
}

impl BlockRef {
    pub fn new(number: u64) -> Self {
        Self {
            number,
            hash: BlockHash::ZERO,
        }
    }

    pub fn with_hash(number: u64, hash: BlockHash) -> Self {
        Self { number, hash }
    }
}

/// A transaction as seen in a block by a chain observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedTx {
    pub hash: TxHash,
    /// Position within the block.
    pub index: u32,
    /// Whether execution succeeded.
    pub success: bool,
}

impl ObservedTx {
    pub fn new(hash: TxHash, index: u32, success: bool) -> Self {
        Self {
            hash,
            index,
            success,
        }
    }
}
