//! State records, one JSON file per record named by its state key.

use std::fs;
use std::io;

use chaind_store::StoreError;
use chaind_types::{TxHash, TxRecord};

use crate::layout::{list_names, write_atomic, FsLayout};
use crate::FsError;

/// State key of a record: zero-padded sequence then hash, so that a sorted
/// directory listing is in allocation order.
pub fn state_key(seq: u64, hash: &TxHash) -> String {
    format!("{seq:016x}_{}", hash.to_hex())
}

/// Split a state key back into sequence and hash.
pub fn parse_state_key(key: &str) -> Option<(u64, TxHash)> {
    let (seq, hash) = key.split_once('_')?;
    let seq = u64::from_str_radix(seq, 16).ok()?;
    let hash = hash.parse().ok()?;
    Some((seq, hash))
}

pub struct FsStateStore {
    layout: FsLayout,
}

impl FsStateStore {
    pub fn new(layout: FsLayout) -> Self {
        Self { layout }
    }

    pub fn read(&self, key: &str) -> Result<TxRecord, StoreError> {
        let path = self.layout.state_dir().join(key);
        let bytes = fs::read(&path).map_err(|e| FsError::io(&path, e))?;
        let record = serde_json::from_slice(&bytes).map_err(FsError::from)?;
        Ok(record)
    }

    pub fn write(&self, key: &str, record: &TxRecord) -> Result<(), StoreError> {
        let path = self.layout.state_dir().join(key);
        let bytes = serde_json::to_vec_pretty(record).map_err(FsError::from)?;
        write_atomic(&path, &bytes)?;
        Ok(())
    }

    /// Returns whether a file was removed.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.layout.state_dir().join(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FsError::io(&path, e).into()),
        }
    }

    /// All state keys in allocation order.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(list_names(&self.layout.state_dir())?)
    }
}
