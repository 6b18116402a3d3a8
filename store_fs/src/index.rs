//! Hash → state key index, one small file per record.

use std::fs;
use std::io;

use chaind_store::{IndexStore, StoreError};
use chaind_types::TxHash;

use crate::layout::{list_names, write_atomic, FsLayout};
use crate::FsError;

pub struct FsIndexStore {
    layout: FsLayout,
}

impl FsIndexStore {
    pub fn new(layout: FsLayout) -> Self {
        Self { layout }
    }

    /// Every indexed hash, as stored file names.
    pub fn names(&self) -> Result<Vec<String>, StoreError> {
        Ok(list_names(&self.layout.index_dir())?)
    }
}

impl IndexStore for FsIndexStore {
    fn put_index(&self, hash: &TxHash, state_key: &str) -> Result<(), StoreError> {
        let path = self.layout.index_dir().join(hash.to_hex());
        write_atomic(&path, state_key.as_bytes())?;
        Ok(())
    }

    fn get_index(&self, hash: &TxHash) -> Result<String, StoreError> {
        let path = self.layout.index_dir().join(hash.to_hex());
        let key = fs::read_to_string(&path).map_err(|e| FsError::io(&path, e))?;
        Ok(key.trim().to_string())
    }

    fn has_index(&self, hash: &TxHash) -> Result<bool, StoreError> {
        let path = self.layout.index_dir().join(hash.to_hex());
        Ok(path.exists())
    }

    fn delete_index(&self, hash: &TxHash) -> Result<bool, StoreError> {
        let path = self.layout.index_dir().join(hash.to_hex());
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FsError::io(&path, e).into()),
        }
    }
}
