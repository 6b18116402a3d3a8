//! Nullable cache: remembers what the adapter told it.

use chaind_store::TxCache;
use chaind_types::{TxHash, TxRecord};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryTxCache {
    puts: Mutex<Vec<TxHash>>,
    finals: Mutex<Vec<TxRecord>>,
}

impl MemoryTxCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn puts(&self) -> Vec<TxHash> {
        self.puts.lock().unwrap().clone()
    }

    pub fn finals(&self) -> Vec<TxRecord> {
        self.finals.lock().unwrap().clone()
    }
}

impl TxCache for MemoryTxCache {
    fn on_put(&self, record: &TxRecord) {
        self.puts.lock().unwrap().push(record.hash);
    }

    fn on_final(&self, record: &TxRecord) {
        self.finals.lock().unwrap().push(record.clone());
    }
}
