//! Sequence counter stored as a decimal file.

use std::fs;
use std::io;

use chaind_store::{CounterStore, StoreError};

use crate::layout::{write_atomic, FsLayout};
use crate::lock::FileLock;
use crate::FsError;

const COUNTER_LOCK: &str = "_counter";

pub struct FsCounterStore {
    layout: FsLayout,
}

impl FsCounterStore {
    pub fn new(layout: FsLayout) -> Self {
        Self { layout }
    }

    fn read(&self) -> Result<u64, FsError> {
        let path = self.layout.counter_file();
        match fs::read_to_string(&path) {
            Ok(s) => s
                .trim()
                .parse()
                .map_err(|_| FsError::Corrupt(format!("counter holds '{}'", s.trim()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(FsError::io(&path, e)),
        }
    }

    /// Raise the counter to at least `floor`. Used when recovering from a
    /// crash that lost a counter update.
    pub fn ensure_at_least(&self, floor: u64) -> Result<(), StoreError> {
        let _lock = FileLock::acquire(&self.layout.lock_dir(), COUNTER_LOCK)?;
        if self.read()? < floor {
            write_atomic(&self.layout.counter_file(), floor.to_string().as_bytes())?;
        }
        Ok(())
    }
}

impl CounterStore for FsCounterStore {
    fn next(&self) -> Result<u64, StoreError> {
        let _lock = FileLock::acquire(&self.layout.lock_dir(), COUNTER_LOCK)?;
        let value = self.read()?;
        write_atomic(&self.layout.counter_file(), (value + 1).to_string().as_bytes())?;
        Ok(value)
    }

    fn peek(&self) -> Result<u64, StoreError> {
        Ok(self.read()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let counter = FsCounterStore::new(FsLayout::create(dir.path()).unwrap());
        assert_eq!(counter.next().unwrap(), 0);
        assert_eq!(counter.next().unwrap(), 1);
        assert_eq!(counter.peek().unwrap(), 2);
    }

    #[test]
    fn held_lock_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let layout = FsLayout::create(dir.path()).unwrap();
        let counter = FsCounterStore::new(layout.clone());
        let _held = FileLock::acquire(&layout.lock_dir(), COUNTER_LOCK).unwrap();
        let err = counter.next().unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn ensure_at_least_only_raises() {
        let dir = tempfile::tempdir().unwrap();
        let counter = FsCounterStore::new(FsLayout::create(dir.path()).unwrap());
        counter.ensure_at_least(5).unwrap();
        counter.ensure_at_least(3).unwrap();
        assert_eq!(counter.peek().unwrap(), 5);
    }
}
