//! Cross-process lock files.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::FsError;

/// Held while the lock file exists; dropping the guard removes it.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Take the lock `name` in `dir`, failing with [`FsError::Locked`] if
    /// another holder has it.
    pub fn acquire(dir: &Path, name: &str) -> Result<Self, FsError> {
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // The pid only helps an operator identify the holder.
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(FsError::Locked(name.to_string()))
            }
            Err(e) => Err(FsError::io(&path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

/// Remove every lock file in `dir`.
///
/// Only safe while no other process uses the store: it exists to recover
/// from locks left behind by a crashed holder.
pub fn clear_stale(dir: &Path) -> Result<usize, FsError> {
    let mut cleared = 0;
    for entry in fs::read_dir(dir).map_err(|e| FsError::io(dir, e))? {
        let entry = entry.map_err(|e| FsError::io(dir, e))?;
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => cleared += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FsError::io(&path, e)),
        }
    }
    if cleared > 0 {
        tracing::warn!(cleared, dir = %dir.display(), "cleared stale lock files");
    }
    Ok(cleared)
}
