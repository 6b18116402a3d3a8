//! Directory layout and atomic file replacement.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::FsError;

const STATE_DIR: &str = "state";
const INDEX_DIR: &str = "index";
const LOCK_DIR: &str = "lock";
const COUNTER_FILE: &str = "counter";

/// Prefix of in-progress writes; readers skip these names.
pub const TEMP_PREFIX: &str = ".tmp-";

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug)]
pub struct FsLayout {
    root: PathBuf,
}

impl FsLayout {
    /// Use an existing store root. Fails with not-found until every
    /// directory has been created, e.g. by a concurrent [`FsLayout::create`].
    pub fn open(root: &Path) -> Result<Self, FsError> {
        let layout = Self {
            root: root.to_path_buf(),
        };
        for dir in [layout.state_dir(), layout.index_dir(), layout.lock_dir()] {
            let meta = fs::metadata(&dir).map_err(|e| FsError::io(&dir, e))?;
            if !meta.is_dir() {
                return Err(FsError::Corrupt(format!("{} is not a directory", dir.display())));
            }
        }
        Ok(layout)
    }

    /// Create the store directories if needed, then open.
    pub fn create(root: &Path) -> Result<Self, FsError> {
        for dir in [STATE_DIR, INDEX_DIR, LOCK_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| FsError::io(&path, e))?;
        }
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join(INDEX_DIR)
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.root.join(LOCK_DIR)
    }

    pub fn counter_file(&self) -> PathBuf {
        self.root.join(COUNTER_FILE)
    }
}

/// Replace `path` with `bytes` so readers see either the old or the new
/// content, never a partial write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FsError> {
    let dir = path
        .parent()
        .ok_or_else(|| FsError::Corrupt(format!("{} has no parent", path.display())))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FsError::Corrupt(format!("{} has no file name", path.display())))?;
    let tmp = dir.join(format!(
        "{TEMP_PREFIX}{name}-{}-{}",
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    {
        let mut file = fs::File::create(&tmp).map_err(|e| FsError::io(&tmp, e))?;
        file.write_all(bytes).map_err(|e| FsError::io(&tmp, e))?;
        file.sync_all().map_err(|e| FsError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| FsError::io(path, e))
}

/// Entry names of `dir`, sorted, without in-progress writes.
pub fn list_names(dir: &Path) -> Result<Vec<String>, FsError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| FsError::io(dir, e))? {
        let entry = entry.map_err(|e| FsError::io(dir, e))?;
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with(TEMP_PREFIX) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Remove leftovers of writes interrupted by a crash.
pub fn remove_temp_files(dir: &Path) -> Result<usize, FsError> {
    let mut removed = 0;
    for entry in fs::read_dir(dir).map_err(|e| FsError::io(dir, e))? {
        let entry = entry.map_err(|e| FsError::io(dir, e))?;
        let is_temp = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(TEMP_PREFIX));
        if is_temp {
            let path = entry.path();
            fs::remove_file(&path).map_err(|e| FsError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsLayout::open(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[test]
    fn create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        FsLayout::create(dir.path()).unwrap();
        let layout = FsLayout::open(dir.path()).unwrap();
        assert!(layout.state_dir().is_dir());
        assert!(layout.lock_dir().is_dir());
    }

    #[test]
    fn atomic_write_replaces_and_hides_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert_eq!(list_names(dir.path()).unwrap(), vec!["entry".to_string()]);
    }
}
