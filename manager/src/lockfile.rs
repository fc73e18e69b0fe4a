//! Lock file marking a server installation as being updated.

use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const UPDATE_REASON: &str = "Server update.";

/// Marks a server as being updated for as long as the guard lives.
///
/// The file holds a single line with the reason and is removed on drop.
#[derive(Debug)]
pub struct UpdateLock {
    path: PathBuf,
}

impl UpdateLock {
    /// Creates the lock file. An existing lock is an error unless
    /// `override_existing` is set, in which case it is taken over.
    pub fn acquire(path: &Path, reason: &str, override_existing: bool) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true);
        if override_existing {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = options.open(path)?;
        writeln!(file, "{}", reason)?;
        debug!("Acquired {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not remove lock file {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".update.lck");

        {
            let lock = UpdateLock::acquire(&path, UPDATE_REASON, false).unwrap();
            assert_eq!(lock.path(), path);
            assert_eq!(fs::read_to_string(&path).unwrap().trim_end(), UPDATE_REASON);
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_existing_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".update.lck");
        fs::write(&path, "stale\n").unwrap();

        let err = UpdateLock::acquire(&path, UPDATE_REASON, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let lock = UpdateLock::acquire(&path, UPDATE_REASON, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", UPDATE_REASON));
        drop(lock);
        assert!(!path.exists());
    }
}
