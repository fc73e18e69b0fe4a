//! Backup and wipe of a server's mission state.

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::MissionError;

/// Persistent world state lives here; a wipe empties it.
pub const STORAGE_DIR: &str = "storage_1";

/// File name of a backup taken at `timestamp` (seconds since the epoch).
pub fn backup_file_name(server: &str, mission: &str, timestamp: u64) -> String {
    format!("{}-{}-{}.tar.gz", server, mission, timestamp)
}

/// A mission directory under `mpmissions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mission {
    name: String,
    path: PathBuf,
}

impl Mission {
    pub fn open(mpmissions: &Path, name: &str) -> Result<Self, MissionError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(|c: char| c == '/' || c == '\\')
        {
            return Err(MissionError::Validation(name.to_string()));
        }

        let path = mpmissions.join(name);
        if !path.is_dir() {
            return Err(MissionError::NotFound(path));
        }

        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn storage(&self) -> PathBuf {
        self.path.join(STORAGE_DIR)
    }

    /// Top-level entries of the mission directory, sorted by name.
    fn entries(&self) -> Result<Vec<PathBuf>, MissionError> {
        let read = |e| MissionError::io(&self.path, e);
        let mut entries = fs::read_dir(&self.path)
            .map_err(read)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(read)?;

        entries.sort();
        Ok(entries)
    }

    /// Writes a gzip compressed tar archive of the mission's entries.
    ///
    /// An existing archive is never touched.
    pub fn backup(&self, archive: &Path) -> Result<(), MissionError> {
        let parent = match archive.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !parent.is_dir() {
            return Err(MissionError::NotFound(parent.to_path_buf()));
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(archive)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => MissionError::AlreadyExists(archive.to_path_buf()),
                _ => MissionError::io(archive, e),
            })?;

        if let Err(e) = self.write_archive(file) {
            if let Err(cleanup) = fs::remove_file(archive) {
                warn!("Could not remove partial archive {}: {}", archive.display(), cleanup);
            }
            return Err(e);
        }

        info!("Backed up mission {} to {}", self.name, archive.display());
        Ok(())
    }

    fn write_archive(&self, file: File) -> Result<(), MissionError> {
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        for entry in self.entries()? {
            let Some(name) = entry.file_name() else {
                continue;
            };

            debug!("Archiving {}", entry.display());
            let result = if entry.is_dir() {
                builder.append_dir_all(name, &entry)
            } else {
                builder.append_path_with_name(&entry, name)
            };
            result.map_err(|e| MissionError::io(&entry, e))?;
        }

        let closed = |e| MissionError::io(&self.path, e);
        builder
            .into_inner()
            .and_then(GzEncoder::finish)
            .and_then(|mut file| file.flush())
            .map_err(closed)
    }

    /// Deletes everything below the storage directory, keeping the directory.
    /// Returns the number of top-level entries removed.
    pub fn wipe(&self) -> Result<usize, MissionError> {
        let storage = self.storage();
        if !storage.is_dir() {
            info!("Mission {} has no {} to wipe", self.name, STORAGE_DIR);
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&storage).map_err(|e| MissionError::io(&storage, e))? {
            let path = entry.map_err(|e| MissionError::io(&storage, e))?.path();

            let result = match path.symlink_metadata() {
                Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path),
                _ => fs::remove_file(&path),
            };
            result.map_err(|e| MissionError::io(&path, e))?;
            removed += 1;
        }

        info!("Wiped mission {}", self.name);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::collections::BTreeSet;

    fn mission_dir(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("storage_1/data")).unwrap();
        fs::write(dir.join("init.c"), "void main() {}").unwrap();
        fs::write(dir.join("storage_1/data/events.bin"), [1u8, 2, 3]).unwrap();
        dir
    }

    fn archive_entries(archive: &Path) -> BTreeSet<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(archive).unwrap()));
        archive
            .entries()
            .unwrap()
            .map(|entry| entry.unwrap().path().unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn test_open_validates_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["", ".", "..", "a/b", "..\\x"] {
            assert!(
                matches!(Mission::open(dir.path(), name), Err(MissionError::Validation(_))),
                "{:?} accepted",
                name
            );
        }
        assert!(matches!(
            Mission::open(dir.path(), "dayzOffline.enoch"),
            Err(MissionError::NotFound(_))
        ));
    }

    #[test]
    fn test_backup_contains_mission_entries() {
        let dir = tempfile::tempdir().unwrap();
        mission_dir(dir.path(), "dayzOffline.chernarusplus");
        let mission = Mission::open(dir.path(), "dayzOffline.chernarusplus").unwrap();

        let archive = dir.path().join("backup.tar.gz");
        mission.backup(&archive).unwrap();

        let entries = archive_entries(&archive);
        assert!(entries.contains("init.c"));
        assert!(entries.contains("storage_1/data/events.bin"));
    }

    #[test]
    fn test_backup_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        mission_dir(dir.path(), "m");
        let mission = Mission::open(dir.path(), "m").unwrap();

        let result = mission.backup(&dir.path().join("missing/backup.tar.gz"));
        assert!(matches!(result, Err(MissionError::NotFound(_))));
    }

    #[test]
    fn test_wipe_keeps_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        mission_dir(dir.path(), "m");
        fs::write(dir.path().join("m/storage_1/players.db"), "").unwrap();
        let mission = Mission::open(dir.path(), "m").unwrap();

        assert_eq!(mission.wipe().unwrap(), 2);
        assert!(mission.storage().is_dir());
        assert_eq!(fs::read_dir(mission.storage()).unwrap().count(), 0);
        assert!(mission.path().join("init.c").is_file());
    }

    #[test]
    fn test_wipe_without_storage() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("fresh")).unwrap();
        let mission = Mission::open(dir.path(), "fresh").unwrap();
        assert_eq!(mission.wipe().unwrap(), 0);
    }

    #[test]
    fn test_backup_file_name() {
        assert_eq!(
            backup_file_name("chernarus", "dayzOffline.chernarusplus", 1700000000),
            "chernarus-dayzOffline.chernarusplus-1700000000.tar.gz"
        );
    }
}
