//! Mod packs: the `@` mod directories of a client installation bundled into
//! one archive, and their installation on a server host.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use std::env;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::PackError;
use crate::hashes::sha256_file;

pub const PACK_FILE: &str = "dayz-mods.tar.gz";
pub const HASH_CACHE: &str = ".mods.sha256.txt";

/// Workshop mods of the game client, relative to the Steam directory.
pub const CLIENT_MODS_DIR: &str = "steamapps/common/DayZ/!Workshop";

/// The Steam installation of the current user, if it can be located.
pub fn default_steam_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        env::var_os("PROGRAMFILES(X86)").map(|dir| PathBuf::from(dir).join("Steam"))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".steam"))
    }
}

/// Name of a mod directory inside the pack.
pub fn archive_name(dir_name: &str) -> String {
    dir_name.replace(' ', "_")
}

/// `@`-prefixed directories in `mods_dir`, sorted by path.
pub fn client_mods(mods_dir: &Path) -> Result<Vec<PathBuf>, PackError> {
    if !mods_dir.is_dir() {
        return Err(PackError::NotFound(mods_dir.to_path_buf()));
    }

    let read = |e| PackError::io(mods_dir, e);
    let mut mods = Vec::new();
    for entry in fs::read_dir(mods_dir).map_err(read)? {
        let path = entry.map_err(read)?.path();
        let is_mod = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('@'));

        if is_mod && path.is_dir() {
            mods.push(path);
        }
    }

    mods.sort();
    Ok(mods)
}

/// Packs every mod in `mods_dir` into `archive`, replacing an existing one.
/// Returns the number of mods packed.
pub fn pack_mods(mods_dir: &Path, archive: &Path) -> Result<usize, PackError> {
    let mods = client_mods(mods_dir)?;
    info!("Packing mods from {} into {}", mods_dir.display(), archive.display());

    let file = File::create(archive).map_err(|e| PackError::io(archive, e))?;
    if let Err(e) = write_pack(file, archive, &mods) {
        if let Err(cleanup) = fs::remove_file(archive) {
            warn!("Could not remove partial pack {}: {}", archive.display(), cleanup);
        }
        return Err(e);
    }

    Ok(mods.len())
}

fn write_pack(file: File, archive: &Path, mods: &[PathBuf]) -> Result<(), PackError> {
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for path in mods {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };

        info!("Adding mod {}", name);
        builder
            .append_dir_all(archive_name(name), path)
            .map_err(|e| PackError::io(path, e))?;
    }

    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .and_then(|mut file| file.flush())
        .map_err(|e| PackError::io(archive, e))
}

fn last_hash(hash_cache: &Path) -> Result<Option<String>, PackError> {
    match fs::read_to_string(hash_cache) {
        Ok(hash) => Ok(Some(hash.trim().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PackError::io(hash_cache, e)),
    }
}

/// Unpacks `archive` into `target_dir` unless the pack installed last had the
/// same checksum. Returns whether anything was extracted.
pub fn install_pack(archive: &Path, target_dir: &Path, hash_cache: &Path) -> Result<bool, PackError> {
    let last = last_hash(hash_cache)?;
    let current = sha256_file(archive).map_err(|e| PackError::io(archive, e))?;
    debug!("Last pack hash: {:?}, current: {}", last, current);

    if last.as_deref() == Some(current.as_str()) {
        info!("No update necessary.");
        return Ok(false);
    }

    info!("Extracting mods into {}", target_dir.display());
    let file = File::open(archive).map_err(|e| PackError::io(archive, e))?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(target_dir)
        .map_err(|e| PackError::io(target_dir, e))?;

    fs::write(hash_cache, &current).map_err(|e| PackError::io(hash_cache, e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_install(root: &Path) -> PathBuf {
        let mods = root.join("!Workshop");
        fs::create_dir_all(mods.join("@Community Framework/addons")).unwrap();
        fs::create_dir_all(mods.join("@VPPAdminTools/keys")).unwrap();
        fs::create_dir_all(mods.join("notamod")).unwrap();
        fs::write(mods.join("@Community Framework/addons/cf.pbo"), "pbo").unwrap();
        fs::write(mods.join("@VPPAdminTools/keys/vpp.bikey"), "key").unwrap();
        fs::write(mods.join("@stray_file"), "").unwrap();
        mods
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name("@Community Framework"), "@Community_Framework");
        assert_eq!(archive_name("@CF"), "@CF");
    }

    #[test]
    fn test_client_mods_only_at_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mods = client_install(dir.path());

        let names: Vec<String> = client_mods(&mods)
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["@Community Framework", "@VPPAdminTools"]);

        assert!(matches!(
            client_mods(&dir.path().join("missing")),
            Err(PackError::NotFound(_))
        ));
    }

    #[test]
    fn test_pack_and_install() {
        let dir = tempfile::tempdir().unwrap();
        let mods = client_install(dir.path());
        let archive = dir.path().join(PACK_FILE);

        assert_eq!(pack_mods(&mods, &archive).unwrap(), 2);

        let server = dir.path().join("server");
        fs::create_dir(&server).unwrap();
        let cache = server.join(HASH_CACHE);

        assert!(install_pack(&archive, &server, &cache).unwrap());
        assert_eq!(
            fs::read_to_string(server.join("@Community_Framework/addons/cf.pbo")).unwrap(),
            "pbo"
        );
        assert!(server.join("@VPPAdminTools/keys/vpp.bikey").is_file());
        assert!(!server.join("notamod").exists());
        assert_eq!(
            fs::read_to_string(&cache).unwrap(),
            sha256_file(&archive).unwrap()
        );

        // Same pack again: nothing is extracted.
        fs::remove_dir_all(server.join("@VPPAdminTools")).unwrap();
        assert!(!install_pack(&archive, &server, &cache).unwrap());
        assert!(!server.join("@VPPAdminTools").exists());
    }

    #[test]
    fn test_install_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let result = install_pack(
            &dir.path().join(PACK_FILE),
            dir.path(),
            &dir.path().join(HASH_CACHE),
        );
        assert!(matches!(result, Err(PackError::Io { .. })));
    }
}
