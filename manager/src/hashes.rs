//! Checksums of the server executable and its mods, used to tell whether a
//! running server is out of date.

use log::debug;
use sha2::{Digest, Sha256};
use shared::ServerConfig;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use crate::error::ManifestError;
use crate::installation::used_mods;

/// Key of the executable's checksum in a manifest.
pub const SERVER_KEY: &str = "server";

/// Hex encoded SHA-256 checksums by key: [`SERVER_KEY`] or a mod ID.
pub type Hashes = BTreeMap<String, String>;

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// True iff a key present in both maps changed or `new` has a key `old` lacks.
///
/// Keys only present in `old` do not count: a removed mod needs no restart.
pub fn hash_changed(old: &Hashes, new: &Hashes) -> bool {
    let changed = old
        .iter()
        .any(|(key, value)| new.get(key).is_some_and(|new_value| new_value != value));

    changed || new.keys().any(|key| !old.contains_key(key))
}

/// Checksums of the executable and each used mod's `meta.cpp`.
pub fn current_hashes(server: &ServerConfig) -> Result<Hashes, ManifestError> {
    let executable = server.executable_path();
    let mut hashes = Hashes::new();

    hashes.insert(
        SERVER_KEY.to_string(),
        sha256_file(&executable).map_err(|e| ManifestError::io(&executable, e))?,
    );

    let mods_dir = server.mods_dir();
    for installed in used_mods(server).map_err(|e| ManifestError::io(&mods_dir, e))? {
        let meta = installed.meta_file();
        match sha256_file(&meta) {
            Ok(hash) => {
                hashes.insert(installed.id().to_string(), hash);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No metadata for mod {}", installed.workshop_mod);
            }
            Err(e) => return Err(ManifestError::io(&meta, e)),
        }
    }

    Ok(hashes)
}

/// The stored manifest; empty if none was stored yet.
pub fn load_hashes(server: &ServerConfig) -> Result<Hashes, ManifestError> {
    let path = server.hashes_file();

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Hashes::new()),
        Err(e) => return Err(ManifestError::io(&path, e)),
    };

    serde_json::from_str(&text).map_err(|source| ManifestError::Json { path, source })
}

/// Stores the current checksums as the manifest of the running server.
pub fn store_hashes(server: &ServerConfig) -> Result<Hashes, ManifestError> {
    let hashes = current_hashes(server)?;
    let path = server.hashes_file();

    let json = serde_json::to_string_pretty(&hashes).map_err(|source| ManifestError::Json {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(|e| ManifestError::io(&path, e))?;

    Ok(hashes)
}

/// Whether the installed files differ from those the manifest was taken of.
pub fn needs_restart(server: &ServerConfig) -> Result<bool, ManifestError> {
    Ok(hash_changed(&load_hashes(server)?, &current_hashes(server)?))
}
