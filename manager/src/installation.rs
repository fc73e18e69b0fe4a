//! Mods present on disk under a server's workshop content directory.

use log::{debug, info};
use shared::{ConfigError, Mod, ModMetadata, ServerConfig};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A mod directory found under `<base_dir>/steamapps/workshop/content/221100`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledMod {
    /// The configured mod, or a disabled unnamed one if the server does not
    /// reference this directory.
    pub workshop_mod: Mod,
    pub base_dir: PathBuf,
}

impl InstalledMod {
    pub fn new(workshop_mod: Mod, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            workshop_mod,
            base_dir: base_dir.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.workshop_mod.id
    }

    pub fn path(&self) -> PathBuf {
        self.base_dir.join(self.workshop_mod.path())
    }

    pub fn addons(&self) -> PathBuf {
        self.base_dir.join(self.workshop_mod.addons())
    }

    pub fn keys(&self) -> PathBuf {
        self.base_dir.join(self.workshop_mod.keys())
    }

    pub fn meta_file(&self) -> PathBuf {
        self.path().join("meta.cpp")
    }

    pub fn metadata(&self) -> Result<ModMetadata, ConfigError> {
        ModMetadata::from_file(&self.meta_file())
    }

    /// `*.pbo` files in the addons directory.
    pub fn pbos(&self) -> io::Result<Vec<PathBuf>> {
        files_with_extension(&self.addons(), "pbo")
    }

    /// `*.bikey` files in the keys directory.
    pub fn bikeys(&self) -> io::Result<Vec<PathBuf>> {
        files_with_extension(&self.keys(), "bikey")
    }

    pub fn remove(&self) -> io::Result<()> {
        fs::remove_dir_all(self.path())
    }
}

/// Entries of `dir` with the given extension, sorted. A missing directory
/// yields nothing.
fn files_with_extension(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(extension) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Every numerically named directory under the server's mods directory,
/// sorted by ID.
pub fn installed_mods(server: &ServerConfig) -> io::Result<Vec<InstalledMod>> {
    let mods_dir = server.mods_dir();
    if !mods_dir.is_dir() {
        debug!("No mods directory at {}", mods_dir.display());
        return Ok(Vec::new());
    }

    let configured: HashMap<u64, &Mod> = server.all_mods().map(|m| (m.id, m)).collect();
    let mut installed = Vec::new();

    for entry in fs::read_dir(&mods_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let Some(id) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u64>().ok())
        else {
            continue;
        };

        let workshop_mod = match configured.get(&id) {
            Some(m) => (*m).clone(),
            None => Mod::new(id).disabled(),
        };
        installed.push(InstalledMod::new(workshop_mod, &server.base_dir));
    }

    installed.sort_by_key(InstalledMod::id);
    Ok(installed)
}

/// Installed mods the server references, enabled or not.
pub fn used_mods(server: &ServerConfig) -> io::Result<Vec<InstalledMod>> {
    Ok(installed_mods(server)?
        .into_iter()
        .filter(|installed| server.find_mod(installed.id()).is_some())
        .collect())
}

pub fn unused_mods(server: &ServerConfig) -> io::Result<Vec<InstalledMod>> {
    Ok(installed_mods(server)?
        .into_iter()
        .filter(|installed| server.find_mod(installed.id()).is_none())
        .collect())
}

/// Deletes every installed mod the server does not reference. Returns the
/// number of removed mods.
pub fn clean_mods(server: &ServerConfig) -> io::Result<usize> {
    let unused = unused_mods(server)?;

    for installed in &unused {
        info!("Removing unused mod: {}", installed.workshop_mod);
        installed.remove()?;
    }

    Ok(unused.len())
}
