//! Steam workshop mods referenced by a server definition.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

use crate::{ConfigError, DAYZ_APP_ID, MODS_BASE_DIR, WORKSHOP_URL};

/// A workshop mod.
///
/// Servers files may still list a disabled mod as a negative ID; that legacy
/// encoding is accepted when parsing and never used internally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "ModEntry")]
pub struct Mod {
    pub id: u64,
    pub name: Option<String>,
    pub enabled: bool,
}

/// Accepted JSON shapes for a mod.
#[derive(Deserialize)]
#[serde(untagged)]
enum ModEntry {
    Id(i64),
    Detailed {
        id: i64,
        name: Option<String>,
        enabled: Option<bool>,
    },
}

impl TryFrom<ModEntry> for Mod {
    type Error = ConfigError;

    fn try_from(entry: ModEntry) -> Result<Self, Self::Error> {
        let (raw, name, enabled) = match entry {
            ModEntry::Id(id) => (id, None, None),
            ModEntry::Detailed { id, name, enabled } => (id, name, enabled),
        };

        if raw == 0 {
            return Err(ConfigError::InvalidMod(raw));
        }

        Ok(Mod {
            id: raw.unsigned_abs(),
            name,
            enabled: raw > 0 && enabled.unwrap_or(true),
        })
    }
}

impl Mod {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: None,
            enabled: true,
        }
    }

    pub fn named(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn url(&self) -> String {
        format!("{}{}", WORKSHOP_URL, self.id)
    }

    /// Mod directory relative to the server's base directory.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(MODS_BASE_DIR)
            .join(DAYZ_APP_ID.to_string())
            .join(self.id.to_string())
    }

    pub fn addons(&self) -> PathBuf {
        self.path().join("addons")
    }

    pub fn keys(&self) -> PathBuf {
        self.path().join("keys")
    }
}

impl fmt::Display for Mod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Joins the relative mod paths for the `-mod=` / `-serverMod=` arguments.
pub fn mods_str<'a>(mods: impl IntoIterator<Item = &'a Mod>) -> String {
    mods.into_iter()
        .map(|m| m.path().display().to_string())
        .collect::<Vec<_>>()
        .join(";")
}
