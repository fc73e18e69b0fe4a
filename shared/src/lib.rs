use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod mods;
pub mod params;
pub mod parsers;

pub use mods::{mods_str, Mod};
pub use params::ServerParams;
pub use parsers::{BattlEyeConfig, ModMetadata, ServerSettings};

pub const DAYZ_APP_ID: u32 = 221100;
pub const DAYZ_SERVER_APP_ID: u32 = 223350;
pub const CONFIG_FILE: &str = "serverDZ.cfg";
pub const MODS_BASE_DIR: &str = "steamapps/workshop/content";
pub const BATTLEYE_GLOB_PREFIX: &str = "BEServer_x64";
pub const BATTLEYE_GLOB_SUFFIX: &str = ".cfg";
pub const WORKSHOP_URL: &str = "https://steamcommunity.com/sharedfiles/filedetails/?id=";

#[cfg(windows)]
pub const SERVER_EXECUTABLE: &str = "DayZServer_x64.exe";
#[cfg(not(windows))]
pub const SERVER_EXECUTABLE: &str = "DayZServer";

#[cfg(windows)]
pub const SERVERS_FILE: &str = "C:\\Program Files\\dzsrv\\servers.json";
#[cfg(not(windows))]
pub const SERVERS_FILE: &str = "/etc/dzservers.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed servers file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid mod ID: {0}")]
    InvalidMod(i64),

    #[error("{file}: missing required key {key}")]
    MissingKey { file: PathBuf, key: String },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("not found: {0}")]
    NotFound(String),
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A configured server installation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Key of this server in the servers file.
    #[serde(skip)]
    pub name: String,
    #[serde(default = "default_app_id")]
    pub app_id: u32,
    #[serde(rename = "basedir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mods: Vec<Mod>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_mods: Vec<Mod>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub params: ServerParams,
}

fn default_app_id() -> u32 {
    DAYZ_SERVER_APP_ID
}

fn default_executable() -> PathBuf {
    PathBuf::from(SERVER_EXECUTABLE)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ServerConfig {
    /// Client and server mods, in configuration order.
    pub fn all_mods(&self) -> impl Iterator<Item = &Mod> {
        self.mods.iter().chain(self.server_mods.iter())
    }

    pub fn enabled_mods(&self) -> impl Iterator<Item = &Mod> {
        self.all_mods().filter(|m| m.enabled)
    }

    pub fn find_mod(&self, id: u64) -> Option<&Mod> {
        self.all_mods().find(|m| m.id == id)
    }

    pub fn executable_path(&self) -> PathBuf {
        if self.executable.is_absolute() {
            self.executable.clone()
        } else {
            self.base_dir.join(&self.executable)
        }
    }

    pub fn battleye_dir(&self) -> PathBuf {
        self.base_dir.join("battleye")
    }

    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join(&self.params.config_file)
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.base_dir
            .join(MODS_BASE_DIR)
            .join(DAYZ_APP_ID.to_string())
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.base_dir.join("keys")
    }

    pub fn mpmissions(&self) -> PathBuf {
        self.base_dir.join("mpmissions")
    }

    pub fn hashes_file(&self) -> PathBuf {
        self.base_dir.join(".hashes.json")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.base_dir.join(".update.lck")
    }

    /// Scratch installation updated ahead of the live one where files in use
    /// cannot be replaced.
    pub fn copy_dir(&self) -> PathBuf {
        self.base_dir.join(".update_copy")
    }

    /// The same server rooted at `base_dir`.
    pub fn with_base_dir(&self, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..self.clone()
        }
    }

    /// Arguments passed to the server executable.
    pub fn executable_args(&self) -> Vec<String> {
        let mut args = self.params.executable_args();
        args.push(format!("-BEpath={}", self.battleye_dir().display()));

        let mods = mods_str(self.mods.iter().filter(|m| m.enabled));
        if !mods.is_empty() {
            args.push(format!("-mod={}", mods));
        }

        let server_mods = mods_str(self.server_mods.iter().filter(|m| m.enabled));
        if !server_mods.is_empty() {
            args.push(format!("-serverMod={}", server_mods));
        }

        args
    }

    /// Full launch command: executable followed by its arguments.
    pub fn command(&self) -> Vec<String> {
        let mut command = vec![self.executable_path().display().to_string()];
        command.extend(self.executable_args());
        command
    }

    pub fn battleye_config(&self) -> Result<BattlEyeConfig, ConfigError> {
        let file = parsers::find_battleye_config(&self.battleye_dir())?;
        BattlEyeConfig::from_file(&file)
    }

    pub fn settings(&self) -> Result<ServerSettings, ConfigError> {
        ServerSettings::from_file(&self.config_file())
    }
}

/// Parses a servers file's contents, keyed by server name.
pub fn parse_servers(json: &str) -> Result<BTreeMap<String, ServerConfig>, ConfigError> {
    let mut servers: BTreeMap<String, ServerConfig> = serde_json::from_str(json)?;

    for (name, server) in servers.iter_mut() {
        server.name = name.clone();
    }

    Ok(servers)
}

pub fn load_servers(path: &Path) -> Result<BTreeMap<String, ServerConfig>, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    parse_servers(&json)
}
