//! Parsers for the configuration files a server installation carries:
//! the BattlEye RCon config, the server's `serverDZ.cfg` and a mod's
//! `meta.cpp`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{ConfigError, BATTLEYE_GLOB_PREFIX, BATTLEYE_GLOB_SUFFIX};

pub const DEFAULT_RCON_IP: &str = "127.0.0.1";
pub const DEFAULT_RCON_PORT: u16 = 2302;

/// RCon settings from `battleye/BEServer_x64*.cfg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattlEyeConfig {
    pub password: String,
    pub ip: String,
    pub port: u16,
    pub restrict_rcon: bool,
}

impl BattlEyeConfig {
    /// Parses `Key value` lines; `#` starts a comment line.
    pub fn parse(text: &str, file: &Path) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once(char::is_whitespace) {
                values.insert(key, value.trim());
            }
        }

        let password = values
            .get("RConPassword")
            .ok_or_else(|| ConfigError::MissingKey {
                file: file.to_path_buf(),
                key: "RConPassword".to_string(),
            })?
            .to_string();

        let port = match values.get("RConPort") {
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RConPort".to_string(),
                value: port.to_string(),
            })?,
            None => DEFAULT_RCON_PORT,
        };

        let restrict_rcon = match values.get("RestrictRCon") {
            Some(&"0") | None => false,
            Some(&"1") => true,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "RestrictRCon".to_string(),
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            password,
            ip: values
                .get("RConIP")
                .map_or(DEFAULT_RCON_IP, |ip| *ip)
                .to_string(),
            port,
            restrict_rcon,
        })
    }

    pub fn from_file(file: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(file).map_err(|e| ConfigError::io(file, e))?;
        Self::parse(&text, file)
    }
}

/// First regular file in `dir` named `BEServer_x64*.cfg`, by name.
pub fn find_battleye_config(dir: &Path) -> Result<PathBuf, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::io(dir, e))?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    name.starts_with(BATTLEYE_GLOB_PREFIX) && name.ends_with(BATTLEYE_GLOB_SUFFIX)
                })
        })
        .collect();
    candidates.sort();

    candidates.into_iter().next().ok_or_else(|| {
        ConfigError::NotFound(format!(
            "{}/{}*{}",
            dir.display(),
            BATTLEYE_GLOB_PREFIX,
            BATTLEYE_GLOB_SUFFIX
        ))
    })
}

/// `key = value;` settings from `serverDZ.cfg`.
///
/// Only top-level scalar settings are kept; class blocks and lines without a
/// terminating semicolon are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSettings {
    values: HashMap<String, String>,
}

impl ServerSettings {
    pub fn parse(text: &str) -> Self {
        let mut values = HashMap::new();

        for line in text.lines().map(str::trim) {
            let Some((key, rest)) = line.split_once('=') else {
                continue;
            };
            let Some((value, _)) = rest.split_once(';') else {
                continue;
            };

            let key = key.trim();
            if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
                continue;
            }

            values.insert(key.to_string(), value.trim().trim_matches('"').to_string());
        }

        Self { values }
    }

    pub fn from_file(file: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(file).map_err(|e| ConfigError::io(file, e))?;
        Ok(Self::parse(&text))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_u32(&self, key: &str) -> Result<u32, ConfigError> {
        let value = self
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(format!("setting {}", key)))?;

        value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Player slot count, which bounds the kick sweep.
    pub fn max_players(&self) -> Result<u32, ConfigError> {
        self.get_u32("maxPlayers")
    }
}

/// Metadata the package manager writes to each mod's `meta.cpp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModMetadata {
    pub protocol: u32,
    pub published_id: u64,
    pub name: String,
    /// Raw timestamp as written by the workshop client.
    pub timestamp: i64,
}

impl ModMetadata {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();

        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if let Some((key, value)) = line.split_once(" = ") {
                values.insert(key.trim(), value.trim().trim_end_matches(';'));
            }
        }

        let get = |key: &str| {
            values
                .get(key)
                .copied()
                .ok_or_else(|| ConfigError::NotFound(format!("meta.cpp key {}", key)))
        };
        let invalid = |key: &str, value: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        let protocol = get("protocol")?;
        let published_id = get("publishedid")?;
        let timestamp = get("timestamp")?;

        Ok(Self {
            protocol: protocol.parse().map_err(|_| invalid("protocol", protocol))?,
            published_id: published_id
                .parse()
                .map_err(|_| invalid("publishedid", published_id))?,
            name: get("name")?.trim_matches('"').to_string(),
            timestamp: timestamp.parse().map_err(|_| invalid("timestamp", timestamp))?,
        })
    }

    pub fn from_file(file: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(file).map_err(|e| ConfigError::io(file, e))?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATTLEYE_CFG: &str = "\
# RCon settings
RConPassword s3cr3t
RestrictRCon 0
RConPort 2306
";

    const SERVER_CFG: &str = r#"
hostname = "My Server";     // Server name
password = "";
maxPlayers = 60;            // Maximum amount of players
instanceId = 1;
disable3rdPerson=0;
class Missions
{
    class DayZ
    {
        template="dayzOffline.chernarusplus";
    };
};
"#;

    const META_CPP: &str = r#"
protocol = 1;
publishedid = 1559212036;
name = "Community Framework";
timestamp = 5249639553286209331;
"#;

    #[test]
    fn test_battleye_config() {
        let config = BattlEyeConfig::parse(BATTLEYE_CFG, Path::new("BEServer_x64.cfg")).unwrap();
        assert_eq!(config.password, "s3cr3t");
        assert_eq!(config.port, 2306);
        assert_eq!(config.ip, DEFAULT_RCON_IP);
        assert!(!config.restrict_rcon);
    }

    #[test]
    fn test_battleye_config_requires_password() {
        let result = BattlEyeConfig::parse("RConPort 2306\n", Path::new("BEServer_x64.cfg"));
        assert!(matches!(result, Err(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn test_battleye_config_invalid_port() {
        let result = BattlEyeConfig::parse(
            "RConPassword x\nRConPort high\n",
            Path::new("BEServer_x64.cfg"),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_find_battleye_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("BEServer_x64_0.cfg")).unwrap();
        std::fs::write(dir.path().join("BEServer_x64_active_6a3f.cfg"), BATTLEYE_CFG).unwrap();
        std::fs::write(dir.path().join("other.cfg"), "").unwrap();

        let found = find_battleye_config(dir.path()).unwrap();
        assert_eq!(
            found.file_name().unwrap().to_str().unwrap(),
            "BEServer_x64_active_6a3f.cfg"
        );
    }

    #[test]
    fn test_find_battleye_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_battleye_config(dir.path()),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_server_settings() {
        let settings = ServerSettings::parse(SERVER_CFG);
        assert_eq!(settings.max_players().unwrap(), 60);
        assert_eq!(settings.get("hostname"), Some("My Server"));
        assert_eq!(settings.get("disable3rdPerson"), Some("0"));
        assert_eq!(settings.get("password"), Some(""));
        assert_eq!(settings.get("template"), Some("dayzOffline.chernarusplus"));
        assert!(matches!(
            settings.get_u32("hostname"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_server_settings_missing_max_players() {
        let settings = ServerSettings::parse("hostname = \"x\";\n");
        assert!(matches!(
            settings.max_players(),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_mod_metadata() {
        let meta = ModMetadata::parse(META_CPP).unwrap();
        assert_eq!(meta.protocol, 1);
        assert_eq!(meta.published_id, 1559212036);
        assert_eq!(meta.name, "Community Framework");
        assert_eq!(meta.timestamp, 5249639553286209331);
    }

    #[test]
    fn test_mod_metadata_missing_key() {
        assert!(ModMetadata::parse("protocol = 1;\n").is_err());
    }
}
