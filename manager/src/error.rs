//! Error types of the maintenance actions.

use rcon::RconError;
use shared::ConfigError;
use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Failure of a mission backup or wipe.
#[derive(Debug, Error)]
pub enum MissionError {
    #[error("no such mission or directory: {}", .0.display())]
    NotFound(PathBuf),

    #[error("archive already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("invalid mission name: {0:?}")]
    Validation(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MissionError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a single package manager invocation.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("updating {item} failed with {status}")]
    Failed { item: String, status: ExitStatus },
}

/// Mods whose update failed during a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq, Error)]
#[error("failed to update mods: {}", join_ids(.failed))]
pub struct FailedModUpdates {
    pub failed: BTreeSet<u64>,
}

fn join_ids(ids: &BTreeSet<u64>) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of the graceful shutdown flow.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("cannot read server configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot establish RCon session: {0}")]
    Session(#[from] RconError),

    #[error("shutdown command failed: {0}")]
    Command(#[source] RconError),
}

/// Failure reading or writing the hash manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed hash manifest {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ManifestError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Refusal or failure to start the server process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("server is locked by {}: {reason}", path.display())]
    Locked { path: PathBuf, reason: String },

    #[error("cannot record hashes before launch: {0}")]
    Manifest(#[from] ManifestError),

    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Failure packing or installing a mod archive.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("no such directory: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PackError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
