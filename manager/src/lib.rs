//! # Server Management Library
//!
//! This library implements the maintenance actions of the `dzdsu` utility for
//! DayZ dedicated server installations described in a servers file.
//!
//! ## Core Responsibilities
//!
//! ### Content Synchronization
//! Updates the server binaries and workshop mods by running SteamCMD once per
//! item. A failed mod does not stop the batch; failures are collected and
//! reported together.
//!
//! ### Path and Key Reconciliation
//! Links mixed case mod directories and `*.pbo` files to the lower case names
//! the server looks up, and copies each mod's `*.bikey` files into the
//! server's key directory.
//!
//! ### Mission Archiving
//! Backs up mission directories to gzip compressed tar archives and wipes
//! their persistent storage.
//!
//! ### Launching
//! Starts the server process, refusing while an update holds the lock file
//! and recording the hashes of the files being run.
//!
//! ### Mod Packs
//! Bundles the `@` mod directories of a game client into one archive and
//! unpacks it on a server host, skipping archives installed before.
//!
//! ### Graceful Shutdown
//! Uses the `rcon` crate to count down, kick every player slot and stop the
//! server. Only failing to reach the server or to deliver the final command is
//! treated as an error.
//!
//! ## Module Organization
//!
//! - `actions`: dispatch of the command line actions and exit statuses
//! - `cli`: command line definition
//! - `hashes`: checksum manifest used to detect pending restarts
//! - `installation`: mods present on disk
//! - `launch`: starting the server process
//! - `listing`: terminal output of mod lists
//! - `lockfile`: update lock guard
//! - `mission`: mission backup and wipe
//! - `modpack`: client mod archives
//! - `reconcile`: lower case links and key installation
//! - `shutdown`: graceful shutdown flow
//! - `sync`: SteamCMD invocation
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use manager::sync::Synchronizer;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let servers = shared::load_servers(Path::new("/etc/dzservers.json"))?;
//!     let server = &servers["chernarus"];
//!
//!     let synchronizer = Synchronizer::new("steam_user");
//!     synchronizer.sync_server(server)?;
//!     synchronizer.sync_mods(server, server.enabled_mods())?;
//!
//!     manager::reconcile::fix_all_paths(server)?;
//!     manager::reconcile::install_keys(server, false)?;
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod cli;
pub mod error;
pub mod hashes;
pub mod installation;
pub mod launch;
pub mod listing;
pub mod lockfile;
pub mod mission;
pub mod modpack;
pub mod reconcile;
pub mod shutdown;
pub mod sync;
pub mod utils;

pub use error::{
    FailedModUpdates, LaunchError, ManifestError, MissionError, PackError, ShutdownError,
    SyncError,
};
pub use hashes::{hash_changed, Hashes};
pub use installation::InstalledMod;
pub use launch::launch;
pub use lockfile::UpdateLock;
pub use mission::Mission;
pub use sync::{CommandRunner, Synchronizer, SystemRunner};
