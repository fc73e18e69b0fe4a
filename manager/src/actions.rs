//! Top-level dispatch of the command line actions against one server.

use log::{debug, error, info, warn};
use rcon::DEFAULT_TIMEOUT;
use shared::{ConfigError, ServerConfig};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::process::ExitCode;

use crate::cli::Args;
use crate::hashes::{self, hash_changed};
use crate::installation;
use crate::listing;
use crate::lockfile::{UpdateLock, UPDATE_REASON};
use crate::mission::{backup_file_name, Mission};
use crate::reconcile;
use crate::shutdown::{shutdown, UPDATE_TEMPLATE};
use crate::sync::{CommandRunner, Synchronizer};
use crate::utils::get_timestamp;

/// Process exit status of the utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success = 0,
    RestartNotNeeded = 1,
    NoSuchServer = 2,
    ShutdownFailed = 3,
    BackupFailed = 4,
    WipeFailed = 5,
    UpdateFailed = 6,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

/// Looks up the named server in the servers file.
pub fn select_server(
    mut servers: BTreeMap<String, ServerConfig>,
    name: &str,
) -> Result<ServerConfig, ConfigError> {
    servers
        .remove(name)
        .ok_or_else(|| ConfigError::NotFound(format!("server {}", name)))
}

/// Runs every action selected in `args` in a fixed order.
///
/// Housekeeping failures are logged; the first failure that has its own exit
/// status ends the run.
pub async fn run<R: CommandRunner>(
    server: &ServerConfig,
    args: &Args,
    runner: R,
) -> Exit {
    if args.clean_mods {
        match installation::clean_mods(server) {
            Ok(count) => info!("Removed {} unused mod(s)", count),
            Err(e) => warn!("Could not clean mods: {}", e),
        }
    }

    if let Some(user) = &args.update {
        let synchronizer = Synchronizer::with_runner(user.as_str(), runner);
        if !update(server, args, &synchronizer).await {
            return Exit::UpdateFailed;
        }
    }

    if args.fix_paths {
        match reconcile::fix_all_paths(server) {
            Ok(count) => info!("Created {} lower case link(s)", count),
            Err(e) => warn!("Could not fix mod paths: {}", e),
        }
    }

    if args.install_keys {
        match reconcile::install_keys(server, args.overwrite) {
            Ok(count) => info!("Installed {} key(s)", count),
            Err(e) => warn!("Could not install keys: {}", e),
        }
    }

    if args.list_mods {
        listing::print_mods("Mods", &server.mods);
    }

    if args.list_server_mods {
        listing::print_mods("Server mods", &server.server_mods);
    }

    if args.installed_mods {
        list_installed(server);
    }

    if args.print_command {
        println!("{}", server.command().join(" "));
    }

    if args.store_hashes {
        match hashes::store_hashes(server) {
            Ok(stored) => info!("Stored {} hash(es)", stored.len()),
            Err(e) => warn!("Could not store hashes: {}", e),
        }
    }

    if args.shutdown && !shutdown_if_needed(server, args).await {
        return Exit::ShutdownFailed;
    }

    if !args.backup.is_empty() && !backup(server, &args.backup, &args.backups_dir) {
        return Exit::BackupFailed;
    }

    if !args.wipe.is_empty() && !wipe(server, &args.wipe) {
        return Exit::WipeFailed;
    }

    if args.needs_restart && !needs_restart(server) {
        return Exit::RestartNotNeeded;
    }

    Exit::Success
}

fn list_installed(server: &ServerConfig) {
    let installed = match installation::installed_mods(server) {
        Ok(installed) => installed,
        Err(e) => {
            warn!("Could not list installed mods: {}", e);
            return;
        }
    };

    let lines = installed.iter().map(|installed| {
        let metadata = match installed.metadata() {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!("No metadata for {}: {}", installed.workshop_mod, e);
                None
            }
        };
        listing::format_installed(installed, metadata.as_ref())
    });

    for line in listing::render("Installed mods", lines) {
        println!("{}", line);
    }
}

/// Updates the server and/or its mods.
///
/// Where files in use cannot be replaced, a copy of the installation is
/// updated first and the server is shut down only if the copy differs.
pub async fn update<R: CommandRunner>(
    server: &ServerConfig,
    args: &Args,
    synchronizer: &Synchronizer<R>,
) -> bool {
    if cfg!(windows) {
        match copy_needs_update(server, args, synchronizer) {
            Some(false) => {
                info!("No update required.");
                return true;
            }
            Some(true) => {
                info!("Updates detected. Notifying users.");
                let countdown = args.countdown(UPDATE_TEMPLATE);
                if let Err(e) = shutdown(server, &countdown, DEFAULT_TIMEOUT).await {
                    warn!("Could not shut down server prior to update: {}", e);
                }
            }
            None => return false,
        }
    }

    if !sync(server, args, synchronizer) {
        return false;
    }

    match hashes::needs_restart(server) {
        Ok(true) => info!("Update applied, server restart required."),
        Ok(false) => info!("No update required."),
        Err(e) => warn!("Could not compare hashes: {}", e),
    }

    true
}

/// Updates the copy in [`ServerConfig::copy_dir`] and compares it with the
/// installed server. `None` if the copy could not be updated or hashed.
pub fn copy_needs_update<R: CommandRunner>(
    server: &ServerConfig,
    args: &Args,
    synchronizer: &Synchronizer<R>,
) -> Option<bool> {
    let copy_dir = server.copy_dir();
    if let Err(e) = fs::create_dir_all(&copy_dir) {
        error!("Could not create {}: {}", copy_dir.display(), e);
        return None;
    }

    let copy = server.with_base_dir(copy_dir);
    if !sync(&copy, args, synchronizer) {
        return None;
    }

    match (hashes::current_hashes(server), hashes::current_hashes(&copy)) {
        (Ok(installed), Ok(updated)) => Some(hash_changed(&installed, &updated)),
        (Err(e), _) | (_, Err(e)) => {
            error!("Could not compare server with its update copy: {}", e);
            None
        }
    }
}

/// Runs the selected syncs under the update lock.
fn sync<R: CommandRunner>(
    server: &ServerConfig,
    args: &Args,
    synchronizer: &Synchronizer<R>,
) -> bool {
    let (update_server, update_mods) = args.update_targets();

    let _lock = match UpdateLock::acquire(&server.lock_file(), UPDATE_REASON, true) {
        Ok(lock) => lock,
        Err(e) => {
            error!("Could not create lock file: {}", e);
            return false;
        }
    };

    let mut success = true;

    if update_server {
        if let Err(e) = synchronizer.sync_server(server) {
            error!("{}", e);
            success = false;
        }
    }

    if update_mods {
        if let Err(e) = synchronizer.sync_mods(server, server.enabled_mods()) {
            error!("{}", e);
            success = false;
        }
    }

    success
}

async fn shutdown_if_needed(server: &ServerConfig, args: &Args) -> bool {
    if !args.force && !needs_restart(server) {
        info!("No restart required.");
        return true;
    }

    match shutdown(server, &args.shutdown_countdown(), DEFAULT_TIMEOUT).await {
        Ok(()) => true,
        Err(e) => {
            error!("Could not shut down server {}: {}", server.name, e);
            false
        }
    }
}

fn needs_restart(server: &ServerConfig) -> bool {
    match hashes::needs_restart(server) {
        Ok(needed) => needed,
        Err(e) => {
            error!("Could not determine whether a restart is needed: {}", e);
            false
        }
    }
}

/// Backs up each mission. Returns false if any backup failed.
pub fn backup(server: &ServerConfig, missions: &[String], backups_dir: &Path) -> bool {
    let timestamp = get_timestamp();
    let mut success = true;

    for name in missions.iter().collect::<BTreeSet<_>>() {
        let archive = backups_dir.join(backup_file_name(&server.name, name, timestamp));

        let result = Mission::open(&server.mpmissions(), name)
            .and_then(|mission| mission.backup(&archive));
        if let Err(e) = result {
            error!("Could not back up mission {}: {}", name, e);
            success = false;
        }
    }

    success
}

/// Wipes each mission. Returns false if any wipe failed.
pub fn wipe(server: &ServerConfig, missions: &[String]) -> bool {
    let mut success = true;

    for name in missions.iter().collect::<BTreeSet<_>>() {
        let result = Mission::open(&server.mpmissions(), name).and_then(|mission| mission.wipe());
        if let Err(e) = result {
            error!("Could not wipe mission {}: {}", name, e);
            success = false;
        }
    }

    success
}
