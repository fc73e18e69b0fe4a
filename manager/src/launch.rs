//! Starting the server process.
//!
//! A launch records the hashes of the files it is about to run, so a later
//! `-N` or `-T` can tell whether an update landed since.

use log::{debug, info};
use shared::ServerConfig;
use std::fs;
use std::process::ExitStatus;

use crate::error::LaunchError;
use crate::hashes;
use crate::sync::CommandRunner;

/// Runs the server in its base directory until it exits.
///
/// Refuses to start while an update holds the lock file.
pub fn launch<R: CommandRunner>(server: &ServerConfig, runner: &R) -> Result<ExitStatus, LaunchError> {
    let lock = server.lock_file();
    if lock.exists() {
        let reason = fs::read_to_string(&lock)
            .map(|reason| reason.trim().to_string())
            .unwrap_or_default();
        return Err(LaunchError::Locked { path: lock, reason });
    }

    let stored = hashes::store_hashes(server)?;
    debug!("Stored {} hash(es) for server {}", stored.len(), server.name);

    let program = server.executable_path().display().to_string();
    let args = server.executable_args();

    info!("Starting server {}", server.name);
    debug!("Executing: {} {}", program, args.join(" "));
    runner
        .run_in(&server.base_dir, &program, &args)
        .map_err(|source| LaunchError::Spawn { program, source })
}
