//! Graceful shutdown over RCon: warn the players, kick them, stop the server.

use log::{debug, error, info, warn};
use rcon::{Countdown, Session};
use shared::{BattlEyeConfig, ServerConfig};
use std::time::Duration;

use crate::error::ShutdownError;

pub const KICK_REASON: &str = "Server restart.";
pub const SHUTDOWN_TEMPLATE: &str = "The server will restart in {} seconds.";
pub const UPDATE_TEMPLATE: &str = "The server will restart for an update in {} seconds.";

/// Runs the shutdown flow against the server's own BattlEye and server configs.
pub async fn shutdown(
    server: &ServerConfig,
    countdown: &Countdown,
    timeout: Duration,
) -> Result<(), ShutdownError> {
    let battleye = server.battleye_config()?;
    let max_players = server.settings()?.max_players()?;

    shutdown_with(&battleye, max_players, countdown, timeout).await
}

/// Connects, counts down, kicks every slot and issues `#shutdown`.
///
/// Only a failure to connect or to deliver the shutdown command is an error;
/// notification and kick failures are logged.
pub async fn shutdown_with(
    battleye: &BattlEyeConfig,
    max_players: u32,
    countdown: &Countdown,
    timeout: Duration,
) -> Result<(), ShutdownError> {
    debug!(
        "Connecting to RCon at {}:{} (RestrictRCon {})",
        battleye.ip, battleye.port, battleye.restrict_rcon
    );
    let session = Session::connect(&battleye.ip, battleye.port, &battleye.password, timeout).await?;

    info!("Notifying players about the shutdown");
    if !session.countdown(countdown).await {
        warn!("Could not notify all players about the shutdown");
    }

    info!("Kicking remaining players");
    let report = session.kick_all(max_players, Some(KICK_REASON)).await;
    if !report.is_complete() {
        warn!(
            "Could not kick {} of {} player slots",
            report.failed.len(),
            report.attempted
        );
    }

    info!("Stopping server");
    let result = session.shutdown().await;
    session.close().await;

    result.map(|_| ()).map_err(|e| {
        error!("Could not shut down server: {}", e);
        ShutdownError::Command(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{parse_servers, ConfigError};
    use std::fs;

    fn server(base_dir: &std::path::Path) -> ServerConfig {
        let json = format!(
            r#"{{"test": {{"basedir": {:?}}}}}"#,
            base_dir.display().to_string()
        );
        parse_servers(&json).unwrap().remove("test").unwrap()
    }

    #[tokio::test]
    async fn test_missing_battleye_config() {
        let dir = tempfile::tempdir().unwrap();
        let result = shutdown(&server(dir.path()), &Countdown::new("{}", 0), rcon::DEFAULT_TIMEOUT).await;

        assert!(matches!(result, Err(ShutdownError::Config(ConfigError::Io { .. }))));
    }

    #[tokio::test]
    async fn test_missing_max_players() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("battleye")).unwrap();
        fs::write(
            dir.path().join("battleye/BEServer_x64.cfg"),
            "RConPassword secret\nRConPort 2302\n",
        )
        .unwrap();
        fs::write(dir.path().join("serverDZ.cfg"), "hostname = \"test\";\n").unwrap();

        let result = shutdown(&server(dir.path()), &Countdown::new("{}", 0), rcon::DEFAULT_TIMEOUT).await;
        assert!(matches!(result, Err(ShutdownError::Config(ConfigError::NotFound(_)))));
    }
}
