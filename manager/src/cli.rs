//! Command line of the `dzdsu` utility.

use clap::Parser;
use log::LevelFilter;
use rcon::Countdown;
use shared::SERVERS_FILE;
use std::path::PathBuf;

use crate::shutdown::SHUTDOWN_TEMPLATE;

#[cfg(windows)]
pub const BACKUPS_DIR: &str = "C:\\Program Files\\dzsrv\\backups";
#[cfg(not(windows))]
pub const BACKUPS_DIR: &str = "/var/backups/dayz";

pub const DEFAULT_COUNTDOWN: u32 = 120;

/// DayZ dedicated server utility.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Server to operate on
    pub server: String,

    /// Servers JSON file
    #[arg(short = 'f', long, default_value = SERVERS_FILE, value_name = "FILE")]
    pub servers_file: PathBuf,

    /// Remove unused mods
    #[arg(short = 'C', long)]
    pub clean_mods: bool,

    /// Update server and/or mods as this Steam user
    #[arg(short = 'U', long, value_name = "STEAM_USER")]
    pub update: Option<String>,

    /// Update the server
    #[arg(short = 's', long)]
    pub update_server: bool,

    /// Update the server's mods
    #[arg(short = 'm', long)]
    pub update_mods: bool,

    /// Link mod file names to lower case
    #[arg(short = 'F', long)]
    pub fix_paths: bool,

    /// Install mod keys
    #[arg(short = 'K', long)]
    pub install_keys: bool,

    /// Overwrite existing key files
    #[arg(long)]
    pub overwrite: bool,

    /// List the server's mods
    #[arg(short = 'M', long)]
    pub list_mods: bool,

    /// List the server's server mods
    #[arg(short = 'S', long)]
    pub list_server_mods: bool,

    /// List installed mods
    #[arg(short = 'I', long)]
    pub installed_mods: bool,

    /// Print the server's launch command
    #[arg(short = 'P', long)]
    pub print_command: bool,

    /// Store the current server and mod hashes
    #[arg(short = 'H', long)]
    pub store_hashes: bool,

    /// Shut the server down if it needs a restart
    #[arg(short = 'T', long)]
    pub shutdown: bool,

    /// Shut down even if no restart is needed
    #[arg(long)]
    pub force: bool,

    /// Back up missions
    #[arg(short = 'B', long, num_args = 1.., value_name = "MISSION")]
    pub backup: Vec<String>,

    /// Wipe missions
    #[arg(short = 'W', long, num_args = 1.., value_name = "MISSION")]
    pub wipe: Vec<String>,

    /// Exit with 1 unless the server needs a restart
    #[arg(short = 'N', long)]
    pub needs_restart: bool,

    /// Directory for mission backups
    #[arg(short = 'b', long, default_value = BACKUPS_DIR, value_name = "PATH")]
    pub backups_dir: PathBuf,

    /// Countdown message template; {} is replaced by the remaining seconds
    #[arg(short = 'e', long, value_name = "TEMPLATE")]
    pub message: Option<String>,

    /// Countdown length in seconds
    #[arg(short = 't', long, default_value_t = DEFAULT_COUNTDOWN, value_name = "SECONDS")]
    pub countdown: u32,

    /// Show debug messages
    #[arg(short, long, conflicts_with = "quiet")]
    pub debug: bool,

    /// Suppress info messages
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        }
    }

    /// Countdown for a shutdown, using `default_template` unless `-e` was given.
    pub fn countdown(&self, default_template: &str) -> Countdown {
        let template = self.message.as_deref().unwrap_or(default_template);
        Countdown::new(template, self.countdown)
    }

    pub fn shutdown_countdown(&self) -> Countdown {
        self.countdown(SHUTDOWN_TEMPLATE)
    }

    /// Both parts are updated if neither was selected.
    pub fn update_targets(&self) -> (bool, bool) {
        if self.update_server || self.update_mods {
            (self.update_server, self.update_mods)
        } else {
            (true, true)
        }
    }
}
