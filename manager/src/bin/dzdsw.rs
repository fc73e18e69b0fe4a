use clap::Parser;
use log::{error, info, LevelFilter};
use manager::actions::{self, Exit};
use manager::launch::launch;
use manager::sync::SystemRunner;
use shared::SERVERS_FILE;
use std::path::PathBuf;
use std::process::ExitCode;

/// Start a DayZ dedicated server and wait for it to exit.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server to start
    server: String,

    /// Servers JSON file
    #[arg(short = 'f', long, default_value = SERVERS_FILE, value_name = "FILE")]
    servers_file: PathBuf,

    /// Show debug messages
    #[arg(short, long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.debug { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_env("RUST_LOG")
        .init();

    let server = match shared::load_servers(&args.servers_file)
        .and_then(|servers| actions::select_server(servers, &args.server))
    {
        Ok(server) => server,
        Err(e) => {
            error!("No such server {}: {}", args.server, e);
            return Exit::NoSuchServer.into();
        }
    };

    match launch(&server, &SystemRunner) {
        Ok(status) => {
            info!("Server {} exited with {}", server.name, status);
            // Signal terminations carry no code.
            status.code().map_or(ExitCode::FAILURE, |code| ExitCode::from(code as u8))
        }
        Err(e) => {
            error!("Could not start server {}: {}", server.name, e);
            ExitCode::FAILURE
        }
    }
}
