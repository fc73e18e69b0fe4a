use clap::Parser;
use log::error;
use manager::actions::{self, Exit};
use manager::cli::Args;
use manager::sync::SystemRunner;
use std::process::ExitCode;

/// Main-method of the utility.
/// Parses the command line, loads the selected server and runs the requested actions.
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
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

    actions::run(&server, &args, SystemRunner).await.into()
}
