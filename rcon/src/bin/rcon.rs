use clap::Parser;
use log::error;
use rcon::Session;
use std::process::ExitCode;
use std::time::Duration;

/// Run a single RCon command against a server and print the response.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RCon host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// RCon port
    #[arg(short, long, default_value = "2302")]
    port: u16,

    /// RCon password
    #[arg(short = 'P', long)]
    password: String,

    /// Response timeout in milliseconds
    #[arg(short, long, default_value = "1000")]
    timeout: u64,

    /// Command to run; an empty command only checks the login
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let timeout = Duration::from_millis(args.timeout);

    let session = match Session::connect(&args.host, args.port, &args.password, timeout).await {
        Ok(session) => session,
        Err(e) => {
            error!("Could not connect to {}:{}: {}", args.host, args.port, e);
            return ExitCode::from(2);
        }
    };

    let command = args.command.join(" ");
    let result = session.run(&command).await;
    session.close().await;

    match result {
        Ok(response) => {
            if !response.is_empty() {
                println!("{}", response);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Command failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
