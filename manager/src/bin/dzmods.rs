use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use manager::modpack::{self, CLIENT_MODS_DIR, HASH_CACHE, PACK_FILE};
use std::path::PathBuf;
use std::process::ExitCode;

/// Move workshop mods from a game client to a dedicated server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack the client's `@` mod directories into one archive.
    Pack {
        /// Steam base directory
        #[arg(short, long, value_name = "DIR")]
        steam_dir: Option<PathBuf>,

        /// Mods directory; overrides the one below the Steam directory
        #[arg(short, long, value_name = "DIR")]
        mods_dir: Option<PathBuf>,

        /// Output file
        #[arg(short, long, default_value = PACK_FILE, value_name = "FILE")]
        file: PathBuf,
    },

    /// Unpack a mod archive unless it was installed already.
    Install {
        /// Archive of the mods to install
        #[arg(default_value = PACK_FILE)]
        file: PathBuf,

        /// Target directory to unpack into
        #[arg(default_value = ".")]
        directory: PathBuf,

        /// Checksum of the last installed archive
        #[arg(long, default_value = HASH_CACHE, value_name = "FILE")]
        hash_cache: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose { LevelFilter::Info } else { LevelFilter::Warn })
        .parse_env("RUST_LOG")
        .init();

    let result = match cli.command {
        Commands::Pack {
            steam_dir,
            mods_dir,
            file,
        } => {
            let Some(mods_dir) = mods_dir.or_else(|| {
                steam_dir
                    .or_else(modpack::default_steam_dir)
                    .map(|steam| steam.join(CLIENT_MODS_DIR))
            }) else {
                error!("Cannot locate the Steam directory; pass --steam-dir or --mods-dir");
                return ExitCode::FAILURE;
            };

            modpack::pack_mods(&mods_dir, &file)
                .map(|count| info!("Packed {} mod(s) into {}", count, file.display()))
        }
        Commands::Install {
            file,
            directory,
            hash_cache,
        } => modpack::install_pack(&file, &directory, &hash_cache).map(|_| ()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
