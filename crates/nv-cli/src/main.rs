//! CLI frontend for the Novella narrative engine.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "nv",
    about = "Novella: play and check visual novel content",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a content directory in the terminal
    Play {
        /// Content directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Story unit to start in (default: from novel.json, else "start")
        #[arg(long)]
        story: Option<String>,

        /// Save directory (default: <dir>/saves)
        #[arg(long)]
        saves: Option<PathBuf>,

        /// Load this save slot instead of starting a new game
        #[arg(long)]
        load: Option<u32>,
    },

    /// Validate story units, goto targets, rules and configuration
    Check {
        /// Content directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// List save slots
    Saves {
        /// Content directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Save directory (default: <dir>/saves)
        #[arg(long)]
        saves: Option<PathBuf>,
    },

    /// Delete a save slot
    Delete {
        /// Slot number
        slot: u32,

        /// Content directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Save directory (default: <dir>/saves)
        #[arg(long)]
        saves: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Play {
            dir,
            story,
            saves,
            load,
        } => commands::play::run(&dir, story.as_deref(), saves.as_deref(), load),
        Commands::Check { dir } => commands::check::run(&dir),
        Commands::Saves { dir, saves } => commands::saves::run(&dir, saves.as_deref()),
        Commands::Delete { slot, dir, saves } => {
            commands::delete::run(&dir, saves.as_deref(), slot)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

/// Log to stderr so log lines never mix with story text.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}
