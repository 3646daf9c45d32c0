//! Versereel CLI: turn recited text into short vertical clips.
//!
//! Usage:
//!   versereel fetch <N>             Retrieve and parse a collection
//!   versereel parse <HTML>          Parse a saved collection page
//!   versereel readers               List readers and their audio
//!   versereel timings <ACTION>      Edit persisted sentence timings
//!   versereel preview               Render one frame of a selection
//!   versereel export                Export a selection to video
//!   versereel check                 Check system capabilities
//!   versereel config                Show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use versereel_common::config::AppConfig;

mod commands;

use commands::shared::{SelectionArgs, StyleArgs};
use commands::timings::TimingsAction;

#[derive(Parser)]
#[command(
    name = "versereel",
    about = "Short vertical recitation clips from collection texts and timed audio",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve a collection from the text source and parse it
    Fetch {
        /// Collection number (1-8)
        collection: i64,

        /// Write the parsed collection as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a saved collection page
    Parse {
        /// Path to the saved HTML page
        html: PathBuf,

        /// Collection number the page belongs to
        #[arg(short, long)]
        collection: i64,

        /// Write the parsed collection as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List readers and which collections have audio
    Readers,

    /// Edit persisted sentence timings
    Timings {
        #[command(subcommand)]
        action: TimingsAction,
    },

    /// Render one frame of a selection to PNG
    Preview {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        style: StyleArgs,

        /// Output PNG path
        #[arg(short, long, default_value = "preview.png")]
        output: PathBuf,
    },

    /// Export a selection to an MP4 clip
    Export {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        style: StyleArgs,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check system capabilities
    Check,

    /// Show the effective configuration
    Config {
        /// Save the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    versereel_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Fetch { collection, output } => {
            commands::fetch::run(&config, collection, output).await
        }
        Commands::Parse {
            html,
            collection,
            output,
        } => commands::parse::run(html, collection, output),
        Commands::Readers => commands::readers::run(&config),
        Commands::Timings { action } => commands::timings::run(&config, action).await,
        Commands::Preview {
            selection,
            style,
            output,
        } => commands::preview::run(&config, selection, style, output).await,
        Commands::Export {
            selection,
            style,
            output,
        } => commands::export::run(&config, selection, style, output).await,
        Commands::Check => commands::check::run(&config),
        Commands::Config { write } => commands::config::run(&config, write),
    }
}
