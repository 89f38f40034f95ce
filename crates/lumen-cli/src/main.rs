//! Lumen CLI - headless front end for the Lumen playback core
//!
//! Features:
//! - Source resolution (how would this item play?)
//! - HLS manifest probing
//! - Preference, history and download inspection
//! - Simulated downloads with a progress bar
//! - Scripted channel surfing through a headless player session

use clap::{Parser, Subcommand, ValueEnum};
use lumen_core::{PlayerConfig, StreamType};
use std::path::PathBuf;

mod commands;
mod headless;
mod output;

use output::OutputFormat;

/// Lumen CLI - playback core toolkit
#[derive(Parser)]
#[command(name = "lumen")]
#[command(author = "Lumen Developers")]
#[command(version)]
#[command(about = "Inspect how the Lumen player resolves and plays catalog items", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Store file for preferences, history and downloads
    #[arg(long, global = true, default_value = "lumen-store.json")]
    store: PathBuf,

    /// Player config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Stream type flag for `resolve`
#[derive(Clone, Copy, ValueEnum)]
enum StreamTypeArg {
    Video,
    M3u8,
    Embed,
    Youtube,
}

impl From<StreamTypeArg> for StreamType {
    fn from(arg: StreamTypeArg) -> Self {
        match arg {
            StreamTypeArg::Video => StreamType::Video,
            StreamTypeArg::M3u8 => StreamType::M3u8,
            StreamTypeArg::Embed => StreamType::Embed,
            StreamTypeArg::Youtube => StreamType::Youtube,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a source URL or iframe snippet
    Resolve {
        /// URL or `<iframe ...>` snippet
        source: String,

        /// Explicit channel stream type
        #[arg(short, long, value_enum)]
        stream_type: Option<StreamTypeArg>,

        /// Pretend no segmented-loading engine is available
        #[arg(long)]
        no_engine: bool,
    },

    /// Fetch an HLS manifest and report levels and duration
    Probe {
        /// Manifest URL
        manifest: String,

        /// Request timeout in seconds
        #[arg(short, long, default_value = "15")]
        timeout: u64,
    },

    /// Show or change stored preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// List watch history, most recent first
    History {
        /// Clear the history instead
        #[arg(long)]
        clear: bool,
    },

    /// Run a simulated download
    Download {
        /// Content id
        id: String,
    },

    /// List finished downloads
    Downloads {
        /// Remove this id from the list
        #[arg(long)]
        remove: Option<String>,
    },

    /// Walk a channel list through a headless player session
    Channels {
        /// JSON file with an array of channels
        list: PathBuf,

        /// Channel id to start on (defaults to the first)
        #[arg(short, long)]
        start: Option<String>,

        /// Comma separated keys or steps: next, prev, ArrowUp, PageDown, ...
        #[arg(long, value_delimiter = ',', default_value = "next")]
        steps: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Print the stored preference record
    Show,

    /// Update preferences
    Set {
        /// Playback rate
        #[arg(short, long)]
        rate: Option<f64>,

        /// Subtitle language code, or "off"
        #[arg(short, long)]
        subtitles: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    lumen_core::init();

    let config = match &cli.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };

    match cli.command {
        Commands::Resolve {
            source,
            stream_type,
            no_engine,
        } => {
            commands::resolve(&source, stream_type.map(Into::into), no_engine, cli.format)?;
        }
        Commands::Probe { manifest, timeout } => {
            commands::probe(&manifest, timeout, cli.format).await?;
        }
        Commands::Prefs { action } => match action {
            PrefsAction::Show => commands::prefs_show(&cli.store, &config, cli.format)?,
            PrefsAction::Set { rate, subtitles } => {
                commands::prefs_set(&cli.store, &config, rate, subtitles, cli.format)?
            }
        },
        Commands::History { clear } => {
            commands::history(&cli.store, &config, clear, cli.format)?;
        }
        Commands::Download { id } => {
            commands::download(&cli.store, &config, &id, cli.format).await?;
        }
        Commands::Downloads { remove } => {
            commands::downloads(&cli.store, &config, remove.as_deref(), cli.format)?;
        }
        Commands::Channels { list, start, steps } => {
            commands::channels(&cli.store, config, &list, start.as_deref(), &steps, cli.format)?;
        }
    }

    Ok(())
}
