//! Notegraph outbox - command-line access to events waiting for relays.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use publish_config_and_utils::{init_logging, Config, Paths};

/// Notegraph outbox command-line interface.
#[derive(Parser)]
#[command(name = "notegraph-outbox")]
#[command(about = "Inspect and publish events waiting in the notegraph outbox")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the config value
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (config, outbox, logs). Defaults to ~/.notegraph
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show outbox size and configured relays
    Status,
    /// List pending entries in publish order
    Pending,
    /// Remove one pending entry by logical key
    Drop {
        /// Logical key, as printed by `pending`
        key: String,
    },
    /// Publish a knowledge node through the queue and wait for delivery
    Note {
        /// Node identifier (`d` tag)
        #[arg(long)]
        id: String,
        /// Node content
        #[arg(long)]
        content: String,
        /// Seconds to wait before giving up and leaving the node in the outbox
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Replay the outbox and publish until it is empty
    Drain {
        /// Seconds to wait before giving up
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Re-send already signed events to one relay
    Republish {
        /// Target relay (ws:// or wss://)
        #[arg(long)]
        relay: String,
        /// JSON file holding an array of signed events
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match cli.command {
        Commands::Status => app::show_status(&config, &paths).await?,
        Commands::Pending => app::list_pending(&paths).await?,
        Commands::Drop { key } => app::drop_entry(&paths, &key).await?,
        Commands::Note {
            id,
            content,
            timeout,
        } => app::publish_note(&config, &paths, &id, &content, timeout).await?,
        Commands::Drain { timeout } => app::drain(&config, &paths, timeout).await?,
        Commands::Republish { relay, file } => app::republish(&config, &relay, &file).await?,
    }

    Ok(())
}
