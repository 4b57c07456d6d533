//! Ticket Ledger CLI - headless sync and checkpoint management.
//!
//! # Usage
//!
//! ```bash
//! # Run the resumable sync in the foreground
//! tl-cli sync
//!
//! # Save up to 50 fulfilled orders as JSON
//! tl-cli export --limit 50 --output orders.json
//!
//! # Inspect or rewind the checkpoint
//! tl-cli checkpoint show
//! tl-cli checkpoint reset --offset 0
//! ```
//!
//! # Commands
//!
//! - `sync` - Sync every remaining page from the checkpoint
//! - `export` - Export fulfilled orders without touching the sheet
//! - `checkpoint show` / `checkpoint reset` - Manage the resume checkpoint

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tl-cli")]
#[command(author, version, about = "Ticket Ledger CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync fulfilled orders into the sheet, resuming from the checkpoint
    Sync,
    /// Export fulfilled orders to a JSON file
    Export {
        /// Maximum number of orders to export
        #[arg(short, long, default_value_t = 99)]
        limit: usize,

        /// Output file (defaults to `SYNC_EXPORT_PATH`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage the resume checkpoint
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,

        /// Checkpoint file (defaults to `SYNC_CHECKPOINT_PATH`)
        #[arg(short, long, global = true)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// Print the saved checkpoint
    Show,
    /// Overwrite the checkpoint, discarding in-flight progress
    Reset {
        /// Offset of the next page to sync
        #[arg(short, long, default_value_t = 0)]
        offset: u32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Sync => commands::sync::run().await?,
        Commands::Export { limit, output } => {
            commands::sync::export(limit, output).await?;
        }
        Commands::Checkpoint { action, path } => {
            let path = commands::checkpoint::resolve_path(path);
            match action {
                CheckpointAction::Show => commands::checkpoint::show(&path).await?,
                CheckpointAction::Reset { offset } => {
                    commands::checkpoint::reset(&path, offset).await?;
                }
            }
        }
    }
    Ok(())
}
