mod commands;

use clap::{Parser, Subcommand};
use rentwatch_core::Paths;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rentwatch")]
#[command(about = "Watches a rental search page and contacts agents for new listings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base directory for config and state (default: ~/.rentwatch)
    #[arg(long, global = true)]
    home: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration status
    Status,

    /// Check for new listings periodically until interrupted
    Run,

    /// Run a single check and exit
    Once,

    /// Inspect the log of handled listings
    Seen {
        #[command(subcommand)]
        command: SeenCommands,
    },
}

#[derive(Subcommand)]
enum SeenCommands {
    /// List every handled listing
    List,
    /// Check whether a listing URL has been handled
    Check {
        /// Listing URL (absolute, or relative to the search page)
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let paths = match cli.home {
        Some(base) => Paths::with_base(base),
        None => Paths::new(),
    };

    match cli.command {
        Commands::Onboard { force } => {
            commands::onboard::run(&paths, force).await?;
        }
        Commands::Status => {
            commands::status::run(&paths).await?;
        }
        Commands::Run => {
            commands::run::run(&paths).await?;
        }
        Commands::Once => {
            commands::run::once(&paths).await?;
        }
        Commands::Seen { command } => match command {
            SeenCommands::List => {
                commands::seen::list(&paths).await?;
            }
            SeenCommands::Check { url } => {
                commands::seen::check(&paths, &url).await?;
            }
        },
    }

    Ok(())
}
