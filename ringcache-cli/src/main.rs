use anyhow::Result;
use clap::{Parser, Subcommand};
use ringcache_core::{init_logging, ConfigManager, LoggingConfig};
use std::path::PathBuf;
use tracing::{error, info};

mod commands;

use commands::*;

#[derive(Parser)]
#[command(name = "ringcache-cli")]
#[command(about = "RingCache operator CLI")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "ringcache.toml", env = "RINGCACHE_CONFIG")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate the configuration and the topology it describes
    Check,
    /// Print the ring built from the configuration
    View {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive command shell over stdin
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the config file when it is readable
    let mut logging = if cli.config.exists() {
        ConfigManager::load_config(&cli.config)
            .map(|config| config.logging.to_logging_config())
            .unwrap_or_default()
    } else {
        LoggingConfig::default()
    };
    if cli.verbose {
        logging.level = "DEBUG".to_string();
    }
    if cli.json_logs {
        logging.json_format = true;
    }
    init_logging(&logging)?;

    info!("RingCache CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Init { force } => execute_init(&cli.config, force),
        Commands::Check => execute_check(&cli.config),
        Commands::View { json } => execute_view(&cli.config, json),
        Commands::Shell => execute_shell(&cli.config).await,
    };

    match result {
        Ok(_) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            Err(e)
        }
    }
}
