use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(short, long, help = "Configuration file path (TOML or YAML)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Subcommands of the snapper binary
#[derive(Subcommand, Debug, Clone, Default, PartialEq, Eq)]
pub enum CommonCommands {
    /// Snapshot tagged volumes and purge expired snapshots (default behavior)
    #[default]
    Run,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Configuration file not found: {}", path.display());
                }
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("Snapper Configuration:");
            println!("======================");
            println!("Tag name: {}", config.snapper.tag_name);
            println!("Default retention: {}", config.snapper.retain);
            println!("Listing pause: {:?}", config.snapper.pause);
            println!("Dry run: {}", config.snapper.dry_run);
            println!("AWS region: {}", config.aws.region);
            println!("AWS max retries: {}", config.aws.max_retries);
            match &config.aws.access_key_id {
                Some(key) => println!("AWS credentials: static ({key})"),
                None => println!("AWS credentials: default provider chain"),
            }
            match &config.logging.log_to {
                Some(path) => println!("Log file: {}", path.display()),
                None => println!("Log file: stdout"),
            }
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        tracing::info!("Validating configuration...");

        config.validate().context("Invalid configuration")?;

        tracing::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle commands that don't start a run
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                println!("Configuration is valid");
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Run => Ok(false),
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
