//! Chanstore CLI
//!
//! Stores files in the text channels of a Discord guild.
//!
//! # Commands
//! - `up` - Upload a file, or resume an interrupted upload
//! - `down` - Download a file
//! - `ls` - List stored files
//! - `rm` - Delete a stored file
//! - `config` - Show or edit configuration
//!
//! # Configuration
//! Config file: ~/.chanstore/config.toml

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod client;
mod commands;
mod config;
mod progress;
mod symbols;

use chanstore_core::TransferEngine;
use client::DiscordClient;
use commands::{delete, download, list, upload};

#[derive(Parser)]
#[command(name = "chanstore")]
#[command(about = "Store files in Discord channels")]
#[command(version)]
struct Cli {
    /// Discord API URL (overrides config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Guild holding the files (overrides config file)
    #[arg(long, global = true)]
    guild: Option<String>,

    /// Bot token (overrides config file)
    #[arg(long, global = true, env = "CHANSTORE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // up, down, ls and rm share the top level with config
    #[command(flatten)]
    Transfer(TransferCommands),

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

/// Commands that talk to the guild
#[derive(Subcommand)]
enum TransferCommands {
    /// Upload a file
    Up {
        /// Local file
        local: PathBuf,

        /// Remote name (defaults to the local file name)
        remote: Option<String>,

        /// Print "<total bytes> <bytes uploaded>" per block instead of a progress bar
        #[arg(short, long)]
        debug: bool,

        /// Continue an interrupted upload
        #[arg(short, long)]
        resume: bool,
    },

    /// Download a file
    Down {
        /// Remote name
        remote: String,

        /// Local path or directory (defaults to the remote name)
        local: Option<PathBuf>,

        /// Print "<total bytes> <bytes downloaded>" per block instead of a progress bar
        #[arg(short, long)]
        debug: bool,

        /// Overwrite an existing local file
        #[arg(short, long)]
        force: bool,
    },

    /// List stored files
    Ls {
        /// Show sizes
        #[arg(short, long)]
        long: bool,

        /// Human-readable sizes
        #[arg(short = 'H', long)]
        human_readable: bool,
    },

    /// Delete a stored file
    Rm {
        /// Remote name
        remote: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., discord.guild_id, transfer.max_attempts)
        key: String,
        /// Value to set
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    // config commands must work before a guild or token is configured
    let command = match cli.command {
        Commands::Config { command } => return handle_config_command(command),
        Commands::Transfer(command) => command,
    };

    // Load configuration from ~/.chanstore/config.toml
    let cfg = config::load_config();

    // CLI args override config file
    let api_url = cli.api_url.unwrap_or(cfg.discord.api_url);
    let guild = require(cli.guild.or(cfg.discord.guild_id), "guild", "discord.guild_id")?;
    let token = require(cli.token.or(cfg.discord.token), "token", "discord.token")?;

    let client = DiscordClient::new(&api_url, &guild, &token).context("Failed to create client")?;
    let engine = TransferEngine::new(&client, cfg.transfer.engine_config());

    run(command, &engine).await
}

/// Dispatch a transfer command
async fn run(command: TransferCommands, engine: &TransferEngine<'_, DiscordClient>) -> Result<()> {
    match command {
        TransferCommands::Up {
            local,
            remote,
            debug,
            resume,
        } => {
            let config = upload::UploadConfig {
                local,
                remote,
                debug,
                resume,
            };
            upload::run(engine, config).await?;
        }

        TransferCommands::Down {
            remote,
            local,
            debug,
            force,
        } => {
            let config = download::DownloadConfig {
                remote,
                local,
                debug,
                force,
            };
            download::run(engine, config).await?;
        }

        TransferCommands::Ls {
            long,
            human_readable,
        } => {
            let config = list::ListConfig {
                long_format: long,
                human_readable,
            };
            list::run(engine, config).await?;
        }

        TransferCommands::Rm { remote } => {
            delete::run(engine, delete::DeleteConfig { remote }).await?;
        }
    }

    Ok(())
}

/// Handle config subcommands
fn handle_config_command(command: Option<ConfigCommands>) -> Result<()> {
    use console::style;

    match command {
        None | Some(ConfigCommands::Show) => {
            let cfg = config::load_config();
            println!();
            println!("{}", style("Chanstore Configuration").bold().underlined());
            println!();
            println!("{}", style("[discord]").cyan());
            println!("  api_url = \"{}\"", cfg.discord.api_url);
            match &cfg.discord.guild_id {
                Some(guild) => println!("  guild_id = \"{}\"", guild),
                None => println!("  guild_id = {}", style("(not set)").yellow()),
            }
            let token = if cfg.discord.token.is_some() { "(set)" } else { "(not set)" };
            println!("  token = {}", style(token).dim());
            println!();
            println!("{}", style("[transfer]").cyan());
            println!("  max_attempts = {}", cfg.transfer.max_attempts);
            println!("  retry_unit_ms = {}", cfg.transfer.retry_unit_ms);
            println!("  safety_margin = {}", cfg.transfer.safety_margin);
            if let Some(max) = cfg.transfer.max_attachment_size {
                println!("  max_attachment_size = {}", max);
            }
            println!();

            // Show config file path
            if let Ok(path) = config::config_file_path() {
                println!("{} {}", style("Config file:").dim(), path.display());
                if !path.exists() {
                    println!(
                        "{} Run '{}' to create it",
                        style("(not created yet)").yellow(),
                        style("chanstore config init").green()
                    );
                }
            }
        }

        Some(ConfigCommands::Path) => {
            if let Ok(path) = config::config_file_path() {
                println!("{}", path.display());
            }
        }

        Some(ConfigCommands::Init { force }) => {
            let path = config::config_file_path()?;
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style(symbols::WARN).yellow(),
                    path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            config::save_config(&config::ChanstoreConfig::default())?;
            println!(
                "{} Config file created at {}",
                style(symbols::CHECK).green(),
                path.display()
            );
        }

        Some(ConfigCommands::Set { key, value }) => {
            let mut cfg = config::load_config();
            cfg.set(&key, value)?;
            config::save_config(&cfg)?;
            println!("{} Configuration updated", style(symbols::CHECK).green());
        }
    }

    Ok(())
}

/// Unwrap a required connection setting
fn require(value: Option<String>, flag: &str, key: &str) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => anyhow::bail!(
            "No {} configured. Pass --{} or run 'chanstore config set {} <value>'.",
            flag,
            flag,
            key
        ),
    }
}
