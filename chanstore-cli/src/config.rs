//! Configuration management
//!
//! Handles storing and loading CLI configuration.
//! Config directory: ~/.chanstore/ (cross-platform)
//!
//! Config file format (~/.chanstore/config.toml):
//! ```toml
//! [discord]
//! api_url = "https://discord.com/api/v10"
//! guild_id = "123456789012345678"
//! token = "..."
//!
//! [transfer]
//! max_attempts = 10
//! retry_unit_ms = 1000
//! safety_margin = 50
//! ```

use anyhow::{Context, Result};
use chanstore_core::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_UNIT};
use chanstore_core::{RetryPolicy, TransferConfig, SAFETY_MARGIN};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Structure of ~/.chanstore/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChanstoreConfig {
    /// Discord connection settings
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Transfer tuning
    #[serde(default)]
    pub transfer: TransferSettings,
}

/// Discord connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// REST API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Guild whose text channels hold the files
    #[serde(default = "default_guild_id")]
    pub guild_id: Option<String>,

    /// Bot token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            guild_id: default_guild_id(),
            token: None,
        }
    }
}

fn default_api_url() -> String {
    std::env::var("CHANSTORE_API_URL")
        .unwrap_or_else(|_| "https://discord.com/api/v10".to_string())
}

fn default_guild_id() -> Option<String> {
    std::env::var("CHANSTORE_GUILD_ID").ok()
}

/// Transfer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Attempts per block send, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit in milliseconds
    #[serde(default = "default_retry_unit_ms")]
    pub retry_unit_ms: u64,

    /// Bytes kept free below the attachment ceiling
    #[serde(default = "default_safety_margin")]
    pub safety_margin: u64,

    /// Attachment ceiling to use instead of the guild's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attachment_size: Option<u64>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_unit_ms: default_retry_unit_ms(),
            safety_margin: default_safety_margin(),
            max_attachment_size: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_unit_ms() -> u64 {
    DEFAULT_RETRY_UNIT.as_millis() as u64
}

fn default_safety_margin() -> u64 {
    SAFETY_MARGIN
}

impl TransferSettings {
    /// Engine configuration for these settings
    pub fn engine_config(&self) -> TransferConfig {
        TransferConfig {
            retry: RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_unit_ms)),
            safety_margin: self.safety_margin,
            max_attachment_size: self.max_attachment_size,
        }
    }
}

impl ChanstoreConfig {
    /// Set a value by its dotted key
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        match key {
            "discord.api_url" => self.discord.api_url = value,
            "discord.guild_id" => self.discord.guild_id = Some(value),
            "discord.token" => self.discord.token = Some(value),
            "transfer.max_attempts" => {
                self.transfer.max_attempts = value.parse().context("Invalid attempt count")?
            }
            "transfer.retry_unit_ms" => {
                self.transfer.retry_unit_ms = value.parse().context("Invalid duration")?
            }
            "transfer.safety_margin" => {
                self.transfer.safety_margin = value.parse().context("Invalid byte count")?
            }
            "transfer.max_attachment_size" => {
                self.transfer.max_attachment_size =
                    Some(value.parse().context("Invalid byte count")?)
            }
            _ => {
                anyhow::bail!(
                    "Unknown config key: {}. Valid keys: discord.api_url, discord.guild_id, discord.token, transfer.max_attempts, transfer.retry_unit_ms, transfer.safety_margin, transfer.max_attachment_size",
                    key
                );
            }
        }
        Ok(())
    }
}

/// Get the config directory path (~/.chanstore/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let config_dir = home.join(".chanstore");

    // Create directory if it doesn't exist
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory ~/.chanstore/")?;
    }

    Ok(config_dir)
}

/// Get the config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from file
/// Falls back to defaults if file doesn't exist
pub fn load_config() -> ChanstoreConfig {
    match config_file_path() {
        Ok(path) if path.exists() => match fs::read_to_string(&path) {
            Ok(content) => parse_config(&content),
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                ChanstoreConfig::default()
            }
        },
        _ => ChanstoreConfig::default(),
    }
}

fn parse_config(content: &str) -> ChanstoreConfig {
    match toml::from_str(content) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Failed to parse config file: {}", e);
            ChanstoreConfig::default()
        }
    }
}

/// Save configuration to file
pub fn save_config(config: &ChanstoreConfig) -> Result<()> {
    let path = config_file_path()?;
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

    // the file may hold a bot token
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::write(&path, &content).context("Failed to write config file")?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(&path, content).context("Failed to write config file")?;
    }

    Ok(())
}
