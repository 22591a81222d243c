//! Delete Command
//!
//! Deletes a stored file and all its blocks.

use crate::symbols;
use anyhow::{Context, Result};
use chanstore_core::{Transport, TransferEngine};
use console::style;

/// Delete configuration
pub struct DeleteConfig {
    pub remote: String,
}

/// Run delete command
pub async fn run<T: Transport + ?Sized>(
    engine: &TransferEngine<'_, T>,
    config: DeleteConfig,
) -> Result<()> {
    engine
        .remove(&config.remote)
        .await
        .with_context(|| format!("Failed to delete {}", config.remote))?;

    println!("{} Deleted: {}", style(symbols::CHECK).green(), config.remote);

    Ok(())
}
