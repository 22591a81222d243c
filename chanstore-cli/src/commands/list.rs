//! List Command
//!
//! Lists stored files.

use crate::progress::format_bytes;
use anyhow::{Context, Result};
use chanstore_core::{RemoteFile, Transport, TransferEngine};
use console::style;

/// List configuration
pub struct ListConfig {
    pub long_format: bool,
    pub human_readable: bool,
}

/// Run list command
pub async fn run<T: Transport + ?Sized>(
    engine: &TransferEngine<'_, T>,
    config: ListConfig,
) -> Result<()> {
    let files = engine.list().await.context("Failed to list files")?;

    if files.is_empty() {
        println!("{} No files stored", style("Info:").cyan());
        return Ok(());
    }

    if !config.long_format {
        for file in &files {
            println!("{}", file.name);
        }
        return Ok(());
    }

    println!("{:>12}  {}", style("SIZE").bold(), style("NAME").bold());
    println!("{}", "-".repeat(60));

    for file in &files {
        println!(
            "{:>12}  {}",
            size_column(file, config.human_readable),
            truncate_name(&file.name, 46)
        );
    }

    let total: u64 = files.iter().filter_map(|f| f.size).sum();
    println!("{}", "-".repeat(60));
    println!(
        "{} files, {} total",
        style(files.len()).green(),
        if config.human_readable {
            format_bytes(total)
        } else {
            format!("{} bytes", total)
        }
    );

    Ok(())
}

fn size_column(file: &RemoteFile, human_readable: bool) -> String {
    match file.size {
        Some(size) if human_readable => format_bytes(size),
        Some(size) => size.to_string(),
        None => "?".to_string(),
    }
}

/// Truncate a name for display, keeping its end
fn truncate_name(name: &str, max_len: usize) -> String {
    let len = name.chars().count();
    if len <= max_len {
        name.to_string()
    } else {
        let tail: String = name.chars().skip(len - (max_len - 3)).collect();
        format!("...{}", tail)
    }
}
