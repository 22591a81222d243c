//! Upload Command
//!
//! Uploads a local file, or continues an interrupted upload with `--resume`.

use crate::progress::{format_bytes, reporter};
use crate::symbols;
use anyhow::{Context, Result};
use chanstore_core::{Transport, TransferEngine, UploadRequest};
use console::style;
use std::path::PathBuf;

/// Upload configuration
pub struct UploadConfig {
    pub local: PathBuf,
    pub remote: Option<String>,
    pub debug: bool,
    pub resume: bool,
}

/// Run upload command
pub async fn run<T: Transport + ?Sized>(
    engine: &TransferEngine<'_, T>,
    config: UploadConfig,
) -> Result<()> {
    if !config.local.is_file() {
        anyhow::bail!("Not a file: {}", config.local.display());
    }

    let mut request = UploadRequest::new(&config.local);
    request.remote = config.remote;
    request.resume = config.resume;

    let label = config.local.display().to_string();
    let mut progress = reporter(config.debug, format!("Uploading {}", label));

    let report = match engine.upload(&request, progress.as_mut()).await {
        Ok(report) => report,
        Err(e) if e.is_resumable() && !config.debug => {
            eprintln!(
                "{} Upload interrupted. Run again with {} to continue.",
                style(symbols::WARN).yellow(),
                style("--resume").green()
            );
            return Err(e).with_context(|| format!("Failed to upload {}", label));
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to upload {}", label)),
    };

    if config.debug {
        return Ok(());
    }

    let verb = if report.resumed { "Resumed" } else { "Uploaded" };
    println!(
        "{} {} {} ({})",
        style(symbols::CHECK).green(),
        verb,
        style(&report.remote).bold(),
        format_bytes(report.size)
    );
    if report.resumed {
        println!(
            "  Blocks {}..{} sent ({} bytes each)",
            report.first_block,
            report.first_block + report.blocks_sent - 1,
            report.block_size
        );
    } else {
        println!(
            "  {} block(s) of up to {} bytes",
            report.blocks_sent, report.block_size
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanstore_core::{MemoryTransport, TransferConfig};

    #[tokio::test]
    async fn test_upload_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"some notes").unwrap();

        let transport = MemoryTransport::new();
        let engine = TransferEngine::new(&transport, TransferConfig::default());
        let config = UploadConfig {
            local: path,
            remote: Some("notes".to_string()),
            debug: true,
            resume: false,
        };
        run(&engine, config).await.unwrap();

        let files = engine.list().await.unwrap();
        assert_eq!(files[0].name, "notes");
        assert_eq!(files[0].size, Some(10));
    }

    #[tokio::test]
    async fn test_upload_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MemoryTransport::new();
        let engine = TransferEngine::new(&transport, TransferConfig::default());
        let config = UploadConfig {
            local: dir.path().to_path_buf(),
            remote: None,
            debug: true,
            resume: false,
        };
        assert!(run(&engine, config).await.is_err());
        assert!(engine.list().await.unwrap().is_empty());
    }
}
