//! Download Command
//!
//! Downloads a stored file to the local filesystem.

use crate::progress::{format_bytes, reporter};
use crate::symbols;
use anyhow::{Context, Result};
use chanstore_core::{Transport, TransferEngine};
use console::style;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Download configuration
pub struct DownloadConfig {
    pub remote: String,
    pub local: Option<PathBuf>,
    pub debug: bool,
    pub force: bool,
}

/// Run download command
pub async fn run<T: Transport + ?Sized>(
    engine: &TransferEngine<'_, T>,
    config: DownloadConfig,
) -> Result<()> {
    let file_path = destination(&config.remote, config.local.as_deref());

    // Ensure parent directory exists
    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let mut progress = reporter(config.debug, format!("Downloading {}", config.remote));
    let report = engine
        .download(&config.remote, &file_path, config.force, progress.as_mut())
        .await
        .with_context(|| format!("Failed to download {}", config.remote))?;

    if config.debug {
        return Ok(());
    }

    println!(
        "{} Downloaded {} ({})\n  Saved to: {}",
        style(symbols::CHECK).green(),
        style(&report.remote).bold(),
        format_bytes(report.size),
        file_path.display()
    );

    Ok(())
}

/// Local path a download of `remote` is written to
///
/// Without an explicit path the last segment of the remote name is used in
/// the current directory; an existing directory receives that segment too.
fn destination(remote: &str, local: Option<&Path>) -> PathBuf {
    let filename = remote
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(remote);

    match local {
        Some(path) if path.is_dir() => path.join(filename),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(filename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanstore_core::{MemoryTransport, NoProgress, TransferConfig, UploadRequest};

    #[test]
    fn test_destination() {
        assert_eq!(destination("report.pdf", None), PathBuf::from("report.pdf"));
        assert_eq!(destination("docs/report.pdf", None), PathBuf::from("report.pdf"));
        assert_eq!(
            destination("report.pdf", Some(Path::new("/nonexistent/out.pdf"))),
            PathBuf::from("/nonexistent/out.pdf")
        );

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            destination("docs/report.pdf", Some(dir.path())),
            dir.path().join("report.pdf")
        );
    }

    #[tokio::test]
    async fn test_download_command() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        std::fs::write(&source, b"payload").unwrap();

        let transport = MemoryTransport::new();
        let engine = TransferEngine::new(&transport, TransferConfig::default());
        engine
            .upload(&UploadRequest::new(&source), &mut NoProgress)
            .await
            .unwrap();

        let out = dir.path().join("nested").join("copy.bin");
        let config = DownloadConfig {
            remote: "source.bin".to_string(),
            local: Some(out.clone()),
            debug: true,
            force: false,
        };
        run(&engine, config).await.unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"payload");
    }
}
