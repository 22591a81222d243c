//! Progress rendering
//!
//! A byte progress bar on standard error, or with `--debug` a
//! `<total> <processed>` line per block on standard output.

use chanstore_core::Progress;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;

/// indicatif bar over bytes
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(message: String) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(message);
        Self { bar }
    }
}

impl Progress for BarProgress {
    fn start(&mut self, total: u64, done: u64) {
        self.bar.set_length(total);
        self.bar.set_position(done);
    }

    fn advance(&mut self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Machine-readable progress, one line per block
pub struct DebugProgress<W: Write + Send> {
    out: W,
    total: u64,
    done: u64,
}

impl<W: Write + Send> DebugProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            total: 0,
            done: 0,
        }
    }
}

impl<W: Write + Send> Progress for DebugProgress<W> {
    fn start(&mut self, total: u64, done: u64) {
        self.total = total;
        self.done = done;
    }

    fn advance(&mut self, bytes: u64) {
        self.done += bytes;
        // a closed stdout must not abort the transfer
        let _ = writeln!(self.out, "{} {}", self.total, self.done);
        let _ = self.out.flush();
    }
}

/// Progress for a transfer command
pub fn reporter(debug: bool, message: String) -> Box<dyn Progress> {
    if debug {
        Box::new(DebugProgress::new(std::io::stdout()))
    } else {
        Box::new(BarProgress::new(message))
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_progress_lines() {
        let mut progress = DebugProgress::new(Vec::new());
        progress.start(25, 10);
        progress.advance(10);
        progress.advance(5);
        progress.finish();

        let out = String::from_utf8(progress.out).unwrap();
        assert_eq!(out, "25 20\n25 25\n");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_bytes(1024u64 * 1024 * 1024 * 1024), "1.00 TB");
    }
}
