// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! In-line download progress on stderr.
//!
//! Prints a single line that is overwritten with carriage returns as bytes
//! arrive, so large downloads stay visible without scrolling the terminal.
//! Written to stderr so that `--stdout` piping stays clean.

use std::io::Write;

/// Running byte count for one download.
///
/// When the total size is known up front (from `Content-Length`) the line
/// gets a ` / TOTAL` suffix.
#[derive(Debug)]
pub struct ByteCounter {
    written: u64,
    suffix: String,
}

impl ByteCounter {
    pub fn new(total: Option<u64>) -> Self {
        let suffix = match total {
            Some(total) if total > 0 => format!(" / {}", human_bytes(total)),
            _ => String::new(),
        };
        Self { written: 0, suffix }
    }

    /// Record `n` more bytes and repaint the progress line.
    pub fn add(&mut self, n: u64) {
        self.written += n;
        self.print();
    }

    fn print(&self) {
        let mut stderr = std::io::stderr();
        // Blank the previous line before repainting, so a shrinking count
        // never leaves stale characters behind.
        let _ = write!(stderr, "\r{}", " ".repeat(35));
        let _ = write!(
            stderr,
            "\rDownloading... {}{}",
            human_bytes(self.written),
            self.suffix
        );
        let _ = stderr.flush();
    }

    /// Terminate the progress line so subsequent output starts cleanly.
    pub fn finish(self) {
        eprintln!();
    }
}

/// Format a byte count the way humans read it.
pub fn human_bytes(n: u64) -> String {
    if n >= 1_073_741_824 {
        format!("{:.1} GB", n as f64 / 1_073_741_824.0)
    } else if n >= 1_048_576 {
        format!("{:.1} MB", n as f64 / 1_048_576.0)
    } else if n >= 1024 {
        format!("{:.1} KB", n as f64 / 1024.0)
    } else {
        format!("{} B", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KB");
        assert_eq!(human_bytes(10 * 1024 * 1024), "10.0 MB");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_counter_suffix_only_with_known_total() {
        let counter = ByteCounter::new(Some(1024));
        assert_eq!(counter.suffix, " / 1.0 KB");

        let counter = ByteCounter::new(None);
        assert!(counter.suffix.is_empty());

        let counter = ByteCounter::new(Some(0));
        assert!(counter.suffix.is_empty());
    }
}
