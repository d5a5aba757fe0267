//! Resolution log writer — append-only JSONL files.
//!
//! Writes to `~/.changegate/logs/{name}.jsonl` — one JSON object per line.
//! Flushes after every write for crash safety: an approved-but-not-applied
//! request (see the replay engine) is diagnosed from this log.

use crate::audit::types::ResolutionLogEntry;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only resolution logger that writes JSONL files.
pub struct AuditLogger {
    /// Path to the log file
    log_path: PathBuf,
    /// Open file handle (kept open for the server lifetime)
    file: File,
    /// Number of entries written
    entry_count: usize,
}

impl AuditLogger {
    /// Create a logger for a named log (typically the reviewed resource).
    /// Creates the log directory and file if they don't exist.
    pub fn new(name: &str) -> Result<Self> {
        let log_dir = Self::log_directory()?;
        fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
        Self::with_path(log_dir.join(format!("{name}.jsonl")))
    }

    /// Create a logger writing to a specific path (for testing).
    pub fn with_path(path: impl AsRef<Path>) -> Result<Self> {
        let log_path = path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

        Ok(Self {
            log_path,
            file,
            entry_count: 0,
        })
    }

    /// Log a resolution attempt. Serializes to JSON and appends to the file.
    /// Flushes immediately for crash safety.
    pub fn log(&mut self, entry: &ResolutionLogEntry) -> Result<()> {
        let json = serde_json::to_string(entry).context("Failed to serialize log entry")?;
        writeln!(self.file, "{}", json).context("Failed to write log entry")?;
        self.file.flush().context("Failed to flush log file")?;
        self.entry_count += 1;
        Ok(())
    }

    /// Get the path to the log file.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Get the number of entries written by this logger.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Get the default log directory (~/.changegate/logs/).
    pub fn log_directory() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".changegate").join("logs"))
    }
}
