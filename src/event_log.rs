use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{info, warn};
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One line of the operational log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub message: String,
}

impl LogEntry {
    pub fn line(&self) -> String {
        format!("[{}] {}", self.at.format("%Y-%m-%d %H:%M:%S"), self.message)
    }
}

/// Entries kept in memory by default; older ones survive only in the log file
pub const DEFAULT_RETAINED_ENTRIES: usize = 1000;

/// Append-only log of notable session events (start/stop, reconnects,
/// violations, errors).
///
/// Only the most recent entries stay in memory. The optional text file gets
/// every entry.
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    retained: usize,
    recorded: u64,
    file: Option<(PathBuf, File)>,
}

impl EventLog {
    pub fn in_memory() -> Self {
        Self::with_retention(DEFAULT_RETAINED_ENTRIES)
    }

    /// In-memory log keeping at most `retained` recent entries
    pub fn with_retention(retained: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            retained: retained.max(1),
            recorded: 0,
            file: None,
        }
    }

    /// Opens the log, appending to `path` when one is given
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::in_memory());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;

        Ok(Self {
            file: Some((path.to_path_buf(), file)),
            ..Self::in_memory()
        })
    }

    /// Appends an entry stamped with the current time
    pub fn record(&mut self, message: impl Into<String>) {
        self.push(LogEntry {
            at: Local::now(),
            message: message.into(),
        });
    }

    fn push(&mut self, entry: LogEntry) {
        let line = entry.line();
        info!("{}", entry.message);

        if let Some((path, file)) = self.file.as_mut() {
            if let Err(err) = writeln!(file, "{}", line) {
                warn!("Failed to append to {}: {}", path.display(), err);
            }
        }
        if self.entries.len() == self.retained {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.recorded += 1;
    }

    /// Retained entries, oldest first
    pub fn entries(&self) -> &VecDeque<LogEntry> {
        &self.entries
    }

    /// The `n` most recent entries, oldest first
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Entries currently held in memory
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries recorded over the whole session, including dropped ones
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
