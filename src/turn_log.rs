//! Append-only record of every conversation turn.
//!
//! Each side of a turn (user question, AI answer) becomes one row. The log is
//! shared by every session of the process and outlives session resets.
//! Callers get a `Result` back; the conversation flow decides to ignore it.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use time::macros::format_description;
use time::{OffsetDateTime, format_description::FormatItem};

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Lets spreadsheet tools detect UTF-8 for the Chinese content.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const HEADER: [&str; 4] = ["timestamp", "origin_address", "role", "content"];

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("turn log I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("turn log CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("turn log lock poisoned")]
    Poisoned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogRole {
    User,
    Ai,
}

impl LogRole {
    pub fn as_str(self) -> &'static str {
        match self {
            LogRole::User => "User",
            LogRole::Ai => "AI",
        }
    }
}

impl fmt::Display for LogRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub timestamp: OffsetDateTime,
    pub origin_address: Option<String>,
    pub role: LogRole,
    pub content: String,
}

impl LogEntry {
    /// Entry stamped with the local wall clock (UTC if the offset is unknown).
    pub fn now(role: LogRole, content: &str, origin_address: Option<&str>) -> Self {
        let timestamp = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        Self {
            timestamp,
            origin_address: origin_address.map(str::to_string),
            role,
            content: content.to_string(),
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp
            .format(TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string())
    }
}

/// Destination for log rows. Implementations must accept concurrent appends.
pub trait TurnSink: Send + Sync {
    fn append(&self, entry: &LogEntry) -> Result<(), LogError>;

    /// Number of data rows, or `None` when nothing was ever logged.
    fn row_count(&self) -> Result<Option<usize>, LogError>;

    /// Raw log contents for download, or `None` when nothing was ever logged.
    fn export(&self) -> Result<Option<Vec<u8>>, LogError>;
}

/// CSV file sink. The file is opened in append mode for every row and each
/// row goes out in a single write, so other processes writing the same file
/// only ever interleave whole rows. Appends within one process are
/// serialized by a mutex.
pub struct CsvTurnLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvTurnLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn has_content(&self) -> bool {
        fs::metadata(&self.path).is_ok_and(|meta| meta.len() > 0)
    }
}

impl TurnSink for CsvTurnLog {
    fn append(&self, entry: &LogEntry) -> Result<(), LogError> {
        let _guard = self.lock.lock().map_err(|_| LogError::Poisoned)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        // Only the process that creates the file writes the BOM and header.
        let (mut file, created) = match OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => (file, true),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                (OpenOptions::new().append(true).open(&self.path)?, false)
            }
            Err(err) => return Err(err.into()),
        };
        let fresh = created || file.metadata()?.len() == 0;

        let mut prefix = Vec::new();
        if fresh {
            prefix.extend_from_slice(UTF8_BOM);
        }
        let mut writer = csv::Writer::from_writer(prefix);
        if fresh {
            writer.write_record(HEADER)?;
        }
        writer.write_record([
            entry.formatted_timestamp().as_str(),
            entry.origin_address.as_deref().unwrap_or(""),
            entry.role.as_str(),
            entry.content.as_str(),
        ])?;
        writer.flush()?;

        // one write per row keeps rows whole under O_APPEND
        file.write_all(writer.get_ref())?;
        Ok(())
    }

    fn row_count(&self) -> Result<Option<usize>, LogError> {
        let _guard = self.lock.lock().map_err(|_| LogError::Poisoned)?;
        if !self.has_content() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;
        let mut rows = 0;
        for record in reader.byte_records() {
            record?;
            rows += 1;
        }
        Ok(Some(rows))
    }

    fn export(&self) -> Result<Option<Vec<u8>>, LogError> {
        let _guard = self.lock.lock().map_err(|_| LogError::Poisoned)?;
        if !self.has_content() {
            return Ok(None);
        }
        Ok(Some(fs::read(&self.path)?))
    }
}

/// Thin handle the conversation flow logs through.
#[derive(Clone)]
pub struct TurnLogger {
    sink: Arc<dyn TurnSink>,
}

impl TurnLogger {
    pub fn new(sink: Arc<dyn TurnSink>) -> Self {
        Self { sink }
    }

    pub fn log(
        &self,
        role: LogRole,
        content: &str,
        origin_address: Option<&str>,
    ) -> Result<(), LogError> {
        self.sink
            .append(&LogEntry::now(role, content, origin_address))
    }

    pub fn row_count(&self) -> Result<Option<usize>, LogError> {
        self.sink.row_count()
    }

    pub fn export(&self) -> Result<Option<Vec<u8>>, LogError> {
        self.sink.export()
    }
}
