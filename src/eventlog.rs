use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::{BotError, Result};

const SEPARATOR_WIDTH: usize = 80;
const DATA_PREFIX: &str = "DATA: ";

fn separator() -> String {
    "-".repeat(SEPARATOR_WIDTH)
}

/// Append-only event log shared by every invocation of the bot.
///
/// Each append takes an exclusive advisory lock on the file for the
/// duration of one open/write/close. Failures never reach the caller: the
/// entry is emitted through `tracing` instead.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("Failed to create log directory {}: {}", dir.display(), e);
            }
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, message: &str) {
        self.append(&format_entry(&timestamp(), message, None));
    }

    pub fn record_with<T: Serialize + ?Sized>(&self, message: &str, data: &T) {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => Value::String(format!("<unserializable: {e}>")),
        };
        self.append(&format_entry(&timestamp(), message, Some(&data)));
    }

    fn append(&self, entry: &str) {
        if let Err(e) = self.try_append(entry) {
            error!(
                path = %self.path.display(),
                "event log write failed ({}): {}",
                e,
                entry.trim_end()
            );
        }
    }

    fn try_append(&self, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock()?;
        let written = file
            .write_all(entry.as_bytes())
            .and_then(|_| file.flush());
        file.unlock()?;
        written
    }

    /// All entries, newest first. A missing log reads as empty.
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let mut entries = parse_entries(&content);
                entries.reverse();
                Ok(entries)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(BotError::local_io(&self.path, e)),
        }
    }

    /// One page of [`EventLog::entries`]. Pages are 1-based; 0 is treated as 1.
    pub fn page(&self, page: usize, per_page: usize) -> Result<LogPage> {
        let entries = self.entries()?;
        Ok(LogPage::of(entries, page, per_page))
    }

    /// Truncate the log under the same lock appends use.
    pub fn clear(&self) -> Result<()> {
        let file = match OpenOptions::new().write(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(BotError::local_io(&self.path, e)),
        };
        file.lock()
            .and_then(|_| file.set_len(0))
            .and_then(|_| file.unlock())
            .map_err(|e| BotError::local_io(&self.path, e))
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_entry(timestamp: &str, message: &str, data: Option<&Value>) -> String {
    let mut entry = format!("[{timestamp}] {message}");
    if let Some(data) = data {
        let rendered = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
        entry.push('\n');
        entry.push_str(DATA_PREFIX);
        entry.push_str(&rendered);
    }
    entry.push('\n');
    entry.push_str(&separator());
    entry.push('\n');
    entry
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryData {
    Json(Value),
    /// Data that no longer decodes, kept verbatim
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: Option<String>,
    pub message: String,
    pub data: Option<EntryData>,
}

/// Split log file content into entries, oldest first.
pub fn parse_entries(content: &str) -> Vec<LogEntry> {
    content
        .split(separator().as_str())
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(parse_entry)
        .collect()
}

fn parse_entry(chunk: &str) -> LogEntry {
    let (header, data) = match chunk.find(&format!("\n{DATA_PREFIX}")) {
        Some(at) => (
            &chunk[..at],
            Some(chunk[at + 1 + DATA_PREFIX.len()..].trim()),
        ),
        None => (chunk, None),
    };

    let (timestamp, message) = match header.strip_prefix('[').and_then(|h| h.split_once("] ")) {
        Some((ts, message)) => (Some(ts.to_string()), message.to_string()),
        None => (None, header.to_string()),
    };

    let data = data.map(|raw| match serde_json::from_str(raw) {
        Ok(value) => EntryData::Json(value),
        Err(_) => EntryData::Raw(raw.to_string()),
    });

    LogEntry {
        timestamp,
        message,
        data,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogPage {
    pub entries: Vec<LogEntry>,
    pub page: usize,
    pub total_pages: usize,
    pub total_entries: usize,
}

impl LogPage {
    fn of(entries: Vec<LogEntry>, page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let total_entries = entries.len();
        let total_pages = total_entries.div_ceil(per_page);
        let entries = entries
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Self {
            entries,
            page,
            total_pages,
            total_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log_in(dir: &tempfile::TempDir) -> EventLog {
        EventLog::open(dir.path().join("nested").join("bot.log"))
    }

    #[test]
    fn test_format_entry_layout() {
        let entry = format_entry("2025-09-08 11:57:00", "MESSAGE RECEIVED", Some(&json!({"a": 1})));
        let lines: Vec<&str> = entry.lines().collect();
        assert_eq!(lines[0], "[2025-09-08 11:57:00] MESSAGE RECEIVED");
        assert_eq!(lines[1], "DATA: {");
        assert_eq!(*lines.last().unwrap(), "-".repeat(80));
    }

    #[test]
    fn test_record_creates_directory_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(&dir);
        log.record("FIRST");
        log.record_with("SECOND", &json!({"file_id": "F1"}));

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.matches(&"-".repeat(80)).count(), 2);

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "SECOND");
        assert_eq!(
            entries[0].data,
            Some(EntryData::Json(json!({"file_id": "F1"})))
        );
        assert_eq!(entries[1].message, "FIRST");
        assert!(entries[1].timestamp.is_some());
        assert_eq!(entries[1].data, None);
    }

    #[test]
    fn test_unwritable_log_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        // The log path is a directory, so every open fails.
        let log = EventLog::open(dir.path());
        log.record("LOST");
        log.record_with("LOST", &json!({"x": 1}));
    }

    #[test]
    fn test_parse_multiline_message_and_raw_data() {
        let content = format!(
            "[2025-01-01 00:00:00] INVALID UPDATE RECEIVED : {{\nbroken\n{sep}\n[2025-01-01 00:00:01] X\nDATA: not json\n{sep}\n",
            sep = "-".repeat(80)
        );
        let entries = parse_entries(&content);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "INVALID UPDATE RECEIVED : {\nbroken");
        assert_eq!(entries[1].data, Some(EntryData::Raw("not json".to_string())));
    }

    #[test]
    fn test_pagination() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(&dir);
        for i in 0..23 {
            log.record(&format!("ENTRY {i}"));
        }

        let first = log.page(1, 10).unwrap();
        assert_eq!(first.total_entries, 23);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.entries.len(), 10);
        assert_eq!(first.entries[0].message, "ENTRY 22");

        let last = log.page(3, 10).unwrap();
        assert_eq!(last.entries.len(), 3);
        assert_eq!(last.entries[2].message, "ENTRY 0");

        assert_eq!(log.page(0, 10).unwrap().page, 1);
        assert!(log.page(9, 10).unwrap().entries.is_empty());
    }

    #[test]
    fn test_page_far_past_the_end_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(&dir);
        log.record("ONE");

        let page = log.page(usize::MAX, 10).unwrap();
        assert!(page.entries.is_empty());
        assert_eq!(page.total_entries, 1);
        assert!(log.page(2, usize::MAX).unwrap().entries.is_empty());
        assert_eq!(log.page(1, usize::MAX).unwrap().entries.len(), 1);
    }

    #[test]
    fn test_concurrent_writers_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.log");
        let payload = "x".repeat(500);

        let writers: Vec<_> = (0..8)
            .map(|writer| {
                let log = EventLog::open(&path);
                let payload = payload.clone();
                std::thread::spawn(move || {
                    for seq in 0..200 {
                        log.record_with(
                            "MESSAGE RECEIVED",
                            &json!({"writer": writer, "seq": seq, "payload": payload}),
                        );
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let entries = EventLog::open(&path).entries().unwrap();
        assert_eq!(entries.len(), 8 * 200);
        for entry in &entries {
            assert_eq!(entry.message, "MESSAGE RECEIVED");
            match &entry.data {
                Some(EntryData::Json(value)) => assert_eq!(value["payload"], payload.as_str()),
                other => panic!("entry data did not decode as JSON: {:?}", other),
            }
        }
    }

    #[test]
    fn test_missing_log_reads_empty_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path().join("absent.log"));
        assert!(log.entries().unwrap().is_empty());
        log.clear().unwrap();
    }

    #[test]
    fn test_clear_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(&dir);
        log.record("ONE");
        log.clear().unwrap();
        assert!(log.entries().unwrap().is_empty());
        log.record("TWO");
        assert_eq!(log.entries().unwrap().len(), 1);
    }
}
