//! Wire logging.
//!
//! Records every backend exchange to an optional append-only file with UTC
//! timestamps. Regular diagnostics go through the `log` facade instead.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

/// Thread-safe handle to an append-only log file.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// A handle that drops every line.
pub fn disabled() -> LogHandle {
    Arc::new(Mutex::new(None))
}

/// Format current UTC time as ISO 8601 with milliseconds (e.g. 2026-02-04T10:15:30.123Z).
fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write a timestamped line to the log file (if present).
pub fn log_line(handle: &LogHandle, direction: &str, data: &str) {
    if let Ok(mut guard) = handle.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "[{}] {}: {}", utc_timestamp(), direction, data);
            let _ = file.flush();
        }
    }
}

/// Open (or create) `{log_dir}/{log_id}.log` and return a shared handle.
///
/// Any failure yields a disabled handle; wire logging never blocks a request.
pub fn open_log_file(log_dir: Option<&Path>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        let path = dir.join(format!("{}.log", log_id));
        std::fs::create_dir_all(dir).ok()?;
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                log::warn!("Failed to open wire log {}: {}", path.display(), e);
                None
            }
        }
    });
    Arc::new(Mutex::new(file))
}

/// Shorten long payloads (base64 previews) before they hit the wire log.
pub fn abbreviate(data: &str, max_chars: usize) -> String {
    let count = data.chars().count();
    if count <= max_chars {
        return data.to_string();
    }
    let head: String = data.chars().take(max_chars).collect();
    format!("{}... ({} chars)", head, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn utc_timestamp_format() {
        let ts = utc_timestamp();
        // YYYY-MM-DDTHH:MM:SS.mmmZ
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 24);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn open_log_file_creates_file() {
        let dir = tempdir().unwrap();
        let handle = open_log_file(Some(dir.path()), "wire");
        assert!(handle.lock().unwrap().is_some());
        assert!(dir.path().join("wire.log").exists());
    }

    #[test]
    fn open_log_file_none_dir() {
        let handle = open_log_file(None, "wire");
        assert!(handle.lock().unwrap().is_none());
    }

    #[test]
    fn log_line_writes_to_file() {
        let dir = tempdir().unwrap();
        let handle = open_log_file(Some(dir.path()), "wire");
        log_line(&handle, "REQUEST", "POST /api/chat");

        let contents = std::fs::read_to_string(dir.path().join("wire.log")).unwrap();
        assert!(contents.contains("REQUEST: POST /api/chat"));
        assert!(contents.starts_with('['));
    }

    #[test]
    fn log_line_handles_disabled_handle() {
        // Should not panic
        log_line(&disabled(), "REQUEST", "test");
    }

    #[test]
    fn abbreviate_keeps_short_text() {
        assert_eq!(abbreviate("short", 10), "short");
    }

    #[test]
    fn abbreviate_truncates_long_text() {
        assert_eq!(abbreviate("abcdefghij", 4), "abcd... (10 chars)");
    }
}
