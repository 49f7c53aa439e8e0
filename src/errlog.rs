//! Append-only restart failure log: one `<timestamp>: <message>` line per
//! failure, no rotation, no locking.
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open, append exactly one line, close.
    pub fn append(&self, message: &str) -> std::io::Result<()> {
        let line = format_line(&Local::now().format(TIMESTAMP_FORMAT).to_string(), message);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

/// Newlines inside the message are flattened so one failure stays one line.
fn format_line(timestamp: &str, message: &str) -> String {
    let flat = message.replace(['\r', '\n'], " ");
    format!("{timestamp}: {}\n", flat.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use tempfile::tempdir;

    #[test]
    fn test_format_line() {
        assert_eq!(
            format_line("2026-01-02 03:04:05.000006", "spawn failed"),
            "2026-01-02 03:04:05.000006: spawn failed\n"
        );
    }

    #[test]
    fn test_format_line_flattens_newlines() {
        assert_eq!(
            format_line("T", "first\nsecond\r\n"),
            "T: first second\n"
        );
    }

    #[test]
    fn test_append_creates_file_with_one_line() {
        let dir = tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("watchdog_error.log"));

        log.append("failed to spawn: No such file or directory").unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);

        let (ts, msg) = lines[0].split_once(": ").unwrap();
        assert!(NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).is_ok());
        assert_eq!(msg, "failed to spawn: No such file or directory");
    }

    #[test]
    fn test_append_never_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("watchdog_error.log");
        std::fs::write(&path, "earlier: entry\n").unwrap();

        let log = ErrorLog::new(path.clone());
        log.append("one").unwrap();
        log.append("two").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "earlier: entry");
        assert!(lines[1].ends_with(": one"));
        assert!(lines[2].ends_with(": two"));
    }

    #[test]
    fn test_append_into_missing_dir_fails() {
        let log = ErrorLog::new(PathBuf::from("/nonexistent-dir/impossible/err.log"));
        assert!(log.append("x").is_err());
    }
}
