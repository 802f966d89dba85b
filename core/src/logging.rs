//! Diagnostic log sinks passed into the parser and validator
//!
//! The core never owns a log destination. Callers construct a sink at the
//! application entry point and lend it to each operation; a sink must never
//! fail or panic, whatever happens to its destination.

use chrono::Local;
use log::Level;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Fire-and-forget destination for diagnostic messages
pub trait LogSink {
    fn log(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// Forwards to whatever `log` backend the application installed
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacade;

impl LogSink for LogFacade {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: "ovpn_profile_core", level, "{}", message);
    }
}

/// Appends `<time> - LEVEL - message` lines to a file and mirrors them to `log`
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLog {
    fn log(&self, level: Level, message: &str) {
        let stamp = Local::now().format("%a %b %e %H:%M:%S %Y");
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{} - {} - {}", stamp, level, message);
            let _ = file.flush();
        }
        LogFacade.log(level, message);
    }
}

/// Keeps every entry in memory, for display in a UI or inspection in tests
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Messages logged at exactly `level`
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    }
}

impl LogSink for MemoryLog {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_log_levels() {
        let log = MemoryLog::new();
        log.info("parsing");
        log.error("CA certificate is required");

        assert_eq!(log.entries().len(), 2);
        assert_eq!(
            log.messages_at(Level::Error),
            vec!["CA certificate is required".to_string()]
        );
    }

    #[test]
    fn test_file_log_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("import.log");

        let log = FileLog::open(&path).unwrap();
        log.info("first");
        log.warn("second");
        drop(log);

        // Reopening appends instead of truncating
        let log = FileLog::open(&path).unwrap();
        log.error("third");

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(" - INFO - first"));
        assert!(lines[1].ends_with(" - WARN - second"));
        assert!(lines[2].ends_with(" - ERROR - third"));
    }
}
