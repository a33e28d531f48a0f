//! Centralized logging for kvc-indicator.
//!
//! Provides thread-safe leveled logging into a bounded in-memory buffer (shown
//! in the dashboard's activity panel) and, once configured, a daily log file
//! under `<config dir>/logs/`.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::SystemTime;

use crate::constants;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Verbose debugging information
    Debug = 0,
    /// Informational messages about normal operation
    Info = 1,
    /// Warning messages about potential issues
    Warning = 2,
    /// Error messages about failures
    Error = 3,
}

impl LogLevel {
    /// Get the prefix string for this log level
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warning => "WARN ",
            Self::Error => "ERROR",
        }
    }

    /// Get the color for this log level
    pub const fn color(self) -> ratatui::style::Color {
        use ratatui::style::Color;
        match self {
            Self::Debug => Color::DarkGray,
            Self::Info => Color::Cyan,
            Self::Warning => Color::Yellow,
            Self::Error => Color::Red,
        }
    }
}

/// A single log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub level: LogLevel,
    pub category: String,
    pub message: String,
}

impl LogEntry {
    /// Format the log entry as a structured line:
    /// `[HH:MM:SS] [LEVEL] CATEGORY: message`
    pub fn format(&self) -> String {
        let time_str = crate::utils::format_system_time_local(self.timestamp);
        format!(
            "[{}] [{}] {}: {}",
            time_str,
            self.level.prefix(),
            self.category,
            self.message
        )
    }
}

struct Logger {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
    min_level: LogLevel,
    log_dir: Option<PathBuf>,
}

impl Logger {
    fn new() -> Self {
        let max = constants::DEFAULT_MAX_LOG_ENTRIES;
        Self {
            entries: VecDeque::with_capacity(max),
            max_entries: max,
            min_level: LogLevel::Info,
            log_dir: None,
        }
    }

    fn log(&mut self, level: LogLevel, category: &str, message: String) {
        if level < self.min_level {
            return;
        }

        let entry = LogEntry {
            timestamp: SystemTime::now(),
            level,
            category: category.to_string(),
            message,
        };

        if let Some(dir) = &self.log_dir {
            append_to_log_file(dir, &entry.format());
        }

        self.entries.push_back(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    fn set_max_entries(&mut self, max: usize) {
        self.max_entries = max.max(1);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }
}

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<Logger> {
    LOGGER.get_or_init(|| Mutex::new(Logger::new()))
}

/// Log a message with the specified level and category
pub fn log(level: LogLevel, category: &str, message: impl Into<String>) {
    if let Ok(mut logger) = get_logger().lock() {
        logger.log(level, category, message.into());
    }
}

/// Get all log entries (for display in the dashboard)
pub fn get_logs() -> Vec<LogEntry> {
    get_logger()
        .lock()
        .map(|logger| logger.entries.iter().cloned().collect())
        .unwrap_or_default()
}

/// Configure the logger from user settings.
///
/// Call once at startup after loading `AppConfig`. `log_dir` enables the
/// daily log file; pass `None` to keep logs in memory only.
pub fn configure(log_level: &str, max_entries: usize, log_dir: Option<PathBuf>) {
    if let Ok(mut logger) = get_logger().lock() {
        logger.min_level = parse_log_level(log_level);
        logger.set_max_entries(max_entries);
        logger.log_dir = log_dir;
    }
}

/// Set the minimum log level (for filtering).
#[cfg(test)]
pub fn set_min_level(level: LogLevel) {
    if let Ok(mut logger) = get_logger().lock() {
        logger.min_level = level;
    }
}

/// Parse a log level string (case-insensitive) into a `LogLevel`.
///
/// Falls back to `LogLevel::Info` for unrecognised values.
#[must_use]
pub fn parse_log_level(s: &str) -> LogLevel {
    match s.trim().to_ascii_lowercase().as_str() {
        "debug" => LogLevel::Debug,
        "warning" | "warn" => LogLevel::Warning,
        "error" | "err" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

/// Clear all logs
#[cfg(test)]
pub fn clear_logs() {
    if let Ok(mut logger) = get_logger().lock() {
        logger.entries.clear();
    }
}

/// Append a formatted line to today's log file, rotating oversized files.
fn append_to_log_file(log_dir: &Path, line: &str) {
    if std::fs::create_dir_all(log_dir).is_err() {
        return;
    }

    let today = crate::utils::format_local_date();
    let log_file = log_dir.join(format!("{}-{today}.log", constants::APP_NAME));

    if let Ok(metadata) = std::fs::metadata(&log_file) {
        if metadata.len() > constants::LOG_ROTATION_SIZE {
            let rotated = log_dir.join(format!("{}-{today}.1.log", constants::APP_NAME));
            let _ = std::fs::rename(&log_file, rotated);
        }
    }

    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
    {
        let _ = writeln!(file, "{line}");
    }
}

#[macro_export]
macro_rules! log_debug {
    ($category:expr, $($arg:tt)*) => {
        $crate::logger::log($crate::logger::LogLevel::Debug, $category, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::logger::log($crate::logger::LogLevel::Info, $category, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($category:expr, $($arg:tt)*) => {
        $crate::logger::log($crate::logger::LogLevel::Warning, $category, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::logger::log($crate::logger::LogLevel::Error, $category, format!($($arg)*))
    };
}
