//! Event system types

use std::fmt;

/// Severity of a log message emitted during reload
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
        };
        f.write_str(s)
    }
}

/// One captured log message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub message: String,
}
