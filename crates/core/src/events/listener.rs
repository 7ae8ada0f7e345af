//! Listener capability
//!
//! Applications embed the engine and want to know what a reload did. They
//! implement [`LiveListener`] and register it on [`super::LiveEvents`]. Every
//! callback has a no-op default, so a listener only overrides what it needs.

use std::sync::Arc;

use parking_lot::Mutex;

use super::types::{LogEntry, LogSeverity};

/// Receiver of reload notifications
///
/// Callbacks run synchronously on the reloading thread, in registration order.
pub trait LiveListener {
    /// Called for every log message produced by the engine
    fn on_log(&self, _severity: LogSeverity, _message: &str) {}

    /// Called right before the module with new code is loaded into the process
    fn on_code_pre_load(&self) {}

    /// Called right after all functions are hooked and variables relocated
    fn on_code_post_load(&self) {}
}

impl<T: LiveListener + ?Sized> LiveListener for Arc<T> {
    fn on_log(&self, severity: LogSeverity, message: &str) {
        (**self).on_log(severity, message)
    }

    fn on_code_pre_load(&self) {
        (**self).on_code_pre_load()
    }

    fn on_code_post_load(&self) {
        (**self).on_code_post_load()
    }
}

/// Listener that keeps every log message it receives
///
/// Register it through an `Arc` to inspect what a reload reported, for
/// example which symbols failed to hook.
#[derive(Debug, Default)]
pub struct LogCollector {
    entries: Mutex<Vec<LogEntry>>,
}

impl LogCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything collected so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Messages logged at exactly `severity`
    pub fn messages(&self, severity: LogSeverity) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.severity == severity)
            .map(|e| e.message.clone())
            .collect()
    }

    /// Number of messages logged at exactly `severity`
    pub fn count(&self, severity: LogSeverity) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.severity == severity)
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LiveListener for LogCollector {
    fn on_log(&self, severity: LogSeverity, message: &str) {
        self.entries.lock().push(LogEntry {
            severity,
            message: message.to_string(),
        });
    }
}
