//! Reload events and listener dispatch
//!
//! All progress and error reporting from the reload steps goes through
//! [`LiveEvents`]. Each message is emitted as a `tracing` event (target
//! `relive`) and then handed to every registered [`LiveListener`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use relive_core::events::{LiveEvents, LogCollector, LogSeverity};
//!
//! let collector = Arc::new(LogCollector::new());
//! let mut events = LiveEvents::new();
//! let key = events.add_listener(Box::new(collector.clone()));
//!
//! events.add_log(LogSeverity::Info, "hello");
//! assert_eq!(collector.count(LogSeverity::Info), 1);
//!
//! events.remove_listener(key);
//! ```

mod listener;
mod types;

use slotmap::{new_key_type, SlotMap};

pub use listener::{LiveListener, LogCollector};
pub use types::{LogEntry, LogSeverity};

new_key_type! {
    /// Key for registered listeners, used for removal
    pub struct ListenerKey;
}

/// Listener registry and log dispatch
#[derive(Default)]
pub struct LiveEvents {
    listeners: SlotMap<ListenerKey, Box<dyn LiveListener>>,

    /// Registration order; slot order is not stable across removals
    order: Vec<ListenerKey>,
}

impl LiveEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    ///
    /// # Returns
    /// A key that can be used to unregister the listener via `remove_listener`.
    pub fn add_listener(&mut self, listener: Box<dyn LiveListener>) -> ListenerKey {
        let key = self.listeners.insert(listener);
        self.order.push(key);
        key
    }

    /// Remove a listener by its key
    ///
    /// Returns `true` if the listener was found and removed.
    pub fn remove_listener(&mut self, key: ListenerKey) -> bool {
        self.order.retain(|k| *k != key);
        self.listeners.remove(key).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn for_each(&self, mut f: impl FnMut(&dyn LiveListener)) {
        for key in &self.order {
            if let Some(listener) = self.listeners.get(*key) {
                f(listener.as_ref());
            }
        }
    }

    /// Emit a log message
    pub fn add_log(&self, severity: LogSeverity, message: impl AsRef<str>) {
        let message = message.as_ref();
        match severity {
            LogSeverity::Debug => tracing::debug!(target: "relive", "{}", message),
            LogSeverity::Info => tracing::info!(target: "relive", "{}", message),
            LogSeverity::Warning => tracing::warn!(target: "relive", "{}", message),
            LogSeverity::Error => tracing::error!(target: "relive", "{}", message),
        }
        self.for_each(|listener| listener.on_log(severity, message));
    }

    /// Notify listeners that new code is about to be loaded
    pub fn code_pre_load(&self) {
        self.for_each(|listener| listener.on_code_pre_load());
    }

    /// Notify listeners that new code is hooked and relocated
    pub fn code_post_load(&self) {
        self.for_each(|listener| listener.on_code_post_load());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records callback order across listeners
    struct Tagged {
        tag: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl LiveListener for Tagged {
        fn on_log(&self, _severity: LogSeverity, message: &str) {
            self.calls.lock().push(format!("{}:{}", self.tag, message));
        }

        fn on_code_post_load(&self) {
            self.calls.lock().push(format!("{}:post", self.tag));
        }
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut events = LiveEvents::new();
        for tag in ["a", "b", "c"] {
            events.add_listener(Box::new(Tagged {
                tag,
                calls: calls.clone(),
            }));
        }

        events.add_log(LogSeverity::Info, "x");
        events.code_post_load();

        assert_eq!(
            *calls.lock(),
            vec!["a:x", "b:x", "c:x", "a:post", "b:post", "c:post"]
        );
    }

    #[test]
    fn test_remove_listener_keeps_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut events = LiveEvents::new();
        let a = events.add_listener(Box::new(Tagged { tag: "a", calls: calls.clone() }));
        events.add_listener(Box::new(Tagged { tag: "b", calls: calls.clone() }));

        assert!(events.remove_listener(a));
        assert!(!events.remove_listener(a));
        // Reuses the freed slot; must still run after "b"
        events.add_listener(Box::new(Tagged { tag: "c", calls: calls.clone() }));

        events.add_log(LogSeverity::Debug, "y");
        assert_eq!(*calls.lock(), vec!["b:y", "c:y"]);
        assert_eq!(events.listener_count(), 2);
    }

    #[test]
    fn test_default_callbacks_are_noops() {
        struct Silent;
        impl LiveListener for Silent {}

        let mut events = LiveEvents::new();
        events.add_listener(Box::new(Silent));
        events.code_pre_load();
        events.code_post_load();
        events.add_log(LogSeverity::Error, "ignored");
    }

    #[test]
    fn test_collector_filters_by_severity() {
        let collector = Arc::new(LogCollector::new());
        let mut events = LiveEvents::new();
        events.add_listener(Box::new(collector.clone()));

        events.add_log(LogSeverity::Error, "e1");
        events.add_log(LogSeverity::Warning, "w1");
        events.add_log(LogSeverity::Error, "e2");

        assert_eq!(collector.count(LogSeverity::Error), 2);
        assert_eq!(collector.messages(LogSeverity::Warning), vec!["w1"]);
        assert_eq!(collector.entries().len(), 3);

        collector.clear();
        assert!(collector.entries().is_empty());
    }
}
