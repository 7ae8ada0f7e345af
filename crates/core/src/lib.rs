//! relive - Core Reload Logic
//!
//! This crate applies a freshly built module to a running process:
//! superseded functions are redirected to their new bodies, and the new code
//! is retargeted at the variables that already hold program state.
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and engine crates for convenience:
//! - [`sdk`] - symbol model, programs and relocation records
//! - [`engine`] - memory patching and object info capabilities

pub use relive_engine as engine;
pub use relive_sdk as sdk;

pub mod config;
pub mod context;
pub mod events;
pub mod logging;
pub mod registry;
pub mod reloc;
pub mod session;
pub mod steps;

// Re-export commonly used items
pub use config::{config_path, ConfigError, ConfigResult, LiveConfig};
pub use context::LiveContext;
pub use events::{ListenerKey, LiveEvents, LiveListener, LogCollector, LogEntry, LogSeverity};
pub use registry::ProgramRegistry;
pub use reloc::{EncodeError, PatchSite, RelocationKind};
pub use session::{LiveSession, ReloadSummary};
pub use steps::{
    FunctionsHookingStep, LinkTimeRelocationsStep, RelocationFailure, ReloadStep, StepReport,
};
