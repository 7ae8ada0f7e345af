//! Error types for code patching operations

/// Error type for patch primitive operations
///
/// `Status` carries an opaque platform code and is surfaced verbatim in logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// Platform patching primitive reported a nonzero status
    #[error("status {0}")]
    Status(i32),

    /// Failed to make the target memory writable
    #[error("Memory protection failed: {0}")]
    MemoryProtection(String),

    /// Address range is not mapped
    #[error("Address not mapped: {0:#x}")]
    Unmapped(usize),

    /// Redirect or write cannot be expressed for this target
    #[error("Unsupported patch: {0}")]
    Unsupported(String),
}
