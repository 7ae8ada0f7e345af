//! relive engine - Patch Primitives and Object Info
//!
//! This crate holds the capabilities the reload steps act through:
//! - [`CodePatcher`] - reading process memory, overwriting bytes, installing
//!   function redirects
//! - [`ProgramInfoLoader`] - relocation records for a freshly built module
//!
//! # Implementations
//!
//! [`NativePatcher`] patches the running process. It is the only place in the
//! workspace that dereferences raw addresses. [`SimulatedMemory`] provides the
//! same capability over an in-memory address space.

pub mod error;
pub mod loader;
pub mod memory;
pub mod native;
pub mod patcher;
pub mod stub;

pub use error::PatchError;
pub use loader::{ProgramInfoLoader, StaticRelocations};
pub use memory::SimulatedMemory;
pub use native::NativePatcher;
pub use patcher::CodePatcher;
pub use stub::encode_redirect;
