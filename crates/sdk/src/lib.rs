//! relive SDK - Reload Data Model
//!
//! This crate contains the value types shared between the reload engine and
//! its collaborators (object file parsers, module loaders). It has no
//! dependencies so collaborators can produce these types without linking the
//! patching engine.
//!
//! # Modules
//!
//! - [`symbol`] - Symbols and the per-generation symbol table
//! - [`program`] - One loaded generation of code
//! - [`relocation`] - Relocation records extracted from object files
//! - [`arch`] - Target architecture tag

pub mod arch;
pub mod program;
pub mod relocation;
pub mod symbol;

pub use arch::Arch;
pub use program::Program;
pub use relocation::RelocationRecord;
pub use symbol::{Symbol, SymbolKind, Symbols};
