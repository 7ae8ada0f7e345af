//! Link-time relocation records
//!
//! Records are produced by the object file parser and consumed by the
//! relocation step. They describe, inside function `target`, a field at
//! `offset` bytes from the function's start whose address computation must
//! resolve to the variable `relocation_symbol`.

/// A single link-time relocation extracted from an object file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationRecord {
    /// Function containing the relocated field
    pub target_symbol_name: String,
    pub target_symbol_hash: u64,

    /// Variable the field refers to
    pub relocation_symbol_name: String,
    pub relocation_symbol_hash: u64,

    /// Byte offset of the field from the start of the target function
    pub offset: i64,

    /// Width of the field in bytes, 4 or 8
    pub size: u8,

    /// Raw relocation type as found in the object file
    pub r_type: u32,
}
