//! Relocation kinds and their encoders
//!
//! A closed set of variants, each with its own encoder. Supporting another
//! architecture means adding a variant and a classification arm, without
//! touching the existing encoders.
//!
//! Encoders are pure: they take the field's current contents and the
//! addresses involved and return the new contents. Reading and writing
//! memory is left to the caller.

mod aarch64;
mod delta;

use relive_sdk::Arch;

/// Failure to express a relocation in the field it lives in
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Value does not fit the field or immediate
    #[error("{0}")]
    OutOfRange(String),

    /// Instruction shape or field width this encoder does not handle
    #[error("{0}")]
    Unsupported(String),
}

/// Mach-O arm64 relocation types
pub mod macho_arm64 {
    pub const ARM64_RELOC_UNSIGNED: u32 = 0;
    pub const ARM64_RELOC_PAGE21: u32 = 3;
    pub const ARM64_RELOC_PAGEOFF12: u32 = 4;
}

/// ELF aarch64 relocation types
pub mod elf_aarch64 {
    pub const R_AARCH64_ABS64: u32 = 257;
    pub const R_AARCH64_ABS32: u32 = 258;
    pub const R_AARCH64_ADR_PREL_PG_HI21: u32 = 275;
    pub const R_AARCH64_ADR_PREL_PG_HI21_NC: u32 = 276;
    pub const R_AARCH64_ADD_ABS_LO12_NC: u32 = 277;
    pub const R_AARCH64_LDST8_ABS_LO12_NC: u32 = 278;
    pub const R_AARCH64_LDST16_ABS_LO12_NC: u32 = 284;
    pub const R_AARCH64_LDST32_ABS_LO12_NC: u32 = 285;
    pub const R_AARCH64_LDST64_ABS_LO12_NC: u32 = 286;
    pub const R_AARCH64_LDST128_ABS_LO12_NC: u32 = 299;
}

/// How a relocated field encodes its reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocationKind {
    /// Field holds the absolute address; overwritten outright
    Absolute,
    /// ADRP: signed page difference between the variable and the instruction
    Page21,
    /// Low 12 bits of the variable's address in an ADD/LDR/STR immediate
    PageOff12,
    /// Field holds a value computed against the new copy; shifted by the
    /// distance from the new copy to the persistent one
    Delta,
}

impl RelocationKind {
    /// Map a raw relocation type for `arch` to its kind
    ///
    /// AArch64 accepts both Mach-O and ELF numbering; the ranges don't overlap.
    /// Every x86-64 relocation is delta-adjusted.
    pub fn classify(arch: Arch, r_type: u32) -> Option<Self> {
        use elf_aarch64::*;
        use macho_arm64::*;

        match arch {
            Arch::X86_64 => Some(RelocationKind::Delta),
            Arch::Aarch64 => match r_type {
                ARM64_RELOC_UNSIGNED | R_AARCH64_ABS64 | R_AARCH64_ABS32 => {
                    Some(RelocationKind::Absolute)
                }
                ARM64_RELOC_PAGE21 | R_AARCH64_ADR_PREL_PG_HI21 | R_AARCH64_ADR_PREL_PG_HI21_NC => {
                    Some(RelocationKind::Page21)
                }
                ARM64_RELOC_PAGEOFF12
                | R_AARCH64_ADD_ABS_LO12_NC
                | R_AARCH64_LDST8_ABS_LO12_NC
                | R_AARCH64_LDST16_ABS_LO12_NC
                | R_AARCH64_LDST32_ABS_LO12_NC
                | R_AARCH64_LDST64_ABS_LO12_NC
                | R_AARCH64_LDST128_ABS_LO12_NC => Some(RelocationKind::PageOff12),
                _ => None,
            },
        }
    }

    /// New contents of the field described by `site`
    ///
    /// `current` is the field's present value, zero-extended from `site.size`
    /// bytes.
    pub fn encode(self, site: &PatchSite, current: u64) -> Result<u64, EncodeError> {
        match self {
            RelocationKind::Absolute => aarch64::encode_absolute(site),
            RelocationKind::Page21 => {
                aarch64::encode_page21(instruction_word(site, current)?, site).map(u64::from)
            }
            RelocationKind::PageOff12 => {
                aarch64::encode_pageoff12(instruction_word(site, current)?, site).map(u64::from)
            }
            RelocationKind::Delta => delta::adjust(current, site),
        }
    }
}

/// A field being retargeted from a variable's new copy to its persistent instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSite {
    /// Address of the field
    pub address: usize,

    /// Field width in bytes, 4 or 8
    pub size: u8,

    /// Address of the persistent instance
    pub persistent: usize,

    /// Address of the new, throwaway copy the field was compiled against
    pub fresh: usize,
}

/// Instruction encoders only work on a single 32-bit word
fn instruction_word(site: &PatchSite, current: u64) -> Result<u32, EncodeError> {
    if site.size != 4 {
        return Err(EncodeError::Unsupported(format!(
            "instruction relocation with size {}",
            site.size
        )));
    }
    Ok(current as u32)
}
