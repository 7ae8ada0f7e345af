//! AArch64 relocation encoders
//!
//! Variables are reached through an ADRP/ADD or ADRP/LDR pair: ADRP loads
//! the 4KB page of the variable relative to its own page, the second
//! instruction adds the low 12 bits. Pointers in data are plain 64-bit (or
//! 32-bit) absolute addresses.

use super::{EncodeError, PatchSite};

const PAGE_MASK: i64 = !0xFFF;

/// ADRP: `1 immlo(2) 10000 immhi(19) Rd(5)`
const ADRP_MASK: u32 = 0x9F00_0000;
const ADRP_BITS: u32 = 0x9000_0000;
const ADRP_IMMLO_MASK: u32 = 0x6000_0000;
const ADRP_IMMHI_MASK: u32 = 0x00FF_FFE0;
/// ADRP reach in pages: signed 21 bits
const ADRP_IMM_LIMIT: i64 = 1 << 20;

/// Load/store register, unsigned immediate (scalar and SIMD)
const LDST_UIMM_MASK: u32 = 0x3B00_0000;
const LDST_UIMM_BITS: u32 = 0x3900_0000;
const LDST_VECTOR: u32 = 1 << 26;
const LDST_OPC_HI: u32 = 1 << 23;

/// ADD (immediate), 32 and 64-bit
const ADD_IMM_MASK: u32 = 0x7F80_0000;
const ADD_IMM_BITS: u32 = 0x1100_0000;

/// imm12 field shared by ADD and LDR/STR, bits [21:10]
const IMM12_MASK: u32 = 0x003F_FC00;
const IMM12_SHIFT: u32 = 10;

pub(super) fn encode_absolute(site: &PatchSite) -> Result<u64, EncodeError> {
    match site.size {
        8 => Ok(site.persistent as u64),
        4 => u32::try_from(site.persistent)
            .map(u64::from)
            .map_err(|_| {
                EncodeError::OutOfRange(format!(
                    "address {:#x} does not fit a 32-bit pointer",
                    site.persistent
                ))
            }),
        size => Err(EncodeError::Unsupported(format!(
            "absolute relocation with size {}",
            size
        ))),
    }
}

pub(super) fn encode_page21(instr: u32, site: &PatchSite) -> Result<u32, EncodeError> {
    if instr & ADRP_MASK != ADRP_BITS {
        return Err(EncodeError::Unsupported(format!(
            "Unsupported instruction type for PAGE21 relocation: {:#010x}",
            instr
        )));
    }

    let page_diff = (site.persistent as i64 & PAGE_MASK) - (site.address as i64 & PAGE_MASK);
    let imm = page_diff >> 12;
    if !(-ADRP_IMM_LIMIT..ADRP_IMM_LIMIT).contains(&imm) {
        return Err(EncodeError::OutOfRange(format!(
            "page difference {:#x} exceeds ADRP range",
            page_diff
        )));
    }

    let imm = imm as u32;
    let immlo = (imm & 0x3) << 29;
    let immhi = ((imm >> 2) & 0x7_FFFF) << 5;
    Ok((instr & !(ADRP_IMMLO_MASK | ADRP_IMMHI_MASK)) | immlo | immhi)
}

pub(super) fn encode_pageoff12(instr: u32, site: &PatchSite) -> Result<u32, EncodeError> {
    let offset = (site.persistent & 0xFFF) as u32;

    let scale = if instr & LDST_UIMM_MASK == LDST_UIMM_BITS {
        // Bits [31:30] give the access size; 128-bit SIMD reuses size 0 with opc<1> set
        let size = instr >> 30;
        if size == 0 && instr & LDST_VECTOR != 0 && instr & LDST_OPC_HI != 0 {
            4
        } else {
            size
        }
    } else if instr & ADD_IMM_MASK == ADD_IMM_BITS {
        let shift = (instr >> 22) & 0x1;
        if shift != 0 {
            return Err(EncodeError::Unsupported(format!(
                "ADD with LSL #12 cannot hold a page offset: {:#010x}",
                instr
            )));
        }
        shift
    } else {
        return Err(EncodeError::Unsupported(format!(
            "Unsupported instruction type for PAGEOFF12 relocation: {:#010x}",
            instr
        )));
    };

    if offset & ((1 << scale) - 1) != 0 {
        return Err(EncodeError::Unsupported(format!(
            "page offset {:#x} is not aligned to the {}-byte access of {:#010x}",
            offset,
            1u32 << scale,
            instr
        )));
    }

    Ok((instr & !IMM12_MASK) | ((offset >> scale) << IMM12_SHIFT))
}
