//! Redirect stub encoding
//!
//! A redirect overwrites the first bytes of the superseded function with an
//! unconditional jump to its replacement. Near targets get the shortest
//! relative branch; far targets get an absolute jump through an inline
//! 64-bit literal.

use iced_x86::{Code, Encoder, Instruction};
use relive_sdk::Arch;

use crate::error::PatchError;

/// Length of `jmp rel32`; the displacement is relative to the next instruction
const X86_REL32_LEN: usize = 5;

/// `jmp qword ptr [rip+0]`, followed by the 8-byte target
const X86_ABS_JMP: [u8; 6] = [0xFF, 0x25, 0x00, 0x00, 0x00, 0x00];

/// `b <imm26>` opcode
const A64_B: u32 = 0x1400_0000;
/// `ldr x16, #8`
const A64_LDR_X16_LIT8: u32 = 0x5800_0050;
/// `br x16`
const A64_BR_X16: u32 = 0xD61F_0200;
/// Reach of `b`: ±128MB
const A64_B_RANGE: i64 = 1 << 27;

/// Encode a jump placed at `from` that lands on `to`
pub fn encode_redirect(arch: Arch, from: usize, to: usize) -> Result<Vec<u8>, PatchError> {
    match arch {
        Arch::X86_64 => encode_x86_64(from, to),
        Arch::Aarch64 => encode_aarch64(from, to),
    }
}

fn encode_x86_64(from: usize, to: usize) -> Result<Vec<u8>, PatchError> {
    let next_ip = from as i64 + X86_REL32_LEN as i64;
    let delta = to as i64 - next_ip;

    if i32::try_from(delta).is_ok() {
        let jmp = Instruction::with_branch(Code::Jmp_rel32_64, to as u64)
            .map_err(|e| PatchError::Unsupported(e.to_string()))?;
        let mut encoder = Encoder::new(64);
        encoder
            .encode(&jmp, from as u64)
            .map_err(|e| PatchError::Unsupported(e.to_string()))?;
        return Ok(encoder.take_buffer());
    }

    let mut stub = Vec::with_capacity(X86_ABS_JMP.len() + 8);
    stub.extend_from_slice(&X86_ABS_JMP);
    stub.extend_from_slice(&(to as u64).to_le_bytes());
    Ok(stub)
}

fn encode_aarch64(from: usize, to: usize) -> Result<Vec<u8>, PatchError> {
    if from % 4 != 0 || to % 4 != 0 {
        return Err(PatchError::Unsupported(format!(
            "unaligned aarch64 redirect {:#x} -> {:#x}",
            from, to
        )));
    }

    let delta = to as i64 - from as i64;
    if (-A64_B_RANGE..A64_B_RANGE).contains(&delta) {
        let imm26 = ((delta >> 2) as u32) & 0x03FF_FFFF;
        return Ok((A64_B | imm26).to_le_bytes().to_vec());
    }

    let mut stub = Vec::with_capacity(16);
    stub.extend_from_slice(&A64_LDR_X16_LIT8.to_le_bytes());
    stub.extend_from_slice(&A64_BR_X16.to_le_bytes());
    stub.extend_from_slice(&(to as u64).to_le_bytes());
    Ok(stub)
}
