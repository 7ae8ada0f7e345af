//! Patching of live process memory
//!
//! Writes go through `region` for page protection. Relocation fields (4 or 8
//! bytes, naturally aligned) are written with a single atomic store.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use relive_sdk::Arch;

use crate::error::PatchError;
use crate::patcher::CodePatcher;
use crate::stub::encode_redirect;

/// Patcher operating on the current process
pub struct NativePatcher {
    arch: Arch,
}

impl NativePatcher {
    /// Create a patcher for the host architecture
    ///
    /// # Safety
    /// Every address later handed to this patcher must lie in memory of this
    /// process that may be overwritten: code of loaded generations, or data
    /// fields inside it. The patcher cannot tell a stale address from a live one.
    pub unsafe fn new() -> Result<Self, PatchError> {
        let arch = Arch::host()
            .ok_or_else(|| PatchError::Unsupported("host architecture".to_string()))?;
        Ok(Self { arch })
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Check that every page covering the range carries `protection`
    fn range_has(address: usize, len: usize, protection: region::Protection) -> Result<bool, PatchError> {
        let mut all = true;
        for page in region::query_range(address as *const u8, len)
            .map_err(|_| PatchError::Unmapped(address))?
        {
            let page = page.map_err(|_| PatchError::Unmapped(address))?;
            all &= page.protection().contains(protection);
        }
        Ok(all)
    }

    fn write(&self, address: usize, bytes: &[u8]) -> Result<(), PatchError> {
        if address == 0 {
            return Err(PatchError::Unmapped(address));
        }

        // Code pages are usually read/execute; open them up for the duration of the write
        let _guard = if Self::range_has(address, bytes.len(), region::Protection::WRITE)? {
            None
        } else {
            let guard = unsafe {
                region::protect_with_handle(
                    address as *const u8,
                    bytes.len(),
                    region::Protection::READ_WRITE_EXECUTE,
                )
            }
            .map_err(|e| PatchError::MemoryProtection(e.to_string()))?;
            Some(guard)
        };

        unsafe { store(address, bytes) };
        flush_icache(address, bytes.len());

        tracing::trace!("Patched {} bytes at {:#x}", bytes.len(), address);
        Ok(())
    }
}

impl CodePatcher for NativePatcher {
    fn install_redirect(&self, from: usize, to: usize) -> Result<(), PatchError> {
        let stub = encode_redirect(self.arch, from, to)?;
        self.write(from, &stub)
    }

    fn patch_bytes(&self, address: usize, bytes: &[u8]) -> Result<(), PatchError> {
        self.write(address, bytes)
    }

    fn read_bytes(&self, address: usize, buf: &mut [u8]) -> Result<(), PatchError> {
        if address == 0 || !Self::range_has(address, buf.len(), region::Protection::READ)? {
            return Err(PatchError::Unmapped(address));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(address as *const u8, buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }
}

/// Store `bytes` at `address`, atomically when it is an aligned 4/8-byte field
///
/// # Safety
/// The range must be mapped writable.
unsafe fn store(address: usize, bytes: &[u8]) {
    if let Ok(word) = <[u8; 4]>::try_from(bytes) {
        if address % 4 == 0 {
            AtomicU32::from_ptr(address as *mut u32).store(u32::from_ne_bytes(word), Ordering::SeqCst);
            return;
        }
    }
    if let Ok(word) = <[u8; 8]>::try_from(bytes) {
        if address % 8 == 0 {
            AtomicU64::from_ptr(address as *mut u64).store(u64::from_ne_bytes(word), Ordering::SeqCst);
            return;
        }
    }
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len());
}

#[cfg(target_arch = "aarch64")]
fn flush_icache(address: usize, len: usize) {
    use std::arch::asm;

    let ctr: u64;
    unsafe { asm!("mrs {}, ctr_el0", out(reg) ctr, options(nomem, nostack)) };
    let dline = 4usize << ((ctr >> 16) & 0xF);
    let iline = 4usize << (ctr & 0xF);
    let end = address + len;

    unsafe {
        let mut line = address & !(dline - 1);
        while line < end {
            asm!("dc cvau, {}", in(reg) line, options(nostack));
            line += dline;
        }
        asm!("dsb ish", options(nostack));

        let mut line = address & !(iline - 1);
        while line < end {
            asm!("ic ivau, {}", in(reg) line, options(nostack));
            line += iline;
        }
        asm!("dsb ish", "isb", options(nostack));
    }
}

#[cfg(not(target_arch = "aarch64"))]
fn flush_icache(_address: usize, _len: usize) {
    // x86 keeps instruction fetch coherent with stores
}
