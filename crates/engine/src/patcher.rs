//! Code patch capability
//!
//! The reload steps never dereference addresses themselves. Every read and
//! write of process memory goes through a [`CodePatcher`].
//!
//! # Concurrency
//!
//! Application threads may be executing the function being redirected, or
//! reading the field being rewritten, while a patch lands. Implementations
//! must perform each relocation write as a single aligned store of the field
//! width so a concurrent fetch sees either the old or the new value. No other
//! synchronisation is taken and other threads are never paused.

use crate::error::PatchError;

/// Capability to read and patch process memory
pub trait CodePatcher {
    /// Make calls arriving at `from` transfer to `to`
    fn install_redirect(&self, from: usize, to: usize) -> Result<(), PatchError>;

    /// Overwrite `bytes.len()` bytes at `address`
    fn patch_bytes(&self, address: usize, bytes: &[u8]) -> Result<(), PatchError>;

    /// Read `buf.len()` bytes starting at `address`
    fn read_bytes(&self, address: usize, buf: &mut [u8]) -> Result<(), PatchError>;

    /// Read a little-endian 32-bit word
    fn read_u32(&self, address: usize) -> Result<u32, PatchError> {
        let mut buf = [0u8; 4];
        self.read_bytes(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a little-endian 64-bit word
    fn read_u64(&self, address: usize) -> Result<u64, PatchError> {
        let mut buf = [0u8; 8];
        self.read_bytes(address, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl<T: CodePatcher + ?Sized> CodePatcher for &T {
    fn install_redirect(&self, from: usize, to: usize) -> Result<(), PatchError> {
        (**self).install_redirect(from, to)
    }

    fn patch_bytes(&self, address: usize, bytes: &[u8]) -> Result<(), PatchError> {
        (**self).patch_bytes(address, bytes)
    }

    fn read_bytes(&self, address: usize, buf: &mut [u8]) -> Result<(), PatchError> {
        (**self).read_bytes(address, buf)
    }
}

impl<T: CodePatcher + ?Sized> CodePatcher for std::sync::Arc<T> {
    fn install_redirect(&self, from: usize, to: usize) -> Result<(), PatchError> {
        (**self).install_redirect(from, to)
    }

    fn patch_bytes(&self, address: usize, bytes: &[u8]) -> Result<(), PatchError> {
        (**self).patch_bytes(address, bytes)
    }

    fn read_bytes(&self, address: usize, buf: &mut [u8]) -> Result<(), PatchError> {
        (**self).read_bytes(address, buf)
    }
}
