//! Simulated address space
//!
//! [`SimulatedMemory`] implements [`CodePatcher`] over byte regions mapped at
//! chosen addresses and a redirect table. It lets the reload steps run
//! without touching real process memory (dry runs, tests), and it can be told
//! to fail specific redirects or writes with an opaque status code.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::error::PatchError;
use crate::patcher::CodePatcher;

/// Longest redirect chain followed by [`SimulatedMemory::resolve_call`]
const MAX_REDIRECT_CHAIN: usize = 64;

#[derive(Default)]
struct Inner {
    /// Mapped regions keyed by base address
    regions: BTreeMap<usize, Vec<u8>>,

    /// Installed redirects: old function address -> new function address
    redirects: HashMap<usize, usize>,

    /// Injected failures
    failing_redirects: HashMap<usize, i32>,
    failing_patches: HashMap<usize, i32>,

    /// Number of successful writes
    patch_count: usize,
}

impl Inner {
    /// Locate `len` bytes at `address` inside a single region
    fn locate(&self, address: usize, len: usize) -> Option<(usize, usize)> {
        let (&base, bytes) = self.regions.range(..=address).next_back()?;
        let start = address - base;
        let end = start.checked_add(len)?;
        (end <= bytes.len()).then_some((base, start))
    }
}

/// In-memory stand-in for process memory
#[derive(Default)]
pub struct SimulatedMemory {
    inner: Mutex<Inner>,
}

impl SimulatedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `bytes` at `base`, replacing any region already mapped there
    pub fn map(&self, base: usize, bytes: Vec<u8>) {
        self.inner.lock().regions.insert(base, bytes);
    }

    /// Map `len` zero bytes at `base`
    pub fn map_zeroed(&self, base: usize, len: usize) {
        self.map(base, vec![0; len]);
    }

    /// Make redirects installed at `from` fail with `status`
    pub fn fail_redirect(&self, from: usize, status: i32) {
        self.inner.lock().failing_redirects.insert(from, status);
    }

    /// Make writes starting at `address` fail with `status`
    pub fn fail_patch(&self, address: usize, status: i32) {
        self.inner.lock().failing_patches.insert(address, status);
    }

    /// Redirect installed at `from`, if any
    pub fn redirect_target(&self, from: usize) -> Option<usize> {
        self.inner.lock().redirects.get(&from).copied()
    }

    /// Address a call to `address` finally executes, following redirects
    pub fn resolve_call(&self, address: usize) -> usize {
        let inner = self.inner.lock();
        let mut current = address;
        for _ in 0..MAX_REDIRECT_CHAIN {
            match inner.redirects.get(&current) {
                Some(&next) => current = next,
                None => break,
            }
        }
        current
    }

    /// Number of redirects installed so far
    pub fn redirect_count(&self) -> usize {
        self.inner.lock().redirects.len()
    }

    /// Number of successful byte patches so far
    pub fn patch_count(&self) -> usize {
        self.inner.lock().patch_count
    }
}

impl CodePatcher for SimulatedMemory {
    fn install_redirect(&self, from: usize, to: usize) -> Result<(), PatchError> {
        let mut inner = self.inner.lock();
        if let Some(&status) = inner.failing_redirects.get(&from) {
            return Err(PatchError::Status(status));
        }
        inner.redirects.insert(from, to);
        Ok(())
    }

    fn patch_bytes(&self, address: usize, bytes: &[u8]) -> Result<(), PatchError> {
        let mut inner = self.inner.lock();
        if let Some(&status) = inner.failing_patches.get(&address) {
            return Err(PatchError::Status(status));
        }

        let (base, start) = inner
            .locate(address, bytes.len())
            .ok_or(PatchError::Unmapped(address))?;
        if let Some(region) = inner.regions.get_mut(&base) {
            region[start..start + bytes.len()].copy_from_slice(bytes);
        }
        inner.patch_count += 1;
        Ok(())
    }

    fn read_bytes(&self, address: usize, buf: &mut [u8]) -> Result<(), PatchError> {
        let inner = self.inner.lock();
        let (base, start) = inner
            .locate(address, buf.len())
            .ok_or(PatchError::Unmapped(address))?;
        let region = &inner.regions[&base];
        buf.copy_from_slice(&region[start..start + buf.len()]);
        Ok(())
    }
}
