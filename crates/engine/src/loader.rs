//! Object info loading
//!
//! Extracting relocations from object files is the job of an object parser
//! living outside this workspace. The reload steps only see the
//! [`ProgramInfoLoader`] capability.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use relive_sdk::RelocationRecord;

/// Source of link-time relocations for a freshly built module
pub trait ProgramInfoLoader {
    /// Relocations of the module linked from `object_files`, in order
    ///
    /// Every returned record has `size` 4 or 8.
    fn link_time_relocations(&self, object_files: &BTreeSet<PathBuf>) -> Vec<RelocationRecord>;
}

/// Loader serving relocations that were extracted ahead of time
///
/// Used when the object parser runs out of process and ships its results
/// back, and as a fixture in tests.
#[derive(Debug, Default, Clone)]
pub struct StaticRelocations {
    by_object: HashMap<PathBuf, Vec<RelocationRecord>>,
}

impl StaticRelocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the relocations found in one object file
    pub fn insert(&mut self, object_file: impl Into<PathBuf>, records: Vec<RelocationRecord>) {
        self.by_object
            .entry(object_file.into())
            .or_default()
            .extend(records);
    }

    /// Builder-style [`StaticRelocations::insert`]
    pub fn with(mut self, object_file: impl Into<PathBuf>, records: Vec<RelocationRecord>) -> Self {
        self.insert(object_file, records);
        self
    }

    /// Relocations registered for a single object file
    pub fn get(&self, object_file: &Path) -> Option<&[RelocationRecord]> {
        self.by_object.get(object_file).map(Vec::as_slice)
    }
}

impl ProgramInfoLoader for StaticRelocations {
    fn link_time_relocations(&self, object_files: &BTreeSet<PathBuf>) -> Vec<RelocationRecord> {
        let mut records = Vec::new();
        for path in object_files {
            match self.by_object.get(path) {
                Some(found) => records.extend(found.iter().cloned()),
                None => tracing::debug!("No relocations recorded for {:?}", path),
            }
        }
        records
    }
}
