//! One loaded generation of code

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::symbol::Symbols;

/// A generation: the original binary, or the shared object built by one reload
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Symbols defined by this generation
    pub symbols: Symbols,

    /// Object files the generation was linked from
    pub object_file_paths: BTreeSet<PathBuf>,
}

impl Program {
    pub fn new(symbols: Symbols) -> Self {
        Self {
            symbols,
            object_file_paths: BTreeSet::new(),
        }
    }

    /// Attach the object files this generation was built from
    pub fn with_object_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.object_file_paths
            .extend(paths.into_iter().map(Into::into));
        self
    }
}
