//! Symbols and per-generation symbol tables
//!
//! Addresses are plain integers. Nothing in this crate dereferences them;
//! only the engine's code patcher touches process memory.

use std::collections::BTreeMap;

/// What a symbol names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Variable,
}

/// A function or variable as it exists in one compiled generation
///
/// Two symbols are the same binding across generations when both `name` and
/// `hash` match. A changed hash means the definition changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    /// Linkage name
    pub name: String,

    /// Fingerprint of the symbol's signature/definition
    pub hash: u64,

    /// Address of the symbol in this process
    pub runtime_address: usize,

    pub kind: SymbolKind,
}

impl Symbol {
    /// Create a function symbol
    pub fn function(name: impl Into<String>, hash: u64, runtime_address: usize) -> Self {
        Self {
            name: name.into(),
            hash,
            runtime_address,
            kind: SymbolKind::Function,
        }
    }

    /// Create a variable symbol
    pub fn variable(name: impl Into<String>, hash: u64, runtime_address: usize) -> Self {
        Self {
            name: name.into(),
            hash,
            runtime_address,
            kind: SymbolKind::Variable,
        }
    }

    /// Check whether `other` is the same binding (name and hash)
    #[inline]
    pub fn same_binding(&self, name: &str, hash: u64) -> bool {
        self.hash == hash && self.name == name
    }
}

/// Symbol table of one generation
///
/// Several entries may share a name (overloads, internal-linkage duplicates
/// across translation units). Insertion order within a name is preserved and
/// names iterate in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Symbols {
    functions: BTreeMap<String, Vec<Symbol>>,
    variables: BTreeMap<String, Vec<Symbol>>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a symbol under its name in the map matching its kind
    pub fn add(&mut self, symbol: Symbol) {
        let map = match symbol.kind {
            SymbolKind::Function => &mut self.functions,
            SymbolKind::Variable => &mut self.variables,
        };
        map.entry(symbol.name.clone()).or_default().push(symbol);
    }

    /// Builder-style [`Symbols::add`]
    pub fn with(mut self, symbol: Symbol) -> Self {
        self.add(symbol);
        self
    }

    /// Find a function by exact (name, hash)
    pub fn find_function(&self, name: &str, hash: u64) -> Option<&Symbol> {
        Self::find_in(&self.functions, name, hash)
    }

    /// Find a variable by exact (name, hash)
    pub fn find_variable(&self, name: &str, hash: u64) -> Option<&Symbol> {
        Self::find_in(&self.variables, name, hash)
    }

    fn find_in<'a>(
        map: &'a BTreeMap<String, Vec<Symbol>>,
        name: &str,
        hash: u64,
    ) -> Option<&'a Symbol> {
        map.get(name)?.iter().find(|s| s.hash == hash)
    }

    /// All entries registered under a variable name
    pub fn variables_named(&self, name: &str) -> Option<&[Symbol]> {
        self.variables.get(name).map(Vec::as_slice)
    }

    /// All entries registered under a function name
    pub fn functions_named(&self, name: &str) -> Option<&[Symbol]> {
        self.functions.get(name).map(Vec::as_slice)
    }

    /// Remove the first variable entry matching (name, hash)
    ///
    /// Drops the name key once no entries remain under it.
    /// Returns `true` if an entry was removed.
    pub fn remove_variable(&mut self, name: &str, hash: u64) -> bool {
        let Some(entries) = self.variables.get_mut(name) else {
            return false;
        };

        let removed = match entries.iter().position(|s| s.hash == hash) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        };

        if entries.is_empty() {
            self.variables.remove(name);
        }
        removed
    }

    /// Iterate every function entry, names in order
    pub fn functions(&self) -> impl Iterator<Item = &Symbol> {
        self.functions.values().flatten()
    }

    /// Iterate every variable entry, names in order
    pub fn variables(&self) -> impl Iterator<Item = &Symbol> {
        self.variables.values().flatten()
    }

    /// Number of function entries (not names)
    pub fn function_count(&self) -> usize {
        self.functions.values().map(Vec::len).sum()
    }

    /// Number of variable entries (not names)
    pub fn variable_count(&self) -> usize {
        self.variables.values().map(Vec::len).sum()
    }
}
