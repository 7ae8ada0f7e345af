//! Generation registry
//!
//! Append-only, oldest first. The first entry is the original binary; each
//! successful reload appends one program. Programs are never reordered or
//! removed.

use relive_sdk::{Program, Symbol};

/// Every generation loaded in this session
#[derive(Debug, Clone)]
pub struct ProgramRegistry {
    programs: Vec<Program>,
}

impl ProgramRegistry {
    /// Start a registry from the original binary's program
    pub fn new(original: Program) -> Self {
        Self {
            programs: vec![original],
        }
    }

    /// Append a generation; it becomes [`ProgramRegistry::current`]
    pub fn push(&mut self, program: Program) {
        self.programs.push(program);
    }

    /// Newest generation
    pub fn current(&self) -> &Program {
        // A registry always holds at least the original program
        &self.programs[self.programs.len() - 1]
    }

    /// Oldest generation (the original binary)
    pub fn original(&self) -> &Program {
        &self.programs[0]
    }

    pub fn get(&self, generation: usize) -> Option<&Program> {
        self.programs.get(generation)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate generations, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Program> {
        self.programs.iter()
    }

    /// Most recent function matching (name, hash)
    ///
    /// If the function was already redirected by an earlier reload, the most
    /// recent copy is the one still receiving calls.
    pub fn find_latest_function(&self, name: &str, hash: u64) -> Option<&Symbol> {
        self.programs
            .iter()
            .rev()
            .find_map(|program| program.symbols.find_function(name, hash))
    }

    /// Oldest variable matching (name, hash): the persistent instance
    pub fn find_persistent_variable(&self, name: &str, hash: u64) -> Option<&Symbol> {
        self.programs
            .iter()
            .find_map(|program| program.symbols.find_variable(name, hash))
    }
}
