//! Live session state handed to the reload steps

use relive_engine::{CodePatcher, ProgramInfoLoader};
use relive_sdk::{Arch, Program};

use crate::events::LiveEvents;
use crate::registry::ProgramRegistry;

/// Everything a reload step reads or acts through
///
/// There is no ambient state: the registry, event dispatch and patching
/// capabilities all live here and are passed by reference into each step.
pub struct LiveContext {
    /// Instruction set of the patched process
    pub arch: Arch,

    /// Every generation loaded so far, oldest first
    pub programs: ProgramRegistry,

    pub events: LiveEvents,

    /// Reads and patches process memory
    pub patcher: Box<dyn CodePatcher>,

    /// Extracts relocations from a new generation's object files
    pub program_info_loader: Box<dyn ProgramInfoLoader>,
}

impl LiveContext {
    pub fn new<P, L>(arch: Arch, original: Program, patcher: P, program_info_loader: L) -> Self
    where
        P: CodePatcher + 'static,
        L: ProgramInfoLoader + 'static,
    {
        Self {
            arch,
            programs: ProgramRegistry::new(original),
            events: LiveEvents::new(),
            patcher: Box::new(patcher),
            program_info_loader: Box::new(program_info_loader),
        }
    }
}
