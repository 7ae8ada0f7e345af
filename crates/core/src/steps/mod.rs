//! Reload steps
//!
//! Each successful recompilation produces a new [`Program`] whose symbols are
//! already resolved to runtime addresses. The steps run in order on the
//! reloading thread, before the new generation is appended to the registry:
//!
//! 1. [`FunctionsHookingStep`] - redirect superseded functions to the new code
//! 2. [`LinkTimeRelocationsStep`] - make the new code use persistent variables
//!
//! Neither step fails as a whole. A symbol or relocation that cannot be
//! handled is logged and skipped; the rest of the batch proceeds.

mod hooking;
mod relocations;

use std::fmt;

use relive_sdk::Program;

use crate::context::LiveContext;

pub use hooking::FunctionsHookingStep;
pub use relocations::{LinkTimeRelocationsStep, RelocationFailure};

/// Counts reported at the end of a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Units of work that took effect
    pub applied: usize,

    /// Units of work considered
    pub total: usize,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.applied, self.total)
    }
}

/// One stage of applying a new generation
pub trait ReloadStep {
    /// Apply `new_program` against the generations already in `context`
    ///
    /// `new_program` is not yet part of `context.programs`.
    fn reload(&self, context: &LiveContext, new_program: &mut Program) -> StepReport;
}
