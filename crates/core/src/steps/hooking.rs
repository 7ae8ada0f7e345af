//! Function hooking step
//!
//! For every function in the new generation, find the most recent earlier
//! copy with the same name and hash and redirect it to the new body.

use relive_sdk::Program;

use super::{ReloadStep, StepReport};
use crate::context::LiveContext;
use crate::events::LogSeverity;

/// Redirects superseded functions to their newest implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct FunctionsHookingStep;

impl ReloadStep for FunctionsHookingStep {
    fn reload(&self, context: &LiveContext, new_program: &mut Program) -> StepReport {
        let events = &context.events;
        events.add_log(LogSeverity::Debug, "Hooking functions...");

        let mut report = StepReport {
            applied: 0,
            total: new_program.symbols.function_count(),
        };

        for sym in new_program.symbols.functions() {
            // Newest first: an earlier reload may already have redirected older copies
            let Some(old) = context.programs.find_latest_function(&sym.name, sym.hash) else {
                continue;
            };

            let old_func = old.runtime_address;
            let new_func = sym.runtime_address;
            match context.patcher.install_redirect(old_func, new_func) {
                Ok(()) => {
                    tracing::trace!("Hooked {} {:#x} -> {:#x}", sym.name, old_func, new_func);
                    report.applied += 1;
                }
                Err(e) => events.add_log(
                    LogSeverity::Error,
                    format!("Cannot hook function: {}, {}", sym.name, e),
                ),
            }
        }

        events.add_log(LogSeverity::Debug, format!("Done, hooked: {}", report));
        report
    }
}
