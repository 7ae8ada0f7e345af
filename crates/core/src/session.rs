//! Live session
//!
//! Owns the [`LiveContext`] for one running process and applies each newly
//! built module in turn.

use relive_engine::{CodePatcher, ProgramInfoLoader};
use relive_sdk::{Arch, Program};

use crate::config::LiveConfig;
use crate::context::LiveContext;
use crate::events::{ListenerKey, LiveListener, LogSeverity};
use crate::steps::{FunctionsHookingStep, LinkTimeRelocationsStep, ReloadStep, StepReport};

/// Outcome of one [`LiveSession::reload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
    /// `None` when hooking is disabled in the config
    pub hooked: Option<StepReport>,

    /// `None` when relocation is disabled in the config
    pub relocated: Option<StepReport>,

    /// Registry index of the new program
    pub generation: usize,
}

/// Hot-reload session for one process
pub struct LiveSession {
    context: LiveContext,
    config: LiveConfig,
}

impl LiveSession {
    pub fn new<P, L>(
        arch: Arch,
        original: Program,
        patcher: P,
        program_info_loader: L,
        config: LiveConfig,
    ) -> Self
    where
        P: CodePatcher + 'static,
        L: ProgramInfoLoader + 'static,
    {
        tracing::debug!(
            "Live session for {} with {} functions, {} variables",
            arch,
            original.symbols.function_count(),
            original.symbols.variable_count()
        );
        Self {
            context: LiveContext::new(arch, original, patcher, program_info_loader),
            config,
        }
    }

    pub fn context(&self) -> &LiveContext {
        &self.context
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Register a listener for logs and load notifications
    pub fn add_listener(&mut self, listener: impl LiveListener + 'static) -> ListenerKey {
        self.context.events.add_listener(Box::new(listener))
    }

    pub fn remove_listener(&mut self, key: ListenerKey) -> bool {
        self.context.events.remove_listener(key)
    }

    /// Apply a freshly loaded module
    ///
    /// `new_program` must carry runtime addresses for all its symbols and the
    /// object files it was linked from. Failures of individual symbols or
    /// relocations are logged and skipped; the program is always appended.
    pub fn reload(&mut self, mut new_program: Program) -> ReloadSummary {
        let events = &self.context.events;
        events.code_pre_load();
        events.add_log(
            LogSeverity::Info,
            format!("Reloading generation {}", self.context.programs.len()),
        );

        let hooked = self
            .config
            .hook_functions
            .then(|| FunctionsHookingStep.reload(&self.context, &mut new_program));
        let relocated = self
            .config
            .relocate_variables
            .then(|| LinkTimeRelocationsStep.reload(&self.context, &mut new_program));

        let generation = self.context.programs.len();
        self.context.programs.push(new_program);

        let events = &self.context.events;
        events.add_log(LogSeverity::Info, "Code reloaded");
        events.code_post_load();

        ReloadSummary {
            hooked,
            relocated,
            generation,
        }
    }
}
