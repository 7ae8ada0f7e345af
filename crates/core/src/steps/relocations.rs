//! Link-time relocation step
//!
//! New code is compiled against its own copies of global and static
//! variables. For every relocation that references a variable an earlier
//! generation already defines, rewrite the field so it addresses the oldest
//! surviving (persistent) instance, then forget the new copy.

use std::collections::BTreeSet;

use relive_engine::PatchError;
use relive_sdk::{Program, RelocationRecord};

use super::{ReloadStep, StepReport};
use crate::context::LiveContext;
use crate::events::LogSeverity;
use crate::reloc::{EncodeError, PatchSite, RelocationKind};

/// Why a single relocation was skipped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelocationFailure {
    #[error("targetSymbol not found: {name} {hash}")]
    TargetNotFound { name: String, hash: u64 },

    #[error("relocSymbol not found: {name} {hash}")]
    SymbolNotFound { name: String, hash: u64 },

    #[error("Unsupported relocation size {size} for {name}")]
    InvalidSize { name: String, size: u8 },

    #[error("Unsupported relocation type {r_type} for {name}")]
    UnknownType { name: String, r_type: u32 },

    #[error("Cannot apply relocation for {name}, distance doesn't fit into max allowed distance")]
    DistanceTooLarge { name: String },

    #[error("Cannot apply relocation for {name}: {source}")]
    Encoding { name: String, source: EncodeError },

    #[error("relocation code patch failed for {name}: {source}")]
    PatchFailed { name: String, source: PatchError },
}

impl RelocationFailure {
    /// Range problems degrade in place; everything else is an error
    pub fn severity(&self) -> LogSeverity {
        match self {
            RelocationFailure::DistanceTooLarge { .. }
            | RelocationFailure::Encoding {
                source: EncodeError::OutOfRange(_),
                ..
            } => LogSeverity::Warning,
            _ => LogSeverity::Error,
        }
    }
}

/// Retargets references in new code to persistent variable instances
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkTimeRelocationsStep;

impl LinkTimeRelocationsStep {
    /// Apply one record
    ///
    /// Returns `Ok(None)` when no earlier generation defines the variable:
    /// the new copy is the persistent instance and nothing needs patching.
    fn relocate(
        &self,
        context: &LiveContext,
        new_program: &Program,
        reloc: &RelocationRecord,
    ) -> Result<Option<(String, u64)>, RelocationFailure> {
        let symbols = &new_program.symbols;

        let target = symbols
            .find_function(&reloc.target_symbol_name, reloc.target_symbol_hash)
            .ok_or_else(|| RelocationFailure::TargetNotFound {
                name: reloc.target_symbol_name.clone(),
                hash: reloc.target_symbol_hash,
            })?;

        let reloc_symbol = symbols
            .find_variable(&reloc.relocation_symbol_name, reloc.relocation_symbol_hash)
            .ok_or_else(|| RelocationFailure::SymbolNotFound {
                name: reloc.relocation_symbol_name.clone(),
                hash: reloc.relocation_symbol_hash,
            })?;

        let Some(old_var) = context
            .programs
            .find_persistent_variable(&reloc.relocation_symbol_name, reloc.relocation_symbol_hash)
        else {
            return Ok(None);
        };

        let name = &reloc_symbol.name;
        let max_distance = match reloc.size {
            4 => i32::MAX as u64,
            8 => i64::MAX as u64,
            size => {
                return Err(RelocationFailure::InvalidSize {
                    name: name.clone(),
                    size,
                })
            }
        };
        let distance = old_var.runtime_address.abs_diff(reloc_symbol.runtime_address) as u64;
        if distance > max_distance {
            return Err(RelocationFailure::DistanceTooLarge { name: name.clone() });
        }

        let kind = RelocationKind::classify(context.arch, reloc.r_type).ok_or_else(|| {
            RelocationFailure::UnknownType {
                name: name.clone(),
                r_type: reloc.r_type,
            }
        })?;

        let reloc_address = target
            .runtime_address
            .checked_add_signed(reloc.offset as isize)
            .ok_or_else(|| RelocationFailure::PatchFailed {
                name: name.clone(),
                source: PatchError::Unmapped(target.runtime_address),
            })?;

        let site = PatchSite {
            address: reloc_address,
            size: reloc.size,
            persistent: old_var.runtime_address,
            fresh: reloc_symbol.runtime_address,
        };

        let patch_failed = |source| RelocationFailure::PatchFailed {
            name: name.clone(),
            source,
        };

        let width = usize::from(reloc.size);
        let mut field = [0u8; 8];
        context
            .patcher
            .read_bytes(reloc_address, &mut field[..width])
            .map_err(patch_failed)?;
        let current = u64::from_le_bytes(field);

        let value = kind
            .encode(&site, current)
            .map_err(|source| RelocationFailure::Encoding {
                name: name.clone(),
                source,
            })?;

        context
            .patcher
            .patch_bytes(reloc_address, &value.to_le_bytes()[..width])
            .map_err(patch_failed)?;

        Ok(Some((reloc_symbol.name.clone(), reloc_symbol.hash)))
    }
}

impl ReloadStep for LinkTimeRelocationsStep {
    fn reload(&self, context: &LiveContext, new_program: &mut Program) -> StepReport {
        let events = &context.events;
        events.add_log(LogSeverity::Debug, "Loading link-time relocations...");

        let relocs = context
            .program_info_loader
            .link_time_relocations(&new_program.object_file_paths);

        let mut report = StepReport {
            applied: 0,
            total: relocs.len(),
        };
        let mut relocated: BTreeSet<(String, u64)> = BTreeSet::new();

        for reloc in &relocs {
            match self.relocate(context, new_program, reloc) {
                Ok(Some(symbol)) => {
                    events.add_log(LogSeverity::Debug, format!("{} was relocated", symbol.0));
                    relocated.insert(symbol);
                    report.applied += 1;
                }
                Ok(None) => {}
                Err(failure) => events.add_log(failure.severity(), failure.to_string()),
            }
        }

        // The new copies are dead now; later lookups must only find the persistent instance
        for (name, hash) in &relocated {
            new_program.symbols.remove_variable(name, *hash);
        }

        events.add_log(LogSeverity::Debug, format!("Done, relocated: {}", report));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reloc::macho_arm64::*;
    use crate::steps::fixtures::{harness, Harness};
    use relive_engine::{CodePatcher, StaticRelocations};
    use relive_sdk::{Arch, Symbol, Symbols};

    const OBJ: &str = "module.o";

    fn record(target: &str, var: &str, offset: i64, size: u8, r_type: u32) -> RelocationRecord {
        RelocationRecord {
            target_symbol_name: target.to_string(),
            target_symbol_hash: 10,
            relocation_symbol_name: var.to_string(),
            relocation_symbol_hash: 20,
            offset,
            size,
            r_type,
        }
    }

    /// Original defines `v` at `old_v`; gen1 has function `f` at 0x9000 and a fresh `v`
    fn setup(arch: Arch, old_v: usize, new_v: usize, records: Vec<RelocationRecord>) -> (Harness, Program) {
        let original = Program::new(Symbols::new().with(Symbol::variable("v", 20, old_v)));
        let h = harness(arch, original, StaticRelocations::new().with(OBJ, records));
        h.memory.map_zeroed(0x9000, 0x100);

        let gen1 = Program::new(
            Symbols::new()
                .with(Symbol::function("f", 10, 0x9000))
                .with(Symbol::variable("v", 20, new_v)),
        )
        .with_object_files([OBJ]);
        (h, gen1)
    }

    #[test]
    fn test_delta_patch_retargets_field() {
        let (h, mut gen1) = setup(
            Arch::X86_64,
            0x1000_0000,
            0x1000_8000,
            vec![record("f", "v", 0x10, 4, 0)],
        );
        // Displacement as compiled against the new copy
        h.memory.patch_bytes(0x9010, &0x7000u32.to_le_bytes()).unwrap();

        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(report, StepReport { applied: 1, total: 1 });
        assert_eq!(h.memory.read_u32(0x9010).unwrap() as i32, 0x7000 - 0x8000);
        assert!(gen1.symbols.find_variable("v", 20).is_none());
        assert!(gen1.symbols.variables_named("v").is_none());
        assert_eq!(h.logs.messages(LogSeverity::Debug).last().unwrap(), "Done, relocated: 1/1");
    }

    #[test]
    fn test_new_variable_needs_no_patch() {
        let original = Program::new(Symbols::new());
        let loader = StaticRelocations::new().with(OBJ, vec![record("f", "v", 0, 4, 0)]);
        let h = harness(Arch::X86_64, original, loader);
        h.memory.map_zeroed(0x9000, 0x10);

        let mut gen1 = Program::new(
            Symbols::new()
                .with(Symbol::function("f", 10, 0x9000))
                .with(Symbol::variable("v", 20, 0xA000)),
        )
        .with_object_files([OBJ]);
        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(report, StepReport { applied: 0, total: 1 });
        assert_eq!(h.memory.patch_count(), 0);
        assert_eq!(h.logs.count(LogSeverity::Error), 0);
        assert_eq!(h.logs.count(LogSeverity::Warning), 0);
        // First definition stays discoverable
        assert!(gen1.symbols.find_variable("v", 20).is_some());
    }

    #[test]
    fn test_missing_target_logs_once_and_continues() {
        let (h, mut gen1) = setup(
            Arch::X86_64,
            0x1000_0000,
            0x1000_8000,
            vec![record("missing", "v", 0, 4, 0), record("f", "v", 0x20, 4, 0)],
        );

        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(report, StepReport { applied: 1, total: 2 });
        assert_eq!(
            h.logs.messages(LogSeverity::Error),
            vec!["targetSymbol not found: missing 10"]
        );
        assert_eq!(h.memory.read_u32(0x9020).unwrap() as i32, -0x8000);
    }

    #[test]
    fn test_missing_relocation_symbol_logs_once_and_continues() {
        let (h, mut gen1) = setup(
            Arch::X86_64,
            0x1000_0000,
            0x1000_8000,
            vec![record("f", "ghost", 0, 4, 0), record("f", "v", 0x20, 4, 0)],
        );

        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(report.applied, 1);
        assert_eq!(
            h.logs.messages(LogSeverity::Error),
            vec!["relocSymbol not found: ghost 20"]
        );
    }

    #[test]
    fn test_distance_out_of_range_is_skipped() {
        let (h, mut gen1) = setup(
            Arch::X86_64,
            0x1000,
            0x1_0000_2000,
            vec![record("f", "v", 0x10, 4, 0)],
        );
        h.memory.patch_bytes(0x9010, &0x1234u32.to_le_bytes()).unwrap();
        let patches_before = h.memory.patch_count();

        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(report.applied, 0);
        assert_eq!(h.memory.read_u32(0x9010).unwrap(), 0x1234);
        assert_eq!(h.memory.patch_count(), patches_before);
        assert_eq!(
            h.logs.messages(LogSeverity::Warning),
            vec!["Cannot apply relocation for v, distance doesn't fit into max allowed distance"]
        );
        // Degraded in place: the new copy remains in use
        assert!(gen1.symbols.find_variable("v", 20).is_some());
    }

    #[test]
    fn test_eight_byte_field_accepts_large_distance() {
        let (h, mut gen1) = setup(
            Arch::X86_64,
            0x1000,
            0x1_0000_2000,
            vec![record("f", "v", 0x10, 8, 0)],
        );
        h.memory
            .patch_bytes(0x9010, &0x1_0000_2000u64.to_le_bytes())
            .unwrap();

        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(report.applied, 1);
        assert_eq!(h.memory.read_u64(0x9010).unwrap(), 0x1000);
    }

    #[test]
    fn test_patch_failure_is_isolated() {
        let (h, mut gen1) = setup(
            Arch::X86_64,
            0x1000_0000,
            0x1000_8000,
            vec![record("f", "v", 0x10, 4, 0), record("f", "v", 0x20, 4, 0)],
        );
        h.memory.fail_patch(0x9010, 9);

        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(report.applied, 1);
        assert_eq!(
            h.logs.messages(LogSeverity::Error),
            vec!["relocation code patch failed for v: status 9"]
        );
        assert_eq!(h.memory.read_u32(0x9010).unwrap(), 0);
        assert_eq!(h.memory.read_u32(0x9020).unwrap() as i32, -0x8000);
    }

    #[test]
    fn test_invalid_size_is_rejected() {
        let (h, mut gen1) = setup(
            Arch::X86_64,
            0x1000_0000,
            0x1000_8000,
            vec![record("f", "v", 0x10, 2, 0)],
        );

        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(report.applied, 0);
        assert_eq!(h.logs.count(LogSeverity::Error), 1);
        assert_eq!(h.memory.patch_count(), 0);
    }

    #[test]
    fn test_cleanup_keeps_other_entries_under_name() {
        let original = Program::new(Symbols::new().with(Symbol::variable("v", 20, 0x1000_0000)));
        let loader = StaticRelocations::new().with(OBJ, vec![record("f", "v", 0, 4, 0)]);
        let h = harness(Arch::X86_64, original, loader);
        h.memory.map_zeroed(0x9000, 0x10);

        let mut gen1 = Program::new(
            Symbols::new()
                .with(Symbol::function("f", 10, 0x9000))
                .with(Symbol::variable("v", 20, 0x1000_8000))
                .with(Symbol::variable("v", 21, 0x1000_9000)),
        )
        .with_object_files([OBJ]);
        LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert!(gen1.symbols.find_variable("v", 20).is_none());
        assert!(gen1.symbols.find_variable("v", 21).is_some());
    }

    #[test]
    fn test_aarch64_adrp_add_pair() {
        let old_v = 0x3_2AB8;
        let (h, mut gen1) = setup(
            Arch::Aarch64,
            old_v,
            0x4_0010,
            vec![
                record("f", "v", 0x0, 4, ARM64_RELOC_PAGE21),
                record("f", "v", 0x4, 4, ARM64_RELOC_PAGEOFF12),
            ],
        );
        // adrp x8, <new page>; add x8, x8, #<new off>
        h.memory.patch_bytes(0x9000, &0xB000_0008u32.to_le_bytes()).unwrap();
        h.memory.patch_bytes(0x9004, &0x9100_4108u32.to_le_bytes()).unwrap();

        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);
        assert_eq!(report, StepReport { applied: 2, total: 2 });

        let adrp = h.memory.read_u32(0x9000).unwrap();
        let add = h.memory.read_u32(0x9004).unwrap();

        let immlo = ((adrp >> 29) & 0x3) as i64;
        let immhi = ((adrp >> 5) & 0x7_FFFF) as i64;
        let pages = (((immhi << 2) | immlo) << 43) >> 43;
        let page = (0x9000i64 & !0xFFF) + (pages << 12);
        let offset = ((add >> 10) & 0xFFF) as i64;
        assert_eq!((page + offset) as usize, old_v);
        // Destination registers untouched
        assert_eq!(adrp & 0x1F, 8);
        assert_eq!(add & 0x3FF, 0x108);
    }

    #[test]
    fn test_aarch64_unsigned_pointer() {
        let (h, mut gen1) = setup(
            Arch::Aarch64,
            0x1_0000_0040,
            0x1_0000_8040,
            vec![record("f", "v", 0x40, 8, ARM64_RELOC_UNSIGNED)],
        );
        h.memory
            .patch_bytes(0x9040, &0x1_0000_8040u64.to_le_bytes())
            .unwrap();

        LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(h.memory.read_u64(0x9040).unwrap(), 0x1_0000_0040);
    }

    #[test]
    fn test_aarch64_unknown_instruction_is_not_patched() {
        let (h, mut gen1) = setup(
            Arch::Aarch64,
            0x1_0000_0040,
            0x1_0000_8040,
            vec![record("f", "v", 0x0, 4, ARM64_RELOC_PAGEOFF12)],
        );
        // b #0: not a PAGEOFF12 instruction shape
        h.memory.patch_bytes(0x9000, &0x1400_0000u32.to_le_bytes()).unwrap();
        let patches_before = h.memory.patch_count();

        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(report.applied, 0);
        assert_eq!(h.memory.read_u32(0x9000).unwrap(), 0x1400_0000);
        assert_eq!(h.memory.patch_count(), patches_before);
        assert_eq!(h.logs.count(LogSeverity::Error), 1);
    }

    #[test]
    fn test_aarch64_unknown_relocation_type() {
        let (h, mut gen1) = setup(
            Arch::Aarch64,
            0x1_0000_0040,
            0x1_0000_8040,
            vec![record("f", "v", 0x0, 4, 2)],
        );

        let report = LinkTimeRelocationsStep.reload(&h.context, &mut gen1);

        assert_eq!(report.applied, 0);
        assert_eq!(
            h.logs.messages(LogSeverity::Error),
            vec!["Unsupported relocation type 2 for v"]
        );
    }

    #[test]
    fn test_severity_mapping() {
        let name = "v".to_string();
        assert_eq!(
            RelocationFailure::DistanceTooLarge { name: name.clone() }.severity(),
            LogSeverity::Warning
        );
        assert_eq!(
            RelocationFailure::Encoding {
                name: name.clone(),
                source: EncodeError::OutOfRange("x".into())
            }
            .severity(),
            LogSeverity::Warning
        );
        assert_eq!(
            RelocationFailure::Encoding {
                name,
                source: EncodeError::Unsupported("x".into())
            }
            .severity(),
            LogSeverity::Error
        );
    }
}
