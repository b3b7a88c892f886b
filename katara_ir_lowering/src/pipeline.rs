//! Composes the individual passes in this crate into the end-to-end build
//! pipeline (§4.6): extension-aware checking, the two optional ownership
//! optimizers, the two mandatory pointer lowerings, a primitive-only
//! re-check, and an optional dead-function sweep — checking again after
//! every stage that can change well-formedness so a bug in one pass is
//! caught before the next pass has to cope with an already-malformed
//! program.

use crate::remove_unused::remove_unused_functions;
use crate::runtime::SharedPointerRuntimeFuncs;
use crate::shared_pointer::lower_shared_pointers_in_program;
use crate::shared_to_unique::convert_shared_to_unique_pointers_in_program;
use crate::unique_pointer::lower_unique_pointers_in_program;
use crate::unique_to_local::promote_unique_pointers_to_locals_in_program;
use katara_common::issues::IssueTracker;
use katara_ir::program::Program;
use katara_ir_check::{check_program, CheckerIssueKind};
use katara_ir_serialization::positions::ProgramPositions;

/// Which optional stages to run. The two mandatory lowerings (shared and
/// unique pointers down to `ptr`) always run; everything here gates an
/// optimization or cleanup pass that changes the program without being
/// required for it to lower successfully.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Run the shared-to-unique pointer optimizer (§4.5.5) before lowering.
    pub convert_shared_to_unique: bool,
    /// Run the unique-to-local-value optimizer (§4.5.6) before lowering.
    pub promote_unique_to_local: bool,
    /// Remove functions unreachable from the entry function after lowering.
    pub remove_unused_functions: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            convert_shared_to_unique: true,
            promote_unique_to_local: true,
            remove_unused_functions: true,
        }
    }
}

/// Diagnostics collected at each of the pipeline's four check boundaries.
/// Kept as separate trackers, rather than one combined tracker, so a
/// caller can tell which stage a diagnostic came from without having to
/// inspect issue kinds.
#[derive(Debug)]
pub struct PipelineIssues {
    pub initial: IssueTracker<CheckerIssueKind>,
    pub post_optimize: IssueTracker<CheckerIssueKind>,
    pub post_lower: IssueTracker<CheckerIssueKind>,
    pub post_cleanup: IssueTracker<CheckerIssueKind>,
}

impl PipelineIssues {
    fn new() -> Self {
        Self {
            initial: IssueTracker::new(),
            post_optimize: IssueTracker::new(),
            post_lower: IssueTracker::new(),
            post_cleanup: IssueTracker::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.initial.has_errors()
            || self.post_optimize.has_errors()
            || self.post_lower.has_errors()
            || self.post_cleanup.has_errors()
    }
}

/// Runs the full pipeline over `program` in place, per §4.6:
///
/// 1. Check the program as given (extension instructions allowed).
/// 2. Optionally convert shared pointers to unique ones, then promote
///    unique pointers to local values; check again.
/// 3. Lower every remaining shared and unique pointer to a primitive `ptr`.
/// 4. Check the now-primitive-only program.
/// 5. Optionally remove functions unreachable from the entry function;
///    check once more.
///
/// Stops early (skipping later stages) the first time a check boundary
/// reports an error, since later passes assume a well-formed program.
/// Returns the runtime helper functions the shared-pointer lowering added
/// to `program`, so callers can, for example, ensure they're linked in.
pub fn run_pipeline(program: &mut Program, options: PipelineOptions) -> (PipelineIssues, Option<SharedPointerRuntimeFuncs>) {
    let mut issues = PipelineIssues::new();
    let positions = ProgramPositions::new();

    check_program(program, &positions, &mut issues.initial);
    if issues.initial.has_errors() {
        return (issues, None);
    }

    if options.convert_shared_to_unique {
        convert_shared_to_unique_pointers_in_program(program);
    }
    if options.promote_unique_to_local {
        promote_unique_pointers_to_locals_in_program(program);
    }
    check_program(program, &positions, &mut issues.post_optimize);
    if issues.post_optimize.has_errors() {
        return (issues, None);
    }

    let runtime_funcs = lower_shared_pointers_in_program(program);
    lower_unique_pointers_in_program(program);
    check_program(program, &positions, &mut issues.post_lower);
    if issues.post_lower.has_errors() {
        return (issues, Some(runtime_funcs));
    }

    if options.remove_unused_functions {
        remove_unused_functions(program);
    }
    check_program(program, &positions, &mut issues.post_cleanup);

    (issues, Some(runtime_funcs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_ir::instr::Instr;
    use katara_ir::types::{PointerStrength, Type, TypeTable};
    use katara_ir::value::{Computed, Constant, Value};

    #[test]
    fn pipeline_lowers_a_shared_pointer_program_cleanly() {
        let mut program = Program::new();
        let shared_ty = program
            .types_mut()
            .intern(Type::SharedPointer { elem: TypeTable::I64, strength: PointerStrength::Strong });
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(TypeTable::I64);
        let b0 = func.add_block(None);
        let p = Computed::new(func.fresh_value_number(None), shared_ty);
        func.block_mut(b0).unwrap().push_instr(Instr::MakeShared {
            result: p,
            size: Value::Constant(Constant::Int { ty: TypeTable::I64, value: 1 }),
        });
        func.block_mut(b0).unwrap().push_instr(Instr::Store {
            address: Value::Computed(p),
            value: Value::Constant(Constant::Int { ty: TypeTable::I64, value: 7 }),
        });
        let v = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(b0).unwrap().push_instr(Instr::Load { result: v, address: Value::Computed(p) });
        func.block_mut(b0).unwrap().push_instr(Instr::DeleteShared { source: Value::Computed(p) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(v)] });

        let (issues, runtime_funcs) = run_pipeline(&mut program, PipelineOptions::default());

        assert!(!issues.has_errors());
        assert!(runtime_funcs.is_some());
        let func = program.func(f).unwrap();
        assert!(!func.blocks().flat_map(|b| b.instrs()).any(|i| {
            matches!(i, Instr::MakeShared { .. } | Instr::DeleteShared { .. } | Instr::MakeUnique { .. } | Instr::DeleteUnique { .. })
        }));
    }

    #[test]
    fn disabling_optional_stages_leaves_unique_pointers_promotable_form_untouched() {
        let mut program = Program::new();
        let unique_ty = program.types_mut().intern(Type::UniquePointer { elem: TypeTable::I64 });
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(TypeTable::I64);
        let b0 = func.add_block(None);
        let p = Computed::new(func.fresh_value_number(None), unique_ty);
        func.block_mut(b0).unwrap().push_instr(Instr::MakeUnique {
            result: p,
            size: Value::Constant(Constant::Int { ty: TypeTable::I64, value: 1 }),
        });
        func.block_mut(b0).unwrap().push_instr(Instr::Store {
            address: Value::Computed(p),
            value: Value::Constant(Constant::Int { ty: TypeTable::I64, value: 7 }),
        });
        let v = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(b0).unwrap().push_instr(Instr::Load { result: v, address: Value::Computed(p) });
        func.block_mut(b0).unwrap().push_instr(Instr::DeleteUnique { source: Value::Computed(p) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(v)] });

        let options = PipelineOptions {
            convert_shared_to_unique: false,
            promote_unique_to_local: false,
            remove_unused_functions: false,
        };
        let (issues, _) = run_pipeline(&mut program, options);

        assert!(!issues.has_errors());
        let func = program.func(f).unwrap();
        assert!(func.blocks().flat_map(|b| b.instrs()).any(|i| matches!(i, Instr::Malloc { .. })));
    }
}
