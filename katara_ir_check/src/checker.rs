//! The semantic checker (§4.4): SSA well-formedness, dominance, control-flow
//! structure, and per-instruction type rules, grounded on
//! `examples/original_source/src/ir/check/checker.cc` and `.h`. The checker
//! is one pass over one [`Program`] rather than a virtual-dispatch class
//! hierarchy (the original's base/derived-checker split collapses here
//! because extension instructions already live in the one [`Instr`] enum);
//! the split survives as separate *kinds* — `3000s` for base rules, `4000s`
//! for the shared/unique-pointer and string rules — not separate types.

use katara_common::issues::IssueTracker;
use katara_common::position::{Range, NO_RANGE};
use katara_ir::block::Block;
use katara_ir::function::Function;
use katara_ir::instr::Instr;
use katara_ir::program::Program;
use katara_ir::types::{Type, TypeKey};
use katara_ir::value::{BlockNumber, Constant, FuncNumber, Value, ValueNumber};
use katara_ir_serialization::positions::ProgramPositions;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::issues::CheckerIssueKind;

#[derive(Debug, Clone, Copy)]
enum Definition {
    Arg,
    Instr(BlockNumber, usize),
}

/// Checks every function in `program` against §3.5's invariants, reporting
/// into `issues`. `positions` supplies source ranges for diagnostics; pass
/// [`ProgramPositions::new`] (all-default) when checking a program that was
/// never parsed from text, e.g. one produced by a lowering pass.
pub fn check_program(
    program: &Program,
    positions: &ProgramPositions,
    issues: &mut IssueTracker<CheckerIssueKind>,
) {
    let mut checker = Checker { program, positions, issues };
    for func in program.funcs() {
        checker.check_func(func);
    }
}

struct Checker<'a> {
    program: &'a Program,
    positions: &'a ProgramPositions,
    issues: &'a mut IssueTracker<CheckerIssueKind>,
}

impl<'a> Checker<'a> {
    fn instr_range(&self, func_num: FuncNumber, block_num: BlockNumber, idx: usize) -> Range {
        self.positions.instr(func_num, block_num, idx).map(|p| p.opcode).unwrap_or(NO_RANGE)
    }

    fn used_range(&self, func_num: FuncNumber, block_num: BlockNumber, idx: usize, operand: usize) -> Range {
        self.positions.instr(func_num, block_num, idx).map(|p| p.used_at(operand)).unwrap_or(NO_RANGE)
    }

    fn func_range(&self, func: &Function) -> Range {
        self.positions.func(func.number()).map(|p| p.number).unwrap_or(NO_RANGE)
    }

    fn block_range(&self, func_num: FuncNumber, block_num: BlockNumber) -> Range {
        self.positions.block(func_num, block_num).map(|p| p.number).unwrap_or(NO_RANGE)
    }

    fn get(&self, ty: TypeKey) -> &Type {
        self.program.types().get(ty)
    }

    fn is_int(&self, ty: TypeKey) -> bool {
        matches!(self.get(ty), Type::Int(_))
    }

    fn is_pointerish(&self, ty: TypeKey) -> bool {
        matches!(self.get(ty), Type::Pointer | Type::Func | Type::SharedPointer { .. } | Type::UniquePointer { .. })
    }

    fn check_func(&mut self, func: &Function) {
        let Some(entry) = func.entry_block_num() else {
            let range = self.func_range(func);
            self.issues.add_at(
                CheckerIssueKind::FuncHasNoEntryBlock,
                range,
                format!("function @{} has no entry block", func.number()),
            );
            return;
        };
        if !func.block(entry).unwrap().parents().is_empty() {
            let range = self.func_range(func);
            self.issues.add_at(
                CheckerIssueKind::EntryBlockHasParents,
                range,
                format!("entry block {{{entry}}} of @{} has incoming edges", func.number()),
            );
        }
        for block in func.blocks() {
            if block.number() != entry && block.parents().is_empty() {
                let range = self.block_range(func.number(), block.number());
                self.issues.add_at(
                    CheckerIssueKind::NonEntryBlockHasNoParents,
                    range,
                    format!("non-entry block {{{}}} of @{} has no incoming edges", block.number(), func.number()),
                );
            }
        }

        let mut defs: HashMap<ValueNumber, Definition> = HashMap::new();
        for arg in func.args() {
            defs.insert(arg.number, Definition::Arg);
        }
        for block in func.blocks() {
            for (idx, instr) in block.instrs().iter().enumerate() {
                for computed in instr.defined() {
                    let previously_defined =
                        defs.insert(computed.number, Definition::Instr(block.number(), idx)).is_some();
                    if previously_defined {
                        let range = self.instr_range(func.number(), block.number(), idx);
                        self.issues.add_at(
                            CheckerIssueKind::ComputedValueDefinedMultipleTimes,
                            range,
                            format!("%{} is defined more than once in @{}", computed.number, func.number()),
                        );
                    }
                }
            }
        }

        let idom = func.immediate_dominators();

        for block in func.blocks() {
            self.check_block(func, block, &idom, &defs);
        }
    }

    fn check_block(
        &mut self,
        func: &Function,
        block: &Block,
        idom: &BTreeMap<BlockNumber, BlockNumber>,
        defs: &HashMap<ValueNumber, Definition>,
    ) {
        let func_num = func.number();
        let block_num = block.number();

        if !block.phis_precede_non_phis() {
            let range = self.block_range(func_num, block_num);
            self.issues.add_at(
                CheckerIssueKind::PhisNotAtBlockStart,
                range,
                format!("block {{{block_num}}} has a phi after a non-phi instruction"),
            );
        }

        if block.parents().len() < 2 && block.instrs().iter().any(Instr::is_phi) {
            let range = self.block_range(func_num, block_num);
            self.issues.add_at(
                CheckerIssueKind::PhiInBlockWithoutMultipleParents,
                range,
                format!("block {{{block_num}}} has a phi but fewer than two parents"),
            );
        }

        let instrs = block.instrs();
        let early_control_flow =
            instrs.len() > 1 && instrs[..instrs.len() - 1].iter().any(Instr::is_control_flow);
        if early_control_flow {
            let range = self.block_range(func_num, block_num);
            self.issues.add_at(
                CheckerIssueKind::ControlFlowInstrNotLastInBlock,
                range,
                format!("block {{{block_num}}} has a control-flow instruction before its last one"),
            );
        }

        match instrs.last() {
            Some(last) if last.is_control_flow() => {
                let successors: HashSet<BlockNumber> = last.successors().into_iter().collect();
                let children: HashSet<BlockNumber> = block.children().iter().copied().collect();
                if successors != children {
                    let range = self.block_range(func_num, block_num);
                    self.issues.add_at(
                        CheckerIssueKind::JumpTargetNotRecordedAsChild,
                        range,
                        format!(
                            "block {{{block_num}}}'s recorded children {children:?} do not match its terminator's targets {successors:?}"
                        ),
                    );
                }
                for target in last.successors() {
                    if !func.has_block(target) {
                        let range = self.block_range(func_num, block_num);
                        self.issues.add_at(
                            CheckerIssueKind::JumpTargetDoesNotExist,
                            range,
                            format!("block {{{block_num}}} jumps to non-existent block {{{target}}}"),
                        );
                    }
                }
                if let Instr::JumpCond { target_true, target_false, .. } = last {
                    if target_true == target_false {
                        let range = self.block_range(func_num, block_num);
                        self.issues.add_at(
                            CheckerIssueKind::JccDuplicateDestinations,
                            range,
                            format!("block {{{block_num}}}'s jcc has the same true and false destination {{{target_true}}}"),
                        );
                    }
                }
            }
            _ => {
                let range = self.block_range(func_num, block_num);
                self.issues.add_at(
                    CheckerIssueKind::BlockDoesNotEndInControlFlow,
                    range,
                    format!("block {{{block_num}}} does not end with a control-flow instruction"),
                );
            }
        }

        for (idx, instr) in instrs.iter().enumerate() {
            self.check_instr(func, block, idx, instr, idom, defs);
        }
    }

    fn dominates_use(
        &self,
        func: &Function,
        idom: &BTreeMap<BlockNumber, BlockNumber>,
        def: Definition,
        use_block: BlockNumber,
        use_idx: usize,
    ) -> bool {
        match def {
            Definition::Arg => true,
            Definition::Instr(def_block, def_idx) => {
                if def_block == use_block {
                    def_idx < use_idx
                } else {
                    func.dominates(idom, def_block, use_block)
                }
            }
        }
    }

    fn dominates_origin(
        &self,
        func: &Function,
        idom: &BTreeMap<BlockNumber, BlockNumber>,
        def: Definition,
        origin_block: BlockNumber,
    ) -> bool {
        match def {
            Definition::Arg => true,
            Definition::Instr(def_block, _) => def_block == origin_block || func.dominates(idom, def_block, origin_block),
        }
    }

    fn check_use(
        &mut self,
        func: &Function,
        idom: &BTreeMap<BlockNumber, BlockNumber>,
        defs: &HashMap<ValueNumber, Definition>,
        use_block: BlockNumber,
        use_idx: usize,
        value: &Value,
        range: Range,
    ) {
        let Value::Computed(c) = value else { return };
        match defs.get(&c.number) {
            None => self.issues.add_at(
                CheckerIssueKind::ComputedValueUsedWithoutDefinition,
                range,
                format!("%{} is used but never defined in @{}", c.number, func.number()),
            ),
            Some(&def) => {
                if !self.dominates_use(func, idom, def, use_block, use_idx) {
                    self.issues.add_at(
                        CheckerIssueKind::ComputedValueDefinitionDoesNotDominateUse,
                        range,
                        format!("definition of %{} does not dominate this use", c.number),
                    );
                }
            }
        }
    }

    fn check_phi_arg(
        &mut self,
        func: &Function,
        idom: &BTreeMap<BlockNumber, BlockNumber>,
        defs: &HashMap<ValueNumber, Definition>,
        origin: BlockNumber,
        value: &Value,
        range: Range,
    ) {
        let Value::Computed(c) = value else { return };
        match defs.get(&c.number) {
            None => self.issues.add_at(
                CheckerIssueKind::ComputedValueUsedWithoutDefinition,
                range,
                format!("%{} is used but never defined in @{}", c.number, func.number()),
            ),
            Some(&def) => {
                if !self.dominates_origin(func, idom, def, origin) {
                    self.issues.add_at(
                        CheckerIssueKind::PhiArgOriginDoesNotDominatePredecessor,
                        range,
                        format!("definition of %{} does not dominate predecessor block {{{origin}}}", c.number),
                    );
                }
            }
        }
    }

    fn check_instr(
        &mut self,
        func: &Function,
        block: &Block,
        idx: usize,
        instr: &Instr,
        idom: &BTreeMap<BlockNumber, BlockNumber>,
        defs: &HashMap<ValueNumber, Definition>,
    ) {
        let func_num = func.number();
        let block_num = block.number();

        if let Instr::Phi { args, .. } = instr {
            let mut seen_origins = HashSet::new();
            for (arg_idx, arg) in args.iter().enumerate() {
                let range = self.used_range(func_num, block_num, idx, arg_idx);
                if !block.parents().contains(&arg.origin) {
                    self.issues.add_at(
                        CheckerIssueKind::PhiHasArgForNonParent,
                        range,
                        format!("phi argument names {{{}}}, which is not a predecessor of {{{block_num}}}", arg.origin),
                    );
                }
                seen_origins.insert(arg.origin);
                self.check_phi_arg(func, idom, defs, arg.origin, &arg.value, range);
            }
            for &parent in block.parents() {
                if !seen_origins.contains(&parent) {
                    let range = self.instr_range(func_num, block_num, idx);
                    self.issues.add_at(
                        CheckerIssueKind::PhiMissingArgForParent,
                        range,
                        format!("phi in {{{block_num}}} has no argument for predecessor {{{parent}}}"),
                    );
                }
            }
        } else {
            for (operand, value) in instr.used_values().iter().enumerate() {
                let range = self.used_range(func_num, block_num, idx, operand);
                self.check_use(func, idom, defs, block_num, idx, value, range);
            }
        }

        self.check_instr_types(func_num, block_num, idx, instr);
    }

    fn check_instr_types(&mut self, func_num: FuncNumber, block_num: BlockNumber, idx: usize, instr: &Instr) {
        let opcode_range = self.instr_range(func_num, block_num, idx);

        match instr {
            Instr::Mov { result, origin } => {
                if result.ty != origin.ty() {
                    self.issues.add_at(
                        CheckerIssueKind::MovTypeMismatch,
                        opcode_range,
                        "mov result type does not match its operand's type".to_string(),
                    );
                }
            }
            Instr::Conv { result, operand } => {
                let convertible = |this: &Self, ty: TypeKey| matches!(this.get(ty), Type::Bool | Type::Int(_));
                if !convertible(self, operand.ty()) || !convertible(self, result.ty) {
                    self.issues.add_at(
                        CheckerIssueKind::ConvOperandNotConvertible,
                        opcode_range,
                        "conv is only defined between bool and integer types".to_string(),
                    );
                }
            }
            Instr::BoolNot { operand, .. } => {
                if !matches!(self.get(operand.ty()), Type::Bool) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::BoolInstrOperandNotBool, range, "bnot operand is not bool".to_string());
                }
            }
            Instr::BoolBinary { lhs, rhs, .. } => {
                if !matches!(self.get(lhs.ty()), Type::Bool) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::BoolInstrOperandNotBool, range, "boolean-op left operand is not bool".to_string());
                }
                if !matches!(self.get(rhs.ty()), Type::Bool) {
                    let range = self.used_range(func_num, block_num, idx, 1);
                    self.issues.add_at(CheckerIssueKind::BoolInstrOperandNotBool, range, "boolean-op right operand is not bool".to_string());
                }
            }
            Instr::IntUnary { operand, .. } => {
                if !self.is_int(operand.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::IntInstrOperandNotInt, range, "integer unary operand is not an int type".to_string());
                }
            }
            Instr::IntCompare { lhs, rhs, .. } | Instr::IntBinary { lhs, rhs, .. } => {
                let lhs_ok = self.is_int(lhs.ty());
                if !lhs_ok {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::IntInstrOperandNotInt, range, "integer-op left operand is not an int type".to_string());
                }
                let rhs_ok = self.is_int(rhs.ty());
                if !rhs_ok {
                    let range = self.used_range(func_num, block_num, idx, 1);
                    self.issues.add_at(CheckerIssueKind::IntInstrOperandNotInt, range, "integer-op right operand is not an int type".to_string());
                } else if lhs_ok && lhs.ty() != rhs.ty() {
                    self.issues.add_at(
                        CheckerIssueKind::IntInstrOperandTypeMismatch,
                        opcode_range,
                        "integer-op operands have different int types".to_string(),
                    );
                }
            }
            Instr::IntShift { shifted, offset, .. } => {
                if !self.is_int(shifted.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::IntInstrOperandNotInt, range, "shifted operand is not an int type".to_string());
                }
                if !self.is_int(offset.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 1);
                    self.issues.add_at(CheckerIssueKind::IntInstrOperandNotInt, range, "shift amount is not an int type".to_string());
                }
            }
            Instr::PointerOffset { pointer, offset, .. } => {
                if !self.is_pointerish(pointer.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::PointerOffsetOperandNotPointer, range, "poff operand is not a pointer type".to_string());
                }
                if !self.is_int(offset.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 1);
                    self.issues.add_at(CheckerIssueKind::PointerOffsetAmountNotInt, range, "poff offset is not an int type".to_string());
                }
            }
            Instr::NilTest { operand, .. } => {
                if !self.is_pointerish(operand.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::NilTestOperandNotNilable, range, "niltest operand is not a nil-able type".to_string());
                }
            }
            Instr::Malloc { size, .. } => {
                if !self.is_int(size.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::MallocSizeNotInt, range, "malloc size is not an int type".to_string());
                }
            }
            Instr::Load { result, address } => match self.get(address.ty()) {
                Type::Pointer => {}
                Type::SharedPointer { elem, .. } | Type::UniquePointer { elem } if *elem == result.ty() => {}
                Type::SharedPointer { .. } | Type::UniquePointer { .. } => {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(
                        CheckerIssueKind::LoadFromSmartPointerHasMismatchedElementType,
                        range,
                        "load result type does not match the smart pointer's element type".to_string(),
                    );
                }
                _ => {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::LoadAddressNotPointer, range, "load address is not a pointer".to_string());
                }
            },
            Instr::Store { address, value } => match self.get(address.ty()) {
                Type::Pointer => {}
                Type::SharedPointer { elem, .. } | Type::UniquePointer { elem } if *elem == value.ty() => {}
                Type::SharedPointer { .. } | Type::UniquePointer { .. } => {
                    let range = self.used_range(func_num, block_num, idx, 1);
                    self.issues.add_at(
                        CheckerIssueKind::StoreToSmartPointerHasMismatchedElementType,
                        range,
                        "stored value type does not match the smart pointer's element type".to_string(),
                    );
                }
                _ => {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::StoreAddressNotPointer, range, "store address is not a pointer".to_string());
                }
            },
            Instr::Free { address } => {
                if !matches!(self.get(address.ty()), Type::Pointer) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::FreeAddressNotPointer, range, "free address is not a primitive pointer".to_string());
                }
            }
            Instr::JumpCond { condition, .. } => {
                if !matches!(self.get(condition.ty()), Type::Bool) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::JumpCondConditionNotBool, range, "jcc condition is not bool".to_string());
                }
            }
            Instr::Syscall { number, args, .. } => {
                if !self.is_int(number.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::SyscallNumberNotInt, range, "syscall number is not an int type".to_string());
                }
                for (i, arg) in args.iter().enumerate() {
                    if !self.is_int(arg.ty()) {
                        let range = self.used_range(func_num, block_num, idx, i + 1);
                        self.issues.add_at(CheckerIssueKind::SyscallArgNotInt, range, "syscall argument is not an int type".to_string());
                    }
                }
            }
            Instr::Call { results, callee, .. } => {
                if !matches!(self.get(callee.ty()), Type::Func) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::CallCalleeNotFunc, range, "call callee is not a func-typed value".to_string());
                } else if let Value::Constant(Constant::Func { value: Some(target), .. }) = callee {
                    if let Some(target_func) = self.program.func(*target) {
                        if results.len() != target_func.result_types().len() {
                            self.issues.add_at(
                                CheckerIssueKind::CallResultArityMismatch,
                                opcode_range,
                                format!(
                                    "call expects {} result(s) but @{target} returns {}",
                                    results.len(),
                                    target_func.result_types().len()
                                ),
                            );
                        }
                    }
                }
            }
            Instr::Return { values } => {
                let Some(func) = self.program.func(func_num) else { return };
                if values.len() != func.result_types().len() {
                    self.issues.add_at(
                        CheckerIssueKind::ReturnArityMismatch,
                        opcode_range,
                        format!("ret has {} value(s), function declares {} result(s)", values.len(), func.result_types().len()),
                    );
                } else {
                    let expected: Vec<TypeKey> = func.result_types().to_vec();
                    for (i, (value, ex)) in values.iter().zip(expected.iter()).enumerate() {
                        if value.ty() != *ex {
                            let range = self.used_range(func_num, block_num, idx, i);
                            self.issues.add_at(
                                CheckerIssueKind::ReturnTypeMismatch,
                                range,
                                format!("ret value {i} does not match the function's declared result type"),
                            );
                        }
                    }
                }
            }
            Instr::MakeShared { size, result } => {
                if !self.is_int(size.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::SharedPointerOffsetNotInt, range, "make_shared size is not an int type".to_string());
                }
                if !matches!(self.get(result.ty), Type::SharedPointer { .. }) {
                    self.issues.add_at(CheckerIssueKind::SharedPointerOperandTypeMismatch, opcode_range, "make_shared result is not a shared pointer type".to_string());
                }
            }
            Instr::CopyShared { source, offset, result } => {
                if !matches!(self.get(source.ty()), Type::SharedPointer { .. }) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::SharedPointerOperandTypeMismatch, range, "copy_shared source is not a shared pointer".to_string());
                }
                if !self.is_int(offset.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 1);
                    self.issues.add_at(CheckerIssueKind::SharedPointerOffsetNotInt, range, "copy_shared offset is not an int type".to_string());
                }
                if !matches!(self.get(result.ty), Type::SharedPointer { .. }) {
                    self.issues.add_at(CheckerIssueKind::SharedPointerOperandTypeMismatch, opcode_range, "copy_shared result is not a shared pointer type".to_string());
                }
            }
            Instr::DeleteShared { source } => {
                if !matches!(self.get(source.ty()), Type::SharedPointer { .. }) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::SharedPointerOperandTypeMismatch, range, "delete_shared operand is not a shared pointer".to_string());
                }
            }
            Instr::MakeUnique { size, result } => {
                if !self.is_int(size.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::UniquePointerOperandTypeMismatch, range, "make_unique size is not an int type".to_string());
                }
                if !matches!(self.get(result.ty), Type::UniquePointer { .. }) {
                    self.issues.add_at(CheckerIssueKind::UniquePointerOperandTypeMismatch, opcode_range, "make_unique result is not a unique pointer type".to_string());
                }
            }
            Instr::DeleteUnique { source } => {
                if !matches!(self.get(source.ty()), Type::UniquePointer { .. }) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::UniquePointerOperandTypeMismatch, range, "delete_unique operand is not a unique pointer".to_string());
                }
            }
            Instr::StrIndex { string, index, .. } => {
                if !matches!(self.get(string.ty()), Type::Str) {
                    let range = self.used_range(func_num, block_num, idx, 0);
                    self.issues.add_at(CheckerIssueKind::StringOperandNotString, range, "str_index operand is not a string".to_string());
                }
                if !self.is_int(index.ty()) {
                    let range = self.used_range(func_num, block_num, idx, 1);
                    self.issues.add_at(CheckerIssueKind::StringIndexNotInt, range, "str_index index is not an int type".to_string());
                }
            }
            Instr::StrConcat { operands, .. } => {
                for (i, operand) in operands.iter().enumerate() {
                    if !matches!(self.get(operand.ty()), Type::Str) {
                        let range = self.used_range(func_num, block_num, idx, i);
                        self.issues.add_at(CheckerIssueKind::StringOperandNotString, range, "str_concat operand is not a string".to_string());
                    }
                }
            }
            Instr::Phi { .. } | Instr::Jump { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_ir::types::{PointerStrength, TypeTable};
    use katara_ir::value::{Computed, InheritedValue};

    fn empty_positions() -> ProgramPositions {
        ProgramPositions::new()
    }

    #[test]
    fn func_without_entry_block_is_reported() {
        let mut program = Program::new();
        program.add_func(None);
        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(issues.issues().iter().any(|i| i.kind == CheckerIssueKind::FuncHasNoEntryBlock));
    }

    #[test]
    fn well_formed_function_has_no_issues() {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(TypeTable::I64);
        let arg = func.add_arg(TypeTable::I64);
        let b0 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(arg)] });

        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(issues.issues().is_empty(), "unexpected issues: {:?}", issues.issues());
    }

    #[test]
    fn use_before_definition_in_same_block_is_rejected() {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(TypeTable::I64);
        let b0 = func.add_block(None);
        let later = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(later)] });
        func.block_mut(b0).unwrap().push_instr(Instr::Mov {
            result: later,
            origin: Value::Constant(Constant::Int { ty: TypeTable::I64, value: 1 }),
        });

        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(issues
            .issues()
            .iter()
            .any(|i| i.kind == CheckerIssueKind::ComputedValueDefinitionDoesNotDominateUse));
    }

    #[test]
    fn phi_missing_argument_for_a_predecessor_is_rejected() {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let b0 = func.add_block(None);
        let b1 = func.add_block(None);
        let b2 = func.add_block(None);
        let b3 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::JumpCond {
            condition: Value::Constant(Constant::Bool { ty: TypeTable::BOOL, value: true }),
            target_true: b1,
            target_false: b2,
        });
        func.add_control_flow(b0, b1);
        func.add_control_flow(b0, b2);
        let v1 = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(b1).unwrap().push_instr(Instr::Mov {
            result: v1,
            origin: Value::Constant(Constant::Int { ty: TypeTable::I64, value: 1 }),
        });
        func.block_mut(b1).unwrap().push_instr(Instr::Jump { target: b3 });
        func.add_control_flow(b1, b3);
        func.block_mut(b2).unwrap().push_instr(Instr::Jump { target: b3 });
        func.add_control_flow(b2, b3);
        let merged = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(b3).unwrap().push_instr(Instr::Phi {
            result: merged,
            args: vec![InheritedValue::new(Value::Computed(v1), b1)],
        });
        func.block_mut(b3).unwrap().push_instr(Instr::Return { values: vec![] });

        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(issues.issues().iter().any(|i| i.kind == CheckerIssueKind::PhiMissingArgForParent));
    }

    #[test]
    fn phi_in_block_with_single_parent_is_rejected() {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let b0 = func.add_block(None);
        let b1 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::Jump { target: b1 });
        func.add_control_flow(b0, b1);
        let v0 = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(b1).unwrap().push_instr(Instr::Phi {
            result: v0,
            args: vec![InheritedValue::new(
                Value::Constant(Constant::Int { ty: TypeTable::I64, value: 1 }),
                b0,
            )],
        });
        func.block_mut(b1).unwrap().push_instr(Instr::Return { values: vec![] });

        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(
            issues.issues().iter().any(|i| i.kind == CheckerIssueKind::PhiInBlockWithoutMultipleParents)
        );
    }

    /// §8.2 boundary behavior: "Duplicate `jcc` destinations: checker reports."
    #[test]
    fn jcc_with_identical_true_and_false_targets_is_rejected() {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let b0 = func.add_block(None);
        let b1 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::JumpCond {
            condition: Value::Constant(Constant::Bool { ty: TypeTable::BOOL, value: true }),
            target_true: b1,
            target_false: b1,
        });
        func.add_control_flow(b0, b1);
        func.block_mut(b1).unwrap().push_instr(Instr::Return { values: vec![] });

        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(issues.issues().iter().any(|i| i.kind == CheckerIssueKind::JccDuplicateDestinations));
    }

    /// §3.5 invariant 3: every non-entry block must have at least one parent.
    #[test]
    fn non_entry_block_without_parents_is_rejected() {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let b0 = func.add_block(None);
        let b1 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![] });
        func.block_mut(b1).unwrap().push_instr(Instr::Return { values: vec![] });

        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(issues.issues().iter().any(|i| i.kind == CheckerIssueKind::NonEntryBlockHasNoParents));
    }

    /// §3.5 invariant 11: a `load` from a smart pointer is valid as long as the
    /// result type matches the pointer's element type.
    #[test]
    fn load_from_shared_pointer_with_matching_element_type_has_no_issues() {
        let mut program = Program::new();
        let shared_ty =
            program.types_mut().intern(Type::SharedPointer { elem: TypeTable::I64, strength: PointerStrength::Strong });
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let address = func.add_arg(shared_ty);
        let b0 = func.add_block(None);
        let result = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(b0).unwrap().push_instr(Instr::Load { result, address: Value::Computed(address) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(result)] });

        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(issues.issues().is_empty());
    }

    /// Mirrors `CatchesLoadFromSmartPointerHasMismatchedElementType`: a load
    /// from `lshared_ptr<i32,s>` into a `u32` result is an element mismatch,
    /// not a "not a pointer" error.
    #[test]
    fn load_from_shared_pointer_with_mismatched_element_type_is_rejected() {
        let mut program = Program::new();
        let shared_ty =
            program.types_mut().intern(Type::SharedPointer { elem: TypeTable::I32, strength: PointerStrength::Strong });
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let address = func.add_arg(shared_ty);
        let b0 = func.add_block(None);
        let result = Computed::new(func.fresh_value_number(None), TypeTable::U32);
        func.block_mut(b0).unwrap().push_instr(Instr::Load { result, address: Value::Computed(address) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(result)] });

        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(issues.issues().iter().any(|i| i.kind == CheckerIssueKind::LoadFromSmartPointerHasMismatchedElementType));
        assert!(!issues.issues().iter().any(|i| i.kind == CheckerIssueKind::LoadAddressNotPointer));
    }

    /// Mirrors `CatchesStoreToSmartPointerHasMismatchedElementType`: a store
    /// of a `u8` value through `lunique_ptr<i8>` is an element mismatch.
    #[test]
    fn store_to_unique_pointer_with_mismatched_element_type_is_rejected() {
        let mut program = Program::new();
        let unique_ty = program.types_mut().intern(Type::UniquePointer { elem: TypeTable::I8 });
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let address = func.add_arg(unique_ty);
        let value = func.add_arg(TypeTable::U8);
        let b0 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::Store { address: Value::Computed(address), value: Value::Computed(value) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![] });

        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(issues.issues().iter().any(|i| i.kind == CheckerIssueKind::StoreToSmartPointerHasMismatchedElementType));
        assert!(!issues.issues().iter().any(|i| i.kind == CheckerIssueKind::StoreAddressNotPointer));
    }

    #[test]
    fn load_from_a_non_pointer_address_is_still_rejected() {
        let mut program = Program::new();
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let address = func.add_arg(TypeTable::I64);
        let b0 = func.add_block(None);
        let result = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(b0).unwrap().push_instr(Instr::Load { result, address: Value::Computed(address) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(result)] });

        let mut issues = IssueTracker::new();
        check_program(&program, &empty_positions(), &mut issues);
        assert!(issues.issues().iter().any(|i| i.kind == CheckerIssueKind::LoadAddressNotPointer));
    }
}
