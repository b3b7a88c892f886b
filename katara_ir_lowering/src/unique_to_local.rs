//! Unique-pointer-to-local-value optimization (§4.5.6), grounded on every
//! parameterized case in
//! `examples/original_source/src/lang/processors/ir/optimizers/unique_pointer_to_local_value_optimizer_test.cc`.
//!
//! A unique pointer defined by `make_unique` is promotable to a dedicated SSA
//! scalar iff every use of the pointer *value itself* is the address operand
//! of a `load`/`store`/`delete_unique` — never a `poff` pointer, never a call
//! argument, never a return value, never the *value* operand of a `store`,
//! and never a `phi` source (mirrors [`crate::shared_to_unique`]'s join rule:
//! the impossible test's fourth case phi-joins two independently-safe
//! `make_unique`s before their `delete_unique`, and that disqualifies both).
//! The impossible test's fifth case additionally disqualifies a `make_unique`
//! whose size operand isn't the constant `#1:i64` — this pass never
//! scalarizes a multi-element allocation.
//!
//! Once a value is confirmed promotable, `make_unique`/`delete_unique`
//! disappear; every `store p, v` becomes `%t = mov v` and every
//! `load %r = load p` becomes `%r = mov %t_latest`, where `%t_latest` is
//! whichever local write (or, at a block with no local write of its own,
//! whatever reaches that block's entry) is live at that program point
//! (§4.5.6). Reconstructing the right value across control-flow joins is the
//! single-variable case of a standard SSA-construction algorithm (Braun et
//! al., "Simple and Efficient Construction of Static Single Assignment
//! Form"): reads with no block-local write recurse to the block's
//! predecessor(s), inserting a `phi` at a join point and breaking recursion
//! cycles by caching the `phi`'s placeholder result before filling its
//! operands.

use katara_ir::function::Function;
use katara_ir::instr::Instr;
use katara_ir::program::Program;
use katara_ir::types::{Type, TypeKey, TypeTable};
use katara_ir::value::{BlockNumber, Computed, Constant, FuncNumber, InheritedValue, Value, ValueNumber};
use std::collections::{HashMap, HashSet};

/// The value a read of `elem_ty` should see if it's reached with no
/// dominating local write (e.g. a `load` immediately after `make_unique`
/// reads uninitialized memory in the original program). Only defined for
/// the primitive scalar kinds; compound element types (structs, strings,
/// shared/unique pointers, arrays, interfaces) are not candidates for this
/// pass; there is no well-formedness rule forcing every path to write before
/// reading, and synthesizing a zero value for a compound type isn't
/// meaningful the way it is for a scalar.
fn default_value_for(elem_ty: TypeKey, types: &TypeTable) -> Option<Value> {
    match types.get(elem_ty) {
        Type::Bool => Some(Value::Constant(Constant::Bool { ty: elem_ty, value: false })),
        Type::Int(_) => Some(Value::Constant(Constant::Int { ty: elem_ty, value: 0 })),
        Type::Pointer => Some(Value::Constant(Constant::Address { ty: elem_ty, value: 0 })),
        Type::Func => Some(Value::Constant(Constant::Func { ty: elem_ty, value: None })),
        _ => None,
    }
}

fn is_single_element_alloc(size: &Value) -> bool {
    matches!(size, Value::Constant(Constant::Int { value: 1, .. }))
}

struct Candidate {
    elem_ty: TypeKey,
    alloc_block: BlockNumber,
}

/// Finds every `make_unique`-defined value in `func` whose every use is a
/// whole-value dereference (§4.5.6).
fn find_promotable_candidates(func: &Function, types: &TypeTable) -> HashMap<ValueNumber, Candidate> {
    let mut candidates: HashMap<ValueNumber, Candidate> = HashMap::new();
    for block in func.blocks() {
        for instr in block.instrs() {
            if let Instr::MakeUnique { result, size } = instr {
                if !is_single_element_alloc(size) {
                    continue;
                }
                if let Type::UniquePointer { elem } = types.get(result.ty) {
                    if default_value_for(*elem, types).is_some() {
                        candidates.insert(result.number, Candidate { elem_ty: *elem, alloc_block: block.number() });
                    }
                }
            }
        }
    }

    let mut disqualified: HashSet<ValueNumber> = HashSet::new();
    for block in func.blocks() {
        for instr in block.instrs() {
            match instr {
                Instr::MakeUnique { .. } | Instr::DeleteUnique { .. } | Instr::Load { .. } => {
                    // Own definition, or a whole-value dereference through the
                    // pointer as an address operand: never disqualifying.
                }
                Instr::Store { value, .. } => {
                    if let Some(c) = value.as_computed() {
                        if candidates.contains_key(&c.number) {
                            disqualified.insert(c.number);
                        }
                    }
                }
                Instr::Phi { args, .. } => {
                    for arg in args {
                        if let Some(c) = arg.value.as_computed() {
                            if candidates.contains_key(&c.number) {
                                disqualified.insert(c.number);
                            }
                        }
                    }
                }
                other => {
                    for used in other.used_values() {
                        if let Some(c) = used.as_computed() {
                            if candidates.contains_key(&c.number) {
                                disqualified.insert(c.number);
                            }
                        }
                    }
                }
            }
        }
    }

    candidates.retain(|num, _| !disqualified.contains(num));
    candidates
}

/// Rewrites one promotable unique pointer's `make_unique`/`load`/`store`/
/// `delete_unique` instructions into SSA-scalar form across `func`, inserting
/// `phi`s at the control-flow joins SSA reconstruction requires.
struct Reconstructor<'f> {
    func: &'f mut Function,
    value_num: ValueNumber,
    elem_ty: TypeKey,
    default_value: Value,
    alloc_block: BlockNumber,
    block_end_value: HashMap<BlockNumber, Value>,
    join_phi: HashMap<BlockNumber, Value>,
    processed: HashSet<BlockNumber>,
    pending_phis: Vec<(BlockNumber, Computed, Vec<InheritedValue>)>,
}

impl<'f> Reconstructor<'f> {
    fn is_candidate_address(&self, value: &Value) -> bool {
        value.as_computed().map(|c| c.number) == Some(self.value_num)
    }

    fn run(&mut self) {
        let order = self.func.blocks_in_dominance_order();
        for block in order {
            self.block_end_value(block);
        }
        for (block, result, args) in std::mem::take(&mut self.pending_phis) {
            self.func.block_mut(block).unwrap().instrs_mut().insert(0, Instr::Phi { result, args });
        }
    }

    /// The value live at the *start* of `block`, computed (and memoized) by
    /// recursing to predecessors, inserting a `phi` at join points.
    fn entry_value(&mut self, block: BlockNumber) -> Value {
        if let Some(v) = self.join_phi.get(&block) {
            return v.clone();
        }
        if block == self.alloc_block {
            // Unreachable in a well-formed function: nothing before
            // `make_unique` can reference the value it defines.
            return self.default_value.clone();
        }
        let preds: Vec<BlockNumber> = self.func.block(block).unwrap().parents().iter().copied().collect();
        if preds.is_empty() {
            return self.default_value.clone();
        }
        if preds.len() == 1 {
            return self.block_end_value(preds[0]);
        }

        let phi_result = Computed::new(self.func.fresh_value_number(None), self.elem_ty);
        let placeholder = Value::Computed(phi_result);
        self.join_phi.insert(block, placeholder.clone());

        let mut args = Vec::with_capacity(preds.len());
        for pred in preds {
            let value = self.block_end_value(pred);
            args.push(InheritedValue::new(value, pred));
        }
        self.pending_phis.push((block, phi_result, args));
        placeholder
    }

    /// The value live at the *end* of `block`, processing (rewriting) it
    /// first if this is the first time it's needed.
    fn block_end_value(&mut self, block: BlockNumber) -> Value {
        if let Some(v) = self.block_end_value.get(&block) {
            return v.clone();
        }
        if self.processed.contains(&block) {
            // `block` is already being processed further up this same call
            // stack: a read at its own entry recursed, through one or more
            // single-predecessor blocks, back to a query for its own end
            // value (a loop whose header reads the pointer before writing
            // it). Since control can only revisit a block already mid-
            // processing via a back edge, and every back edge targets a
            // block with more than one predecessor, `entry_value` must
            // already have placed this block's join `phi` — which, absent
            // a local write still to come, is also that block's end value.
            return self
                .join_phi
                .get(&block)
                .cloned()
                .expect("cyclic end-value query for a block with no join phi recorded");
        }
        self.process_block(block);
        self.block_end_value[&block].clone()
    }

    fn process_block(&mut self, block: BlockNumber) {
        if self.processed.contains(&block) {
            return;
        }
        self.processed.insert(block);

        let old_instrs = std::mem::take(self.func.block_mut(block).unwrap().instrs_mut());
        let mut current: Option<Value> = None;
        let mut new_instrs = Vec::with_capacity(old_instrs.len());
        for instr in old_instrs {
            match instr {
                Instr::MakeUnique { result, .. } if result.number == self.value_num => {
                    current = Some(self.default_value.clone());
                }
                Instr::DeleteUnique { ref source } if self.is_candidate_address(source) => {}
                Instr::Store { ref address, value } if self.is_candidate_address(address) => {
                    let t = Computed::new(self.func.fresh_value_number(None), self.elem_ty);
                    new_instrs.push(Instr::Mov { result: t, origin: value });
                    current = Some(Value::Computed(t));
                }
                Instr::Load { result, ref address } if self.is_candidate_address(address) => {
                    let latest = match current.clone() {
                        Some(v) => v,
                        None => self.entry_value(block),
                    };
                    new_instrs.push(Instr::Mov { result, origin: latest.clone() });
                    current = Some(latest);
                }
                other => new_instrs.push(other),
            }
        }
        *self.func.block_mut(block).unwrap().instrs_mut() = new_instrs;

        let end_value = match current {
            Some(v) => v,
            None => self.entry_value(block),
        };
        self.block_end_value.insert(block, end_value);
    }
}

fn promote_unique_pointers_to_locals_in_func(func: &mut Function, types: &TypeTable) {
    let candidates = find_promotable_candidates(func, types);
    for (value_num, candidate) in candidates {
        let default_value = default_value_for(candidate.elem_ty, types)
            .expect("find_promotable_candidates only admits scalar element types");
        let mut r = Reconstructor {
            func: &mut *func,
            value_num,
            elem_ty: candidate.elem_ty,
            default_value,
            alloc_block: candidate.alloc_block,
            block_end_value: HashMap::new(),
            join_phi: HashMap::new(),
            processed: HashSet::new(),
            pending_phis: Vec::new(),
        };
        r.run();
    }
}

/// Runs the optimization over every function in `program` (§4.5.6).
pub fn promote_unique_pointers_to_locals_in_program(program: &mut Program) {
    let types = program.types().clone();
    let func_nums: Vec<FuncNumber> = program.funcs().map(|f| f.number()).collect();
    for func_num in func_nums {
        let func = program.func_mut(func_num).unwrap();
        promote_unique_pointers_to_locals_in_func(func, &types);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_ir::instr::IntBinaryOp;

    fn unique_i64(program: &mut Program) -> TypeKey {
        program.types_mut().intern(Type::UniquePointer { elem: TypeTable::I64 })
    }

    fn int_const(value: i64) -> Value {
        Value::Constant(Constant::Int { ty: TypeTable::I64, value })
    }

    #[test]
    fn straight_line_store_load_collapses_to_movs() {
        let mut program = Program::new();
        let unique_ty = unique_i64(&mut program);
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(TypeTable::I64);
        let b0 = func.add_block(None);

        let p = Computed::new(func.fresh_value_number(None), unique_ty);
        func.block_mut(b0).unwrap().push_instr(Instr::MakeUnique { result: p, size: int_const(1) });
        func.block_mut(b0).unwrap().push_instr(Instr::Store { address: Value::Computed(p), value: int_const(123) });
        let v1 = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(b0).unwrap().push_instr(Instr::Load { result: v1, address: Value::Computed(p) });
        func.block_mut(b0).unwrap().push_instr(Instr::DeleteUnique { source: Value::Computed(p) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(v1)] });

        promote_unique_pointers_to_locals_in_program(&mut program);

        let func = program.func(f).unwrap();
        let instrs = func.block(b0).unwrap().instrs();
        assert_eq!(instrs.len(), 2);
        assert!(matches!(instrs[0], Instr::Mov { origin: Value::Constant(Constant::Int { value: 123, .. }), .. }));
        assert!(matches!(instrs[1], Instr::Return { .. }));
    }

    #[test]
    fn loop_carried_accumulator_gets_a_phi_at_the_header() {
        // Mirrors `UniquePointerToLocalValueOptimizationPossibleTest`'s third
        // case, collapsed to a single accumulator: allocate, initialize to
        // 0, loop while < 10 adding 1 each time, then return the sum.
        let mut program = Program::new();
        let unique_ty = unique_i64(&mut program);
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(TypeTable::I64);

        let b0 = func.add_block(None);
        let header = func.add_block(None);
        let body = func.add_block(None);
        let exit = func.add_block(None);

        let p = Computed::new(func.fresh_value_number(None), unique_ty);
        func.block_mut(b0).unwrap().push_instr(Instr::MakeUnique { result: p, size: int_const(1) });
        func.block_mut(b0).unwrap().push_instr(Instr::Store { address: Value::Computed(p), value: int_const(0) });
        func.block_mut(b0).unwrap().push_instr(Instr::Jump { target: header });
        func.add_control_flow(b0, header);

        let cur = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(header).unwrap().push_instr(Instr::Load { result: cur, address: Value::Computed(p) });
        let cond = Computed::new(func.fresh_value_number(None), TypeTable::BOOL);
        func.block_mut(header).unwrap().push_instr(Instr::IntCompare {
            result: cond,
            op: katara_ir::instr::IntCompareOp::Lss,
            lhs: Value::Computed(cur),
            rhs: int_const(10),
        });
        func.block_mut(header).unwrap().push_instr(Instr::JumpCond {
            condition: Value::Computed(cond),
            target_true: body,
            target_false: exit,
        });
        func.add_control_flow(header, body);
        func.add_control_flow(header, exit);

        let loaded = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(body).unwrap().push_instr(Instr::Load { result: loaded, address: Value::Computed(p) });
        let next = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(body).unwrap().push_instr(Instr::IntBinary {
            result: next,
            op: IntBinaryOp::Add,
            lhs: Value::Computed(loaded),
            rhs: int_const(1),
        });
        func.block_mut(body).unwrap().push_instr(Instr::Store { address: Value::Computed(p), value: Value::Computed(next) });
        func.block_mut(body).unwrap().push_instr(Instr::Jump { target: header });
        func.add_control_flow(body, header);

        let result = Computed::new(func.fresh_value_number(None), TypeTable::I64);
        func.block_mut(exit).unwrap().push_instr(Instr::Load { result, address: Value::Computed(p) });
        func.block_mut(exit).unwrap().push_instr(Instr::DeleteUnique { source: Value::Computed(p) });
        func.block_mut(exit).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(result)] });

        promote_unique_pointers_to_locals_in_program(&mut program);

        let func = program.func(f).unwrap();
        assert!(!func.blocks().flat_map(|b| b.instrs()).any(|i| matches!(i, Instr::MakeUnique { .. })));
        assert!(!func.blocks().flat_map(|b| b.instrs()).any(|i| matches!(i, Instr::DeleteUnique { .. })));
        let header_instrs = func.block(header).unwrap().instrs();
        assert!(matches!(header_instrs[0], Instr::Phi { .. }), "expected a phi at the loop header, got {header_instrs:?}");

        let mut issues = katara_common::issues::IssueTracker::new();
        let positions = katara_ir_serialization::positions::ProgramPositions::new();
        katara_ir_check::check_program(&program, &positions, &mut issues);
        assert!(!issues.has_errors(), "unexpected issues: {:?}", issues.issues());
    }

    #[test]
    fn multi_element_allocation_is_not_promoted() {
        let mut program = Program::new();
        let unique_ty = unique_i64(&mut program);
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let b0 = func.add_block(None);
        let p = Computed::new(func.fresh_value_number(None), unique_ty);
        func.block_mut(b0).unwrap().push_instr(Instr::MakeUnique { result: p, size: int_const(42) });
        func.block_mut(b0).unwrap().push_instr(Instr::DeleteUnique { source: Value::Computed(p) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![] });

        promote_unique_pointers_to_locals_in_program(&mut program);

        let func = program.func(f).unwrap();
        assert!(matches!(func.block(b0).unwrap().instrs()[0], Instr::MakeUnique { .. }));
    }

    #[test]
    fn phi_join_of_the_pointer_itself_disqualifies_promotion() {
        let mut program = Program::new();
        let unique_ty = unique_i64(&mut program);
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let cond = func.add_arg(TypeTable::BOOL);
        let b0 = func.add_block(None);
        let b1 = func.add_block(None);
        let b2 = func.add_block(None);

        let p1 = Computed::new(func.fresh_value_number(None), unique_ty);
        func.block_mut(b0).unwrap().push_instr(Instr::MakeUnique { result: p1, size: int_const(1) });
        func.block_mut(b0).unwrap().push_instr(Instr::JumpCond {
            condition: Value::Computed(cond),
            target_true: b1,
            target_false: b2,
        });
        func.add_control_flow(b0, b1);
        func.add_control_flow(b0, b2);

        let p2 = Computed::new(func.fresh_value_number(None), unique_ty);
        func.block_mut(b1).unwrap().push_instr(Instr::MakeUnique { result: p2, size: int_const(1) });
        func.block_mut(b1).unwrap().push_instr(Instr::Jump { target: b2 });
        func.add_control_flow(b1, b2);

        let p3 = Computed::new(func.fresh_value_number(None), unique_ty);
        func.block_mut(b2).unwrap().push_instr(Instr::Phi {
            result: p3,
            args: vec![InheritedValue::new(Value::Computed(p1), b0), InheritedValue::new(Value::Computed(p2), b1)],
        });
        func.block_mut(b2).unwrap().push_instr(Instr::DeleteUnique { source: Value::Computed(p3) });
        func.block_mut(b2).unwrap().push_instr(Instr::Return { values: vec![] });

        promote_unique_pointers_to_locals_in_program(&mut program);

        let func = program.func(f).unwrap();
        assert!(func.blocks().flat_map(|b| b.instrs()).any(|i| matches!(i, Instr::MakeUnique { .. })));
    }
}
