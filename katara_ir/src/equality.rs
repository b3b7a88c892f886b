//! Structural equality up to renumbering (§4.2, §9). Two programs can
//! disagree on every block and value number and still be the "same" IR if
//! they agree on shape, so equality is computed by first building a
//! position-based correspondence (blocks in reverse-postorder, values in
//! definition order) and then checking every instruction under that
//! correspondence, rather than comparing numbers directly.

use crate::function::Function;
use crate::instr::Instr;
use crate::program::Program;
use crate::types::types_equal;
use crate::value::{BlockNumber, Computed, Constant, InheritedValue, Value, ValueNumber};
use std::collections::HashMap;

struct Correspondence {
    blocks: HashMap<BlockNumber, BlockNumber>,
    values: HashMap<ValueNumber, ValueNumber>,
}

impl Correspondence {
    fn new() -> Self {
        Self { blocks: HashMap::new(), values: HashMap::new() }
    }

    /// Binds `a <-> b`, returning `false` if either side is already bound to
    /// something else (a contradiction, meaning the two functions diverge).
    fn bind_block(&mut self, a: BlockNumber, b: BlockNumber) -> bool {
        match self.blocks.get(&a) {
            Some(&existing) => existing == b,
            None => {
                self.blocks.insert(a, b);
                true
            }
        }
    }

    fn bind_value(&mut self, a: ValueNumber, b: ValueNumber) -> bool {
        match self.values.get(&a) {
            Some(&existing) => existing == b,
            None => {
                self.values.insert(a, b);
                true
            }
        }
    }

    fn block_of(&self, a: BlockNumber) -> Option<BlockNumber> {
        self.blocks.get(&a).copied()
    }

    fn value_of(&self, a: ValueNumber) -> Option<ValueNumber> {
        self.values.get(&a).copied()
    }
}

/// `true` iff `a` and `b` are the same program up to block/value renumbering:
/// same type table (structurally), same functions in the same order, each
/// function's blocks and instructions agreeing under a consistent
/// correspondence.
pub fn programs_equal(a: &Program, b: &Program) -> bool {
    if a.func_count() != b.func_count() {
        return false;
    }
    a.funcs().zip(b.funcs()).all(|(fa, fb)| functions_equal(a, fa, b, fb))
}

/// `true` iff `func_a` (from `prog_a`) and `func_b` (from `prog_b`) agree up
/// to block/value renumbering.
pub fn functions_equal(prog_a: &Program, func_a: &Function, prog_b: &Program, func_b: &Function) -> bool {
    if func_a.args().len() != func_b.args().len() {
        return false;
    }
    if func_a.result_types().len() != func_b.result_types().len() {
        return false;
    }
    if !func_a
        .result_types()
        .iter()
        .zip(func_b.result_types())
        .all(|(&ra, &rb)| types_equal(prog_a.types(), ra, prog_b.types(), rb))
    {
        return false;
    }

    let order_a = func_a.reverse_postorder();
    let order_b = func_b.reverse_postorder();
    if order_a.len() != order_b.len() {
        return false;
    }
    if func_a.block_count() != order_a.len() || func_b.block_count() != order_b.len() {
        // Unreachable blocks make a positional correspondence ambiguous;
        // treat as unequal rather than guess at a pairing.
        return false;
    }

    let mut corr = Correspondence::new();
    for (&a, &b) in order_a.iter().zip(order_b.iter()) {
        if !corr.bind_block(a, b) {
            return false;
        }
    }

    for (arg_a, arg_b) in func_a.args().iter().zip(func_b.args()) {
        if !types_equal(prog_a.types(), arg_a.ty, prog_b.types(), arg_b.ty) {
            return false;
        }
        if !corr.bind_value(arg_a.number, arg_b.number) {
            return false;
        }
    }

    for (&block_a, &block_b) in order_a.iter().zip(order_b.iter()) {
        let ba = func_a.block(block_a).expect("reverse_postorder only yields existing blocks");
        let bb = func_b.block(block_b).expect("reverse_postorder only yields existing blocks");
        if ba.instrs().len() != bb.instrs().len() {
            return false;
        }
        for (ia, ib) in ba.instrs().iter().zip(bb.instrs()) {
            if !instrs_equal(prog_a, ia, prog_b, ib, &mut corr) {
                return false;
            }
        }
    }

    true
}

fn instrs_equal(
    prog_a: &Program,
    ia: &Instr,
    prog_b: &Program,
    ib: &Instr,
    corr: &mut Correspondence,
) -> bool {
    if ia.mnemonic() != ib.mnemonic() {
        return false;
    }

    // Bind any newly defined values before comparing uses, so that a value
    // used in the same instruction it is defined in (impossible in valid SSA
    // but harmless here) and all later instructions see the binding.
    let defined_a = ia.defined();
    let defined_b = ib.defined();
    if defined_a.len() != defined_b.len() {
        return false;
    }
    for (da, db) in defined_a.iter().zip(defined_b.iter()) {
        if !types_equal(prog_a.types(), da.ty, prog_b.types(), db.ty) {
            return false;
        }
        if !corr.bind_value(da.number, db.number) {
            return false;
        }
    }

    match (ia, ib) {
        (Instr::Phi { args: args_a, .. }, Instr::Phi { args: args_b, .. }) => {
            phi_args_equal(prog_a, args_a, prog_b, args_b, corr)
        }
        (Instr::Jump { target: ta }, Instr::Jump { target: tb }) => {
            corr.block_of(*ta) == Some(*tb)
        }
        (
            Instr::JumpCond { condition: ca, target_true: tta, target_false: tfa },
            Instr::JumpCond { condition: cb, target_true: ttb, target_false: tfb },
        ) => {
            values_equal(prog_a, ca, prog_b, cb, corr)
                && corr.block_of(*tta) == Some(*ttb)
                && corr.block_of(*tfa) == Some(*tfb)
        }
        _ => {
            let used_a = ia.used_values();
            let used_b = ib.used_values();
            used_a.len() == used_b.len()
                && used_a
                    .iter()
                    .zip(used_b.iter())
                    .all(|(va, vb)| values_equal(prog_a, va, prog_b, vb, corr))
        }
    }
}

/// `phi` operands are keyed by origin block, so they are compared as a set
/// under the block correspondence rather than positionally — parsers and
/// passes are not required to list predecessors in any particular order.
fn phi_args_equal(
    prog_a: &Program,
    args_a: &[InheritedValue],
    prog_b: &Program,
    args_b: &[InheritedValue],
    corr: &mut Correspondence,
) -> bool {
    if args_a.len() != args_b.len() {
        return false;
    }
    for a in args_a {
        let Some(mapped_origin) = corr.block_of(a.origin) else { return false };
        let Some(b) = args_b.iter().find(|b| b.origin == mapped_origin) else { return false };
        if !values_equal(prog_a, &a.value, prog_b, &b.value, corr) {
            return false;
        }
    }
    true
}

fn values_equal(
    prog_a: &Program,
    a: &Value,
    prog_b: &Program,
    b: &Value,
    corr: &mut Correspondence,
) -> bool {
    match (a, b) {
        (Value::Constant(ca), Value::Constant(cb)) => constants_equal(prog_a, ca, prog_b, cb),
        (Value::Computed(ca), Value::Computed(cb)) => {
            types_equal(prog_a.types(), ca.ty, prog_b.types(), cb.ty)
                && match corr.value_of(ca.number) {
                    Some(mapped) => mapped == cb.number,
                    // A use before any binding (a forward reference into a
                    // not-yet-walked block) still needs to agree: bind it.
                    None => corr.bind_value(ca.number, cb.number),
                }
        }
        _ => false,
    }
}

fn constants_equal(prog_a: &Program, a: &Constant, prog_b: &Program, b: &Constant) -> bool {
    if !types_equal(prog_a.types(), a.ty(), prog_b.types(), b.ty()) {
        return false;
    }
    match (a, b) {
        (Constant::Bool { value: va, .. }, Constant::Bool { value: vb, .. }) => va == vb,
        (Constant::Int { value: va, .. }, Constant::Int { value: vb, .. }) => va == vb,
        (Constant::Address { value: va, .. }, Constant::Address { value: vb, .. }) => va == vb,
        (Constant::Func { value: va, .. }, Constant::Func { value: vb, .. }) => va == vb,
        (Constant::Str { value: va, .. }, Constant::Str { value: vb, .. }) => va == vb,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;

    fn build_add_one(entry_num: Option<BlockNumber>) -> Program {
        let mut p = Program::new();
        p.add_func(None);
        let f = p.func_mut(0).unwrap();
        let b = f.add_block(entry_num);
        let arg = f.add_arg(TypeTable::I64);
        let result = Computed::new(f.fresh_value_number(None), TypeTable::I64);
        f.block_mut(b).unwrap().push_instr(Instr::IntBinary {
            result,
            op: crate::instr::IntBinaryOp::Add,
            lhs: Value::Computed(arg),
            rhs: Value::Constant(Constant::Int { ty: TypeTable::I64, value: 1 }),
        });
        f.block_mut(b).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(result)] });
        f.result_types_mut().push(TypeTable::I64);
        p
    }

    #[test]
    fn identical_shape_with_different_numbering_is_equal() {
        let a = build_add_one(Some(0));
        let b = build_add_one(Some(7));
        assert!(programs_equal(&a, &b));
    }

    #[test]
    fn different_constant_makes_programs_unequal() {
        let a = build_add_one(Some(0));
        let mut b = build_add_one(Some(0));
        let f = b.func_mut(0).unwrap();
        let blk = f.block_mut(0).unwrap();
        if let Instr::IntBinary { rhs, .. } = &mut blk.instrs_mut()[0] {
            *rhs = Value::Constant(Constant::Int { ty: TypeTable::I64, value: 2 });
        }
        assert!(!programs_equal(&a, &b));
    }
}
