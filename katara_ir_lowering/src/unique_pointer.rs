//! Unique-pointer lowering (§4.5.4), grounded on
//! `UniquePointerLowererTest.LowersSimpleProgram` in
//! `examples/original_source/src/lang/processors/ir/lowerers/unique_pointer_lowerer_test.cc`:
//! `make_unique`/`delete_unique` become plain `malloc`/`free`, and every
//! value typed as a unique pointer anywhere in the function is retyped to
//! `ptr` alongside them. `make_unique`'s size operand counts 8-byte
//! allocation words rather than bytes of the pointee type — the test's
//! `lunique_ptr<i16>` lowers `make_unique #1:i64` to `malloc #8:i64`, one
//! word regardless of the 2-byte element — so lowering multiplies the
//! operand by the word size instead of consulting the element type.

use katara_ir::function::Function;
use katara_ir::instr::{Instr, IntBinaryOp};
use katara_ir::program::Program;
use katara_ir::types::{Type, TypeKey, TypeTable};
use katara_ir::value::{BlockNumber, Computed, Constant, FuncNumber, Value};

/// Bytes per allocation word (§4.5.4); also the fixed granularity
/// `make_unique`'s size operand is expressed in.
const WORD_SIZE: i64 = 8;

fn is_unique_pointer_type(types: &TypeTable, ty: TypeKey) -> bool {
    matches!(types.get(ty), Type::UniquePointer { .. })
}

fn retype_computed(c: &mut Computed, types: &TypeTable) {
    if is_unique_pointer_type(types, c.ty) {
        c.ty = TypeTable::PTR;
    }
}

fn retype_constant(c: &mut Constant, types: &TypeTable) {
    let ty = match c {
        Constant::Bool { ty, .. }
        | Constant::Int { ty, .. }
        | Constant::Address { ty, .. }
        | Constant::Func { ty, .. }
        | Constant::Str { ty, .. } => ty,
    };
    if is_unique_pointer_type(types, *ty) {
        *ty = TypeTable::PTR;
    }
}

fn retype_value(v: &mut Value, types: &TypeTable) {
    match v {
        Value::Computed(c) => retype_computed(c, types),
        Value::Constant(c) => retype_constant(c, types),
    }
}

/// Retypes every `Computed`/`Constant` appearing anywhere in `instr` whose
/// declared type is a unique pointer. Run after `make_unique`/`delete_unique`
/// have already been rewritten to `malloc`/`free` so their own result/address
/// types are already `ptr`.
fn retype_instr_values(instr: &mut Instr, types: &TypeTable) {
    match instr {
        Instr::Mov { result, origin } => {
            retype_computed(result, types);
            retype_value(origin, types);
        }
        Instr::Phi { result, args } => {
            retype_computed(result, types);
            for arg in args {
                retype_value(&mut arg.value, types);
            }
        }
        Instr::Conv { result, operand }
        | Instr::BoolNot { result, operand }
        | Instr::IntUnary { result, operand, .. }
        | Instr::NilTest { result, operand } => {
            retype_computed(result, types);
            retype_value(operand, types);
        }
        Instr::BoolBinary { result, lhs, rhs, .. }
        | Instr::IntCompare { result, lhs, rhs, .. }
        | Instr::IntBinary { result, lhs, rhs, .. } => {
            retype_computed(result, types);
            retype_value(lhs, types);
            retype_value(rhs, types);
        }
        Instr::IntShift { result, shifted, offset, .. } => {
            retype_computed(result, types);
            retype_value(shifted, types);
            retype_value(offset, types);
        }
        Instr::PointerOffset { result, pointer, offset } => {
            retype_computed(result, types);
            retype_value(pointer, types);
            retype_value(offset, types);
        }
        Instr::Malloc { result, size } => {
            retype_computed(result, types);
            retype_value(size, types);
        }
        Instr::Load { result, address } => {
            retype_computed(result, types);
            retype_value(address, types);
        }
        Instr::Store { address, value } => {
            retype_value(address, types);
            retype_value(value, types);
        }
        Instr::Free { address } => retype_value(address, types),
        Instr::Jump { .. } => {}
        Instr::JumpCond { condition, .. } => retype_value(condition, types),
        Instr::Syscall { result, number, args } => {
            retype_computed(result, types);
            retype_value(number, types);
            for arg in args {
                retype_value(arg, types);
            }
        }
        Instr::Call { results, callee, args } => {
            for result in results {
                retype_computed(result, types);
            }
            retype_value(callee, types);
            for arg in args {
                retype_value(arg, types);
            }
        }
        Instr::Return { values } => {
            for value in values {
                retype_value(value, types);
            }
        }
        Instr::MakeShared { result, size } => {
            retype_computed(result, types);
            retype_value(size, types);
        }
        Instr::CopyShared { result, source, offset } => {
            retype_computed(result, types);
            retype_value(source, types);
            retype_value(offset, types);
        }
        Instr::DeleteShared { source } => retype_value(source, types),
        Instr::MakeUnique { result, size } => {
            retype_computed(result, types);
            retype_value(size, types);
        }
        Instr::DeleteUnique { source } => retype_value(source, types),
        Instr::StrIndex { result, string, index } => {
            retype_computed(result, types);
            retype_value(string, types);
            retype_value(index, types);
        }
        Instr::StrConcat { result, operands } => {
            retype_computed(result, types);
            for operand in operands {
                retype_value(operand, types);
            }
        }
    }
}

fn size_times_word(func: &mut Function, block: BlockNumber, size: Value) -> Value {
    if let Value::Constant(Constant::Int { ty, value }) = size {
        return Value::Constant(Constant::Int { ty, value: value * WORD_SIZE });
    }
    let result = Computed::new(func.fresh_value_number(None), TypeTable::I64);
    func.block_mut(block).unwrap().push_instr(Instr::IntBinary {
        result,
        op: IntBinaryOp::Mul,
        lhs: size,
        rhs: Value::Constant(Constant::Int { ty: TypeTable::I64, value: WORD_SIZE }),
    });
    Value::Computed(result)
}

fn lower_unique_pointers_in_func(func: &mut Function, types: &TypeTable) {
    for arg in func.args_mut() {
        retype_computed(arg, types);
    }
    for ty in func.result_types_mut() {
        if is_unique_pointer_type(types, *ty) {
            *ty = TypeTable::PTR;
        }
    }

    for block_num in func.blocks_in_dominance_order() {
        let old_instrs = std::mem::take(func.block_mut(block_num).unwrap().instrs_mut());
        let mut new_instrs = Vec::with_capacity(old_instrs.len());
        for instr in old_instrs {
            match instr {
                Instr::MakeUnique { mut result, size } => {
                    result.ty = TypeTable::PTR;
                    let byte_size = size_times_word(func, block_num, size);
                    new_instrs.push(Instr::Malloc { result, size: byte_size });
                }
                Instr::DeleteUnique { source } => {
                    new_instrs.push(Instr::Free { address: source });
                }
                mut other => {
                    retype_instr_values(&mut other, types);
                    new_instrs.push(other);
                }
            }
        }
        *func.block_mut(block_num).unwrap().instrs_mut() = new_instrs;
    }
}

/// Lowers every unique pointer in `program` to a plain `ptr`, per §4.5.4.
/// Unused `UniquePointer` entries left behind in the type table are
/// harmless (§4.2: dangling table entries never affect equality or
/// checking, only reachable types are printed).
pub fn lower_unique_pointers_in_program(program: &mut Program) {
    let types = program.types().clone();
    let func_nums: Vec<FuncNumber> = program.funcs().map(|f| f.number()).collect();
    for func_num in func_nums {
        let func = program.func_mut(func_num).unwrap();
        lower_unique_pointers_in_func(func, &types);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_ir::types::Type;

    #[test]
    fn make_unique_and_delete_unique_become_malloc_and_free() {
        let mut program = Program::new();
        let unique_i16 = program.types_mut().intern(Type::UniquePointer { elem: TypeTable::I16 });
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(TypeTable::I16);
        let b0 = func.add_block(None);

        let p = Computed::new(func.fresh_value_number(None), unique_i16);
        func.block_mut(b0).unwrap().push_instr(Instr::MakeUnique {
            result: p,
            size: Value::Constant(Constant::Int { ty: TypeTable::I64, value: 1 }),
        });
        func.block_mut(b0).unwrap().push_instr(Instr::Store {
            address: Value::Computed(p),
            value: Value::Constant(Constant::Int { ty: TypeTable::I16, value: 123 }),
        });
        let v1 = Computed::new(func.fresh_value_number(None), TypeTable::I16);
        func.block_mut(b0).unwrap().push_instr(Instr::Load { result: v1, address: Value::Computed(p) });
        func.block_mut(b0).unwrap().push_instr(Instr::DeleteUnique { source: Value::Computed(p) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(v1)] });

        lower_unique_pointers_in_program(&mut program);

        let func = program.func(f).unwrap();
        let instrs = func.block(b0).unwrap().instrs();
        assert!(matches!(
            instrs[0],
            Instr::Malloc { size: Value::Constant(Constant::Int { value: 8, .. }), .. }
        ));
        assert!(matches!(instrs[2], Instr::Load { address: Value::Computed(c), .. } if c.ty == TypeTable::PTR));
        assert!(matches!(instrs[3], Instr::Free { .. }));
    }
}
