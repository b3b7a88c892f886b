//! Removes functions unreachable from the program's entry function — the
//! optional cleanup stage at the end of the build pipeline (§4.6).
//!
//! "Reachable" isn't just direct `call` targets: a function value can be
//! stored, returned, passed as data, or dispatched through an interface
//! method table and invoked indirectly later, so reachability is computed
//! over every `func` constant any reachable function's instructions name
//! anywhere, not only `call`'s own callee operand.

use katara_ir::instr::Instr;
use katara_ir::program::Program;
use katara_ir::value::{Constant, FuncNumber, Value};
use std::collections::{HashSet, VecDeque};

fn push_if_func(value: &Value, out: &mut Vec<FuncNumber>) {
    if let Value::Constant(Constant::Func { value: Some(n), .. }) = value {
        out.push(*n);
    }
}

fn funcs_referenced_by(instr: &Instr) -> Vec<FuncNumber> {
    let mut out = Vec::new();
    for value in instr.used_values() {
        push_if_func(&value, &mut out);
    }
    if let Instr::Phi { args, .. } = instr {
        for arg in args {
            push_if_func(&arg.value, &mut out);
        }
    }
    out
}

/// Deletes every function not reachable from `program`'s entry function
/// (§4.6). A no-op if the program has no entry function set.
pub fn remove_unused_functions(program: &mut Program) {
    let Some(entry) = program.entry_func_num() else { return };
    let mut reachable: HashSet<FuncNumber> = HashSet::new();
    let mut queue: VecDeque<FuncNumber> = VecDeque::new();
    reachable.insert(entry);
    queue.push_back(entry);

    while let Some(func_num) = queue.pop_front() {
        let Some(func) = program.func(func_num) else { continue };
        for block in func.blocks() {
            for instr in block.instrs() {
                for referenced in funcs_referenced_by(instr) {
                    if reachable.insert(referenced) {
                        queue.push_back(referenced);
                    }
                }
            }
        }
    }

    let all: Vec<FuncNumber> = program.funcs().map(|f| f.number()).collect();
    for func_num in all {
        if !reachable.contains(&func_num) {
            program.remove_func(func_num);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_ir::instr::Instr;
    use katara_ir::types::TypeTable;
    use katara_ir::value::{Computed, Value};

    #[test]
    fn unreferenced_function_is_removed() {
        let mut program = Program::new();
        let main = program.add_func(None);
        let func = program.func_mut(main).unwrap();
        let b0 = func.add_block(None);
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![] });

        let dead = program.add_func(None);
        program.func_mut(dead).unwrap().add_block(None);

        remove_unused_functions(&mut program);

        assert!(program.has_func(main));
        assert!(!program.has_func(dead));
    }

    #[test]
    fn function_reachable_only_as_a_stored_value_survives() {
        let mut program = Program::new();
        let callback = program.add_func(None);
        program.func_mut(callback).unwrap().add_block(None);

        let main = program.add_func(None);
        let func = program.func_mut(main).unwrap();
        let b0 = func.add_block(None);
        let holder = Computed::new(func.fresh_value_number(None), TypeTable::FUNC);
        func.block_mut(b0).unwrap().push_instr(Instr::Mov {
            result: holder,
            origin: Value::Constant(katara_ir::value::Constant::Func { ty: TypeTable::FUNC, value: Some(callback) }),
        });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(holder)] });

        remove_unused_functions(&mut program);

        assert!(program.has_func(callback));
    }
}
