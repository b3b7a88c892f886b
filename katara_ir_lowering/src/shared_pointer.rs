//! Shared-pointer lowering (§4.5.3), grounded on
//! `LowerSharedPointersInFunc` and its per-instruction-kind helpers in
//! `examples/original_source/src/lang/processors/ir/lowerers/shared_pointer_lowerer.cc`.
//! Every shared-pointer-typed computed value is decomposed into a pair of
//! primitive pointers, the control-block pointer and the underlying
//! pointer; `decomposed[value_num]` tracks that pair as blocks are visited
//! in dominance order, mirroring the original's
//! `std::unordered_map<value_num_t, DecomposedShared>`. Phi args are filled
//! in a second pass once every block has contributed its decompositions.

use crate::runtime::{add_shared_pointer_runtime_funcs, SharedPointerRuntimeFuncs};
use katara_ir::function::Function;
use katara_ir::instr::Instr;
use katara_ir::program::Program;
use katara_ir::types::{PointerStrength, Type, TypeKey, TypeTable};
use katara_ir::value::{BlockNumber, Computed, Constant, FuncNumber, InheritedValue, Value, ValueNumber};
use std::collections::HashMap;

/// Offset, within a shared-pointer value stored inline as a 16-byte pair,
/// of the underlying pointer (the control-block pointer occupies the first
/// 8 bytes, §4.5.3 "load/store where the value type is a shared pointer").
const NESTED_UNDERLYING_OFFSET: i64 = 8;

#[derive(Debug, Clone, Copy)]
struct DecomposedShared {
    cb: Computed,
    underlying: Computed,
}

struct PhiLoweringInfo {
    block: BlockNumber,
    instr_index: usize,
    arg_origins: Vec<(BlockNumber, ValueNumber)>,
}

fn fresh(func: &mut Function, ty: TypeKey) -> Computed {
    Computed::new(func.fresh_value_number(None), ty)
}

fn shared_pointer_info(types: &TypeTable, ty: TypeKey) -> Option<(TypeKey, PointerStrength)> {
    match types.get(ty) {
        Type::SharedPointer { elem, strength } => Some((*elem, *strength)),
        _ => None,
    }
}

fn int_const(value: i64) -> Value {
    Value::Constant(Constant::Int { ty: TypeTable::I64, value })
}

fn func_const(num: FuncNumber) -> Value {
    Value::Constant(Constant::Func { ty: TypeTable::FUNC, value: Some(num) })
}

fn is_nil_address(value: &Value) -> bool {
    matches!(value, Value::Constant(Constant::Address { value: 0, .. }))
}

fn nil_ptr() -> Value {
    Value::Constant(Constant::Address { ty: TypeTable::PTR, value: 0 })
}

fn validate_weak_call(runtime: &SharedPointerRuntimeFuncs, cb: Computed) -> Instr {
    Instr::Call {
        results: vec![],
        callee: func_const(runtime.validate_weak_shared),
        args: vec![Value::Computed(cb)],
    }
}

/// The destructor to record in a `make_shared` control block for a payload
/// of type `elem` (§4.5.3): nil for primitive payloads, the matching
/// `delete_ptr_to_{strong,weak}_shared` stub when the payload is itself a
/// shared pointer.
fn destructor_for_type(types: &TypeTable, elem: TypeKey, runtime: &SharedPointerRuntimeFuncs) -> Value {
    match shared_pointer_info(types, elem) {
        Some((_, PointerStrength::Strong)) => func_const(runtime.delete_ptr_to_strong_shared),
        Some((_, PointerStrength::Weak)) => func_const(runtime.delete_ptr_to_weak_shared),
        None => Value::Constant(Constant::Func { ty: TypeTable::FUNC, value: None }),
    }
}

fn lower_make_shared(
    func: &mut Function,
    types: &TypeTable,
    result: Computed,
    size: Value,
    decomposed: &mut HashMap<ValueNumber, DecomposedShared>,
    runtime: &SharedPointerRuntimeFuncs,
) -> Vec<Instr> {
    let (elem, _) = shared_pointer_info(types, result.ty).expect("make_shared result must be a shared pointer");
    let destructor = destructor_for_type(types, elem, runtime);
    let element_size = int_const(types.byte_size(elem) as i64);

    let cb = fresh(func, TypeTable::PTR);
    let underlying = fresh(func, TypeTable::PTR);
    decomposed.insert(result.number, DecomposedShared { cb, underlying });

    vec![Instr::Call {
        results: vec![cb, underlying],
        callee: func_const(runtime.make_shared),
        args: vec![element_size, size, destructor],
    }]
}

fn lower_copy_shared(
    func: &mut Function,
    result: Computed,
    source: Value,
    offset: Value,
    decomposed: &mut HashMap<ValueNumber, DecomposedShared>,
    runtime: &SharedPointerRuntimeFuncs,
    strength: PointerStrength,
) -> Vec<Instr> {
    let source_num = source.as_computed().expect("copy_shared source must be computed").number;
    let decomposed_source = *decomposed.get(&source_num).expect("copy_shared source not decomposed");

    let new_underlying = fresh(func, TypeTable::PTR);
    decomposed.insert(result.number, DecomposedShared { cb: decomposed_source.cb, underlying: new_underlying });

    let copy_func = match strength {
        PointerStrength::Strong => runtime.strong_copy_shared,
        PointerStrength::Weak => runtime.weak_copy_shared,
    };
    vec![Instr::Call {
        results: vec![new_underlying],
        callee: func_const(copy_func),
        args: vec![
            Value::Computed(decomposed_source.cb),
            Value::Computed(decomposed_source.underlying),
            offset,
        ],
    }]
}

fn lower_delete_shared(
    source: Value,
    decomposed: &HashMap<ValueNumber, DecomposedShared>,
    runtime: &SharedPointerRuntimeFuncs,
    strength: PointerStrength,
) -> Vec<Instr> {
    let source_num = source.as_computed().expect("delete_shared source must be computed").number;
    let decomposed_source = *decomposed.get(&source_num).expect("delete_shared source not decomposed");
    let delete_func = match strength {
        PointerStrength::Strong => runtime.delete_strong_shared,
        PointerStrength::Weak => runtime.delete_weak_shared,
    };
    vec![Instr::Call {
        results: vec![],
        callee: func_const(delete_func),
        args: vec![Value::Computed(decomposed_source.cb)],
    }]
}

fn lower_load(
    func: &mut Function,
    types: &TypeTable,
    result: Computed,
    address: Value,
    decomposed: &mut HashMap<ValueNumber, DecomposedShared>,
    runtime: &SharedPointerRuntimeFuncs,
) -> Vec<Instr> {
    let mut out = Vec::new();
    let result_is_shared = shared_pointer_info(types, result.ty).is_some();

    let nested_source_addr = if let Some(addr_num) = address.as_computed().map(|c| c.number) {
        if let Some((_, strength)) = shared_pointer_info(types, address.ty()) {
            let decomposed_addr = *decomposed.get(&addr_num).expect("load address not decomposed");
            if strength == PointerStrength::Weak {
                out.push(validate_weak_call(runtime, decomposed_addr.cb));
            }
            if !result_is_shared {
                out.push(Instr::Load { result, address: Value::Computed(decomposed_addr.underlying) });
            }
            Value::Computed(decomposed_addr.underlying)
        } else {
            address.clone()
        }
    } else {
        address.clone()
    };

    if result_is_shared {
        let cb = fresh(func, TypeTable::PTR);
        let underlying = fresh(func, TypeTable::PTR);
        out.push(Instr::Load { result: cb, address: nested_source_addr.clone() });
        let underlying_addr = fresh(func, TypeTable::PTR);
        out.push(Instr::PointerOffset {
            result: underlying_addr,
            pointer: nested_source_addr,
            offset: int_const(NESTED_UNDERLYING_OFFSET),
        });
        out.push(Instr::Load { result: underlying, address: Value::Computed(underlying_addr) });
        decomposed.insert(result.number, DecomposedShared { cb, underlying });
    }

    out
}

fn lower_store(
    func: &mut Function,
    types: &TypeTable,
    address: Value,
    value: Value,
    decomposed: &HashMap<ValueNumber, DecomposedShared>,
    runtime: &SharedPointerRuntimeFuncs,
) -> Vec<Instr> {
    let mut out = Vec::new();
    let value_is_shared = shared_pointer_info(types, value.ty()).is_some();

    let nested_dest_addr = if let Some(addr_num) = address.as_computed().map(|c| c.number) {
        if let Some((_, strength)) = shared_pointer_info(types, address.ty()) {
            let decomposed_addr = *decomposed.get(&addr_num).expect("store address not decomposed");
            if strength == PointerStrength::Weak {
                out.push(validate_weak_call(runtime, decomposed_addr.cb));
            }
            if !value_is_shared {
                out.push(Instr::Store { address: Value::Computed(decomposed_addr.underlying), value });
                return out;
            }
            Value::Computed(decomposed_addr.underlying)
        } else {
            address.clone()
        }
    } else {
        address.clone()
    };

    if value_is_shared {
        let (cb_value, underlying_value) = if is_nil_address(&value) {
            (nil_ptr(), nil_ptr())
        } else {
            let value_num = value.as_computed().expect("stored shared pointer must be computed").number;
            let decomposed_value = *decomposed.get(&value_num).expect("stored value not decomposed");
            (Value::Computed(decomposed_value.cb), Value::Computed(decomposed_value.underlying))
        };
        out.push(Instr::Store { address: nested_dest_addr.clone(), value: cb_value });
        let underlying_addr = fresh(func, TypeTable::PTR);
        out.push(Instr::PointerOffset {
            result: underlying_addr,
            pointer: nested_dest_addr,
            offset: int_const(NESTED_UNDERLYING_OFFSET),
        });
        out.push(Instr::Store { address: Value::Computed(underlying_addr), value: underlying_value });
    }

    out
}

fn lower_mov(
    func: &mut Function,
    types: &TypeTable,
    result: Computed,
    origin: Value,
    decomposed: &mut HashMap<ValueNumber, DecomposedShared>,
) -> Vec<Instr> {
    if shared_pointer_info(types, result.ty).is_none() {
        return vec![Instr::Mov { result, origin }];
    }

    if is_nil_address(&origin) {
        let cb = fresh(func, TypeTable::PTR);
        let underlying = fresh(func, TypeTable::PTR);
        decomposed.insert(result.number, DecomposedShared { cb, underlying });
        vec![
            Instr::Mov { result: cb, origin: nil_ptr() },
            Instr::Mov { result: underlying, origin: nil_ptr() },
        ]
    } else {
        let origin_num = origin.as_computed().expect("mov origin must be computed").number;
        let decomposed_origin = *decomposed.get(&origin_num).expect("mov origin not decomposed");
        decomposed.insert(result.number, decomposed_origin);
        vec![]
    }
}

fn lower_call(
    func: &mut Function,
    types: &TypeTable,
    results: Vec<Computed>,
    callee: Value,
    args: Vec<Value>,
    decomposed: &mut HashMap<ValueNumber, DecomposedShared>,
) -> Vec<Instr> {
    let mut new_args = Vec::with_capacity(args.len());
    for arg in args {
        if let Some(arg_c) = arg.as_computed() {
            if let Some(_) = shared_pointer_info(types, arg_c.ty) {
                let decomposed_arg = *decomposed.get(&arg_c.number).expect("call arg not decomposed");
                new_args.push(Value::Computed(decomposed_arg.cb));
                new_args.push(Value::Computed(decomposed_arg.underlying));
                continue;
            }
        }
        new_args.push(arg);
    }

    let mut new_results = Vec::with_capacity(results.len());
    for result in results {
        if shared_pointer_info(types, result.ty).is_some() {
            let cb = fresh(func, TypeTable::PTR);
            let underlying = fresh(func, TypeTable::PTR);
            decomposed.insert(result.number, DecomposedShared { cb, underlying });
            new_results.push(cb);
            new_results.push(underlying);
        } else {
            new_results.push(result);
        }
    }

    vec![Instr::Call { results: new_results, callee, args: new_args }]
}

fn lower_return(
    types: &TypeTable,
    values: Vec<Value>,
    decomposed: &HashMap<ValueNumber, DecomposedShared>,
) -> Vec<Instr> {
    let mut new_values = Vec::with_capacity(values.len());
    for value in values {
        if let Some(value_c) = value.as_computed() {
            if shared_pointer_info(types, value_c.ty).is_some() {
                let decomposed_value = *decomposed.get(&value_c.number).expect("return value not decomposed");
                new_values.push(Value::Computed(decomposed_value.cb));
                new_values.push(Value::Computed(decomposed_value.underlying));
                continue;
            }
        }
        new_values.push(value);
    }
    vec![Instr::Return { values: new_values }]
}

/// Splits every shared-pointer-typed argument into two consecutive
/// primitive-pointer arguments, in place (§4.5.3).
fn lower_func_args(func: &mut Function, types: &TypeTable, decomposed: &mut HashMap<ValueNumber, DecomposedShared>) {
    let old_args = func.args().to_vec();
    let mut new_args = Vec::with_capacity(old_args.len());
    for arg in old_args {
        if shared_pointer_info(types, arg.ty).is_some() {
            let cb = fresh(func, TypeTable::PTR);
            let underlying = fresh(func, TypeTable::PTR);
            decomposed.insert(arg.number, DecomposedShared { cb, underlying });
            new_args.push(cb);
            new_args.push(underlying);
        } else {
            new_args.push(arg);
        }
    }
    *func.args_mut() = new_args;
}

/// Splits every shared-pointer-typed result type into two consecutive
/// primitive-pointer result types, in place (§4.5.3).
fn lower_func_results(func: &mut Function, types: &TypeTable) {
    let old_results = func.result_types().to_vec();
    let mut new_results = Vec::with_capacity(old_results.len());
    for ty in old_results {
        if shared_pointer_info(types, ty).is_some() {
            new_results.push(TypeTable::PTR);
            new_results.push(TypeTable::PTR);
        } else {
            new_results.push(ty);
        }
    }
    *func.result_types_mut() = new_results;
}

fn lower_block(
    func: &mut Function,
    types: &TypeTable,
    block_num: BlockNumber,
    decomposed: &mut HashMap<ValueNumber, DecomposedShared>,
    phi_infos: &mut Vec<PhiLoweringInfo>,
    runtime: &SharedPointerRuntimeFuncs,
) {
    let old_instrs = std::mem::take(func.block_mut(block_num).unwrap().instrs_mut());
    let mut new_instrs = Vec::with_capacity(old_instrs.len());

    for instr in old_instrs {
        match instr {
            Instr::MakeShared { result, size } => {
                new_instrs.extend(lower_make_shared(func, types, result, size, decomposed, runtime));
            }
            Instr::CopyShared { result, source, offset } => {
                let (_, strength) =
                    shared_pointer_info(types, result.ty).expect("copy_shared result must be a shared pointer");
                new_instrs.extend(lower_copy_shared(func, result, source, offset, decomposed, runtime, strength));
            }
            Instr::DeleteShared { source } => {
                let (_, strength) = shared_pointer_info(types, source.ty())
                    .expect("delete_shared source must be a shared pointer");
                new_instrs.extend(lower_delete_shared(source, decomposed, runtime, strength));
            }
            Instr::Load { result, address } => {
                new_instrs.extend(lower_load(func, types, result, address, decomposed, runtime));
            }
            Instr::Store { address, value } => {
                new_instrs.extend(lower_store(func, types, address, value, decomposed, runtime));
            }
            Instr::Mov { result, origin } => {
                new_instrs.extend(lower_mov(func, types, result, origin, decomposed));
            }
            Instr::Phi { result, args } if shared_pointer_info(types, result.ty).is_some() => {
                let cb_phi = fresh(func, TypeTable::PTR);
                let underlying_phi = fresh(func, TypeTable::PTR);
                decomposed.insert(result.number, DecomposedShared { cb: cb_phi, underlying: underlying_phi });
                let arg_origins = args
                    .iter()
                    .map(|a| (a.origin, a.value.as_computed().expect("phi arg must be computed").number))
                    .collect();
                phi_infos.push(PhiLoweringInfo {
                    block: block_num,
                    instr_index: new_instrs.len(),
                    arg_origins,
                });
                new_instrs.push(Instr::Phi { result: cb_phi, args: vec![] });
                new_instrs.push(Instr::Phi { result: underlying_phi, args: vec![] });
            }
            Instr::Call { results, callee, args } => {
                new_instrs.extend(lower_call(func, types, results, callee, args, decomposed));
            }
            Instr::Return { values } => {
                new_instrs.extend(lower_return(types, values, decomposed));
            }
            other => new_instrs.push(other),
        }
    }

    *func.block_mut(block_num).unwrap().instrs_mut() = new_instrs;
}

fn fill_phi_args(func: &mut Function, info: &PhiLoweringInfo, decomposed: &HashMap<ValueNumber, DecomposedShared>) {
    let block = func.block_mut(info.block).unwrap();
    let instrs = block.instrs_mut();
    let (cb_args, underlying_args): (Vec<_>, Vec<_>) = info
        .arg_origins
        .iter()
        .map(|&(origin, arg_num)| {
            let decomposed_arg = decomposed.get(&arg_num).expect("phi arg not decomposed");
            (
                InheritedValue::new(Value::Computed(decomposed_arg.cb), origin),
                InheritedValue::new(Value::Computed(decomposed_arg.underlying), origin),
            )
        })
        .unzip();
    if let Instr::Phi { args, .. } = &mut instrs[info.instr_index] {
        *args = cb_args;
    }
    if let Instr::Phi { args, .. } = &mut instrs[info.instr_index + 1] {
        *args = underlying_args;
    }
}

fn lower_shared_pointers_in_func(func: &mut Function, types: &TypeTable, runtime: &SharedPointerRuntimeFuncs) {
    let mut decomposed: HashMap<ValueNumber, DecomposedShared> = HashMap::new();
    let mut phi_infos: Vec<PhiLoweringInfo> = Vec::new();

    lower_func_args(func, types, &mut decomposed);
    lower_func_results(func, types);

    for block_num in func.blocks_in_dominance_order() {
        lower_block(func, types, block_num, &mut decomposed, &mut phi_infos, runtime);
    }

    for info in &phi_infos {
        fill_phi_args(func, info, &decomposed);
    }
}

/// Adds the shared-pointer runtime-support functions and lowers every
/// function's shared pointers to primitive-pointer pairs (§4.5.2, §4.5.3).
pub fn lower_shared_pointers_in_program(program: &mut Program) -> SharedPointerRuntimeFuncs {
    let runtime = add_shared_pointer_runtime_funcs(program);
    let types = program.types().clone();
    let func_nums: Vec<FuncNumber> = program.funcs().map(|f| f.number()).collect();
    for func_num in func_nums {
        let func = program.func_mut(func_num).unwrap();
        lower_shared_pointers_in_func(func, &types, &runtime);
    }
    runtime
}

#[cfg(test)]
mod tests {
    use super::*;
    use katara_ir::types::Type;

    /// §8.3 S3: `make_shared` of an `lshared_ptr<func, s>` lowers to a call
    /// into the synthesized `make_shared` with `(element_size, size,
    /// destructor) = (8, 1, @-1)` — 8 is `func`'s byte size, 1 is the
    /// original instruction's own size operand passed through unchanged, and
    /// `@-1` is nil because `func` is not itself a shared pointer.
    #[test]
    fn make_shared_of_a_func_element_calls_runtime_with_its_byte_size() {
        let mut program = Program::new();
        let shared_func =
            program.types_mut().intern(Type::SharedPointer { elem: TypeTable::FUNC, strength: PointerStrength::Strong });
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(shared_func);
        let b0 = func.add_block(None);
        let r = Computed::new(func.fresh_value_number(None), shared_func);
        func.block_mut(b0).unwrap().push_instr(Instr::MakeShared { result: r, size: int_const(1) });
        func.block_mut(b0).unwrap().push_instr(Instr::Store { address: Value::Computed(r), value: func_const(0) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(r)] });

        lower_shared_pointers_in_program(&mut program);

        let func = program.func(f).unwrap();
        let instrs = func.block(b0).unwrap().instrs();
        match &instrs[0] {
            Instr::Call { args, .. } => {
                assert!(matches!(args[0], Value::Constant(Constant::Int { value: 8, .. })));
                assert!(matches!(args[1], Value::Constant(Constant::Int { value: 1, .. })));
                assert!(matches!(args[2], Value::Constant(Constant::Func { value: None, .. })));
            }
            other => panic!("expected a call to the runtime make_shared, got {other:?}"),
        }
        assert_eq!(func.result_types(), &[TypeTable::PTR, TypeTable::PTR]);
    }

    /// A payload that is itself a shared pointer gets the matching
    /// `delete_ptr_to_{strong,weak}_shared` destructor stub (§4.5.3), and the
    /// nested element's own two-pointer representation makes its size 16.
    #[test]
    fn make_shared_of_a_nested_shared_element_uses_the_ptr_destructor_stub() {
        let mut program = Program::new();
        let inner = program.types_mut().intern(Type::SharedPointer { elem: TypeTable::I64, strength: PointerStrength::Strong });
        let outer = program.types_mut().intern(Type::SharedPointer { elem: inner, strength: PointerStrength::Strong });
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(outer);
        let b0 = func.add_block(None);
        let r = Computed::new(func.fresh_value_number(None), outer);
        func.block_mut(b0).unwrap().push_instr(Instr::MakeShared { result: r, size: int_const(1) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(r)] });

        let runtime = lower_shared_pointers_in_program(&mut program);

        let func = program.func(f).unwrap();
        let instrs = func.block(b0).unwrap().instrs();
        match &instrs[0] {
            Instr::Call { args, .. } => {
                assert!(matches!(args[0], Value::Constant(Constant::Int { value: 16, .. })));
                assert!(matches!(
                    args[2],
                    Value::Constant(Constant::Func { value: Some(n), .. }) if n == runtime.delete_ptr_to_strong_shared
                ));
            }
            other => panic!("expected a call to the runtime make_shared, got {other:?}"),
        }
    }

    /// `copy_shared`/`delete_shared` on a weak pointer dispatch to the
    /// `weak_*` runtime functions rather than the strong ones (§4.5.3).
    #[test]
    fn weak_copy_and_delete_dispatch_to_the_weak_runtime_funcs() {
        let mut program = Program::new();
        let weak_ty = program.types_mut().intern(Type::SharedPointer { elem: TypeTable::I64, strength: PointerStrength::Weak });
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        let b0 = func.add_block(None);
        let p = Computed::new(func.fresh_value_number(None), weak_ty);
        func.block_mut(b0).unwrap().push_instr(Instr::MakeShared { result: p, size: int_const(1) });
        let q = Computed::new(func.fresh_value_number(None), weak_ty);
        func.block_mut(b0)
            .unwrap()
            .push_instr(Instr::CopyShared { result: q, source: Value::Computed(p), offset: int_const(0) });
        func.block_mut(b0).unwrap().push_instr(Instr::DeleteShared { source: Value::Computed(q) });
        func.block_mut(b0).unwrap().push_instr(Instr::DeleteShared { source: Value::Computed(p) });
        func.block_mut(b0).unwrap().push_instr(Instr::Return { values: vec![] });

        let runtime = lower_shared_pointers_in_program(&mut program);

        let func = program.func(f).unwrap();
        let instrs = func.block(b0).unwrap().instrs();
        assert!(matches!(
            &instrs[1],
            Instr::Call { callee: Value::Constant(Constant::Func { value: Some(n), .. }), .. }
                if *n == runtime.weak_copy_shared
        ));
        assert!(matches!(
            &instrs[2],
            Instr::Call { callee: Value::Constant(Constant::Func { value: Some(n), .. }), .. }
                if *n == runtime.delete_weak_shared
        ));
        assert!(matches!(
            &instrs[3],
            Instr::Call { callee: Value::Constant(Constant::Func { value: Some(n), .. }), .. }
                if *n == runtime.delete_strong_shared
        ));
    }

    /// A `phi` joining two shared-pointer values lowers to a pair of
    /// primitive phis, one per component, with args filled in once every
    /// predecessor block's decomposition is known (§4.5.3).
    #[test]
    fn phi_of_shared_pointers_lowers_to_a_phi_pair() {
        let mut program = Program::new();
        let shared_i64 = program.types_mut().intern(Type::SharedPointer { elem: TypeTable::I64, strength: PointerStrength::Strong });
        let f = program.add_func(None);
        let func = program.func_mut(f).unwrap();
        func.result_types_mut().push(shared_i64);

        let entry = func.add_block(None);
        let left = func.add_block(None);
        let right = func.add_block(None);
        let join = func.add_block(None);
        func.add_control_flow(entry, left);
        func.add_control_flow(entry, right);
        func.add_control_flow(left, join);
        func.add_control_flow(right, join);

        let a = Computed::new(func.fresh_value_number(None), shared_i64);
        func.block_mut(left).unwrap().push_instr(Instr::MakeShared { result: a, size: int_const(1) });
        func.block_mut(left).unwrap().push_instr(Instr::Jump { target: join });
        let b = Computed::new(func.fresh_value_number(None), shared_i64);
        func.block_mut(right).unwrap().push_instr(Instr::MakeShared { result: b, size: int_const(1) });
        func.block_mut(right).unwrap().push_instr(Instr::Jump { target: join });
        func.block_mut(entry).unwrap().push_instr(Instr::JumpCond {
            condition: Value::Constant(Constant::Bool { ty: TypeTable::BOOL, value: true }),
            target_true: left,
            target_false: right,
        });

        let p = Computed::new(func.fresh_value_number(None), shared_i64);
        func.block_mut(join).unwrap().push_instr(Instr::Phi {
            result: p,
            args: vec![InheritedValue::new(Value::Computed(a), left), InheritedValue::new(Value::Computed(b), right)],
        });
        func.block_mut(join).unwrap().push_instr(Instr::Return { values: vec![Value::Computed(p)] });

        lower_shared_pointers_in_program(&mut program);

        let func = program.func(f).unwrap();
        let join_instrs = func.block(join).unwrap().instrs();
        let phis: Vec<&Instr> = join_instrs.iter().filter(|i| matches!(i, Instr::Phi { .. })).collect();
        assert_eq!(phis.len(), 2);
        for phi in phis {
            if let Instr::Phi { args, .. } = phi {
                assert_eq!(args.len(), 2);
            }
        }
    }
}
