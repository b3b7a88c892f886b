//! Position bundles (§4.1): structured records of source ranges for every
//! parsed or printed program/function/block/instruction, grounded on
//! `examples/original_source/src/ir/serialization/positions.h` and
//! `positions_util.h`.

use katara_common::position::Range;
use katara_ir::value::{BlockNumber, FuncNumber};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct FuncPositions {
    pub number: Range,
    pub name: Option<Range>,
    pub args_outer: Range,
    pub args: Vec<Range>,
    pub results_outer: Range,
    pub results: Vec<Range>,
    pub body: Range,
}

#[derive(Debug, Clone, Default)]
pub struct BlockPositions {
    pub number: Range,
    pub name: Option<Range>,
    pub body: Range,
}

/// Per-instruction ranges: the opcode name, each defined value individually
/// and as a whole, each used value individually and as a whole. Structural
/// helpers below recover named sub-ranges (e.g. "the true-branch label of a
/// `jcc`") by indexing into `used`/`defined` the way the instruction's
/// `used_values()`/`defined()` order already promises.
#[derive(Debug, Clone, Default)]
pub struct InstrPositions {
    pub opcode: Range,
    pub defined: Vec<Range>,
    pub defined_all: Range,
    pub used: Vec<Range>,
    pub used_all: Range,
}

impl InstrPositions {
    pub fn defined_at(&self, index: usize) -> Range {
        self.defined.get(index).copied().unwrap_or(katara_common::position::NO_RANGE)
    }

    pub fn used_at(&self, index: usize) -> Range {
        self.used.get(index).copied().unwrap_or(katara_common::position::NO_RANGE)
    }

    // mov %r = mov %s
    pub fn mov_result_range(&self) -> Range {
        self.defined_at(0)
    }
    pub fn mov_operand_range(&self) -> Range {
        self.used_at(0)
    }

    // %r = phi %a{Ba}, %b{Bb}, ...
    pub fn phi_result_range(&self) -> Range {
        self.defined_at(0)
    }
    pub fn phi_operand_range(&self, operand_index: usize) -> Range {
        self.used_at(operand_index)
    }

    // jcc condition, {true}, {false} — condition is used[0]; the two block
    // labels are block refs, not "used values", so they have no sub-range
    // here. A diagnostic that needs to underline a jump destination reports
    // against the whole instruction's `used_all`/`opcode` range instead.
    pub fn jcc_condition_range(&self) -> Range {
        self.used_at(0)
    }

    // call callee(args...)
    pub fn call_callee_range(&self) -> Range {
        self.used_at(0)
    }
    pub fn call_arg_range(&self, arg_index: usize) -> Range {
        self.used_at(arg_index + 1)
    }

    // ret values...
    pub fn ret_value_range(&self, index: usize) -> Range {
        self.used_at(index)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgramPositions {
    pub funcs: BTreeMap<FuncNumber, FuncPositions>,
    pub blocks: BTreeMap<(FuncNumber, BlockNumber), BlockPositions>,
    pub instrs: BTreeMap<(FuncNumber, BlockNumber, usize), InstrPositions>,
}

impl ProgramPositions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn func(&self, func_num: FuncNumber) -> Option<&FuncPositions> {
        self.funcs.get(&func_num)
    }

    pub fn block(&self, func_num: FuncNumber, block_num: BlockNumber) -> Option<&BlockPositions> {
        self.blocks.get(&(func_num, block_num))
    }

    pub fn instr(
        &self,
        func_num: FuncNumber,
        block_num: BlockNumber,
        instr_index: usize,
    ) -> Option<&InstrPositions> {
        self.instrs.get(&(func_num, block_num, instr_index))
    }
}
