//! Instructions (§3.3). Each variant carries a fixed operand layout; all
//! per-kind behavior (printing, checking, lowering) is driven by matching on
//! the variant rather than through virtual dispatch (design note §9).

use crate::value::{BlockNumber, Computed, InheritedValue, Value};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolBinaryOp {
    And,
    Or,
}

impl BoolBinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BoolBinaryOp::And => "band",
            BoolBinaryOp::Or => "bor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntUnaryOp {
    Neg,
    Not,
}

impl IntUnaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntUnaryOp::Neg => "ineg",
            IntUnaryOp::Not => "inot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntCompareOp {
    Eq,
    Neq,
    Lss,
    Leq,
    Gtr,
    Geq,
}

impl IntCompareOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntCompareOp::Eq => "ieq",
            IntCompareOp::Neq => "ineq",
            IntCompareOp::Lss => "ilss",
            IntCompareOp::Leq => "ileq",
            IntCompareOp::Gtr => "igtr",
            IntCompareOp::Geq => "igeq",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Andn,
}

impl IntBinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntBinaryOp::Add => "iadd",
            IntBinaryOp::Sub => "isub",
            IntBinaryOp::Mul => "imul",
            IntBinaryOp::Div => "idiv",
            IntBinaryOp::Rem => "irem",
            IntBinaryOp::And => "iand",
            IntBinaryOp::Or => "ior",
            IntBinaryOp::Xor => "ixor",
            IntBinaryOp::Andn => "iandn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntShiftOp {
    Shl,
    Shr,
}

impl IntShiftOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntShiftOp::Shl => "ishl",
            IntShiftOp::Shr => "ishr",
        }
    }
}

/// An instruction, per §3.3. Control-flow instructions are `Jump`,
/// `JumpCond`, and `Return` (§3.3, last sentence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    Mov { result: Computed, origin: Value },
    Phi { result: Computed, args: Vec<InheritedValue> },
    Conv { result: Computed, operand: Value },
    BoolNot { result: Computed, operand: Value },
    BoolBinary { result: Computed, op: BoolBinaryOp, lhs: Value, rhs: Value },
    IntUnary { result: Computed, op: IntUnaryOp, operand: Value },
    IntCompare { result: Computed, op: IntCompareOp, lhs: Value, rhs: Value },
    IntBinary { result: Computed, op: IntBinaryOp, lhs: Value, rhs: Value },
    IntShift { result: Computed, op: IntShiftOp, shifted: Value, offset: Value },
    PointerOffset { result: Computed, pointer: Value, offset: Value },
    NilTest { result: Computed, operand: Value },
    Malloc { result: Computed, size: Value },
    Load { result: Computed, address: Value },
    Store { address: Value, value: Value },
    Free { address: Value },
    Jump { target: BlockNumber },
    JumpCond { condition: Value, target_true: BlockNumber, target_false: BlockNumber },
    Syscall { result: Computed, number: Value, args: Vec<Value> },
    Call { results: Vec<Computed>, callee: Value, args: Vec<Value> },
    Return { values: Vec<Value> },

    // Extension instructions (shared/unique pointers, strings).
    MakeShared { result: Computed, size: Value },
    CopyShared { result: Computed, source: Value, offset: Value },
    DeleteShared { source: Value },
    MakeUnique { result: Computed, size: Value },
    DeleteUnique { source: Value },
    StrIndex { result: Computed, string: Value, index: Value },
    StrConcat { result: Computed, operands: Vec<Value> },
}

impl Instr {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instr::Mov { .. } => "mov",
            Instr::Phi { .. } => "phi",
            Instr::Conv { .. } => "conv",
            Instr::BoolNot { .. } => "bnot",
            Instr::BoolBinary { op, .. } => op.mnemonic(),
            Instr::IntUnary { op, .. } => op.mnemonic(),
            Instr::IntCompare { op, .. } => op.mnemonic(),
            Instr::IntBinary { op, .. } => op.mnemonic(),
            Instr::IntShift { op, .. } => op.mnemonic(),
            Instr::PointerOffset { .. } => "poff",
            Instr::NilTest { .. } => "niltest",
            Instr::Malloc { .. } => "malloc",
            Instr::Load { .. } => "load",
            Instr::Store { .. } => "store",
            Instr::Free { .. } => "free",
            Instr::Jump { .. } => "jmp",
            Instr::JumpCond { .. } => "jcc",
            Instr::Syscall { .. } => "syscall",
            Instr::Call { .. } => "call",
            Instr::Return { .. } => "ret",
            Instr::MakeShared { .. } => "make_shared",
            Instr::CopyShared { .. } => "copy_shared",
            Instr::DeleteShared { .. } => "delete_shared",
            Instr::MakeUnique { .. } => "make_unique",
            Instr::DeleteUnique { .. } => "delete_unique",
            Instr::StrIndex { .. } => "str_index",
            Instr::StrConcat { .. } => "str_concat",
        }
    }

    pub fn is_control_flow(&self) -> bool {
        matches!(self, Instr::Jump { .. } | Instr::JumpCond { .. } | Instr::Return { .. })
    }

    /// The block numbers this instruction can transfer control to, in the
    /// order its own children-set must match (§3.5 invariant 5).
    pub fn successors(&self) -> SmallVec<[BlockNumber; 2]> {
        match self {
            Instr::Jump { target } => SmallVec::from_slice(&[*target]),
            Instr::JumpCond { target_true, target_false, .. } => {
                SmallVec::from_slice(&[*target_true, *target_false])
            }
            _ => SmallVec::new(),
        }
    }

    /// Every computed value this instruction defines, in order.
    pub fn defined(&self) -> SmallVec<[Computed; 1]> {
        match self {
            Instr::Mov { result, .. }
            | Instr::Phi { result, .. }
            | Instr::Conv { result, .. }
            | Instr::BoolNot { result, .. }
            | Instr::BoolBinary { result, .. }
            | Instr::IntUnary { result, .. }
            | Instr::IntCompare { result, .. }
            | Instr::IntBinary { result, .. }
            | Instr::IntShift { result, .. }
            | Instr::PointerOffset { result, .. }
            | Instr::NilTest { result, .. }
            | Instr::Malloc { result, .. }
            | Instr::Load { result, .. }
            | Instr::Syscall { result, .. }
            | Instr::MakeShared { result, .. }
            | Instr::CopyShared { result, .. }
            | Instr::MakeUnique { result, .. }
            | Instr::StrIndex { result, .. }
            | Instr::StrConcat { result, .. } => SmallVec::from_slice(&[*result]),
            Instr::Call { results, .. } => results.iter().copied().collect(),
            Instr::Store { .. }
            | Instr::Free { .. }
            | Instr::Jump { .. }
            | Instr::JumpCond { .. }
            | Instr::Return { .. }
            | Instr::DeleteShared { .. }
            | Instr::DeleteUnique { .. } => SmallVec::new(),
        }
    }

    /// Non-inherited operand values used by this instruction, in order.
    /// Empty for `Phi`, whose operands are [`Instr::phi_args`] instead.
    pub fn used_values(&self) -> Vec<Value> {
        match self {
            Instr::Mov { origin, .. } => vec![origin.clone()],
            Instr::Phi { .. } => vec![],
            Instr::Conv { operand, .. }
            | Instr::BoolNot { operand, .. }
            | Instr::IntUnary { operand, .. }
            | Instr::NilTest { operand, .. } => vec![operand.clone()],
            Instr::BoolBinary { lhs, rhs, .. }
            | Instr::IntCompare { lhs, rhs, .. }
            | Instr::IntBinary { lhs, rhs, .. } => vec![lhs.clone(), rhs.clone()],
            Instr::IntShift { shifted, offset, .. } => vec![shifted.clone(), offset.clone()],
            Instr::PointerOffset { pointer, offset, .. } => vec![pointer.clone(), offset.clone()],
            Instr::Malloc { size, .. } => vec![size.clone()],
            Instr::Load { address, .. } => vec![address.clone()],
            Instr::Store { address, value } => vec![address.clone(), value.clone()],
            Instr::Free { address } => vec![address.clone()],
            Instr::Jump { .. } => vec![],
            Instr::JumpCond { condition, .. } => vec![condition.clone()],
            Instr::Syscall { number, args, .. } => {
                let mut values = vec![number.clone()];
                values.extend(args.iter().cloned());
                values
            }
            Instr::Call { callee, args, .. } => {
                let mut values = vec![callee.clone()];
                values.extend(args.iter().cloned());
                values
            }
            Instr::Return { values } => values.clone(),
            Instr::MakeShared { size, .. } => vec![size.clone()],
            Instr::CopyShared { source, offset, .. } => vec![source.clone(), offset.clone()],
            Instr::DeleteShared { source } => vec![source.clone()],
            Instr::MakeUnique { size, .. } => vec![size.clone()],
            Instr::DeleteUnique { source } => vec![source.clone()],
            Instr::StrIndex { string, index, .. } => vec![string.clone(), index.clone()],
            Instr::StrConcat { operands, .. } => operands.clone(),
        }
    }

    pub fn phi_args(&self) -> Option<&[InheritedValue]> {
        match self {
            Instr::Phi { args, .. } => Some(args),
            _ => None,
        }
    }

    pub fn phi_args_mut(&mut self) -> Option<&mut Vec<InheritedValue>> {
        match self {
            Instr::Phi { args, .. } => Some(args),
            _ => None,
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Instr::Phi { .. })
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let defined = self.defined();
        if !defined.is_empty() {
            let names: Vec<String> = defined.iter().map(|c| c.to_string()).collect();
            write!(f, "{} = ", names.join(", "))?;
        }
        write!(f, "{}", self.mnemonic())?;
        match self {
            Instr::Phi { args, .. } => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, " {}", parts.join(", "))
            }
            Instr::Jump { target } => write!(f, " {{{target}}}"),
            Instr::JumpCond { condition, target_true, target_false } => {
                write!(f, " {condition}, {{{target_true}}}, {{{target_false}}}")
            }
            Instr::Call { callee, args, .. } => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, " {callee}({})", parts.join(", "))
            }
            Instr::Return { values } => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, " {}", parts.join(", "))
            }
            _ => {
                let operands: Vec<String> = self.used_values().iter().map(|v| v.to_string()).collect();
                if operands.is_empty() {
                    Ok(())
                } else {
                    write!(f, " {}", operands.join(", "))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;
    use crate::value::Constant;

    #[test]
    fn jump_is_control_flow_with_one_successor() {
        let instr = Instr::Jump { target: 3 };
        assert!(instr.is_control_flow());
        assert_eq!(instr.successors().as_slice(), &[3]);
    }

    #[test]
    fn jcc_reports_both_destinations_in_order() {
        let instr = Instr::JumpCond {
            condition: Value::Constant(Constant::Bool { ty: TypeTable::BOOL, value: true }),
            target_true: 1,
            target_false: 2,
        };
        assert_eq!(instr.successors().as_slice(), &[1, 2]);
    }

    #[test]
    fn ibin_mnemonic_and_display() {
        let result = Computed::new(2, TypeTable::I64);
        let instr = Instr::IntBinary {
            result,
            op: IntBinaryOp::Add,
            lhs: Value::Computed(Computed::new(0, TypeTable::I64)),
            rhs: Value::Computed(Computed::new(1, TypeTable::I64)),
        };
        assert_eq!(instr.mnemonic(), "iadd");
        assert_eq!(instr.to_string(), "%2 = iadd %0, %1");
    }

    #[test]
    fn call_has_zero_to_n_defined_values() {
        let instr = Instr::Call {
            results: vec![Computed::new(0, TypeTable::I64), Computed::new(1, TypeTable::I64)],
            callee: Value::Constant(Constant::Func { ty: TypeTable::FUNC, value: Some(0) }),
            args: vec![],
        };
        assert_eq!(instr.defined().len(), 2);
    }
}
