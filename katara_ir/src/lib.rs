//! The SSA-form intermediate representation: types, values, instructions,
//! blocks, functions, and programs (§3), plus the renumbering-tolerant
//! structural equality used by tests and round-trip checks (§4.2).

pub mod block;
pub mod equality;
pub mod function;
pub mod instr;
pub mod program;
pub mod types;
pub mod value;

pub use block::Block;
pub use equality::{functions_equal, programs_equal};
pub use function::Function;
pub use instr::{BoolBinaryOp, Instr, IntBinaryOp, IntCompareOp, IntShiftOp, IntUnaryOp};
pub use program::Program;
pub use types::{IntType, PointerStrength, Type, TypeKey, TypeTable, types_equal};
pub use value::{
    BlockNumber, Computed, Constant, FuncNumber, InheritedValue, Value, ValueNumber,
};
