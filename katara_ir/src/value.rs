//! Values (§3.2): constants, computed (SSA) values, and the inherited
//! values used only inside `phi` instructions.

use crate::types::TypeKey;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ValueNumber = u32;
pub type BlockNumber = u32;
pub type FuncNumber = u32;

/// A literal value, always carrying the [`TypeKey`] it was constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Bool { ty: TypeKey, value: bool },
    Int { ty: TypeKey, value: i64 },
    /// A raw pointer address; `0` is the nil pointer and prints as `0x0`.
    Address { ty: TypeKey, value: u64 },
    /// A function reference by number; `None` is the nil function, `@-1`.
    Func { ty: TypeKey, value: Option<FuncNumber> },
    Str { ty: TypeKey, value: String },
}

impl Constant {
    pub fn ty(&self) -> TypeKey {
        match self {
            Constant::Bool { ty, .. }
            | Constant::Int { ty, .. }
            | Constant::Address { ty, .. }
            | Constant::Func { ty, .. }
            | Constant::Str { ty, .. } => *ty,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Bool { value, .. } => write!(f, "{}", if *value { "#t" } else { "#f" }),
            Constant::Int { value, .. } => write!(f, "#{value}"),
            Constant::Address { value, .. } => write!(f, "0x{value:x}"),
            Constant::Func { value: Some(n), .. } => write!(f, "@{n}"),
            Constant::Func { value: None, .. } => write!(f, "@-1"),
            Constant::Str { value, .. } => write!(f, "\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }
}

/// An SSA-defined value: its number is unique within its defining function,
/// and every reference to it (by the defining instruction, by uses, or by
/// the function's argument list) carries the same number and type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Computed {
    pub number: ValueNumber,
    pub ty: TypeKey,
}

impl Computed {
    pub fn new(number: ValueNumber, ty: TypeKey) -> Self {
        Self { number, ty }
    }
}

impl fmt::Display for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.number)
    }
}

/// A value usable as an instruction operand outside a `phi`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Constant(Constant),
    Computed(Computed),
}

impl Value {
    pub fn ty(&self) -> TypeKey {
        match self {
            Value::Constant(c) => c.ty(),
            Value::Computed(c) => c.ty,
        }
    }

    pub fn as_computed(&self) -> Option<Computed> {
        match self {
            Value::Computed(c) => Some(*c),
            Value::Constant(_) => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Constant(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Constant(c) => write!(f, "{c}"),
            Value::Computed(c) => write!(f, "{c}"),
        }
    }
}

/// A value inherited from whichever predecessor block actually transferred
/// control, paired with the number of that origin block (§3.2). Only valid
/// as a `phi` operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritedValue {
    pub value: Value,
    pub origin: BlockNumber,
}

impl InheritedValue {
    pub fn new(value: Value, origin: BlockNumber) -> Self {
        Self { value, origin }
    }
}

impl fmt::Display for InheritedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.value, self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;

    #[test]
    fn constant_display_matches_grammar() {
        assert_eq!(Constant::Bool { ty: TypeTable::BOOL, value: true }.to_string(), "#t");
        assert_eq!(Constant::Int { ty: TypeTable::I64, value: 123 }.to_string(), "#123");
        assert_eq!(Constant::Address { ty: TypeTable::PTR, value: 0 }.to_string(), "0x0");
        assert_eq!(Constant::Func { ty: TypeTable::FUNC, value: None }.to_string(), "@-1");
        assert_eq!(Constant::Func { ty: TypeTable::FUNC, value: Some(3) }.to_string(), "@3");
    }

    #[test]
    fn computed_prints_use_site_form() {
        let c = Computed::new(7, TypeTable::I64);
        assert_eq!(c.to_string(), "%7");
    }

    #[test]
    fn inherited_value_prints_with_origin_block() {
        let inherited = InheritedValue::new(Value::Computed(Computed::new(3, TypeTable::I64)), 2);
        assert_eq!(inherited.to_string(), "%3{2}");
    }
}
