//! Programs (§3.4): a shared [`TypeTable`] plus an ordered collection of
//! functions, one of which is designated the entry point.

use crate::function::Function;
use crate::types::TypeTable;
use crate::value::FuncNumber;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    types: TypeTable,
    funcs: BTreeMap<FuncNumber, Function>,
    entry_func: Option<FuncNumber>,
    next_func_num: FuncNumber,
}

impl Program {
    pub fn new() -> Self {
        Self {
            types: TypeTable::new(),
            funcs: BTreeMap::new(),
            entry_func: None,
            next_func_num: 0,
        }
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    /// Adds a function, issuing a fresh number if `requested` is `None` or
    /// already taken (mirrors [`Function::add_block`]'s policy at the
    /// program level, §4.2).
    pub fn add_func(&mut self, requested: Option<FuncNumber>) -> FuncNumber {
        let number = match requested {
            Some(n) if !self.funcs.contains_key(&n) => n,
            _ => {
                let mut candidate = self.next_func_num;
                while self.funcs.contains_key(&candidate) {
                    candidate += 1;
                }
                candidate
            }
        };
        if number >= self.next_func_num {
            self.next_func_num = number + 1;
        }
        self.funcs.insert(number, Function::new(number));
        if self.entry_func.is_none() {
            self.entry_func = Some(number);
        }
        number
    }

    pub fn has_func(&self, number: FuncNumber) -> bool {
        self.funcs.contains_key(&number)
    }

    pub fn func(&self, number: FuncNumber) -> Option<&Function> {
        self.funcs.get(&number)
    }

    pub fn func_mut(&mut self, number: FuncNumber) -> Option<&mut Function> {
        self.funcs.get_mut(&number)
    }

    /// Removes a function outright (used by the unused-function cleanup
    /// pass, §4.6). Does not renumber or touch `entry_func`; removing the
    /// entry function itself is the caller's responsibility to avoid.
    pub fn remove_func(&mut self, number: FuncNumber) -> Option<Function> {
        self.funcs.remove(&number)
    }

    /// Iterates functions in ascending function-number order (§4.3.4
    /// printer contract: functions print in number order regardless of
    /// insertion order).
    pub fn funcs(&self) -> impl Iterator<Item = &Function> {
        self.funcs.values()
    }

    pub fn funcs_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.funcs.values_mut()
    }

    pub fn func_count(&self) -> usize {
        self.funcs.len()
    }

    pub fn entry_func_num(&self) -> Option<FuncNumber> {
        self.entry_func
    }

    pub fn set_entry_func_num(&mut self, number: FuncNumber) {
        self.entry_func = Some(number);
    }

    pub fn entry_func(&self) -> Option<&Function> {
        self.entry_func.and_then(|n| self.func(n))
    }

    /// Looks a function up by its (optional) name. Names are not required to
    /// be unique (§3.4); this returns the first match in number order.
    pub fn func_with_name(&self, name: &str) -> Option<&Function> {
        self.funcs.values().find(|f| f.name() == Some(name))
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn func_numbers_are_issued_in_order_when_unspecified() {
        let mut p = Program::new();
        assert_eq!(p.add_func(None), 0);
        assert_eq!(p.add_func(None), 1);
        assert_eq!(p.entry_func_num(), Some(0));
    }

    #[test]
    fn requested_func_number_is_honored_unless_taken() {
        let mut p = Program::new();
        assert_eq!(p.add_func(Some(9)), 9);
        assert_eq!(p.add_func(Some(9)), 0);
    }

    #[test]
    fn func_with_name_finds_first_match_in_number_order() {
        let mut p = Program::new();
        let a = p.add_func(None);
        let b = p.add_func(None);
        p.func_mut(a).unwrap().set_name("main");
        p.func_mut(b).unwrap().set_name("main");
        assert_eq!(p.func_with_name("main").unwrap().number(), a);
    }
}
