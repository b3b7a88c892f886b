//! Functions (§3.4): an ordered argument list, result types, and an arena of
//! blocks keyed by block number. Also hosts dominance queries (§4.2, §9):
//! the IR computes and reports CFG edges and immediate dominators itself,
//! leaving full CFG/dominator-*graph* construction to an external collaborator.

use crate::block::Block;
use crate::types::TypeKey;
use crate::value::{BlockNumber, Computed, FuncNumber, ValueNumber};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    number: FuncNumber,
    name: Option<String>,
    args: Vec<Computed>,
    result_types: Vec<TypeKey>,
    blocks: BTreeMap<BlockNumber, Block>,
    entry_block: Option<BlockNumber>,
    next_block_num: BlockNumber,
    next_value_num: ValueNumber,
}

impl Function {
    pub(crate) fn new(number: FuncNumber) -> Self {
        Self {
            number,
            name: None,
            args: Vec::new(),
            result_types: Vec::new(),
            blocks: BTreeMap::new(),
            entry_block: None,
            next_block_num: 0,
            next_value_num: 0,
        }
    }

    pub fn number(&self) -> FuncNumber {
        self.number
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn args(&self) -> &[Computed] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Vec<Computed> {
        &mut self.args
    }

    /// Adds an argument with a fresh value number, bumping the high-water mark.
    pub fn add_arg(&mut self, ty: TypeKey) -> Computed {
        let computed = Computed::new(self.fresh_value_number(None), ty);
        self.args.push(computed);
        computed
    }

    pub fn result_types(&self) -> &[TypeKey] {
        &self.result_types
    }

    pub fn result_types_mut(&mut self) -> &mut Vec<TypeKey> {
        &mut self.result_types
    }

    /// Issues a value number: `requested` if given and unused, otherwise the
    /// next free number. Either way bumps the function's high-water mark.
    pub fn fresh_value_number(&mut self, requested: Option<ValueNumber>) -> ValueNumber {
        let number = match requested {
            Some(n) if n >= self.next_value_num => n,
            Some(n) => n,
            None => self.next_value_num,
        };
        if number >= self.next_value_num {
            self.next_value_num = number + 1;
        }
        number
    }

    pub fn has_block(&self, number: BlockNumber) -> bool {
        self.blocks.contains_key(&number)
    }

    pub fn block(&self, number: BlockNumber) -> Option<&Block> {
        self.blocks.get(&number)
    }

    pub fn block_mut(&mut self, number: BlockNumber) -> Option<&mut Block> {
        self.blocks.get_mut(&number)
    }

    /// Iterates blocks in ascending block-number order (§4.3.4 printer contract).
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut Block> {
        self.blocks.values_mut()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Adds a block, issuing a fresh number if `requested` is `None` or
    /// already used (§4.2). The first block added becomes the entry block.
    pub fn add_block(&mut self, requested: Option<BlockNumber>) -> BlockNumber {
        let number = match requested {
            Some(n) if !self.blocks.contains_key(&n) => n,
            _ => {
                let mut candidate = self.next_block_num;
                while self.blocks.contains_key(&candidate) {
                    candidate += 1;
                }
                candidate
            }
        };
        if number >= self.next_block_num {
            self.next_block_num = number + 1;
        }
        self.blocks.insert(number, Block::new(number));
        if self.entry_block.is_none() {
            self.entry_block = Some(number);
        }
        number
    }

    pub fn entry_block_num(&self) -> Option<BlockNumber> {
        self.entry_block
    }

    pub fn set_entry_block_num(&mut self, number: BlockNumber) {
        self.entry_block = Some(number);
    }

    pub fn is_entry_block(&self, number: BlockNumber) -> bool {
        self.entry_block == Some(number)
    }

    /// Records a control-flow edge `from -> to`, updating both blocks'
    /// parent/child sets.
    pub fn add_control_flow(&mut self, from: BlockNumber, to: BlockNumber) {
        if let Some(block) = self.blocks.get_mut(&from) {
            block.add_child(to);
        }
        if let Some(block) = self.blocks.get_mut(&to) {
            block.add_parent(from);
        }
    }

    pub fn remove_control_flow(&mut self, from: BlockNumber, to: BlockNumber) {
        if let Some(block) = self.blocks.get_mut(&from) {
            block.remove_child(to);
        }
        if let Some(block) = self.blocks.get_mut(&to) {
            block.remove_parent(from);
        }
    }

    /// Reverse-postorder traversal of reachable blocks from the entry block,
    /// following control-flow-instruction successors. This is both the
    /// dominance-respecting block order (§4.2) and the order the
    /// Cooper-Harvey-Kennedy dominator computation needs.
    pub fn reverse_postorder(&self) -> Vec<BlockNumber> {
        let Some(entry) = self.entry_block else { return Vec::new() };
        let mut visited: HashSet<BlockNumber> = HashSet::new();
        let mut postorder = Vec::new();
        // Explicit stack of (block, iterator-over-children-index) to avoid recursion.
        let mut stack: Vec<(BlockNumber, Vec<BlockNumber>, usize)> = Vec::new();
        visited.insert(entry);
        stack.push((entry, self.sorted_children(entry), 0));
        while let Some((block, children, idx)) = stack.last_mut() {
            if *idx < children.len() {
                let child = children[*idx];
                *idx += 1;
                if visited.insert(child) {
                    let grandchildren = self.sorted_children(child);
                    stack.push((child, grandchildren, 0));
                }
            } else {
                postorder.push(*block);
                stack.pop();
            }
        }
        postorder.reverse();
        postorder
    }

    fn sorted_children(&self, number: BlockNumber) -> Vec<BlockNumber> {
        self.blocks
            .get(&number)
            .map(|b| b.children().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Blocks in an order where every block's dominators precede it
    /// (reducible CFGs only — guaranteed by invariant 3, §3.5).
    pub fn blocks_in_dominance_order(&self) -> Vec<BlockNumber> {
        self.reverse_postorder()
    }

    /// Computes each reachable non-entry block's immediate dominator via the
    /// iterative Cooper-Harvey-Kennedy algorithm (§9 open question,
    /// resolved: built once per function rather than queried by walking
    /// parent sets repeatedly).
    pub fn immediate_dominators(&self) -> BTreeMap<BlockNumber, BlockNumber> {
        let Some(entry) = self.entry_block else { return BTreeMap::new() };
        let order = self.reverse_postorder();
        if order.is_empty() {
            return BTreeMap::new();
        }
        let rpo_index: HashMap<BlockNumber, usize> =
            order.iter().enumerate().map(|(i, &b)| (b, i)).collect();

        let mut idom: HashMap<BlockNumber, Option<BlockNumber>> = HashMap::new();
        idom.insert(entry, Some(entry));

        let mut changed = true;
        while changed {
            changed = false;
            for &block in order.iter().skip(1) {
                let preds: Vec<BlockNumber> = self.blocks[&block]
                    .parents()
                    .iter()
                    .copied()
                    .filter(|p| rpo_index.contains_key(p))
                    .collect();
                let mut new_idom: Option<BlockNumber> = None;
                for pred in preds {
                    if idom.get(&pred).copied().flatten().is_some() {
                        new_idom = Some(match new_idom {
                            None => pred,
                            Some(cur) => intersect(cur, pred, &idom, &rpo_index),
                        });
                    }
                }
                if idom.get(&block).copied().flatten() != new_idom {
                    idom.insert(block, new_idom);
                    changed = true;
                }
            }
        }

        idom.into_iter()
            .filter(|&(b, _)| b != entry)
            .filter_map(|(b, d)| d.map(|d| (b, d)))
            .collect()
    }

    /// `true` iff `dominator` dominates `block` (`block == dominator` counts).
    pub fn dominates(
        &self,
        idom: &BTreeMap<BlockNumber, BlockNumber>,
        dominator: BlockNumber,
        block: BlockNumber,
    ) -> bool {
        if dominator == block {
            return true;
        }
        let mut current = block;
        while let Some(&next) = idom.get(&current) {
            if next == dominator {
                return true;
            }
            if next == current {
                break;
            }
            current = next;
        }
        false
    }
}

fn intersect(
    mut a: BlockNumber,
    mut b: BlockNumber,
    idom: &HashMap<BlockNumber, Option<BlockNumber>>,
    rpo_index: &HashMap<BlockNumber, usize>,
) -> BlockNumber {
    while a != b {
        while rpo_index[&a] > rpo_index[&b] {
            a = idom[&a].expect("reached a block with no computed dominator during intersect");
        }
        while rpo_index[&b] > rpo_index[&a] {
            b = idom[&b].expect("reached a block with no computed dominator during intersect");
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instr;
    use crate::types::TypeTable;
    use crate::value::{Constant, Value};

    fn diamond() -> Function {
        // entry(0) -> {1, 2} -> 3
        let mut f = Function::new(0);
        let b0 = f.add_block(None);
        let b1 = f.add_block(None);
        let b2 = f.add_block(None);
        let b3 = f.add_block(None);
        f.block_mut(b0).unwrap().push_instr(Instr::JumpCond {
            condition: Value::Constant(Constant::Bool { ty: TypeTable::BOOL, value: true }),
            target_true: b1,
            target_false: b2,
        });
        f.add_control_flow(b0, b1);
        f.add_control_flow(b0, b2);
        f.block_mut(b1).unwrap().push_instr(Instr::Jump { target: b3 });
        f.add_control_flow(b1, b3);
        f.block_mut(b2).unwrap().push_instr(Instr::Jump { target: b3 });
        f.add_control_flow(b2, b3);
        f.block_mut(b3).unwrap().push_instr(Instr::Return { values: vec![] });
        f
    }

    #[test]
    fn block_numbers_are_issued_in_order_when_unspecified() {
        let mut f = Function::new(0);
        assert_eq!(f.add_block(None), 0);
        assert_eq!(f.add_block(None), 1);
        assert_eq!(f.entry_block_num(), Some(0));
    }

    #[test]
    fn requested_block_number_is_honored_unless_taken() {
        let mut f = Function::new(0);
        assert_eq!(f.add_block(Some(5)), 5);
        assert_eq!(f.add_block(Some(5)), 0); // already used -> fresh number
    }

    #[test]
    fn immediate_dominator_of_diamond_merge_is_entry() {
        let f = diamond();
        let idom = f.immediate_dominators();
        assert_eq!(idom.get(&1), Some(&0));
        assert_eq!(idom.get(&2), Some(&0));
        assert_eq!(idom.get(&3), Some(&0));
        assert!(f.dominates(&idom, 0, 3));
        assert!(!f.dominates(&idom, 1, 3));
    }

    #[test]
    fn reverse_postorder_places_entry_first() {
        let f = diamond();
        let order = f.reverse_postorder();
        assert_eq!(order[0], 0);
        assert_eq!(order.len(), 4);
    }
}
