//! Basic blocks (§3.4). Parent/child sets are maintained incrementally as
//! control-flow instructions are added, rather than recomputed from
//! scratch, so the edges stay cheap to query during passes.

use crate::instr::Instr;
use crate::value::BlockNumber;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    number: BlockNumber,
    name: Option<String>,
    instrs: Vec<Instr>,
    parents: BTreeSet<BlockNumber>,
    children: BTreeSet<BlockNumber>,
}

impl Block {
    pub(crate) fn new(number: BlockNumber) -> Self {
        Self {
            number,
            name: None,
            instrs: Vec::new(),
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }

    pub fn number(&self) -> BlockNumber {
        self.number
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn instrs_mut(&mut self) -> &mut Vec<Instr> {
        &mut self.instrs
    }

    pub fn push_instr(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn parents(&self) -> &BTreeSet<BlockNumber> {
        &self.parents
    }

    pub fn children(&self) -> &BTreeSet<BlockNumber> {
        &self.children
    }

    pub(crate) fn add_parent(&mut self, parent: BlockNumber) {
        self.parents.insert(parent);
    }

    pub(crate) fn add_child(&mut self, child: BlockNumber) {
        self.children.insert(child);
    }

    pub(crate) fn remove_parent(&mut self, parent: BlockNumber) {
        self.parents.remove(&parent);
    }

    pub(crate) fn remove_child(&mut self, child: BlockNumber) {
        self.children.remove(&child);
    }

    /// `true` iff every `phi` instruction in this block precedes every
    /// non-phi instruction (§3.5 invariant 6).
    pub fn phis_precede_non_phis(&self) -> bool {
        let mut seen_non_phi = false;
        for instr in &self.instrs {
            if instr.is_phi() {
                if seen_non_phi {
                    return false;
                }
            } else {
                seen_non_phi = true;
            }
        }
        true
    }

    pub fn phis(&self) -> impl Iterator<Item = &Instr> {
        self.instrs.iter().take_while(|i| i.is_phi())
    }
}
