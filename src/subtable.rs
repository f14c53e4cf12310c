//! Per-variable unique table.
//!
//! The manager keeps one subtable per variable. Since all nodes in a
//! subtable share the variable, the hash key is just the `(low, high)` pair.
//! Swapping two adjacent levels only touches the two subtables involved,
//! which is what makes in-place reordering cheap.

use std::collections::HashMap;

use crate::reference::Ref;
use crate::types::Var;

#[derive(Debug, Clone)]
pub struct Subtable {
    pub variable: Var,
    nodes: HashMap<(Ref, Ref), u32>,
}

impl Subtable {
    pub fn new(variable: Var) -> Self {
        Self {
            variable,
            nodes: HashMap::new(),
        }
    }

    /// Look up a node by its children.
    pub fn find(&self, low: Ref, high: Ref) -> Option<u32> {
        self.nodes.get(&(low, high)).copied()
    }

    pub fn insert(&mut self, low: Ref, high: Ref, index: u32) {
        self.nodes.insert((low, high), index);
    }

    pub fn remove(&mut self, low: Ref, high: Ref) -> Option<u32> {
        self.nodes.remove(&(low, high))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all `(low, high, index)` tuples.
    pub fn iter(&self) -> impl Iterator<Item = (Ref, Ref, u32)> + '_ {
        self.nodes.iter().map(|(&(low, high), &idx)| (low, high, idx))
    }

    /// Keep only the entries whose node index satisfies `keep`, returning the
    /// indices that were dropped.
    pub fn retain_indices(&mut self, mut keep: impl FnMut(u32) -> bool) -> Vec<u32> {
        let mut dropped = Vec::new();
        self.nodes.retain(|_, &mut idx| {
            let k = keep(idx);
            if !k {
                dropped.push(idx);
            }
            k
        });
        dropped
    }
}
