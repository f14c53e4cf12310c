//! Saving and restoring the encoder around a nested session.

use std::mem;

use log::debug;

use super::cache::EncCache;
use super::mask::MaskCache;
use super::{BddEnc, Cubes, VarShift, VarTable};
use crate::reorder::GroupTree;
use crate::symbols::SymbolTable;

/// Encoder state saved by [`BddEnc::push_status_and_reset`].
///
/// Holding the snapshot keeps every diagram it refers to alive.
#[derive(Debug)]
pub struct EncSnapshot {
    cache: EncCache,
    cubes: Cubes,
    masks: MaskCache,
    vars: VarTable,
    symbols: SymbolTable,
    shift: VarShift,
    groups: GroupTree,
}

impl BddEnc {
    /// Save the current state and start a nested session.
    ///
    /// The nested session keeps the declared variables and symbols (and the
    /// manager with all its nodes) but starts with an empty evaluation
    /// cache and empty class cubes and masks, so only variables declared
    /// inside it count as state or input.
    ///
    /// # Panics
    ///
    /// Panics if a snapshot is already outstanding.
    pub fn push_status_and_reset(&mut self) -> EncSnapshot {
        assert!(!self.pushed, "Encoder status is already pushed");
        self.pushed = true;
        debug!("push encoder status ({} cached results)", self.cache.len());
        EncSnapshot {
            cache: mem::take(&mut self.cache),
            cubes: mem::replace(&mut self.cubes, Cubes::new(&self.bdd)),
            masks: mem::take(&mut self.masks),
            vars: self.vars.clone(),
            symbols: self.symbols.clone(),
            shift: self.shift.clone(),
            groups: self.bdd.group_tree(),
        }
    }

    /// Restore the state saved by [`push_status_and_reset`](BddEnc::push_status_and_reset).
    ///
    /// Declarations and cached results of the nested session are dropped;
    /// manager variables it allocated stay allocated but become unused.
    pub fn pop_status(&mut self, snapshot: EncSnapshot) {
        assert!(self.pushed, "Encoder status was not pushed");
        self.pushed = false;
        self.cache = snapshot.cache;
        self.cubes = snapshot.cubes;
        self.masks = snapshot.masks;
        self.vars = snapshot.vars;
        self.symbols = snapshot.symbols;
        self.shift = snapshot.shift;
        self.bdd.set_group_tree(snapshot.groups);
        debug!("pop encoder status ({} cached results)", self.cache.len());
    }
}
