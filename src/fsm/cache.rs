//! Result cache shared by a family of FSM copies.
//!
//! The slots live in one `Rc<RefCell<..>>` cell. Cloning an [`FsmCache`]
//! (the soft copy) shares the cell, so results computed through one copy
//! are visible to all of them. [`FsmCache::hard_copy`] and
//! [`FsmCache::fork_retaining`] allocate a new cell, detaching the copy
//! from its family. Every stored diagram is held through a [`Root`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::bdd::{Bdd, Root};
use crate::reference::Ref;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Slot {
    Reachable,
    NotSuccessor,
    Deadlock,
    LegalStateInput,
    FairStatesInputs,
    FairStates,
    Monolithic,
}

#[derive(Debug, Clone, Default)]
struct Slots {
    values: HashMap<Slot, Root>,
    layers: Option<Vec<Root>>,
    diameter: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct FsmCache {
    cell: Rc<RefCell<Slots>>,
}

impl FsmCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: Slot) -> Option<Ref> {
        self.cell.borrow().values.get(&slot).map(|r| r.get())
    }

    pub fn set(&self, bdd: &Rc<Bdd>, slot: Slot, f: Ref) {
        self.cell.borrow_mut().values.insert(slot, Root::new(bdd, f));
    }

    /// Reachable layers, `layers[i]` holding the states within `i` steps.
    pub fn layers(&self) -> Option<Vec<Ref>> {
        self.cell
            .borrow()
            .layers
            .as_ref()
            .map(|layers| layers.iter().map(|r| r.get()).collect())
    }

    pub fn set_layers(&self, bdd: &Rc<Bdd>, layers: &[Ref]) {
        let roots = layers.iter().map(|&f| Root::new(bdd, f)).collect();
        self.cell.borrow_mut().layers = Some(roots);
    }

    pub fn diameter(&self) -> Option<usize> {
        self.cell.borrow().diameter
    }

    pub fn set_diameter(&self, diameter: usize) {
        self.cell.borrow_mut().diameter = Some(diameter);
    }

    /// Number of copies sharing this cell.
    pub fn family_size(&self) -> usize {
        Rc::strong_count(&self.cell)
    }

    pub fn is_shared_with(&self, other: &FsmCache) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// Independent cell with the same contents.
    pub fn hard_copy(&self) -> FsmCache {
        FsmCache {
            cell: Rc::new(RefCell::new(self.cell.borrow().clone())),
        }
    }

    /// Independent cell holding only the `keep` slots (and the layers and
    /// diameter if [`Slot::Reachable`] is kept).
    pub fn fork_retaining(&self, keep: &[Slot]) -> FsmCache {
        let old = self.cell.borrow();
        let values = old
            .values
            .iter()
            .filter(|(slot, _)| keep.contains(slot))
            .map(|(&slot, root)| (slot, root.clone()))
            .collect();
        let (layers, diameter) = if keep.contains(&Slot::Reachable) {
            (old.layers.clone(), old.diameter)
        } else {
            (None, None)
        };
        FsmCache {
            cell: Rc::new(RefCell::new(Slots {
                values,
                layers,
                diameter,
            })),
        }
    }

    pub fn clear(&self) {
        let mut slots = self.cell.borrow_mut();
        slots.values.clear();
        slots.layers = None;
        slots.diameter = None;
    }
}
