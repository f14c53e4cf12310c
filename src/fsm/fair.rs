//! Fairness constraints and fair states.
//!
//! Fair state-input pairs are computed with the Emerson-Lei nested
//! fixpoint over state-input pairs:
//!
//! ```text
//! νZ. Z ∧ EX(⋀ᵢ E[Z U (Z ∧ pᵢ)]) ∧ subspace
//! ```
//!
//! where `pᵢ` ranges over the justice conditions and `EX` is the weak
//! backward image. A compassion pair `(p, q)` additionally restricts `Z`
//! to `(Z ∧ ¬p) ∨ E[Z U (Z ∧ q)]` in every round: a `p`-state stays only if
//! it can still reach `q`.

use std::rc::Rc;

use log::{debug, info};

use super::cache::Slot;
use super::BddFsm;
use crate::bdd::{Bdd, Root};
use crate::reference::Ref;

/// Justice (generalized Büchi) conditions: each must hold infinitely often.
#[derive(Debug, Clone, Default)]
pub struct JusticeList {
    conditions: Vec<Root>,
}

impl JusticeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bdd: &Rc<Bdd>, condition: Ref) {
        self.conditions.push(Root::new(bdd, condition));
    }

    pub fn append(&mut self, other: &JusticeList) {
        self.conditions.extend(other.conditions.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ref> + '_ {
        self.conditions.iter().map(|r| r.get())
    }
}

/// Compassion (Streett) pairs `(p, q)`: if `p` holds infinitely often, so
/// does `q`.
#[derive(Debug, Clone, Default)]
pub struct CompassionList {
    pairs: Vec<(Root, Root)>,
}

impl CompassionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bdd: &Rc<Bdd>, trigger: Ref, response: Ref) {
        self.pairs.push((Root::new(bdd, trigger), Root::new(bdd, response)));
    }

    pub fn append(&mut self, other: &CompassionList) {
        self.pairs.extend(other.pairs.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ref, Ref)> + '_ {
        self.pairs.iter().map(|(p, q)| (p.get(), q.get()))
    }
}

impl BddFsm {
    /// Pairs with a legal transition into `pairs`.
    fn ex_si(&self, pairs: Ref) -> Ref {
        self.weak_backward_image(self.exists_inputs(pairs))
    }

    /// `E[z U target]` over state-input pairs.
    fn eu_si(&self, z: Ref, target: Ref) -> Ref {
        let bdd = &self.bdd;
        let mut y = target;
        let mut steps = 0;
        loop {
            let grown = bdd.apply_or(target, bdd.apply_and(z, self.ex_si(y)));
            if grown == y {
                debug!("EU converged after {} steps", steps);
                return y;
            }
            y = grown;
            steps += 1;
        }
    }

    /// Fair state-input pairs within `subspace`.
    pub fn fair_states_inputs_in_subspace(&self, subspace: Ref) -> Ref {
        let bdd = &self.bdd;
        let mut base = bdd.apply_and(self.legal_state_input(), subspace);
        if self.config.prune_fairness_with_reachable {
            base = bdd.apply_and(base, self.reachable_states());
        }

        let justice: Vec<Ref> = if self.justice.is_empty() {
            vec![bdd.one()]
        } else {
            self.justice.iter().collect()
        };

        let mut z = base;
        let mut iteration = 0;
        loop {
            iteration += 1;
            let previous = z;

            let witness = justice
                .iter()
                .fold(bdd.one(), |acc, &p| bdd.apply_and(acc, self.eu_si(z, bdd.apply_and(z, p))));
            z = bdd.apply_and_many([z, self.ex_si(witness), subspace]);

            for (p, q) in self.compassion.iter() {
                let served = self.eu_si(z, bdd.apply_and(z, q));
                z = bdd.apply_or(bdd.apply_diff(z, p), served);
            }

            info!("Fairness iteration {}: {} nodes", iteration, bdd.size(z));
            if z == previous {
                break;
            }
        }

        if !self.compassion.is_empty() {
            z = self.eu_si(base, z);
        }
        z
    }

    /// Fair state-input pairs.
    pub fn fair_states_inputs(&self) -> Ref {
        self.cached(Slot::FairStatesInputs, |fsm| fsm.fair_states_inputs_in_subspace(fsm.bdd.one()))
    }

    /// States with at least one fair path.
    pub fn fair_states(&self) -> Ref {
        self.cached(Slot::FairStates, |fsm| fsm.exists_inputs(fsm.fair_states_inputs()))
    }

    pub fn is_fair_states(&self, states: Ref) -> bool {
        self.bdd.is_implies(states, self.fair_states())
    }
}
