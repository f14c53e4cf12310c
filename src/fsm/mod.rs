//! Symbolic finite-state machine.
//!
//! [`BddFsm`] owns the initial states, the state and input invariants, a
//! [`BddTrans`] and the fairness lists, and answers image, reachability,
//! deadlock and fairness queries. Expensive results are memoized in an
//! [`FsmCache`] shared between soft copies (plain `clone`).
//!
//! All sets of states are over the current-state variables; sets of
//! state-input pairs are over current-state and input variables.

pub mod builder;
pub mod cache;
pub mod fair;
mod reach;

use std::rc::Rc;

use log::{info, warn};
use num_bigint::BigUint;

pub use self::builder::FsmBuilder;
pub use self::cache::{FsmCache, Slot};
pub use self::fair::{CompassionList, JusticeList};

use crate::bdd::{Bdd, Root};
use crate::enc::BddEnc;
use crate::reference::Ref;
use crate::trans::{BddTrans, Direction};
use crate::types::Var;

#[derive(Debug, Clone)]
pub struct FsmConfig {
    /// Restrict the fairness fixpoints to reachable states.
    pub prune_fairness_with_reachable: bool,
    /// Keep the per-distance layers of the reachability fixpoint.
    pub cache_reachable_layers: bool,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            prune_fairness_with_reachable: false,
            cache_reachable_layers: true,
        }
    }
}

impl FsmConfig {
    pub fn with_prune_fairness_with_reachable(mut self, prune: bool) -> Self {
        self.prune_fairness_with_reachable = prune;
        self
    }

    pub fn with_cache_reachable_layers(mut self, cache: bool) -> Self {
        self.cache_reachable_layers = cache;
        self
    }
}

/// Variable classes of a machine, captured from the encoder.
#[derive(Debug, Clone)]
pub struct FsmVars {
    state_cube: Root,
    input_cube: Root,
    next_cube: Root,
    state_mask: Root,
    input_mask: Root,
    state_vars: Vec<Var>,
    input_vars: Vec<Var>,
}

impl FsmVars {
    pub fn from_encoder(enc: &mut BddEnc) -> Self {
        let bdd = Rc::clone(enc.bdd());
        let state_mask = enc.state_vars_mask();
        let input_mask = enc.input_vars_mask();
        Self {
            state_cube: Root::new(&bdd, enc.state_cube()),
            input_cube: Root::new(&bdd, enc.input_cube()),
            next_cube: Root::new(&bdd, enc.next_cube()),
            state_mask: Root::new(&bdd, state_mask),
            input_mask: Root::new(&bdd, input_mask),
            state_vars: enc.state_vars().to_vec(),
            input_vars: enc.input_vars().to_vec(),
        }
    }

    pub fn state_cube(&self) -> Ref {
        self.state_cube.get()
    }

    pub fn input_cube(&self) -> Ref {
        self.input_cube.get()
    }

    pub fn next_cube(&self) -> Ref {
        self.next_cube.get()
    }

    pub fn state_mask(&self) -> Ref {
        self.state_mask.get()
    }

    pub fn input_mask(&self) -> Ref {
        self.input_mask.get()
    }

    pub fn state_vars(&self) -> &[Var] {
        &self.state_vars
    }

    pub fn input_vars(&self) -> &[Var] {
        &self.input_vars
    }

    fn merge(&self, bdd: &Rc<Bdd>, other: &FsmVars) -> FsmVars {
        let and = |a: &Root, b: &Root| Root::new(bdd, bdd.apply_and(a.get(), b.get()));
        let union = |a: &[Var], b: &[Var]| {
            let mut vars = a.to_vec();
            vars.extend(b.iter().filter(|v| !a.contains(v)));
            vars
        };
        FsmVars {
            state_cube: and(&self.state_cube, &other.state_cube),
            input_cube: and(&self.input_cube, &other.input_cube),
            next_cube: and(&self.next_cube, &other.next_cube),
            state_mask: and(&self.state_mask, &other.state_mask),
            input_mask: and(&self.input_mask, &other.input_mask),
            state_vars: union(&self.state_vars, &other.state_vars),
            input_vars: union(&self.input_vars, &other.input_vars),
        }
    }
}

/// Advisory emptiness conditions of a machine. None of them is an error;
/// they usually mean the model is vacuous.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct EmptinessReport {
    pub init_empty: bool,
    pub state_invar_empty: bool,
    pub input_invar_empty: bool,
    pub fair_states_empty: bool,
    pub init_fair_empty: bool,
}

impl EmptinessReport {
    pub fn is_clean(&self) -> bool {
        *self == EmptinessReport::default()
    }
}

#[derive(Debug, Clone)]
pub struct BddFsm {
    bdd: Rc<Bdd>,
    vars: FsmVars,
    init: Root,
    state_invar: Root,
    input_invar: Root,
    trans: BddTrans,
    justice: JusticeList,
    compassion: CompassionList,
    cache: FsmCache,
    config: FsmConfig,
}

impl BddFsm {
    /// Assemble a machine. The invariants and the initial set are
    /// restricted to valid encodings through the domain masks.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bdd: &Rc<Bdd>,
        vars: FsmVars,
        init: Ref,
        state_invar: Ref,
        input_invar: Ref,
        trans: BddTrans,
        justice: JusticeList,
        compassion: CompassionList,
        config: FsmConfig,
    ) -> Self {
        let state_invar = bdd.apply_and(state_invar, vars.state_mask());
        let input_invar = bdd.apply_and(input_invar, vars.input_mask());
        let init = bdd.apply_and(init, vars.state_mask());
        Self {
            bdd: Rc::clone(bdd),
            init: Root::new(bdd, init),
            state_invar: Root::new(bdd, state_invar),
            input_invar: Root::new(bdd, input_invar),
            vars,
            trans,
            justice,
            compassion,
            cache: FsmCache::new(),
            config,
        }
    }

    /// Copy with its own, independent result cache.
    pub fn hard_copy(&self) -> BddFsm {
        BddFsm {
            cache: self.cache.hard_copy(),
            ..self.clone()
        }
    }

    pub fn bdd(&self) -> &Rc<Bdd> {
        &self.bdd
    }

    pub fn vars(&self) -> &FsmVars {
        &self.vars
    }

    pub fn init(&self) -> Ref {
        self.init.get()
    }

    pub fn state_invar(&self) -> Ref {
        self.state_invar.get()
    }

    pub fn input_invar(&self) -> Ref {
        self.input_invar.get()
    }

    pub fn trans(&self) -> &BddTrans {
        &self.trans
    }

    pub fn justice(&self) -> &JusticeList {
        &self.justice
    }

    pub fn compassion(&self) -> &CompassionList {
        &self.compassion
    }

    pub fn cache(&self) -> &FsmCache {
        &self.cache
    }

    pub fn config(&self) -> &FsmConfig {
        &self.config
    }

    /// Look up `slot`, computing and storing it on a miss.
    pub(crate) fn cached(&self, slot: Slot, compute: impl FnOnce(&Self) -> Ref) -> Ref {
        if let Some(f) = self.cache.get(slot) {
            return f;
        }
        let f = compute(self);
        self.cache.set(&self.bdd, slot, f);
        f
    }

    fn invariants(&self) -> Ref {
        self.bdd.apply_and(self.state_invar(), self.input_invar())
    }

    fn exists_inputs(&self, f: Ref) -> Ref {
        self.bdd.exists(f, self.vars.input_cube())
    }

    /// Number of states in `f`, mask-corrected.
    pub fn count_states(&self, f: Ref) -> BigUint {
        let cube = self.bdd.apply_and(self.vars.input_cube(), self.vars.next_cube());
        let g = self.bdd.exists(self.bdd.apply_and(f, self.vars.state_mask()), cube);
        self.bdd.sat_count(g, self.vars.state_vars.len())
    }

    /// Number of state-input pairs in `f`, mask-corrected.
    pub fn count_states_inputs(&self, f: Ref) -> BigUint {
        let mask = self.bdd.apply_and(self.vars.state_mask(), self.vars.input_mask());
        let g = self.bdd.exists(self.bdd.apply_and(f, mask), self.vars.next_cube());
        self.bdd
            .sat_count(g, self.vars.state_vars.len() + self.vars.input_vars.len())
    }
}

// Images
impl BddFsm {
    /// Successors of `states` under legal transitions.
    pub fn forward_image(&self, states: Ref) -> Ref {
        let set = self.bdd.apply_and(states, self.invariants());
        let img = self.trans.image(Direction::Forward, set);
        self.bdd.apply_and(img, self.state_invar())
    }

    /// Predecessors of `states` under legal transitions.
    pub fn backward_image(&self, states: Ref) -> Ref {
        let set = self.bdd.apply_and(states, self.invariants());
        let img = self.trans.image(Direction::Backward, set);
        self.bdd.apply_and(img, self.state_invar())
    }

    /// Forward image through the transitions whose source pair satisfies
    /// `constraint` (over state and input variables).
    pub fn constrained_forward_image(&self, states: Ref, constraint: Ref) -> Ref {
        let set = self.bdd.apply_and_many([states, constraint, self.invariants()]);
        let img = self.trans.image(Direction::Forward, set);
        self.bdd.apply_and(img, self.state_invar())
    }

    /// Backward image through the transitions whose source pair satisfies
    /// `constraint`.
    pub fn constrained_backward_image(&self, states: Ref, constraint: Ref) -> Ref {
        let pairs = self.weak_backward_image(states);
        self.exists_inputs(self.bdd.apply_and(pairs, constraint))
    }

    /// State-input pairs with a legal successor in `states`.
    pub fn weak_backward_image(&self, states: Ref) -> Ref {
        let set = self.bdd.apply_and(states, self.state_invar());
        let pairs = self.trans.state_input_image(Direction::Backward, set);
        self.bdd.apply_and(pairs, self.invariants())
    }

    /// Legal state-input pairs whose every successor lies in `states`.
    pub fn strong_backward_image(&self, states: Ref) -> Ref {
        let outside = self.weak_backward_image(-states);
        self.bdd.apply_diff(self.legal_state_input(), outside)
    }

    pub fn k_forward_image(&self, states: Ref, k: usize) -> Ref {
        (0..k).fold(states, |s, _| self.forward_image(s))
    }

    pub fn k_backward_image(&self, states: Ref, k: usize) -> Ref {
        (0..k).fold(states, |s, _| self.backward_image(s))
    }

    /// Inputs labelling some legal transition from `from` to `to`.
    pub fn states_to_states_get_inputs(&self, from: Ref, to: Ref) -> Ref {
        let pairs = self.bdd.apply_and(self.weak_backward_image(to), from);
        self.bdd.exists(pairs, self.vars.state_cube())
    }

    /// State-input pairs with at least one legal successor.
    pub fn legal_state_input(&self) -> Ref {
        self.cached(Slot::LegalStateInput, |fsm| fsm.weak_backward_image(fsm.bdd.one()))
    }

    /// The whole relation as a single diagram.
    pub fn monolithic_trans(&self) -> Ref {
        self.cached(Slot::Monolithic, |fsm| fsm.trans.monolithic())
    }
}

// Composition and diagnostics
impl BddFsm {
    /// Compose with `other` in place: initial sets, invariants and
    /// fairness lists are conjoined or appended, the relation gains the
    /// clusters of `other`.
    ///
    /// The cache is forked away from the soft-copy family, and every slot
    /// is dropped since the initial set changes along with the relation.
    pub fn apply_synchronous_product(&mut self, other: &BddFsm) {
        let bdd = Rc::clone(&self.bdd);
        self.vars = self.vars.merge(&bdd, &other.vars);
        self.init.set(bdd.apply_and(self.init(), other.init()));
        self.state_invar.set(bdd.apply_and(self.state_invar(), other.state_invar()));
        self.input_invar.set(bdd.apply_and(self.input_invar(), other.input_invar()));
        self.trans.synchronous_product(
            &other.trans,
            self.vars.state_cube(),
            self.vars.input_cube(),
            self.vars.next_cube(),
        );
        self.justice.append(&other.justice);
        self.compassion.append(&other.compassion);
        self.cache = self.cache.fork_retaining(&[]);
        info!(
            "Synchronous product: {} justice, {} compassion constraints",
            self.justice.len(),
            self.compassion.len()
        );
    }

    /// Check the advisory emptiness conditions, logging a warning for each
    /// one that holds.
    pub fn check_emptiness(&self) -> EmptinessReport {
        let bdd = &self.bdd;
        let mut report = EmptinessReport {
            init_empty: bdd.is_zero(self.init()),
            state_invar_empty: bdd.is_zero(self.state_invar()),
            input_invar_empty: bdd.is_zero(self.input_invar()),
            ..Default::default()
        };
        if report.init_empty {
            warn!("The set of initial states is empty");
        }
        if report.state_invar_empty {
            warn!("The state invariant is empty");
        }
        if report.input_invar_empty {
            warn!("The input invariant is empty");
        }

        let fair = self.fair_states();
        report.fair_states_empty = bdd.is_zero(fair);
        report.init_fair_empty = bdd.is_zero(bdd.apply_and(self.init(), fair));
        if report.fair_states_empty {
            warn!("The set of fair states is empty");
        } else if report.init_fair_empty {
            warn!("No initial state is fair");
        }
        report
    }
}
