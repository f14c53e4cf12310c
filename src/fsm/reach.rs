use log::info;

use super::cache::Slot;
use super::BddFsm;
use crate::reference::Ref;

impl BddFsm {
    /// Breadth-first reachability from the initial states.
    ///
    /// Returns the layers: `layers[i]` holds the states reachable in at
    /// most `i` steps, the last one being the fixpoint.
    fn compute_layers(&self) -> Vec<Ref> {
        let bdd = &self.bdd;
        let init = bdd.apply_and(self.init(), self.state_invar());
        let mut layers = vec![init];
        let mut reached = init;
        let mut frontier = init;
        loop {
            let image = self.forward_image(frontier);
            let next = bdd.apply_or(reached, image);
            frontier = bdd.apply_diff(next, reached);
            if bdd.is_zero(frontier) {
                break;
            }
            reached = next;
            layers.push(reached);
            info!(
                "Reachability step {}: {} nodes in reached set, {} in frontier",
                layers.len() - 1,
                bdd.size(reached),
                bdd.size(frontier)
            );
        }
        layers
    }

    fn store_layers(&self, layers: &[Ref]) {
        if let Some(&last) = layers.last() {
            self.cache.set(&self.bdd, Slot::Reachable, last);
            self.cache.set_diameter(layers.len() - 1);
        }
        if self.config.cache_reachable_layers {
            self.cache.set_layers(&self.bdd, layers);
        }
    }

    pub fn reachable_states(&self) -> Ref {
        if let Some(f) = self.cache.get(Slot::Reachable) {
            return f;
        }
        let layers = self.compute_layers();
        self.store_layers(&layers);
        layers.last().copied().unwrap_or(self.bdd.zero())
    }

    /// Per-distance layers, `layers[i]` holding the states reachable within
    /// `i` steps.
    pub fn reachable_layers(&self) -> Vec<Ref> {
        if let Some(layers) = self.cache.layers() {
            return layers;
        }
        let layers = self.compute_layers();
        self.store_layers(&layers);
        layers
    }

    /// Install an externally computed layering, e.g. one restored from a
    /// previous run. The last layer becomes the reachable set.
    pub fn set_reachable_layers(&self, layers: &[Ref]) {
        self.store_layers(layers);
    }

    /// Number of steps needed to reach the fixpoint.
    pub fn diameter(&self) -> usize {
        if let Some(d) = self.cache.diameter() {
            return d;
        }
        self.reachable_layers().len().saturating_sub(1)
    }

    /// Index of the first layer satisfying `hit`, which must be monotone
    /// in the layer. Without cached layers the search regenerates them only
    /// up to that index.
    fn first_layer(&self, hit: impl Fn(Ref) -> bool) -> Option<usize> {
        if let Some(layers) = self.cache.layers() {
            return layers.iter().position(|&layer| hit(layer));
        }
        if let Some(reach) = self.cache.get(Slot::Reachable) {
            if !hit(reach) {
                return None;
            }
        }
        let bdd = &self.bdd;
        let mut reached = bdd.apply_and(self.init(), self.state_invar());
        let mut frontier = reached;
        let mut depth = 0;
        loop {
            if hit(reached) {
                return Some(depth);
            }
            let next = bdd.apply_or(reached, self.forward_image(frontier));
            frontier = bdd.apply_diff(next, reached);
            if bdd.is_zero(frontier) {
                self.cache.set(bdd, Slot::Reachable, reached);
                self.cache.set_diameter(depth);
                return None;
            }
            reached = next;
            depth += 1;
        }
    }

    /// Least `i` such that every state of `states` is reachable within `i`
    /// steps, or `None` if some of them are not reachable.
    pub fn distance_of(&self, states: Ref) -> Option<usize> {
        let states = self.bdd.apply_and(states, self.state_invar());
        self.first_layer(|layer| self.bdd.is_implies(states, layer))
    }

    /// Least `i` such that some state of `states` is reachable within `i`
    /// steps, or `None` if none of them is reachable.
    pub fn minimum_distance_of(&self, states: Ref) -> Option<usize> {
        let states = self.bdd.apply_and(states, self.state_invar());
        self.first_layer(|layer| !self.bdd.is_zero(self.bdd.apply_and(states, layer)))
    }

    /// States without any legal successor.
    pub fn not_successor_states(&self) -> Ref {
        self.cached(Slot::NotSuccessor, |fsm| {
            let has_successor = fsm.backward_image(fsm.bdd.one());
            fsm.bdd.apply_diff(fsm.state_invar(), has_successor)
        })
    }

    /// Reachable states without any legal successor.
    pub fn deadlock_states(&self) -> Ref {
        self.cached(Slot::Deadlock, |fsm| {
            fsm.bdd.apply_and(fsm.not_successor_states(), fsm.reachable_states())
        })
    }

    pub fn is_total(&self) -> bool {
        self.bdd.is_zero(self.not_successor_states())
    }

    pub fn is_deadlock_free(&self) -> bool {
        self.bdd.is_zero(self.deadlock_states())
    }
}
