//! Partitioned transition relation.
//!
//! [`BddTrans`] keeps the relation as a list of [`Cluster`]s and computes
//! images without building their conjunction: the set is conjoined with one
//! cluster at a time along a [`Schedule`], and every variable is quantified
//! as soon as no later cluster mentions it. Forward and backward images use
//! separate schedules over the same clusters.

pub mod cluster;
pub mod partition;
pub mod schedule;

use std::collections::BTreeSet;
use std::rc::Rc;

use log::info;

pub use self::cluster::Cluster;
pub use self::partition::{Iwls95Weights, PartitionMethod, TransConfig};
pub use self::schedule::{Schedule, ScheduleStep};

use crate::bdd::{Bdd, Root};
use crate::enc::{VarCubes, VarShift};
use crate::reference::Ref;
use crate::types::Var;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone)]
struct ClassVars {
    state: Root,
    input: Root,
    next: Root,
}

impl ClassVars {
    fn new(bdd: &Rc<Bdd>, cubes: VarCubes) -> Self {
        Self {
            state: Root::new(bdd, cubes.state),
            input: Root::new(bdd, cubes.input),
            next: Root::new(bdd, cubes.next),
        }
    }

    fn cubes(&self) -> VarCubes {
        VarCubes {
            state: self.state.get(),
            input: self.input.get(),
            next: self.next.get(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BddTrans {
    bdd: Rc<Bdd>,
    clusters: Vec<Cluster>,
    forward: Schedule,
    backward: Schedule,
    vars: ClassVars,
    shift: VarShift,
    config: TransConfig,
}

impl BddTrans {
    /// Partition `clusters` and build both schedules.
    ///
    /// # Panics
    ///
    /// Panics if `clusters` is empty, or if some cluster depends on a
    /// variable outside the state, input and next cubes.
    pub fn build(
        bdd: &Rc<Bdd>,
        clusters: Vec<Cluster>,
        cubes: VarCubes,
        shift: VarShift,
        config: TransConfig,
    ) -> Self {
        assert!(!clusters.is_empty(), "Transition relation needs at least one cluster");
        let clusters = partition::partition(bdd, clusters, &config);
        let vars = ClassVars::new(bdd, cubes);
        let (forward, backward) = Self::schedules(bdd, &clusters, cubes, &config);
        info!(
            "Built transition relation: {} clusters, {} nodes",
            clusters.len(),
            bdd.count_nodes(&clusters.iter().map(|c| c.relation()).collect::<Vec<_>>())
        );
        Self {
            bdd: Rc::clone(bdd),
            clusters,
            forward,
            backward,
            vars,
            shift,
            config,
        }
    }

    fn schedules(bdd: &Rc<Bdd>, clusters: &[Cluster], cubes: VarCubes, config: &TransConfig) -> (Schedule, Schedule) {
        let set = |cube: Ref| -> BTreeSet<Var> { bdd.support(cube).into_iter().collect() };
        let state = set(cubes.state);
        let input = set(cubes.input);
        let next = set(cubes.next);

        for cluster in clusters {
            for v in cluster.support() {
                assert!(
                    state.contains(v) || input.contains(v) || next.contains(v),
                    "Cluster support must be within the declared variables, found {}",
                    v
                );
            }
        }

        let weights = match config.partition {
            PartitionMethod::Iwls95 => Some(&config.iwls95),
            _ => None,
        };
        let forward_q: BTreeSet<Var> = state.union(&input).copied().collect();
        let backward_q: BTreeSet<Var> = next.union(&input).copied().collect();
        let forward = Schedule::build(bdd, clusters, &forward_q, &input, weights);
        let backward = Schedule::build(bdd, clusters, &backward_q, &input, weights);
        (forward, backward)
    }

    pub fn bdd(&self) -> &Rc<Bdd> {
        &self.bdd
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn forward_schedule(&self) -> &Schedule {
        &self.forward
    }

    pub fn backward_schedule(&self) -> &Schedule {
        &self.backward
    }

    pub fn config(&self) -> &TransConfig {
        &self.config
    }

    pub fn shift(&self) -> &VarShift {
        &self.shift
    }

    fn image_impl(&self, direction: Direction, set: Ref, keep_inputs: bool) -> Ref {
        match direction {
            Direction::Forward => {
                let next = self.forward.apply(&self.bdd, set, keep_inputs);
                self.bdd.permute(next, self.shift.to_current_table())
            }
            Direction::Backward => {
                let shifted = self.bdd.permute(set, self.shift.to_next_table());
                self.backward.apply(&self.bdd, shifted, keep_inputs)
            }
        }
    }

    /// Successors (forward) or predecessors (backward) of `set`, over the
    /// current-state variables.
    pub fn image(&self, direction: Direction, set: Ref) -> Ref {
        self.image_impl(direction, set, false)
    }

    /// Like [`image`](BddTrans::image) but keeping the input variables:
    /// backward, the state-input pairs with a successor in `set`.
    pub fn state_input_image(&self, direction: Direction, set: Ref) -> Ref {
        self.image_impl(direction, set, true)
    }

    /// Append the clusters of `other` and rebuild both schedules over the
    /// given cubes. No re-partitioning takes place.
    pub fn synchronous_product(&mut self, other: &BddTrans, state_cube: Ref, input_cube: Ref, next_cube: Ref) {
        self.clusters.extend(other.clusters.iter().cloned());
        let cubes = VarCubes {
            state: state_cube,
            input: input_cube,
            next: next_cube,
        };
        self.vars = ClassVars::new(&self.bdd, cubes);
        self.shift = self.shift.merge(&other.shift);
        let (forward, backward) = Self::schedules(&self.bdd, &self.clusters, cubes, &self.config);
        self.forward = forward;
        self.backward = backward;
        info!("Synchronous product: {} clusters", self.clusters.len());
    }

    /// Conjunction of all clusters.
    pub fn monolithic(&self) -> Ref {
        partition::monolithic(&self.bdd, &self.clusters).relation()
    }

    pub fn cubes(&self) -> VarCubes {
        self.vars.cubes()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::enc::BddEnc;
    use crate::expr::{BinOp, Expr};
    use crate::symbols::VarType;

    /// Counter `c : 0..3` stepping by one, and a flag toggled on input `go`.
    fn setup() -> (Rc<Bdd>, BddEnc, Vec<Cluster>) {
        let bdd = Rc::new(Bdd::default());
        let mut enc = BddEnc::new(&bdd);
        enc.declare_state_variable("c", VarType::Range(0, 3)).unwrap();
        enc.declare_state_variable("f", VarType::Boolean).unwrap();
        enc.declare_input_variable("go", VarType::Boolean).unwrap();

        let step = Expr::assign(
            Expr::next(Expr::atom("c")),
            Expr::binary(
                BinOp::Mod,
                Expr::binary(BinOp::Plus, Expr::atom("c"), Expr::number(1)),
                Expr::number(4),
            ),
        );
        let flag = Expr::assign(
            Expr::next(Expr::atom("f")),
            Expr::binary(BinOp::Xor, Expr::atom("f"), Expr::atom("go")),
        );
        let clusters = [step, flag]
            .iter()
            .map(|e| Cluster::new(&bdd, enc.evaluate_bdd(e, "").unwrap()))
            .collect();
        (bdd, enc, clusters)
    }

    fn eval(enc: &mut BddEnc, e: &str, n: i64) -> Ref {
        enc.evaluate_bdd(&Expr::eq(Expr::atom(e), Expr::number(n)), "").unwrap()
    }

    #[test]
    fn test_images_agree_across_partitions() {
        let methods = [
            PartitionMethod::Monolithic,
            PartitionMethod::Threshold(1),
            PartitionMethod::Iwls95,
        ];
        let mut results = Vec::new();
        for method in methods {
            let (bdd, mut enc, clusters) = setup();
            let trans = BddTrans::build(
                &bdd,
                clusters,
                enc.var_cubes(),
                enc.shift().clone(),
                TransConfig::default().with_partition(method),
            );
            let c0 = eval(&mut enc, "c", 0);
            let c1 = eval(&mut enc, "c", 1);
            let c3 = eval(&mut enc, "c", 3);
            assert_eq!(trans.image(Direction::Forward, c0), c1);
            assert_eq!(trans.image(Direction::Backward, c0), c3);
            results.push(trans.monolithic());
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_state_input_image_keeps_inputs() {
        let (bdd, mut enc, clusters) = setup();
        let trans = BddTrans::build(&bdd, clusters, enc.var_cubes(), enc.shift().clone(), TransConfig::default());
        let f = enc.evaluate_bdd(&Expr::atom("f"), "").unwrap();
        let go = enc.evaluate_bdd(&Expr::atom("go"), "").unwrap();

        // Pairs leading to f: (f, !go) or (!f, go).
        let pairs = trans.state_input_image(Direction::Backward, f);
        assert_eq!(pairs, bdd.apply_xor(f, go));
        assert!(bdd.is_one(trans.image(Direction::Backward, f)));
    }

    #[test]
    #[should_panic(expected = "at least one cluster")]
    fn test_empty_cluster_list_panics() {
        let (bdd, enc, _) = setup();
        BddTrans::build(&bdd, Vec::new(), enc.var_cubes(), enc.shift().clone(), TransConfig::default());
    }

    #[test]
    #[should_panic(expected = "within the declared variables")]
    fn test_foreign_support_panics() {
        let (bdd, enc, _) = setup();
        let stray = bdd.var(bdd.new_var());
        let clusters = vec![Cluster::new(&bdd, stray)];
        BddTrans::build(&bdd, clusters, enc.var_cubes(), enc.shift().clone(), TransConfig::default());
    }

    #[test]
    fn test_synchronous_product() {
        let (bdd, mut enc, clusters) = setup();
        let left = vec![clusters[0].clone()];
        let right = vec![clusters[1].clone()];
        let cubes = enc.var_cubes();
        let mut a = BddTrans::build(&bdd, left, cubes, enc.shift().clone(), TransConfig::default());
        let b = BddTrans::build(&bdd, right, cubes, enc.shift().clone(), TransConfig::default());
        let whole = BddTrans::build(&bdd, clusters, cubes, enc.shift().clone(), TransConfig::default());

        a.synchronous_product(&b, cubes.state, cubes.input, cubes.next);
        assert_eq!(a.monolithic(), whole.monolithic());
        let c2 = eval(&mut enc, "c", 2);
        assert_eq!(a.image(Direction::Forward, c2), whole.image(Direction::Forward, c2));
    }
}
