//! Early-quantification schedules.
//!
//! A schedule is the cluster list in conjunction order, each step carrying
//! the cube of variables that occur in no later cluster and may therefore be
//! quantified right after conjoining it. Quantified variables that occur in
//! no cluster at all are eliminated at the first step.

use std::collections::BTreeSet;
use std::rc::Rc;

use log::debug;

use super::cluster::Cluster;
use super::partition::Iwls95Weights;
use crate::bdd::{Bdd, Root};
use crate::reference::Ref;
use crate::types::Var;

#[derive(Debug, Clone)]
pub struct ScheduleStep {
    cluster: Cluster,
    quantify: Root,
    quantify_keep_inputs: Root,
}

impl ScheduleStep {
    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// Variables eliminated after this step.
    pub fn quantify(&self) -> Ref {
        self.quantify.get()
    }

    /// Same, without the input variables.
    pub fn quantify_keep_inputs(&self) -> Ref {
        self.quantify_keep_inputs.get()
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    steps: Vec<ScheduleStep>,
}

impl Schedule {
    /// Build a schedule over `clusters` eliminating `quantified`.
    ///
    /// With `weights`, clusters are greedily ordered by benefit; otherwise
    /// the given order is kept.
    pub fn build(
        bdd: &Rc<Bdd>,
        clusters: &[Cluster],
        quantified: &BTreeSet<Var>,
        inputs: &BTreeSet<Var>,
        weights: Option<&Iwls95Weights>,
    ) -> Self {
        let ordered: Vec<Cluster> = match weights {
            Some(w) => order_by_benefit(bdd, clusters, quantified, w),
            None => clusters.to_vec(),
        };

        let mut later: BTreeSet<Var> = BTreeSet::new();
        let mut cubes: Vec<BTreeSet<Var>> = vec![BTreeSet::new(); ordered.len()];
        for (i, cluster) in ordered.iter().enumerate().rev() {
            cubes[i] = cluster
                .support()
                .iter()
                .filter(|v| quantified.contains(v) && !later.contains(v))
                .copied()
                .collect();
            later.extend(cluster.support().iter().copied());
        }
        if let Some(first) = cubes.first_mut() {
            first.extend(quantified.iter().filter(|v| !later.contains(v)).copied());
        }

        let steps = ordered
            .into_iter()
            .zip(cubes)
            .map(|(cluster, vars)| {
                let all = bdd.var_cube(vars.iter().copied());
                let keep = bdd.var_cube(vars.iter().filter(|v| !inputs.contains(v)).copied());
                ScheduleStep {
                    cluster,
                    quantify: Root::new(bdd, all),
                    quantify_keep_inputs: Root::new(bdd, keep),
                }
            })
            .collect();
        Self { steps }
    }

    pub fn steps(&self) -> &[ScheduleStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Conjoin `set` with every cluster in order, eliminating variables as
    /// soon as no later cluster mentions them.
    pub fn apply(&self, bdd: &Bdd, set: Ref, keep_inputs: bool) -> Ref {
        let mut acc = set;
        for step in self.steps.iter() {
            let cube = if keep_inputs {
                step.quantify_keep_inputs()
            } else {
                step.quantify()
            };
            acc = bdd.and_exists(acc, step.cluster.relation(), cube);
            if bdd.is_zero(acc) {
                break;
            }
        }
        acc
    }
}

/// Greedy benefit ordering.
///
/// For a candidate cluster `c` among the remaining ones, with `V` its
/// quantifiable support and `E ⊆ V` the variables no other remaining
/// cluster mentions:
///
/// * `r1 = |E| / |V|`
/// * `r2 = |E| / |Q|`, `Q` the quantifiable variables still pending
/// * `r3 = -|N| / |support(c)|`, `N` the non-quantified variables `c` introduces
/// * `r4 = max level of E / number of variables`
fn order_by_benefit(
    bdd: &Bdd,
    clusters: &[Cluster],
    quantified: &BTreeSet<Var>,
    weights: &Iwls95Weights,
) -> Vec<Cluster> {
    let mut remaining: Vec<Cluster> = clusters.to_vec();
    let mut introduced: BTreeSet<Var> = BTreeSet::new();
    let mut ordered = Vec::with_capacity(remaining.len());
    let num_vars = bdd.num_vars().max(1) as f64;

    while !remaining.is_empty() {
        let pending: BTreeSet<Var> = remaining
            .iter()
            .flat_map(|c| c.support().iter().copied())
            .filter(|v| quantified.contains(v))
            .collect();

        let mut best = 0;
        let mut best_benefit = f64::NEG_INFINITY;
        for (i, c) in remaining.iter().enumerate() {
            let v: Vec<Var> = c.support().iter().filter(|v| quantified.contains(v)).copied().collect();
            let e: Vec<Var> = v
                .iter()
                .filter(|var| {
                    remaining
                        .iter()
                        .enumerate()
                        .all(|(j, other)| j == i || !other.support().contains(var))
                })
                .copied()
                .collect();
            let n = c
                .support()
                .iter()
                .filter(|var| !quantified.contains(var) && !introduced.contains(var))
                .count();

            let ratio = |a: usize, b: usize| if b == 0 { 0.0 } else { a as f64 / b as f64 };
            let r1 = ratio(e.len(), v.len());
            let r2 = ratio(e.len(), pending.len());
            let r3 = -ratio(n, c.support().len());
            let r4 = e.iter().map(|&var| bdd.level_of(var).index() + 1).max().unwrap_or(0) as f64 / num_vars;
            let benefit = weights.w1 * r1 + weights.w2 * r2 + weights.w3 * r3 + weights.w4 * r4;
            if benefit > best_benefit {
                best_benefit = benefit;
                best = i;
            }
        }

        let chosen = remaining.remove(best);
        introduced.extend(chosen.support().iter().filter(|v| !quantified.contains(v)).copied());
        debug!("schedule: cluster of {} vars, benefit {:.3}", chosen.support().len(), best_benefit);
        ordered.push(chosen);
    }
    ordered
}
