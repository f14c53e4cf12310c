//! Variable ordering and reordering.
//!
//! # Theory: Variable Ordering
//!
//! The size of a BDD is highly sensitive to the order in which variables
//! appear along its paths. For `f = (x₁ ∧ y₁) ∨ (x₂ ∧ y₂) ∨ ... ∨ (xₙ ∧ yₙ)`,
//! the interleaved order `x₁, y₁, x₂, y₂, ...` needs O(n) nodes while the
//! separated order `x₁, ..., xₙ, y₁, ..., yₙ` needs O(2ⁿ).
//!
//! # In-place swap
//!
//! Every reordering is a sequence of adjacent level swaps. A swap rewrites
//! the nodes of the upper variable that depend on the lower one *in place*:
//! the node keeps its index, so every [`Ref`] held by a client still denotes
//! the same function afterwards. Nodes that do not depend on the lower
//! variable are left untouched and simply move one level down.
//!
//! # Groups
//!
//! A group (block) is a run of consecutive variable ids that reordering
//! must keep on consecutive levels. The state encoder puts the current and
//! next copy of each state bit into a group of two, so a bit never drifts
//! away from its next-state twin.
//!
//! # Sifting
//!
//! Rudell's sifting moves each unit (a group, or a single ungrouped
//! variable) through all positions, records the total size at each one,
//! and leaves it at the best. `GroupSift` additionally sifts the members of
//! every group inside the group's own range.
//!
//! # References
//!
//! - R. Rudell. "Dynamic variable ordering for ordered binary decision diagrams."
//!   ICCAD 1993.
//! - S. Panda, F. Somenzi. "Who are the variables in your neighborhood."
//!   ICCAD 1995.

use std::collections::HashSet;

use log::{debug, info};

use crate::bdd::{Bdd, BddConfig};
use crate::reference::Ref;
use crate::types::{Level, Var};

/// Reordering algorithms.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReorderMethod {
    None,
    /// Sift every unit once, groups moved as a whole.
    Sift,
    /// [`ReorderMethod::Sift`], then sift inside each group.
    GroupSift,
}

/// Statistics collected during reordering.
#[derive(Debug, Clone, Default)]
pub struct ReorderStats {
    /// Number of adjacent level swaps performed
    pub swaps: usize,
    pub initial_size: usize,
    pub final_size: usize,
    /// Number of units (groups or single variables) sifted
    pub units_processed: usize,
}

impl ReorderStats {
    pub fn reduction_ratio(&self) -> f64 {
        if self.initial_size == 0 {
            return 0.0;
        }
        1.0 - (self.final_size as f64 / self.initial_size as f64)
    }

    pub fn reduction_percent(&self) -> f64 {
        self.reduction_ratio() * 100.0
    }
}

/// Variable grouping: blocks of consecutive ids kept on adjacent levels.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct GroupTree {
    blocks: Vec<(Var, usize)>,
}

impl GroupTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[(Var, usize)] {
        &self.blocks
    }

    /// Members of the block containing `var`, if any.
    pub fn group_of(&self, var: Var) -> Option<Vec<Var>> {
        self.blocks
            .iter()
            .find(|&&(first, size)| first.id() <= var.id() && var.id() < first.id() + size as u32)
            .map(|&(first, size)| (0..size as u32).map(|i| Var::new(first.id() + i)).collect())
    }

    fn add(&mut self, first: Var, size: usize) {
        let overlaps = self.blocks.iter().any(|&(f, s)| {
            let (a0, a1) = (f.id(), f.id() + s as u32);
            let (b0, b1) = (first.id(), first.id() + size as u32);
            a0 < b1 && b0 < a1
        });
        assert!(!overlaps, "Group starting at {} overlaps an existing group", first);
        self.blocks.push((first, size));
    }
}

pub(crate) struct ReorderState {
    auto: bool,
    method: ReorderMethod,
    next_threshold: usize,
    max_growth: f64,
    suspended: usize,
    running: bool,
    groups: GroupTree,
    reorderings: usize,
}

impl ReorderState {
    pub(crate) fn new(config: &BddConfig) -> Self {
        Self {
            auto: config.auto_reorder,
            method: config.reorder_method,
            next_threshold: config.reorder_threshold,
            max_growth: config.max_growth,
            suspended: 0,
            running: false,
            groups: GroupTree::new(),
            reorderings: 0,
        }
    }
}

/// Scoped suspension of automatic reordering, see [`Bdd::suspend_auto_reorder`].
pub struct ReorderSuspension<'a> {
    bdd: &'a Bdd,
}

impl Drop for ReorderSuspension<'_> {
    fn drop(&mut self) {
        self.bdd.reorder.borrow_mut().suspended -= 1;
    }
}

// Automatic reordering status
impl Bdd {
    pub fn enable_auto_reorder(&self, method: ReorderMethod) {
        let mut state = self.reorder.borrow_mut();
        state.auto = !matches!(method, ReorderMethod::None);
        state.method = method;
    }

    pub fn disable_auto_reorder(&self) {
        self.reorder.borrow_mut().auto = false;
    }

    /// Whether automatic reordering is enabled, and with which method.
    pub fn auto_reorder_status(&self) -> (bool, ReorderMethod) {
        let state = self.reorder.borrow();
        (state.auto, state.method)
    }

    /// Number of reorderings performed so far, automatic or explicit.
    pub fn reorderings(&self) -> usize {
        self.reorder.borrow().reorderings
    }

    /// Prevent automatic reordering until the returned guard is dropped.
    ///
    /// Suspensions nest; the enabled/disabled status itself is untouched.
    pub fn suspend_auto_reorder(&self) -> ReorderSuspension<'_> {
        self.reorder.borrow_mut().suspended += 1;
        ReorderSuspension { bdd: self }
    }

    pub(crate) fn maybe_reorder(&self) {
        let method = {
            let state = self.reorder.borrow();
            if !state.auto || state.suspended > 0 || state.running {
                return;
            }
            if self.node_count() < state.next_threshold {
                return;
            }
            state.method
        };
        let stats = self.reorder(method);
        let mut state = self.reorder.borrow_mut();
        state.next_threshold = state.next_threshold.max(2 * self.node_count());
        debug!("Next automatic reordering at {} nodes ({} swaps last time)", state.next_threshold, stats.swaps);
    }
}

// Groups
impl Bdd {
    /// Declare the ids `first..first+size` as a block kept on adjacent levels.
    ///
    /// # Panics
    ///
    /// Panics if the variables do not currently occupy consecutive levels,
    /// or if the block overlaps an existing one.
    pub fn new_group(&self, first: Var, size: usize) {
        if size == 0 {
            return;
        }
        let last = Var::new(first.id() + size as u32 - 1);
        self.mk_var(last.id());
        let mut levels: Vec<usize> = (0..size as u32)
            .map(|i| self.level_of(Var::new(first.id() + i)).index())
            .collect();
        levels.sort_unstable();
        assert!(
            levels.windows(2).all(|w| w[1] == w[0] + 1),
            "Group members {}..={} must occupy consecutive levels",
            first,
            last
        );
        self.reorder.borrow_mut().groups.add(first, size);
    }

    pub fn group_tree(&self) -> GroupTree {
        self.reorder.borrow().groups.clone()
    }

    pub fn set_group_tree(&self, tree: GroupTree) {
        self.reorder.borrow_mut().groups = tree;
    }
}

// Swapping and sifting
impl Bdd {
    /// Swap the variables at `level` and `level + 1` in place.
    pub fn swap_levels(&self, level: Level) {
        assert!(level.index() + 1 < self.num_vars(), "No level below {}", level);
        let a = self.var_at_level(level);
        let b = self.var_at_level(level.next());

        let depends_on_b = |r: Ref| !r.is_terminal() && self.variable(r) == b;
        let moving: Vec<(Ref, Ref, u32)> = self
            .subtable_entries(a)
            .into_iter()
            .filter(|&(low, high, _)| depends_on_b(low) || depends_on_b(high))
            .collect();
        for &(low, high, _) in moving.iter() {
            self.subtable_remove(a, low, high);
        }

        self.swap_order(level);

        for (low, high, index) in moving {
            let (f00, f01) = if depends_on_b(low) {
                (self.low_node(low), self.high_node(low))
            } else {
                (low, low)
            };
            let (f10, f11) = if depends_on_b(high) {
                (self.low_node(high), self.high_node(high))
            } else {
                (high, high)
            };
            let new_low = self.mk_node(a, f00, f10);
            let new_high = self.mk_node(a, f01, f11);
            debug_assert!(!new_high.is_negated());
            debug_assert_ne!(new_low, new_high);
            self.set_node(
                index,
                crate::node::Node {
                    variable: b,
                    low: new_low,
                    high: new_high,
                },
            );
            self.subtable_insert(b, new_low, new_high, index);
        }

        self.clear_cache();
    }

    /// Current layout as units, top to bottom: each group is one unit, every
    /// other variable is a unit of its own.
    fn units(&self) -> Vec<Vec<Var>> {
        let groups = self.group_tree();
        let mut seen = HashSet::new();
        let mut units = Vec::new();
        for var in self.ordering() {
            match groups.group_of(var) {
                Some(mut members) => {
                    if seen.insert(members[0]) {
                        members.sort_by_key(|&v| self.level_of(v));
                        units.push(members);
                    }
                }
                None => units.push(vec![var]),
            }
        }
        units
    }

    /// Swap units `i` and `i + 1` of `layout`, returning the number of level swaps.
    fn swap_units(&self, layout: &mut [Vec<Var>], i: usize) -> usize {
        let start: usize = layout[..i].iter().map(|u| u.len()).sum();
        let m = layout[i].len();
        let k = layout[i + 1].len();
        for j in 0..k {
            for l in (start + j..start + m + j).rev() {
                self.swap_levels(Level::new(l));
            }
        }
        layout.swap(i, i + 1);
        m * k
    }

    fn sift_unit(&self, layout: &mut [Vec<Var>], mut pos: usize, roots: &[Ref], max_growth: f64) -> usize {
        let initial = self.count_nodes(roots);
        let limit = initial as f64 * max_growth;
        let mut best = (pos, initial);
        let mut swaps = 0;

        while pos > 0 {
            swaps += self.swap_units(layout, pos - 1);
            pos -= 1;
            let size = self.count_nodes(roots);
            if size < best.1 {
                best = (pos, size);
            }
            if size as f64 > limit {
                break;
            }
        }
        while pos + 1 < layout.len() {
            swaps += self.swap_units(layout, pos);
            pos += 1;
            let size = self.count_nodes(roots);
            if size < best.1 {
                best = (pos, size);
            }
            if size as f64 > limit && pos > best.0 {
                break;
            }
        }
        while pos > best.0 {
            swaps += self.swap_units(layout, pos - 1);
            pos -= 1;
        }
        while pos < best.0 {
            swaps += self.swap_units(layout, pos);
            pos += 1;
        }
        swaps
    }

    /// Sift `var` within the levels `start..start+len`.
    fn sift_within(&self, var: Var, start: usize, len: usize, roots: &[Ref]) -> usize {
        let mut level = self.level_of(var).index();
        let mut best = (level, self.count_nodes(roots));
        let mut swaps = 0;
        while level > start {
            self.swap_levels(Level::new(level - 1));
            level -= 1;
            swaps += 1;
            let size = self.count_nodes(roots);
            if size < best.1 {
                best = (level, size);
            }
        }
        while level + 1 < start + len {
            self.swap_levels(Level::new(level));
            level += 1;
            swaps += 1;
            let size = self.count_nodes(roots);
            if size < best.1 {
                best = (level, size);
            }
        }
        while level > best.0 {
            self.swap_levels(Level::new(level - 1));
            level -= 1;
            swaps += 1;
        }
        swaps
    }

    /// Reorder with `method`, minimizing the nodes reachable from the
    /// referenced handles.
    pub fn reorder(&self, method: ReorderMethod) -> ReorderStats {
        let roots = self.referenced_roots();
        let initial_size = self.count_nodes(&roots);
        let mut stats = ReorderStats {
            initial_size,
            final_size: initial_size,
            ..Default::default()
        };
        if matches!(method, ReorderMethod::None) || roots.is_empty() || self.num_vars() < 2 {
            return stats;
        }

        let max_growth = {
            let mut state = self.reorder.borrow_mut();
            state.running = true;
            state.max_growth
        };

        let mut layout = self.units();
        let mut order: Vec<Vec<Var>> = layout.clone();
        order.sort_by_key(|unit| std::cmp::Reverse(unit.iter().map(|&v| self.nodes_at(v)).sum::<usize>()));
        debug!("Sifting {} units, initial size {}", order.len(), initial_size);

        for unit in order.iter() {
            let Some(pos) = layout.iter().position(|u| u[0] == unit[0]) else {
                continue;
            };
            stats.swaps += self.sift_unit(&mut layout, pos, &roots, max_growth);
            stats.units_processed += 1;
        }

        if matches!(method, ReorderMethod::GroupSift) {
            let mut start = 0;
            for unit in layout.iter() {
                if unit.len() > 1 {
                    for &var in unit.iter() {
                        stats.swaps += self.sift_within(var, start, unit.len(), &roots);
                    }
                }
                start += unit.len();
            }
        }

        stats.final_size = self.count_nodes(&roots);
        {
            let mut state = self.reorder.borrow_mut();
            state.running = false;
            state.reorderings += 1;
        }
        info!(
            "Reordering ({:?}): size {} -> {} ({:.1}% reduction), {} swaps",
            method,
            stats.initial_size,
            stats.final_size,
            stats.reduction_percent(),
            stats.swaps
        );
        stats
    }
}
