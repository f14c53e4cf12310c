//! The BDD manager.
//!
//! All operations go through [`Bdd`], which owns the node storage, the
//! per-variable unique tables, the variable ordering and the computed table.
//! Handles ([`Ref`]) are plain `Copy` values with a complement bit; the
//! terminal node lives at index 1, so `ONE = @1` and `ZERO = ~@1`.
//!
//! Nodes are never freed implicitly. Long-lived holders protect their
//! handles with external reference counts ([`Bdd::reference`], or the
//! [`Root`] guard), and [`Bdd::collect_garbage`] reclaims everything that is
//! neither referenced nor passed as an explicit root.
//!
//! Recursion compares *levels*, not variable ids, so the ordering can be
//! changed in place by the [`reorder`][crate::reorder] module without
//! invalidating any handle.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::rc::Rc;

use log::debug;

use crate::cache::{Cache, OpKey};
use crate::node::Node;
use crate::reference::Ref;
use crate::reorder::{ReorderMethod, ReorderState};
use crate::subtable::Subtable;
use crate::types::{Level, Var};

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct BddConfig {
    /// The computed table is pre-sized for `2^cache_bits` entries.
    pub cache_bits: usize,
    /// Whether automatic reordering starts enabled.
    pub auto_reorder: bool,
    /// Method used by automatic reordering.
    pub reorder_method: ReorderMethod,
    /// Live-node count that triggers the first automatic reordering.
    pub reorder_threshold: usize,
    /// Sifting stops moving a unit once the size grows beyond this factor.
    pub max_growth: f64,
}

impl Default for BddConfig {
    fn default() -> Self {
        Self {
            cache_bits: 16,
            auto_reorder: false,
            reorder_method: ReorderMethod::Sift,
            reorder_threshold: 4004,
            max_growth: 1.2,
        }
    }
}

impl BddConfig {
    pub fn with_cache_bits(mut self, cache_bits: usize) -> Self {
        self.cache_bits = cache_bits;
        self
    }

    pub fn with_auto_reorder(mut self, method: ReorderMethod) -> Self {
        self.auto_reorder = !matches!(method, ReorderMethod::None);
        self.reorder_method = method;
        self
    }

    pub fn with_reorder_threshold(mut self, threshold: usize) -> Self {
        self.reorder_threshold = threshold;
        self
    }

    pub fn with_max_growth(mut self, max_growth: f64) -> Self {
        self.max_growth = max_growth;
        self
    }
}

pub struct Bdd {
    nodes: RefCell<Vec<Node>>,
    free: RefCell<Vec<u32>>,
    /// `subtables[v - 1]` holds the nodes labelled with variable `v`.
    subtables: RefCell<Vec<Subtable>>,
    /// `var_to_level[v]` for `v >= 1`; slot 0 is unused.
    var_to_level: RefCell<Vec<usize>>,
    level_to_var: RefCell<Vec<Var>>,
    cache: RefCell<Cache<OpKey, Ref>>,
    refs: RefCell<HashMap<u32, usize>>,
    pub(crate) reorder: RefCell<ReorderState>,
    depth: Cell<usize>,
}

impl Bdd {
    pub fn new(config: BddConfig) -> Self {
        // Slot 0 is a sentry, slot 1 is the terminal.
        let nodes = vec![Node::vacant(), Node::vacant()];
        Self {
            nodes: RefCell::new(nodes),
            free: RefCell::new(Vec::new()),
            subtables: RefCell::new(Vec::new()),
            var_to_level: RefCell::new(vec![usize::MAX]),
            level_to_var: RefCell::new(Vec::new()),
            cache: RefCell::new(Cache::new(config.cache_bits)),
            refs: RefCell::new(HashMap::new()),
            reorder: RefCell::new(ReorderState::new(&config)),
            depth: Cell::new(0),
        }
    }

    pub fn with_config(config: BddConfig) -> Self {
        Self::new(config)
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(BddConfig::default())
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bdd")
            .field("vars", &self.num_vars())
            .field("nodes", &self.node_count())
            .field("referenced", &self.referenced_count())
            .finish()
    }
}

// Node access and ordering
impl Bdd {
    pub fn one(&self) -> Ref {
        Ref::ONE
    }
    pub fn zero(&self) -> Ref {
        Ref::ZERO
    }
    pub fn is_one(&self, f: Ref) -> bool {
        f == Ref::ONE
    }
    pub fn is_zero(&self, f: Ref) -> bool {
        f == Ref::ZERO
    }
    pub fn is_terminal(&self, f: Ref) -> bool {
        f.is_terminal()
    }

    pub(crate) fn node(&self, index: u32) -> Node {
        self.nodes.borrow()[index as usize]
    }

    pub(crate) fn set_node(&self, index: u32, node: Node) {
        self.nodes.borrow_mut()[index as usize] = node;
    }

    /// Top variable of a non-terminal node.
    pub fn variable(&self, f: Ref) -> Var {
        assert!(!f.is_terminal(), "Terminal node has no variable");
        self.node(f.index()).variable
    }

    pub fn low_node(&self, f: Ref) -> Ref {
        let low = self.node(f.index()).low;
        if f.is_negated() {
            -low
        } else {
            low
        }
    }

    pub fn high_node(&self, f: Ref) -> Ref {
        let high = self.node(f.index()).high;
        if f.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn num_vars(&self) -> usize {
        self.level_to_var.borrow().len()
    }

    /// Allocate the next variable id; it is placed at the bottom of the order.
    pub fn new_var(&self) -> Var {
        let var = Var::new(self.num_vars() as u32 + 1);
        let level = self.num_vars();
        self.level_to_var.borrow_mut().push(var);
        self.var_to_level.borrow_mut().push(level);
        self.subtables.borrow_mut().push(Subtable::new(var));
        debug!("new_var: {} at level {}", var, level);
        var
    }

    fn ensure_var(&self, var: Var) {
        while self.num_vars() < var.index() {
            self.new_var();
        }
    }

    pub fn level_of(&self, var: Var) -> Level {
        Level::new(self.var_to_level.borrow()[var.index()])
    }

    pub fn var_at_level(&self, level: Level) -> Var {
        self.level_to_var.borrow()[level.index()]
    }

    /// Level of the top variable of `f`, or [`Level::TERMINAL`] for constants.
    pub fn level(&self, f: Ref) -> Level {
        if f.is_terminal() {
            Level::TERMINAL
        } else {
            self.level_of(self.variable(f))
        }
    }

    /// Variables in the current order, top to bottom.
    pub fn ordering(&self) -> Vec<Var> {
        self.level_to_var.borrow().clone()
    }

    pub(crate) fn swap_order(&self, level: Level) {
        let mut l2v = self.level_to_var.borrow_mut();
        let mut v2l = self.var_to_level.borrow_mut();
        let (i, j) = (level.index(), level.index() + 1);
        l2v.swap(i, j);
        v2l[l2v[i].index()] = i;
        v2l[l2v[j].index()] = j;
    }

    pub(crate) fn subtable_entries(&self, var: Var) -> Vec<(Ref, Ref, u32)> {
        self.subtables.borrow()[var.index() - 1].iter().collect()
    }

    pub(crate) fn subtable_remove(&self, var: Var, low: Ref, high: Ref) {
        self.subtables.borrow_mut()[var.index() - 1].remove(low, high);
    }

    pub(crate) fn subtable_insert(&self, var: Var, low: Ref, high: Ref, index: u32) {
        let mut subtables = self.subtables.borrow_mut();
        debug_assert!(subtables[var.index() - 1].find(low, high).is_none());
        subtables[var.index() - 1].insert(low, high, index);
    }

    /// Number of nodes currently stored in the unique tables.
    pub fn node_count(&self) -> usize {
        self.subtables.borrow().iter().map(|s| s.len()).sum()
    }

    /// Number of nodes at the level holding `var`.
    pub fn nodes_at(&self, var: Var) -> usize {
        self.subtables.borrow()[var.index() - 1].len()
    }

    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.borrow();
        (cache.hits(), cache.misses())
    }

    pub(crate) fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Cofactors of `f` with respect to the variable at `level`.
    pub fn top_cofactors(&self, f: Ref, level: Level) -> (Ref, Ref) {
        if self.level(f) != level {
            (f, f)
        } else {
            (self.low_node(f), self.high_node(f))
        }
    }
}

// Node construction
impl Bdd {
    pub fn mk_node(&self, v: Var, low: Ref, high: Ref) -> Ref {
        if low == high {
            return low;
        }
        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }

        if let Some(i) = self.subtables.borrow()[v.index() - 1].find(low, high) {
            return Ref::positive(i);
        }

        let node = Node {
            variable: v,
            low,
            high,
        };
        let index = match self.free.borrow_mut().pop() {
            Some(i) => {
                self.nodes.borrow_mut()[i as usize] = node;
                i
            }
            None => {
                let mut nodes = self.nodes.borrow_mut();
                assert!(nodes.len() < i32::MAX as usize, "Storage is full");
                nodes.push(node);
                (nodes.len() - 1) as u32
            }
        };
        self.subtables.borrow_mut()[v.index() - 1].insert(low, high, index);
        Ref::positive(index)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");
        let var = Var::new(v);
        self.ensure_var(var);
        self.mk_node(var, Ref::ZERO, Ref::ONE)
    }

    pub fn var(&self, var: Var) -> Ref {
        self.mk_var(var.id())
    }

    /// Conjunction of DIMACS-style literals.
    pub fn mk_cube(&self, literals: impl IntoIterator<Item = i32>) -> Ref {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        for &lit in literals.iter() {
            assert_ne!(lit, 0, "Variable index should not be zero");
            self.ensure_var(Var::new(lit.unsigned_abs()));
        }
        // Build bottom-up in the current order.
        literals.sort_by_key(|&lit| std::cmp::Reverse(self.level_of(Var::new(lit.unsigned_abs()))));
        let mut current = Ref::ONE;
        for lit in literals {
            let v = Var::new(lit.unsigned_abs());
            current = if lit < 0 {
                self.mk_node(v, current, Ref::ZERO)
            } else {
                self.mk_node(v, Ref::ZERO, current)
            };
        }
        current
    }

    /// Positive cube over the given variables.
    pub fn var_cube(&self, vars: impl IntoIterator<Item = Var>) -> Ref {
        self.mk_cube(vars.into_iter().map(|v| v.id() as i32))
    }

    /// Conjunction of a full assignment.
    pub fn minterm_cube(&self, assignment: &[(Var, bool)]) -> Ref {
        self.mk_cube(assignment.iter().map(|&(v, b)| if b { v.id() as i32 } else { -(v.id() as i32) }))
    }

    fn is_positive_cube(&self, mut cube: Ref) -> bool {
        while !cube.is_terminal() {
            if self.low_node(cube) != Ref::ZERO {
                return false;
            }
            cube = self.high_node(cube);
        }
        cube == Ref::ONE
    }

    /// Run a top-level operation, giving automatic reordering a chance to run
    /// once the outermost call has returned.
    fn top_level<T>(&self, op: impl FnOnce() -> T) -> T {
        self.depth.set(self.depth.get() + 1);
        let res = op();
        self.depth.set(self.depth.get() - 1);
        if self.depth.get() == 0 {
            self.maybe_reorder();
        }
        res
    }
}

// Boolean operations
impl Bdd {
    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(f, g, h) = (f ∧ g) ∨ (¬f ∧ h)
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use bdd_fsm::bdd::Bdd;
    ///
    /// let bdd = Bdd::default();
    /// let x = bdd.mk_var(1);
    /// let y = bdd.mk_var(2);
    /// let z = bdd.mk_var(3);
    /// let f = bdd.apply_ite(x, y, z);
    /// let x_and_y = bdd.apply_and(x, y);
    /// let not_x_and_z = bdd.apply_and(-x, z);
    /// assert_eq!(f, bdd.apply_or(x_and_y, not_x_and_z));
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        self.top_level(|| self.ite_rec(f, g, h))
    }

    pub(crate) fn ite_rec(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        // ite(1,G,H) => G, ite(0,G,H) => H
        if f == Ref::ONE {
            return g;
        }
        if f == Ref::ZERO {
            return h;
        }

        // ite(F,F,H) => ite(F,1,H), ite(F,~F,H) => ite(F,0,H), and so on.
        let g = if g == f {
            Ref::ONE
        } else if g == -f {
            Ref::ZERO
        } else {
            g
        };
        let h = if h == f {
            Ref::ZERO
        } else if h == -f {
            Ref::ONE
        } else {
            h
        };

        if g == h {
            return g;
        }
        if g == Ref::ONE && h == Ref::ZERO {
            return f;
        }
        if g == Ref::ZERO && h == Ref::ONE {
            return -f;
        }

        // ite(~F,G,H) => ite(F,H,G)
        let (f, g, h) = if f.is_negated() { (-f, h, g) } else { (f, g, h) };
        // ite(F,~G,H) => ~ite(F,G,~H)
        let (g, h, negate) = if g.is_negated() { (-g, -h, true) } else { (g, h, false) };

        let key = OpKey::Ite(f, g, h);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            return if negate { -res } else { res };
        }

        let top = self.level(f).min(self.level(g)).min(self.level(h));
        let (f0, f1) = self.top_cofactors(f, top);
        let (g0, g1) = self.top_cofactors(g, top);
        let (h0, h1) = self.top_cofactors(h, top);

        let t = self.ite_rec(f1, g1, h1);
        let e = self.ite_rec(f0, g0, h0);
        let res = self.mk_node(self.var_at_level(top), e, t);
        self.cache.borrow_mut().insert(key, res);

        if negate {
            -res
        } else {
            res
        }
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, Ref::ZERO)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, Ref::ONE, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_eq(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, -v)
    }

    pub fn apply_imply(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, Ref::ONE)
    }

    /// `u ∧ ¬v`
    pub fn apply_diff(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, Ref::ZERO)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = Ref::ONE;
        for node in nodes {
            res = self.apply_and(res, node);
            if res == Ref::ZERO {
                break;
            }
        }
        res
    }

    pub fn apply_or_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = Ref::ZERO;
        for node in nodes {
            res = self.apply_or(res, node);
            if res == Ref::ONE {
                break;
            }
        }
        res
    }
}

// Quantification, relational product, permutation, entailment
impl Bdd {
    /// Existential quantification of the variables in the positive `cube`.
    pub fn exists(&self, f: Ref, cube: Ref) -> Ref {
        assert!(self.is_positive_cube(cube), "Quantification cube must be a positive cube");
        self.top_level(|| self.exists_rec(f, cube))
    }

    /// Universal quantification of the variables in the positive `cube`.
    pub fn forall(&self, f: Ref, cube: Ref) -> Ref {
        -self.exists(-f, cube)
    }

    fn skip_cube(&self, mut cube: Ref, level: Level) -> Ref {
        while !cube.is_terminal() && self.level(cube) < level {
            cube = self.high_node(cube);
        }
        cube
    }

    fn exists_rec(&self, f: Ref, cube: Ref) -> Ref {
        if f.is_terminal() {
            return f;
        }
        let top = self.level(f);
        let cube = self.skip_cube(cube, top);
        if cube == Ref::ONE {
            return f;
        }

        let key = OpKey::Exists(f, cube);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            return res;
        }

        let f0 = self.low_node(f);
        let f1 = self.high_node(f);
        let res = if self.level(cube) == top {
            let rest = self.high_node(cube);
            let t = self.exists_rec(f1, rest);
            if t == Ref::ONE {
                Ref::ONE
            } else {
                let e = self.exists_rec(f0, rest);
                self.ite_rec(t, Ref::ONE, e)
            }
        } else {
            let t = self.exists_rec(f1, cube);
            let e = self.exists_rec(f0, cube);
            self.mk_node(self.var_at_level(top), e, t)
        };

        self.cache.borrow_mut().insert(key, res);
        res
    }

    /// Relational product `∃cube. f ∧ g`, without building `f ∧ g`.
    pub fn and_exists(&self, f: Ref, g: Ref, cube: Ref) -> Ref {
        assert!(self.is_positive_cube(cube), "Quantification cube must be a positive cube");
        self.top_level(|| self.and_exists_rec(f, g, cube))
    }

    fn and_exists_rec(&self, f: Ref, g: Ref, cube: Ref) -> Ref {
        if f == Ref::ZERO || g == Ref::ZERO || f == -g {
            return Ref::ZERO;
        }
        if f == Ref::ONE && g == Ref::ONE {
            return Ref::ONE;
        }
        if cube == Ref::ONE {
            return self.ite_rec(f, g, Ref::ZERO);
        }
        if f == Ref::ONE || f == g {
            return self.exists_rec(g, cube);
        }
        if g == Ref::ONE {
            return self.exists_rec(f, cube);
        }

        let (f, g) = if f.get() > g.get() { (g, f) } else { (f, g) };
        let top = self.level(f).min(self.level(g));
        let cube = self.skip_cube(cube, top);
        if cube == Ref::ONE {
            return self.ite_rec(f, g, Ref::ZERO);
        }

        let key = OpKey::AndExists(f, g, cube);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            return res;
        }

        let (f0, f1) = self.top_cofactors(f, top);
        let (g0, g1) = self.top_cofactors(g, top);
        let res = if self.level(cube) == top {
            let rest = self.high_node(cube);
            let t = self.and_exists_rec(f1, g1, rest);
            if t == Ref::ONE {
                Ref::ONE
            } else {
                let e = self.and_exists_rec(f0, g0, rest);
                self.ite_rec(t, Ref::ONE, e)
            }
        } else {
            let t = self.and_exists_rec(f1, g1, cube);
            let e = self.and_exists_rec(f0, g0, cube);
            self.mk_node(self.var_at_level(top), e, t)
        };

        self.cache.borrow_mut().insert(key, res);
        res
    }

    /// Rename variables: every `v` is replaced by `table[v.index() - 1]`
    /// (ids beyond the table map to themselves).
    pub fn permute(&self, f: Ref, table: &[Var]) -> Ref {
        self.top_level(|| {
            let mut memo = HashMap::new();
            self.permute_rec(f, table, &mut memo)
        })
    }

    fn permute_rec(&self, f: Ref, table: &[Var], memo: &mut HashMap<Ref, Ref>) -> Ref {
        if f.is_terminal() {
            return f;
        }
        let reg = f.regular();
        let res = match memo.get(&reg) {
            Some(&res) => res,
            None => {
                let v = self.variable(reg);
                let t = self.permute_rec(self.high_node(reg), table, memo);
                let e = self.permute_rec(self.low_node(reg), table, memo);
                let target = table.get(v.index() - 1).copied().unwrap_or(v);
                let x = self.mk_var(target.id());
                let res = self.ite_rec(x, t, e);
                memo.insert(reg, res);
                res
            }
        };
        if f.is_negated() {
            -res
        } else {
            res
        }
    }

    /// Entailment test: `f → g` is valid.
    pub fn is_implies(&self, f: Ref, g: Ref) -> bool {
        self.leq_rec(f, g)
    }

    fn leq_rec(&self, f: Ref, g: Ref) -> bool {
        if f == g || f == Ref::ZERO || g == Ref::ONE {
            return true;
        }
        if f == Ref::ONE || g == Ref::ZERO || f == -g {
            return false;
        }

        let key = OpKey::Leq(f, g);
        if let Some(res) = self.cache.borrow_mut().get(&key) {
            return res == Ref::ONE;
        }

        let top = self.level(f).min(self.level(g));
        let (f0, f1) = self.top_cofactors(f, top);
        let (g0, g1) = self.top_cofactors(g, top);
        let res = self.leq_rec(f1, g1) && self.leq_rec(f0, g0);

        self.cache
            .borrow_mut()
            .insert(key, if res { Ref::ONE } else { Ref::ZERO });
        res
    }

    /// Variables `f` depends on, sorted by level.
    pub fn support(&self, f: Ref) -> Vec<Var> {
        let mut vars = HashSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![f.regular()];
        while let Some(node) = stack.pop() {
            if node.is_terminal() || !visited.insert(node) {
                continue;
            }
            let n = self.node(node.index());
            vars.insert(n.variable);
            stack.push(n.low.regular());
            stack.push(n.high.regular());
        }
        let mut vars: Vec<Var> = vars.into_iter().collect();
        vars.sort_by_key(|&v| self.level_of(v));
        vars
    }

    pub fn support_cube(&self, f: Ref) -> Ref {
        let support = self.support(f);
        self.var_cube(support)
    }

    /// Evaluate `f` under a total assignment.
    pub fn eval(&self, f: Ref, assignment: impl Fn(Var) -> bool) -> bool {
        let mut current = f;
        while !current.is_terminal() {
            current = if assignment(self.variable(current)) {
                self.high_node(current)
            } else {
                self.low_node(current)
            };
        }
        current == Ref::ONE
    }

    /// Number of nodes in `f`, including the terminal.
    pub fn size(&self, f: Ref) -> usize {
        self.count_nodes(&[f])
    }

    /// Number of distinct nodes reachable from `roots`, including the terminal.
    pub fn count_nodes(&self, roots: &[Ref]) -> usize {
        let mut visited = HashSet::new();
        visited.insert(1u32);
        let mut stack: Vec<u32> = roots.iter().map(|r| r.index()).collect();
        while let Some(index) = stack.pop() {
            if visited.insert(index) {
                let node = self.node(index);
                stack.push(node.low.index());
                stack.push(node.high.index());
            }
        }
        visited.len()
    }

    pub fn to_bracket_string(&self, node: Ref) -> String {
        if node == Ref::ZERO {
            return "(0)".to_string();
        } else if node == Ref::ONE {
            return "(1)".to_string();
        }
        format!(
            "{}:({}, {}, {})",
            node,
            self.variable(node),
            self.to_bracket_string(self.high_node(node)),
            self.to_bracket_string(self.low_node(node))
        )
    }
}

// External references and garbage collection
impl Bdd {
    /// Protect `f` from garbage collection. Returns `f` for chaining.
    pub fn reference(&self, f: Ref) -> Ref {
        if !f.is_terminal() {
            *self.refs.borrow_mut().entry(f.index()).or_insert(0) += 1;
        }
        f
    }

    /// Release one reference previously taken with [`Bdd::reference`].
    pub fn dereference(&self, f: Ref) {
        if f.is_terminal() {
            return;
        }
        let mut refs = self.refs.borrow_mut();
        let count = refs
            .get_mut(&f.index())
            .unwrap_or_else(|| panic!("Dereferencing unreferenced node {}", f));
        *count -= 1;
        if *count == 0 {
            refs.remove(&f.index());
        }
    }

    /// Number of distinct nodes currently protected by external references.
    pub fn referenced_count(&self) -> usize {
        self.refs.borrow().len()
    }

    pub(crate) fn referenced_roots(&self) -> Vec<Ref> {
        let mut roots: Vec<Ref> = self.refs.borrow().keys().map(|&i| Ref::positive(i)).collect();
        roots.sort();
        roots
    }

    /// Free every node unreachable from referenced handles and `roots`.
    ///
    /// Returns the number of reclaimed nodes.
    pub fn collect_garbage(&self, roots: &[Ref]) -> usize {
        let size = self.nodes.borrow().len();
        let mut alive = vec![false; size];
        alive[1] = true;
        let mut stack: Vec<u32> = self.refs.borrow().keys().copied().collect();
        stack.extend(roots.iter().map(|r| r.index()));
        while let Some(index) = stack.pop() {
            if !alive[index as usize] {
                alive[index as usize] = true;
                let node = self.node(index);
                stack.push(node.low.index());
                stack.push(node.high.index());
            }
        }

        let mut freed = 0;
        let mut subtables = self.subtables.borrow_mut();
        let mut free = self.free.borrow_mut();
        let mut nodes = self.nodes.borrow_mut();
        for subtable in subtables.iter_mut() {
            for index in subtable.retain_indices(|i| alive[i as usize]) {
                nodes[index as usize] = Node::vacant();
                free.push(index);
                freed += 1;
            }
        }
        self.cache.borrow_mut().clear();
        debug!("collect_garbage: freed {} nodes, {} remain", freed, size - 2 - free.len());
        freed
    }
}

/// RAII guard holding one external reference to a node.
///
/// Cloning takes another reference; dropping releases one.
pub struct Root {
    bdd: Rc<Bdd>,
    node: Ref,
}

impl Root {
    pub fn new(bdd: &Rc<Bdd>, node: Ref) -> Self {
        bdd.reference(node);
        Self {
            bdd: Rc::clone(bdd),
            node,
        }
    }

    pub fn get(&self) -> Ref {
        self.node
    }

    /// Replace the held node, releasing the old one.
    pub fn set(&mut self, node: Ref) {
        self.bdd.reference(node);
        self.bdd.dereference(self.node);
        self.node = node;
    }
}

impl Clone for Root {
    fn clone(&self) -> Self {
        Root::new(&self.bdd, self.node)
    }
}

impl Drop for Root {
    fn drop(&mut self) {
        self.bdd.dereference(self.node);
    }
}

impl Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Root({})", self.node)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_var() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        assert_eq!(bdd.variable(x), Var::new(1));
        assert_eq!(bdd.high_node(x), bdd.one());
        assert_eq!(bdd.low_node(x), bdd.zero());
        assert_eq!(bdd.high_node(-x), bdd.zero());
        assert_eq!(bdd.low_node(-x), bdd.one());
    }

    #[test]
    fn test_vars_are_allocated_in_order() {
        let bdd = Bdd::default();
        bdd.mk_var(3);
        assert_eq!(bdd.num_vars(), 3);
        assert_eq!(bdd.level_of(Var::new(2)), Level::new(1));
        assert_eq!(bdd.var_at_level(Level::new(2)), Var::new(3));
    }

    #[test]
    fn test_cube() {
        let bdd = Bdd::default();
        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        let f = bdd.apply_and_many([x1, x2, x3]);
        assert_eq!(f, bdd.mk_cube([3, 1, 2]));

        let f = bdd.apply_and_many([x1, -x2, -x3]);
        assert_eq!(f, bdd.mk_cube([1, -2, -3]));
    }

    #[test]
    fn test_de_morgan() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        assert_eq!(-bdd.apply_and(x, y), bdd.apply_or(-x, -y));
        assert_eq!(-bdd.apply_or(x, y), bdd.apply_and(-x, -y));
    }

    #[test]
    fn test_xor() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.apply_and(x, y);
        assert_eq!(bdd.apply_xor(f, f), bdd.zero());
        assert_eq!(bdd.apply_xor(f, -f), bdd.one());
        assert_eq!(bdd.apply_eq(x, y), -bdd.apply_xor(x, y));
    }

    #[test]
    fn test_apply_ite() {
        let bdd = Bdd::default();
        let g = bdd.mk_var(2);
        let h = bdd.mk_var(3);
        assert_eq!(bdd.apply_ite(bdd.one(), g, h), g);
        assert_eq!(bdd.apply_ite(bdd.zero(), g, h), h);

        let f = bdd.mk_var(1);
        assert_eq!(bdd.apply_ite(f, f, h), bdd.apply_or(f, h));
        assert_eq!(bdd.apply_ite(f, g, f), bdd.apply_and(f, g));
        assert_eq!(bdd.apply_ite(f, -g, bdd.one()), -bdd.apply_and(f, g));
        assert_eq!(bdd.apply_ite(f, g, g), g);
        assert_eq!(bdd.apply_ite(f, bdd.zero(), bdd.one()), -f);
    }

    #[test]
    fn test_exists() {
        let bdd = Bdd::default();
        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        // ∃x2. (x1 ∧ x2) ∨ (¬x2 ∧ x3) = x1 ∨ x3
        let f = bdd.apply_or(bdd.apply_and(x1, x2), bdd.apply_and(-x2, x3));
        let cube = bdd.mk_cube([2]);
        assert_eq!(bdd.exists(f, cube), bdd.apply_or(x1, x3));

        // ∀x2. same = x1 ∧ x3
        assert_eq!(bdd.forall(f, cube), bdd.apply_and(x1, x3));
    }

    #[test]
    fn test_and_exists_matches_baseline() {
        let bdd = Bdd::default();
        let x: Vec<Ref> = (1..=6).map(|i| bdd.mk_var(i)).collect();
        let f = bdd.apply_or(bdd.apply_and(x[0], x[3]), bdd.apply_xor(x[1], x[4]));
        let g = bdd.apply_or(bdd.apply_eq(x[3], x[5]), bdd.apply_and(x[2], -x[4]));
        let cube = bdd.mk_cube([4, 5]);

        let baseline = bdd.exists(bdd.apply_and(f, g), cube);
        assert_eq!(bdd.and_exists(f, g, cube), baseline);
    }

    #[test]
    #[should_panic(expected = "positive cube")]
    fn test_exists_rejects_negative_cube() {
        let bdd = Bdd::default();
        let f = bdd.mk_var(1);
        let cube = bdd.mk_cube([-1]);
        bdd.exists(f, cube);
    }

    #[test]
    fn test_permute_swaps_variables() {
        let bdd = Bdd::default();
        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);
        let f = bdd.apply_and(x1, -x3);

        let table = vec![Var::new(2), Var::new(1), Var::new(3)];
        let g = bdd.permute(f, &table);
        assert_eq!(g, bdd.apply_and(x2, -x3));

        // x3 is not in the table's range and maps to itself.
        let short = vec![Var::new(3)];
        assert_eq!(bdd.permute(f, &short), bdd.zero());
        let short = vec![Var::new(2)];
        assert_eq!(bdd.permute(f, &short), bdd.apply_and(x2, -x3));
    }

    #[test]
    fn test_is_implies() {
        let bdd = Bdd::default();
        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let f = bdd.apply_and(x1, x2);

        assert!(bdd.is_implies(f, x1));
        assert!(bdd.is_implies(f, x2));
        assert!(!bdd.is_implies(f, -x1));
        assert!(bdd.is_implies(f, bdd.apply_or(x1, x2)));
        assert!(bdd.is_implies(bdd.zero(), x1));
        assert!(bdd.is_implies(x1, bdd.one()));
        assert!(!bdd.is_implies(bdd.apply_or(x1, x2), f));
    }

    #[test]
    fn test_support() {
        let bdd = Bdd::default();
        let x1 = bdd.mk_var(1);
        let x3 = bdd.mk_var(3);
        let f = bdd.apply_xor(x1, x3);
        assert_eq!(bdd.support(f), vec![Var::new(1), Var::new(3)]);
        assert_eq!(bdd.support_cube(f), bdd.mk_cube([1, 3]));
        assert!(bdd.support(bdd.one()).is_empty());
    }

    #[test]
    fn test_eval() {
        let bdd = Bdd::default();
        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let f = bdd.apply_imply(x1, x2);
        assert!(bdd.eval(f, |_| false));
        assert!(!bdd.eval(f, |v| v == Var::new(1)));
    }

    #[test]
    fn test_collect_garbage_keeps_referenced() {
        let bdd = Bdd::default();
        let x: Vec<Ref> = (1..=4).map(|i| bdd.mk_var(i)).collect();
        let keep = bdd.reference(bdd.apply_and(x[0], x[1]));
        let _dead = bdd.apply_xor(x[2], x[3]);

        let before = bdd.node_count();
        let freed = bdd.collect_garbage(&[]);
        assert!(freed > 0);
        assert_eq!(bdd.node_count(), before - freed);

        // The referenced function is still intact and canonical.
        assert_eq!(bdd.apply_and(bdd.mk_var(1), bdd.mk_var(2)), keep);
        bdd.dereference(keep);
        assert_eq!(bdd.referenced_count(), 0);
    }

    #[test]
    #[should_panic(expected = "Dereferencing unreferenced node")]
    fn test_double_dereference_panics() {
        let bdd = Bdd::default();
        let x = bdd.reference(bdd.mk_var(1));
        bdd.dereference(x);
        bdd.dereference(x);
    }

    #[test]
    fn test_root_guard() {
        let bdd = Rc::new(Bdd::default());
        let x = bdd.mk_var(1);
        {
            let root = Root::new(&bdd, x);
            let copy = root.clone();
            assert_eq!(copy.get(), x);
            assert_eq!(bdd.referenced_count(), 1);
        }
        assert_eq!(bdd.referenced_count(), 0);
    }
}
