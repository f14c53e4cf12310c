use std::collections::HashMap;

use num_bigint::BigUint;

use crate::bdd::Bdd;
use crate::reference::Ref;
use crate::types::{Level, Var};

/// A total assignment to some list of variables.
pub type Minterm = Vec<(Var, bool)>;

impl Bdd {
    /// Number of satisfying assignments of `node` over `num_vars` variables.
    ///
    /// The support of `node` is assumed to be included in those variables.
    pub fn sat_count(&self, node: Ref, num_vars: usize) -> BigUint {
        let mut cache = HashMap::new();
        let max = BigUint::from(2u32).pow(num_vars as u32);
        self.sat_count_rec(node, &max, &mut cache)
    }

    fn sat_count_rec(&self, node: Ref, max: &BigUint, cache: &mut HashMap<Ref, BigUint>) -> BigUint {
        if self.is_zero(node) {
            return BigUint::ZERO;
        } else if self.is_one(node) {
            return max.clone();
        }

        if let Some(count) = cache.get(&node) {
            return count.clone();
        }

        let regular = node.regular();
        let count_low = self.sat_count_rec(self.low_node(regular), max, cache);
        let count_high = self.sat_count_rec(self.high_node(regular), max, cache);

        let count: BigUint = (count_low + count_high) >> 1;
        let count = if node.is_negated() { max - count } else { count };

        cache.insert(node, count.clone());
        count
    }

    fn sorted_by_level(&self, vars: &[Var]) -> Vec<Var> {
        let mut vars = vars.to_vec();
        vars.sort_by_key(|&v| self.level_of(v));
        vars.dedup();
        vars
    }

    /// One satisfying assignment of `f` over `vars`, or `None` if `f` is zero.
    ///
    /// Variables of `vars` that `f` does not test are set to false; the low
    /// branch is preferred whenever it is satisfiable. Variables tested by
    /// `f` but missing from `vars` are resolved silently.
    pub fn pick_one_minterm(&self, f: Ref, vars: &[Var]) -> Option<Minterm> {
        if self.is_zero(f) {
            return None;
        }

        let vars = self.sorted_by_level(vars);
        let mut minterm = Vec::with_capacity(vars.len());
        let mut current = f;
        let mut i = 0;

        while !current.is_terminal() || i < vars.len() {
            let lf = self.level(current);
            let lv = vars.get(i).map(|&v| self.level_of(v)).unwrap_or(Level::TERMINAL);
            if lf < lv {
                let low = self.low_node(current);
                current = if !self.is_zero(low) { low } else { self.high_node(current) };
            } else if lf == lv {
                let low = self.low_node(current);
                if !self.is_zero(low) {
                    minterm.push((vars[i], false));
                    current = low;
                } else {
                    minterm.push((vars[i], true));
                    current = self.high_node(current);
                }
                i += 1;
            } else {
                minterm.push((vars[i], false));
                i += 1;
            }
        }

        debug_assert!(self.is_one(current));
        Some(minterm)
    }

    /// All satisfying assignments of `f` over `vars`, in lexicographic order
    /// of the current variable ordering (false before true).
    ///
    /// # Panics
    ///
    /// Panics if `f` depends on a variable outside `vars`.
    pub fn all_minterms(&self, f: Ref, vars: &[Var]) -> Vec<Minterm> {
        let vars = self.sorted_by_level(vars);
        for v in self.support(f) {
            assert!(vars.contains(&v), "Minterm variables must cover the support, missing {}", v);
        }
        let mut result = Vec::new();
        let mut prefix = Vec::with_capacity(vars.len());
        self.all_minterms_rec(f, &vars, &mut prefix, &mut result);
        result
    }

    fn all_minterms_rec(&self, f: Ref, vars: &[Var], prefix: &mut Minterm, result: &mut Vec<Minterm>) {
        if self.is_zero(f) {
            return;
        }
        let Some((&v, rest)) = vars.split_first() else {
            result.push(prefix.clone());
            return;
        };
        let (low, high) = self.top_cofactors(f, self.level_of(v));
        for (value, branch) in [(false, low), (true, high)] {
            prefix.push((v, value));
            self.all_minterms_rec(branch, rest, prefix, result);
            prefix.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn vars(ids: &[u32]) -> Vec<Var> {
        ids.iter().map(|&i| Var::new(i)).collect()
    }

    #[test]
    fn test_sat_count_terminal() {
        let bdd = Bdd::default();

        assert_eq!(bdd.sat_count(bdd.zero(), 3), BigUint::from(0u32));
        assert_eq!(bdd.sat_count(bdd.one(), 1), BigUint::from(2u32));
        assert_eq!(bdd.sat_count(bdd.one(), 3), BigUint::from(8u32));
    }

    #[test]
    fn test_sat_count_cube() {
        let bdd = Bdd::default();

        let f = bdd.mk_cube([1, 2]);
        assert_eq!(bdd.sat_count(f, 2), BigUint::from(1u32));
        assert_eq!(bdd.sat_count(f, 3), BigUint::from(2u32));
        assert_eq!(bdd.sat_count(f, 5), BigUint::from(8u32));
    }

    #[test]
    fn test_sat_count_not_cube() {
        let bdd = Bdd::default();

        let f = -bdd.mk_cube([1, 2]);
        assert_eq!(bdd.sat_count(f, 2), BigUint::from(3u32));
        assert_eq!(bdd.sat_count(f, 4), BigUint::from(12u32));
    }

    #[test]
    fn test_sat_count_xor() {
        let bdd = Bdd::default();

        let f = bdd.apply_xor(bdd.mk_var(1), bdd.mk_var(3));
        println!("f = {}", bdd.to_bracket_string(f));
        assert_eq!(bdd.sat_count(f, 3), BigUint::from(4u32));
    }

    #[test]
    fn test_pick_one_minterm() {
        let bdd = Bdd::default();

        let f = bdd.mk_cube([1, -2, 3]);
        let minterm = bdd.pick_one_minterm(f, &vars(&[1, 2, 3, 4]));
        assert_eq!(
            minterm,
            Some(vec![
                (Var::new(1), true),
                (Var::new(2), false),
                (Var::new(3), true),
                (Var::new(4), false),
            ])
        );

        assert_eq!(bdd.pick_one_minterm(bdd.zero(), &vars(&[1])), None);
    }

    #[test]
    fn test_pick_one_minterm_is_a_model() {
        let bdd = Bdd::default();

        let f = bdd.apply_or(bdd.mk_cube([1, 2]), bdd.mk_cube([-1, 3]));
        let minterm = bdd.pick_one_minterm(f, &vars(&[1, 2, 3])).unwrap();
        let cube = bdd.minterm_cube(&minterm);
        assert!(bdd.is_implies(cube, f));
    }

    #[test]
    fn test_all_minterms() {
        let bdd = Bdd::default();

        let f = bdd.apply_xor(bdd.mk_var(1), bdd.mk_var(2));
        let all = bdd.all_minterms(f, &vars(&[1, 2]));
        assert_eq!(
            all,
            vec![
                vec![(Var::new(1), false), (Var::new(2), true)],
                vec![(Var::new(1), true), (Var::new(2), false)],
            ]
        );

        // Extra variables multiply the result.
        let all = bdd.all_minterms(f, &vars(&[1, 2, 3]));
        assert_eq!(all.len(), 4);
    }

    #[test]
    #[should_panic(expected = "must cover the support")]
    fn test_all_minterms_missing_support() {
        let bdd = Bdd::default();
        let f = bdd.apply_and(bdd.mk_var(1), bdd.mk_var(2));
        bdd.all_minterms(f, &vars(&[1]));
    }
}
