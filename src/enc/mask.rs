//! Domain masks.
//!
//! A variable with `n` values needs `⌈log₂ n⌉` bits. When `n` is not a
//! power of two, some leaves of its encoding do not test every bit, and the
//! untested bits would make a single value count as several states. The
//! mask keeps exactly one bit pattern per value: untested bits are forced
//! to 0.

use std::collections::HashMap;
use std::rc::Rc;

use crate::add::Add;
use crate::bdd::{Bdd, Root};
use crate::reference::Ref;
use crate::types::Var;

#[derive(Debug, Clone, Default)]
pub(crate) struct MaskCache {
    pub vars: HashMap<Rc<str>, Root>,
    pub state: Option<Root>,
    pub input: Option<Root>,
    pub state_input: Option<Root>,
}

impl MaskCache {
    /// Drop the per-class masks; new variables change them.
    pub fn invalidate_classes(&mut self) {
        self.state = None;
        self.input = None;
        self.state_input = None;
    }
}

/// Mask of one encoding over its `bits`.
///
/// Walks each leaf guard top-down along the bits in level order, building
/// the result with top-level operations; the caller must keep automatic
/// reordering suspended for the whole walk.
pub(crate) fn mask_of(bdd: &Bdd, encoding: &Add, bits: &[Var]) -> Ref {
    let mut bits = bits.to_vec();
    bits.sort_by_key(|&v| bdd.level_of(v));
    let mut mask = bdd.zero();
    for guard in encoding.guards() {
        let m = mask_rec(bdd, guard, &bits);
        mask = bdd.apply_or(mask, m);
    }
    mask
}

fn mask_rec(bdd: &Bdd, f: Ref, bits: &[Var]) -> Ref {
    if bdd.is_zero(f) {
        return f;
    }
    let Some((&v, rest)) = bits.split_first() else {
        return f;
    };
    let x = bdd.var(v);
    if bdd.level(f) == bdd.level_of(v) {
        let low = mask_rec(bdd, bdd.low_node(f), rest);
        let high = mask_rec(bdd, bdd.high_node(f), rest);
        bdd.apply_ite(x, high, low)
    } else {
        let low = mask_rec(bdd, f, rest);
        bdd.apply_and(-x, low)
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use test_log::test;

    use super::*;
    use crate::add::Value;

    #[test]
    fn test_mask_of_three_values() {
        let bdd = Bdd::default();
        let b0 = bdd.mk_var(1);
        let b1 = bdd.mk_var(2);
        // b0 ? 2 : (b1 ? 1 : 0); value 2 does not test b1.
        let enc = Add::from_leaves(
            &bdd,
            [
                (Value::Int(0), bdd.apply_and(-b0, -b1)),
                (Value::Int(1), bdd.apply_and(-b0, b1)),
                (Value::Int(2), b0),
            ],
        );
        let bits = [Var::new(1), Var::new(2)];
        let mask = mask_of(&bdd, &enc, &bits);
        assert_eq!(bdd.sat_count(mask, 2), BigUint::from(3u32));
        assert_eq!(mask, -bdd.mk_cube([1, 2]));
        assert_eq!(bdd.apply_and(mask, mask), mask);
    }

    #[test]
    fn test_mask_of_full_domain_is_one() {
        let bdd = Bdd::default();
        let b = bdd.mk_var(1);
        let enc = Add::from_bdd(b);
        assert_eq!(mask_of(&bdd, &enc, &[Var::new(1)]), bdd.one());
    }
}
