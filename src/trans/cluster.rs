use std::collections::BTreeSet;
use std::rc::Rc;

use crate::bdd::{Bdd, Root};
use crate::reference::Ref;
use crate::types::Var;

/// One conjunct of a partitioned transition relation.
#[derive(Debug, Clone)]
pub struct Cluster {
    relation: Root,
    support: BTreeSet<Var>,
}

impl Cluster {
    pub fn new(bdd: &Rc<Bdd>, relation: Ref) -> Self {
        Self {
            relation: Root::new(bdd, relation),
            support: bdd.support(relation).into_iter().collect(),
        }
    }

    pub fn relation(&self) -> Ref {
        self.relation.get()
    }

    pub fn support(&self) -> &BTreeSet<Var> {
        &self.support
    }

    pub fn size(&self, bdd: &Bdd) -> usize {
        bdd.size(self.relation())
    }

    /// Conjunction of two clusters.
    pub fn merge(&self, bdd: &Rc<Bdd>, other: &Cluster) -> Cluster {
        Cluster::new(bdd, bdd.apply_and(self.relation(), other.relation()))
    }

    /// Jaccard similarity of the supports, in `[0, 1]`.
    pub fn affinity(&self, other: &Cluster) -> f64 {
        let union = self.support.union(&other.support).count();
        if union == 0 {
            return 0.0;
        }
        self.support.intersection(&other.support).count() as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_cluster_support_and_merge() {
        let bdd = Rc::new(Bdd::default());
        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        let a = Cluster::new(&bdd, bdd.apply_xor(x1, x2));
        let b = Cluster::new(&bdd, bdd.apply_or(x2, x3));
        assert_eq!(a.support().iter().copied().collect::<Vec<_>>(), vec![Var::new(1), Var::new(2)]);
        assert!((a.affinity(&b) - 1.0 / 3.0).abs() < 1e-9);

        let m = a.merge(&bdd, &b);
        assert_eq!(m.support().len(), 3);
        assert_eq!(m.relation(), bdd.apply_and(a.relation(), b.relation()));
        assert_eq!(bdd.referenced_count(), 3);
    }
}
