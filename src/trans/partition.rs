//! Clustering strategies.

use std::rc::Rc;

use log::debug;

use super::cluster::Cluster;
use crate::bdd::Bdd;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PartitionMethod {
    /// A single cluster holding the whole relation.
    Monolithic,
    /// Conjoin consecutive clusters while the result stays within the given
    /// node count.
    Threshold(usize),
    /// Affinity clustering under [`TransConfig::cluster_threshold`], then a
    /// benefit-ordered schedule.
    Iwls95,
}

/// Weights of the four benefit terms used to order clusters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Iwls95Weights {
    pub w1: f64,
    pub w2: f64,
    pub w3: f64,
    pub w4: f64,
}

impl Default for Iwls95Weights {
    fn default() -> Self {
        Self {
            w1: 6.0,
            w2: 1.0,
            w3: 1.0,
            w4: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransConfig {
    pub partition: PartitionMethod,
    pub cluster_threshold: usize,
    /// Merge by support affinity; otherwise consecutive merging.
    pub affinity: bool,
    pub iwls95: Iwls95Weights,
}

impl Default for TransConfig {
    fn default() -> Self {
        Self {
            partition: PartitionMethod::Iwls95,
            cluster_threshold: 1000,
            affinity: true,
            iwls95: Iwls95Weights::default(),
        }
    }
}

impl TransConfig {
    pub fn with_partition(mut self, partition: PartitionMethod) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_cluster_threshold(mut self, threshold: usize) -> Self {
        self.cluster_threshold = threshold;
        self
    }

    pub fn with_affinity(mut self, affinity: bool) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn with_iwls95_weights(mut self, weights: Iwls95Weights) -> Self {
        self.iwls95 = weights;
        self
    }
}

pub(crate) fn partition(bdd: &Rc<Bdd>, clusters: Vec<Cluster>, config: &TransConfig) -> Vec<Cluster> {
    let before = clusters.len();
    let result = match config.partition {
        PartitionMethod::Monolithic => vec![monolithic(bdd, &clusters)],
        PartitionMethod::Threshold(limit) => by_threshold(bdd, clusters, limit),
        PartitionMethod::Iwls95 if config.affinity => by_affinity(bdd, clusters, config.cluster_threshold),
        PartitionMethod::Iwls95 => by_threshold(bdd, clusters, config.cluster_threshold),
    };
    debug!("{:?} partitioning: {} -> {} clusters", config.partition, before, result.len());
    result
}

pub(crate) fn monolithic(bdd: &Rc<Bdd>, clusters: &[Cluster]) -> Cluster {
    let relation = bdd.apply_and_many(clusters.iter().map(|c| c.relation()));
    Cluster::new(bdd, relation)
}

/// Greedy left-to-right merging.
fn by_threshold(bdd: &Rc<Bdd>, clusters: Vec<Cluster>, limit: usize) -> Vec<Cluster> {
    let mut result = Vec::new();
    let mut current: Option<Cluster> = None;
    for cluster in clusters {
        current = Some(match current {
            None => cluster,
            Some(acc) => {
                let merged = acc.merge(bdd, &cluster);
                if merged.size(bdd) <= limit {
                    merged
                } else {
                    result.push(acc);
                    cluster
                }
            }
        });
    }
    result.extend(current);
    result
}

/// Repeatedly merge the pair with the highest support affinity whose
/// conjunction stays within `limit` nodes.
fn by_affinity(bdd: &Rc<Bdd>, mut clusters: Vec<Cluster>, limit: usize) -> Vec<Cluster> {
    loop {
        let mut pairs = Vec::new();
        for i in 0..clusters.len() {
            for j in i + 1..clusters.len() {
                let a = clusters[i].affinity(&clusters[j]);
                if a > 0.0 {
                    pairs.push((a, i, j));
                }
            }
        }
        pairs.sort_by(|x, y| y.0.total_cmp(&x.0));

        let found = pairs.into_iter().find_map(|(_, i, j)| {
            let merged = clusters[i].merge(bdd, &clusters[j]);
            (merged.size(bdd) <= limit).then_some((i, j, merged))
        });
        let Some((i, j, merged)) = found else {
            return clusters;
        };
        clusters.remove(j);
        clusters[i] = merged;
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn clusters(bdd: &Rc<Bdd>) -> Vec<Cluster> {
        // Three independent "next(xi) = !xi" constraints over pairs (1,2), (3,4), (5,6).
        (0..3)
            .map(|i| Cluster::new(bdd, bdd.apply_xor(bdd.mk_var(2 * i + 1), bdd.mk_var(2 * i + 2))))
            .collect()
    }

    #[test]
    fn test_monolithic() {
        let bdd = Rc::new(Bdd::default());
        let cs = clusters(&bdd);
        let config = TransConfig::default().with_partition(PartitionMethod::Monolithic);
        let result = partition(&bdd, cs.clone(), &config);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].relation(), monolithic(&bdd, &cs).relation());
    }

    #[test]
    fn test_threshold() {
        let bdd = Rc::new(Bdd::default());
        let cs = clusters(&bdd);

        let tight = TransConfig::default().with_partition(PartitionMethod::Threshold(1));
        assert_eq!(partition(&bdd, cs.clone(), &tight).len(), 3);

        let loose = TransConfig::default().with_partition(PartitionMethod::Threshold(100));
        assert_eq!(partition(&bdd, cs, &loose).len(), 1);
    }

    #[test]
    fn test_affinity_merges_overlapping_only() {
        let bdd = Rc::new(Bdd::default());
        let mut cs = clusters(&bdd);
        cs.push(Cluster::new(&bdd, bdd.apply_or(bdd.mk_var(1), bdd.mk_var(2))));
        let config = TransConfig::default().with_cluster_threshold(100);
        let result = partition(&bdd, cs, &config);
        // The extra cluster joins the one over (1, 2); disjoint supports stay apart.
        assert_eq!(result.len(), 3);
    }
}
