//! Agglomeration of phylogenetically close tips.

use super::{rebuild_collapsed, sum_taxon_groups};
use crate::data::CommunityDataSet;
use crate::error::Result;
use std::collections::HashMap;

/// Collapse tips closer than `h` in cophenetic distance.
///
/// Single-linkage clustering cut at height `h` is exactly the set of
/// connected components of the "distance < h" relation, so clusters are
/// found with a union-find over tip pairs. Each cluster's abundances are
/// summed onto a representative (the first member in taxon-axis order); the
/// taxonomy and tree collapse to the representatives.
///
/// Fails with `MissingTree` when the dataset has no tree, and with
/// `MalformedDataset` when the tree does not cover every taxon.
pub fn tip_glom(ds: &CommunityDataSet, h: f64) -> Result<CommunityDataSet> {
    let tree = ds.require_covering_tree("tip_glom")?;
    let (labels, dist) = tree.cophenetic_matrix();
    let tip_of: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(idx, label)| (label.as_str(), idx))
        .collect();

    let n = labels.len();
    let mut uf = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if dist[(i, j)] < h {
                uf.union(i, j);
            }
        }
    }

    // Walk the taxon axis so clusters come out in axis order with the first
    // member as representative.
    let taxon_ids = ds.abundance().taxon_ids();
    let mut cluster_group: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (row, taxon_id) in taxon_ids.iter().enumerate() {
        let tip = tip_of[taxon_id.as_str()];
        let root = uf.find(tip);
        match cluster_group.get(&root) {
            Some(&group_idx) => groups[group_idx].1.push(row),
            None => {
                cluster_group.insert(root, groups.len());
                groups.push((taxon_id.clone(), vec![row]));
            }
        }
    }

    let abundance = sum_taxon_groups(ds.abundance(), &groups)?;
    rebuild_collapsed(ds, abundance, "tip_glom")
}

/// Union-find with path halving.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}
