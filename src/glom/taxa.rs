//! Merging a set of taxa into a single archetype row.

use super::{rebuild_collapsed, sum_taxon_groups};
use crate::data::{CommunityDataSet, PhyloTree, TaxonomyTable, TreeNode};
use crate::error::{EcoError, Result};
use std::collections::HashSet;

/// Merge the taxa in `members` into one row keyed by `archetype`.
///
/// Abundances of all members are summed into the archetype's row; the other
/// members are removed from the abundance table, taxonomy, and tree. The
/// archetype must itself be a member; otherwise the merge fails with
/// `InvalidArchetype` rather than silently relabeling (see
/// [`merge_taxa_legacy`] for the permissive historical rule).
pub fn merge_taxa(
    ds: &CommunityDataSet,
    members: &[String],
    archetype: &str,
) -> Result<CommunityDataSet> {
    if !members.iter().any(|m| m == archetype) {
        return Err(EcoError::InvalidArchetype(format!(
            "'{}' is not among the taxa being merged",
            archetype
        )));
    }
    merge_into(ds, members, archetype)
}

/// Merge taxa under the legacy archetype rule.
///
/// If `archetype` is a member, this is identical to [`merge_taxa`]. If it is
/// not, the first member (in taxon-axis order) absorbs the group and is
/// relabeled to the literal `archetype` value across all tables — a
/// documented but surprising rule kept only for compatibility.
pub fn merge_taxa_legacy(
    ds: &CommunityDataSet,
    members: &[String],
    archetype: &str,
) -> Result<CommunityDataSet> {
    if members.iter().any(|m| m == archetype) {
        return merge_into(ds, members, archetype);
    }

    let member_rows = resolve_members(ds, members)?;
    let first_id = ds.abundance().taxon_ids()[member_rows[0]].clone();
    let merged = merge_into(ds, members, &first_id)?;
    relabel_taxon(&merged, &first_id, archetype)
}

fn resolve_members(ds: &CommunityDataSet, members: &[String]) -> Result<Vec<usize>> {
    if members.is_empty() {
        return Err(EcoError::InvalidParameter(
            "merge_taxa needs at least one member taxon".to_string(),
        ));
    }
    let mut rows = Vec::with_capacity(members.len());
    for member in members {
        let row = ds.abundance().taxon_index(member).ok_or_else(|| {
            EcoError::InvalidParameter(format!("unknown taxon id '{}'", member))
        })?;
        rows.push(row);
    }
    // Deterministic order = taxon-axis order, independent of argument order.
    rows.sort_unstable();
    rows.dedup();
    Ok(rows)
}

fn merge_into(
    ds: &CommunityDataSet,
    members: &[String],
    archetype: &str,
) -> Result<CommunityDataSet> {
    let member_rows = resolve_members(ds, members)?;
    let member_set: HashSet<usize> = member_rows.iter().copied().collect();
    let archetype_row = ds
        .abundance()
        .taxon_index(archetype)
        .ok_or_else(|| EcoError::InvalidArchetype(format!("unknown taxon id '{}'", archetype)))?;

    // One group per surviving row; the archetype keeps its axis position.
    let taxon_ids = ds.abundance().taxon_ids();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for row in 0..ds.abundance().n_taxa() {
        if row == archetype_row {
            groups.push((archetype.to_string(), member_rows.clone()));
        } else if !member_set.contains(&row) {
            groups.push((taxon_ids[row].clone(), vec![row]));
        }
    }

    let abundance = sum_taxon_groups(ds.abundance(), &groups)?;
    rebuild_collapsed(ds, abundance, "merge_taxa")
}

/// Rename one taxon across abundance, taxonomy, and tree.
fn relabel_taxon(ds: &CommunityDataSet, from: &str, to: &str) -> Result<CommunityDataSet> {
    let rename = |id: &String| -> String {
        if id == from {
            to.to_string()
        } else {
            id.clone()
        }
    };

    let abundance = ds.abundance();
    let taxon_ids: Vec<String> = abundance.taxon_ids().iter().map(rename).collect();
    let abundance = crate::data::AbundanceTable::from_triplets(
        (abundance.n_taxa(), abundance.n_samples()),
        &abundance.triplets(),
        taxon_ids,
        abundance.sample_ids().to_vec(),
    )?;

    let taxonomy = match ds.taxonomy() {
        Some(tax) => Some(TaxonomyTable::new(
            tax.ranks().to_vec(),
            tax.taxon_ids().iter().map(rename).collect(),
            tax.taxon_ids()
                .iter()
                .map(|tid| tax.assignments(tid).map(|a| a.to_vec()).unwrap_or_default())
                .collect(),
        )?),
        None => None,
    };

    let tree = match ds.tree() {
        Some(tree) => {
            let nodes: Vec<TreeNode> = tree
                .nodes()
                .iter()
                .map(|node| {
                    let mut node = node.clone();
                    if node.label.as_deref() == Some(from) {
                        node.label = Some(to.to_string());
                    }
                    node
                })
                .collect();
            Some(PhyloTree::new(nodes, tree.root())?)
        }
        None => None,
    };

    CommunityDataSet::new(abundance, ds.samples().clone(), taxonomy, tree)
}
