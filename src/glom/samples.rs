//! Merging samples into groups with explicit metadata aggregation.

use crate::data::{AbundanceTable, CommunityDataSet, SampleData, Variable, VariableType};
use crate::error::{EcoError, Result};
use std::collections::HashMap;

/// How to aggregate a non-numeric metadata column when merging samples.
///
/// Continuous columns are always summed. Categorical and boolean columns
/// carry no arithmetic, so the caller must choose a strategy per column;
/// there is no silent coercion of category codes to numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalMerge {
    /// First non-missing value in group order.
    First,
    /// Most frequent non-missing value; ties break to the earliest seen.
    Majority,
    /// Distinct non-missing values joined with `,` in first-seen order.
    Collect,
}

/// Merge samples into groups named by `group_key`.
///
/// Abundances are summed within each group; the group ids become the new
/// sample axis, ordered by first appearance. Continuous metadata columns are
/// summed per group (missing values skipped); each categorical or boolean
/// column must have an entry in `strategies` or the merge fails with
/// `InvalidParameter`.
pub fn merge_samples<F>(
    ds: &CommunityDataSet,
    group_key: F,
    strategies: &HashMap<String, CategoricalMerge>,
) -> Result<CommunityDataSet>
where
    F: Fn(&str) -> String,
{
    let abundance = ds.abundance();
    let samples = ds.samples();

    // Group ids in first-appearance order; map old column -> group column.
    let mut group_ids: Vec<String> = Vec::new();
    let mut group_of: Vec<usize> = Vec::with_capacity(abundance.n_samples());
    let mut index_of: HashMap<String, usize> = HashMap::new();
    for sid in abundance.sample_ids() {
        let gid = group_key(sid);
        let idx = *index_of.entry(gid.clone()).or_insert_with(|| {
            group_ids.push(gid);
            group_ids.len() - 1
        });
        group_of.push(idx);
    }

    // Validate strategies up front so no partial work escapes on error.
    for column in samples.column_names() {
        match samples.column_type(column) {
            Some(VariableType::Continuous) | None => {}
            Some(VariableType::Categorical) | Some(VariableType::Boolean) => {
                if !strategies.contains_key(column) {
                    return Err(EcoError::InvalidParameter(format!(
                        "merge_samples needs an aggregation strategy for non-numeric column '{}'",
                        column
                    )));
                }
            }
        }
    }

    // Sum abundance columns into group columns.
    let mut triplets = Vec::new();
    for (row, col, val) in abundance.triplets() {
        triplets.push((row, group_of[col], val));
    }
    let merged_abundance = AbundanceTable::from_triplets(
        (abundance.n_taxa(), group_ids.len()),
        &triplets,
        abundance.taxon_ids().to_vec(),
        group_ids.clone(),
    )?;

    // Aggregate metadata per group.
    let mut columns: Vec<(String, Vec<Variable>)> = Vec::new();
    for column in samples.column_names() {
        let values = samples.column(column)?;
        let mut per_group: Vec<Vec<&Variable>> = vec![Vec::new(); group_ids.len()];
        for (col, value) in values.into_iter().enumerate() {
            per_group[group_of[col]].push(value);
        }

        let aggregated: Vec<Variable> = match samples.column_type(column) {
            Some(VariableType::Continuous) | None => per_group
                .iter()
                .map(|group| aggregate_continuous(group))
                .collect(),
            Some(VariableType::Categorical) | Some(VariableType::Boolean) => {
                let strategy = strategies[column.as_str()];
                per_group
                    .iter()
                    .map(|group| aggregate_categorical(group, strategy))
                    .collect()
            }
        };
        columns.push((column.clone(), aggregated));
    }
    let merged_samples = SampleData::from_columns(group_ids, columns)?;

    CommunityDataSet::new(
        merged_abundance,
        merged_samples,
        ds.taxonomy().cloned(),
        ds.tree().cloned(),
    )
}

fn aggregate_continuous(group: &[&Variable]) -> Variable {
    let mut sum = 0.0;
    let mut any = false;
    for v in group {
        if let Some(x) = v.as_continuous() {
            sum += x;
            any = true;
        }
    }
    if any {
        Variable::Continuous(sum)
    } else {
        Variable::Missing
    }
}

fn aggregate_categorical(group: &[&Variable], strategy: CategoricalMerge) -> Variable {
    let present: Vec<String> = group
        .iter()
        .filter_map(|v| match v {
            Variable::Categorical(s) => Some(s.clone()),
            Variable::Boolean(b) => Some(b.to_string()),
            _ => None,
        })
        .collect();
    if present.is_empty() {
        return Variable::Missing;
    }

    match strategy {
        CategoricalMerge::First => Variable::Categorical(present[0].clone()),
        CategoricalMerge::Majority => {
            let mut counts: Vec<(String, usize)> = Vec::new();
            for value in &present {
                match counts.iter_mut().find(|(v, _)| v == value) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((value.clone(), 1)),
                }
            }
            // Strict comparison keeps the earliest-seen value on ties.
            let mut best = 0;
            for idx in 1..counts.len() {
                if counts[idx].1 > counts[best].1 {
                    best = idx;
                }
            }
            Variable::Categorical(counts[best].0.clone())
        }
        CategoricalMerge::Collect => {
            let mut distinct: Vec<String> = Vec::new();
            for value in present {
                if !distinct.contains(&value) {
                    distinct.push(value);
                }
            }
            Variable::Categorical(distinct.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PhyloTree, TaxonomyTable};

    fn grouped_dataset() -> CommunityDataSet {
        let abundance = AbundanceTable::from_triplets(
            (2, 4),
            &[
                (0, 0, 1.0),
                (0, 1, 2.0),
                (0, 2, 4.0),
                (0, 3, 8.0),
                (1, 0, 10.0),
                (1, 2, 20.0),
            ],
            vec!["T1".to_string(), "T2".to_string()],
            vec![
                "S1".to_string(),
                "S2".to_string(),
                "S3".to_string(),
                "S4".to_string(),
            ],
        )
        .unwrap();
        let samples = SampleData::from_columns(
            vec![
                "S1".to_string(),
                "S2".to_string(),
                "S3".to_string(),
                "S4".to_string(),
            ],
            vec![
                (
                    "site".to_string(),
                    vec![
                        Variable::Categorical("gut".to_string()),
                        Variable::Categorical("gut".to_string()),
                        Variable::Categorical("skin".to_string()),
                        Variable::Categorical("gut".to_string()),
                    ],
                ),
                (
                    "reads".to_string(),
                    vec![
                        Variable::Continuous(100.0),
                        Variable::Continuous(200.0),
                        Variable::Continuous(300.0),
                        Variable::Continuous(400.0),
                    ],
                ),
            ],
        )
        .unwrap();
        CommunityDataSet::new(abundance, samples, None, None).unwrap()
    }

    fn strategies(strategy: CategoricalMerge) -> HashMap<String, CategoricalMerge> {
        let mut map = HashMap::new();
        map.insert("site".to_string(), strategy);
        map
    }

    #[test]
    fn test_abundances_sum_per_group() {
        let ds = grouped_dataset();
        // S1,S2 -> A; S3,S4 -> B
        let merged = merge_samples(
            &ds,
            |sid| if sid == "S1" || sid == "S2" { "A" } else { "B" }.to_string(),
            &strategies(CategoricalMerge::Majority),
        )
        .unwrap();

        assert_eq!(merged.abundance().sample_ids(), &["A", "B"]);
        assert_eq!(merged.abundance().get(0, 0), 3.0);
        assert_eq!(merged.abundance().get(0, 1), 12.0);
        assert_eq!(merged.abundance().get(1, 0), 10.0);
        assert_eq!(merged.abundance().get(1, 1), 20.0);
    }

    #[test]
    fn test_numeric_columns_sum() {
        let ds = grouped_dataset();
        let merged = merge_samples(
            &ds,
            |sid| if sid == "S3" { "B" } else { "A" }.to_string(),
            &strategies(CategoricalMerge::First),
        )
        .unwrap();
        let reads = merged.variable("reads").unwrap();
        assert_eq!(reads[0].as_continuous(), Some(700.0));
        assert_eq!(reads[1].as_continuous(), Some(300.0));
    }

    #[test]
    fn test_majority_strategy() {
        let ds = grouped_dataset();
        let merged = merge_samples(
            &ds,
            |_| "all".to_string(),
            &strategies(CategoricalMerge::Majority),
        )
        .unwrap();
        let site = merged.variable("site").unwrap();
        assert_eq!(site[0].as_categorical(), Some("gut"));
    }

    #[test]
    fn test_collect_strategy() {
        let ds = grouped_dataset();
        let merged = merge_samples(
            &ds,
            |_| "all".to_string(),
            &strategies(CategoricalMerge::Collect),
        )
        .unwrap();
        let site = merged.variable("site").unwrap();
        assert_eq!(site[0].as_categorical(), Some("gut,skin"));
    }

    #[test]
    fn test_missing_strategy_rejected() {
        let ds = grouped_dataset();
        let res = merge_samples(&ds, |_| "all".to_string(), &HashMap::new());
        assert!(matches!(res, Err(EcoError::InvalidParameter(_))));
    }

    #[test]
    fn test_taxa_tables_untouched() {
        let base = grouped_dataset();
        let taxonomy = TaxonomyTable::new(
            vec!["Kingdom".to_string()],
            vec!["T1".to_string(), "T2".to_string()],
            vec![vec![Some("Bacteria".to_string())], vec![None]],
        )
        .unwrap();
        let tree = PhyloTree::from_newick("(T1:1,T2:2);").unwrap();
        let ds = CommunityDataSet::new(
            base.abundance().clone(),
            base.samples().clone(),
            Some(taxonomy),
            Some(tree),
        )
        .unwrap();

        let merged = merge_samples(
            &ds,
            |_| "all".to_string(),
            &strategies(CategoricalMerge::First),
        )
        .unwrap();
        assert_eq!(merged.taxonomy().unwrap().n_taxa(), 2);
        assert_eq!(merged.tree().unwrap().n_tips(), 2);
    }
}
