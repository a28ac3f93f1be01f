//! Co-occurrence networks from dissimilarity matrices.
//!
//! A threshold graph connects two entities when their dissimilarity does not
//! exceed a cutoff. Nodes with no edges stay in the graph so downstream
//! consumers see the full entity set.

use crate::diversity::DissimilarityMatrix;
use crate::error::{EcoError, Result};
use serde::{Deserialize, Serialize};

/// An undirected graph over labelled nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Node labels, in input order.
    pub nodes: Vec<String>,
    /// Undirected edges as node index pairs with `i < j`, sorted.
    pub edges: Vec<(usize, usize)>,
}

impl Graph {
    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Degree of each node, in node order.
    pub fn degrees(&self) -> Vec<usize> {
        let mut deg = vec![0; self.nodes.len()];
        for &(i, j) in &self.edges {
            deg[i] += 1;
            deg[j] += 1;
        }
        deg
    }

    /// Edges as label pairs.
    pub fn edge_labels(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .map(|&(i, j)| (self.nodes[i].as_str(), self.nodes[j].as_str()))
            .collect()
    }

    /// Whether two labelled nodes are connected by an edge.
    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        let ia = self.nodes.iter().position(|n| n == a);
        let ib = self.nodes.iter().position(|n| n == b);
        match (ia, ib) {
            (Some(x), Some(y)) => {
                let key = (x.min(y), x.max(y));
                self.edges.contains(&key)
            }
            _ => false,
        }
    }
}

/// Build a threshold graph: an edge joins every pair whose dissimilarity is
/// at most `max_distance`.
///
/// # Arguments
/// * `dm` - Pairwise dissimilarities between the entities to connect
/// * `max_distance` - Inclusive dissimilarity cutoff for drawing an edge
pub fn build_threshold_graph(dm: &DissimilarityMatrix, max_distance: f64) -> Result<Graph> {
    if !max_distance.is_finite() || max_distance < 0.0 {
        return Err(EcoError::InvalidParameter(format!(
            "max_distance must be finite and non-negative, got {}",
            max_distance
        )));
    }

    let n = dm.len();
    let mut edges = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            if dm.get(i, j) <= max_distance {
                edges.push((i, j));
            }
        }
    }
    log::debug!(
        "threshold graph: {} nodes, {} edges at cutoff {}",
        n,
        edges.len(),
        max_distance
    );

    Ok(Graph {
        nodes: dm.labels().to_vec(),
        edges,
    })
}
