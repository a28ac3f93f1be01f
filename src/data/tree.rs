//! Phylogenetic tree stored as an arena of indexed nodes.
//!
//! Nodes hold parent/child indices and the branch length of the edge to the
//! parent, so traversal is index arithmetic over a flat `Vec` and the whole
//! structure serializes trivially. Tips carry taxon labels.

use crate::error::{EcoError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One node in the tree arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// Index of the parent node; `None` for the root.
    pub parent: Option<usize>,
    /// Indices of child nodes; empty for tips.
    pub children: Vec<usize>,
    /// Length of the edge to the parent; 0 for the root.
    pub branch_length: f64,
    /// Taxon label; present on tips.
    pub label: Option<String>,
}

impl TreeNode {
    /// Whether this node is a tip (leaf).
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted phylogenetic tree over a set of labeled tips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhyloTree {
    nodes: Vec<TreeNode>,
    root: usize,
    /// Tip node indices, in arena order.
    tips: Vec<usize>,
}

impl PhyloTree {
    /// Create a tree from an arena, validating structure and branch lengths.
    pub fn new(nodes: Vec<TreeNode>, root: usize) -> Result<Self> {
        if root >= nodes.len() {
            return Err(EcoError::MalformedDataset(
                "tree root index out of bounds".to_string(),
            ));
        }
        if nodes[root].parent.is_some() {
            return Err(EcoError::MalformedDataset(
                "tree root must not have a parent".to_string(),
            ));
        }

        let mut tips = Vec::new();
        let mut labels = HashSet::new();
        for (idx, node) in nodes.iter().enumerate() {
            if !node.branch_length.is_finite() || node.branch_length < 0.0 {
                return Err(EcoError::MalformedDataset(format!(
                    "negative or non-finite branch length at tree node {}",
                    idx
                )));
            }
            for &child in &node.children {
                if child >= nodes.len() || nodes[child].parent != Some(idx) {
                    return Err(EcoError::MalformedDataset(format!(
                        "inconsistent parent/child link at tree node {}",
                        idx
                    )));
                }
            }
            if node.is_tip() {
                let label = node.label.as_deref().ok_or_else(|| {
                    EcoError::MalformedDataset(format!("unlabeled tip at tree node {}", idx))
                })?;
                if !labels.insert(label.to_string()) {
                    return Err(EcoError::MalformedDataset(format!(
                        "duplicate tip label '{}' in tree",
                        label
                    )));
                }
                tips.push(idx);
            }
        }

        Ok(Self { nodes, root, tips })
    }

    /// Parse a tree from a Newick string, e.g. `((A:1,B:2):0.5,C:3);`.
    ///
    /// Missing branch lengths default to 0.
    pub fn from_newick(newick: &str) -> Result<Self> {
        let trimmed = newick.trim().trim_end_matches(';');
        let mut nodes = Vec::new();
        let mut chars = trimmed.chars().peekable();
        let root = parse_clade(&mut chars, &mut nodes, None)?;
        if chars.peek().is_some() {
            return Err(EcoError::MalformedDataset(
                "trailing characters after Newick tree".to_string(),
            ));
        }
        Self::new(nodes, root)
    }

    /// Serialize to a Newick string.
    pub fn to_newick(&self) -> String {
        let mut out = String::new();
        self.write_newick(self.root, &mut out);
        out.push(';');
        out
    }

    fn write_newick(&self, idx: usize, out: &mut String) {
        let node = &self.nodes[idx];
        if !node.is_tip() {
            out.push('(');
            for (i, &child) in node.children.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                self.write_newick(child, out);
            }
            out.push(')');
        }
        if let Some(label) = &node.label {
            out.push_str(label);
        }
        if node.parent.is_some() {
            out.push_str(&format!(":{}", node.branch_length));
        }
    }

    /// All nodes in the arena.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Root node index.
    pub fn root(&self) -> usize {
        self.root
    }

    /// Tip node indices, in arena order.
    pub fn tips(&self) -> &[usize] {
        &self.tips
    }

    /// Number of tips.
    pub fn n_tips(&self) -> usize {
        self.tips.len()
    }

    /// Tip labels, in tip order.
    pub fn tip_labels(&self) -> Vec<&str> {
        self.tips
            .iter()
            .map(|&idx| self.nodes[idx].label.as_deref().unwrap_or(""))
            .collect()
    }

    /// Whether a label names a tip of this tree.
    pub fn has_tip(&self, label: &str) -> bool {
        self.tips
            .iter()
            .any(|&idx| self.nodes[idx].label.as_deref() == Some(label))
    }

    /// Total branch length of the tree.
    pub fn total_branch_length(&self) -> f64 {
        self.nodes.iter().map(|n| n.branch_length).sum()
    }

    /// Node indices in post-order (children before parents).
    pub fn postorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((idx, visited)) = stack.pop() {
            if visited {
                order.push(idx);
            } else {
                stack.push((idx, true));
                for &child in &self.nodes[idx].children {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    /// Distance from the root to every node, along branch lengths.
    pub fn depths(&self) -> Vec<f64> {
        let mut depths = vec![0.0; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            for &child in &self.nodes[idx].children {
                depths[child] = depths[idx] + self.nodes[child].branch_length;
                stack.push(child);
            }
        }
        depths
    }

    /// Number of edges from the root to every node.
    fn step_depths(&self) -> Vec<usize> {
        let mut steps = vec![0; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            for &child in &self.nodes[idx].children {
                steps[child] = steps[idx] + 1;
                stack.push(child);
            }
        }
        steps
    }

    /// Lowest common ancestor of two nodes.
    fn lca(&self, a: usize, b: usize, steps: &[usize]) -> usize {
        let (mut a, mut b) = (a, b);
        while steps[a] > steps[b] {
            a = self.nodes[a].parent.unwrap_or(self.root);
        }
        while steps[b] > steps[a] {
            b = self.nodes[b].parent.unwrap_or(self.root);
        }
        while a != b {
            a = self.nodes[a].parent.unwrap_or(self.root);
            b = self.nodes[b].parent.unwrap_or(self.root);
        }
        a
    }

    /// Pairwise cophenetic (tree-path) distances between all tips.
    ///
    /// Returns (tip labels, symmetric matrix) with rows/columns in tip order.
    pub fn cophenetic_matrix(&self) -> (Vec<String>, DMatrix<f64>) {
        let labels: Vec<String> = self.tip_labels().iter().map(|s| s.to_string()).collect();
        let depths = self.depths();
        let steps = self.step_depths();
        let n = self.tips.len();
        let mut dist = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (self.tips[i], self.tips[j]);
                let lca = self.lca(a, b, &steps);
                let d = depths[a] + depths[b] - 2.0 * depths[lca];
                dist[(i, j)] = d;
                dist[(j, i)] = d;
            }
        }
        (labels, dist)
    }

    /// Prune the tree to the tips whose labels are in `keep`.
    ///
    /// Internal nodes left with a single child are suppressed, summing branch
    /// lengths, so cophenetic distances between kept tips are preserved.
    /// Fails with `EmptySelection` when no tip survives.
    pub fn retain_tips(&self, keep: &HashSet<&str>) -> Result<Self> {
        let kept: Vec<usize> = self
            .tips
            .iter()
            .copied()
            .filter(|&idx| {
                self.nodes[idx]
                    .label
                    .as_deref()
                    .map(|l| keep.contains(l))
                    .unwrap_or(false)
            })
            .collect();
        if kept.is_empty() {
            return Err(EcoError::EmptySelection(
                "no tree tips survive pruning".to_string(),
            ));
        }

        let mut retained = vec![false; self.nodes.len()];
        for &idx in &kept {
            retained[idx] = true;
        }
        for idx in self.postorder() {
            if !self.nodes[idx].is_tip() {
                retained[idx] = self.nodes[idx].children.iter().any(|&c| retained[c]);
            }
        }

        let mut nodes = Vec::new();
        let root = self.build_pruned(self.root, &retained, &mut nodes, None, 0.0);
        // The new root carries no edge.
        nodes[root].branch_length = 0.0;
        Self::new(nodes, root)
    }

    /// Rebuild the retained part of the subtree at `idx`, suppressing unary
    /// nodes by accumulating `carry` branch length. Returns the new index.
    fn build_pruned(
        &self,
        idx: usize,
        retained: &[bool],
        nodes: &mut Vec<TreeNode>,
        parent: Option<usize>,
        carry: f64,
    ) -> usize {
        let node = &self.nodes[idx];
        let kept_children: Vec<usize> = node
            .children
            .iter()
            .copied()
            .filter(|&c| retained[c])
            .collect();

        if kept_children.len() == 1 && !node.is_tip() {
            // Unary node: splice it out, pushing its edge length down to the
            // surviving child (the child adds its own length when emitted).
            let child = kept_children[0];
            return self.build_pruned(child, retained, nodes, parent, carry + node.branch_length);
        }

        let new_idx = nodes.len();
        nodes.push(TreeNode {
            parent,
            children: Vec::new(),
            branch_length: node.branch_length + carry,
            label: node.label.clone(),
        });
        for child in kept_children {
            let new_child = self.build_pruned(child, retained, nodes, Some(new_idx), 0.0);
            nodes[new_idx].children.push(new_child);
        }
        new_idx
    }
}

/// Recursive-descent Newick parser. Returns the index of the parsed clade.
fn parse_clade(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    nodes: &mut Vec<TreeNode>,
    parent: Option<usize>,
) -> Result<usize> {
    let idx = nodes.len();
    nodes.push(TreeNode {
        parent,
        children: Vec::new(),
        branch_length: 0.0,
        label: None,
    });

    if chars.peek() == Some(&'(') {
        chars.next();
        loop {
            let child = parse_clade(chars, nodes, Some(idx))?;
            nodes[idx].children.push(child);
            match chars.next() {
                Some(',') => continue,
                Some(')') => break,
                other => {
                    return Err(EcoError::MalformedDataset(format!(
                        "unexpected {:?} in Newick string",
                        other
                    )))
                }
            }
        }
    }

    // Optional label.
    let mut label = String::new();
    while let Some(&c) = chars.peek() {
        if c == ':' || c == ',' || c == ')' || c == '(' {
            break;
        }
        label.push(c);
        chars.next();
    }
    if !label.is_empty() {
        nodes[idx].label = Some(label);
    }

    // Optional branch length.
    if chars.peek() == Some(&':') {
        chars.next();
        let mut num = String::new();
        while let Some(&c) = chars.peek() {
            if c == ',' || c == ')' || c == '(' {
                break;
            }
            num.push(c);
            chars.next();
        }
        nodes[idx].branch_length = num.trim().parse().map_err(|_| {
            EcoError::MalformedDataset(format!("invalid branch length '{}' in Newick string", num))
        })?;
    }

    Ok(idx)
}
