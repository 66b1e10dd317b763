//! Structure analysis
//!
//! Computes shape statistics (depth, branching factor, leaf density) over a
//! generated structure and suggests smart-pruning thresholds from them.

use serde::{Deserialize, Serialize};

use crate::structure::Node;

// ============================================================================
// STATS
// ============================================================================

/// Shape statistics for a structure tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureStats {
    /// Deepest nesting level
    pub max_depth: usize,
    /// Total nodes (categories and leaf lists)
    pub total_nodes: usize,
    /// Total leaf terms
    pub total_leaves: usize,
    /// Number of leaf lists
    pub leaf_lists: usize,
    /// Child counts per category
    pub branching_factors: Vec<usize>,
    /// Term counts per leaf list
    pub leaf_sizes: Vec<usize>,
}

impl StructureStats {
    /// Mean children per category
    pub fn avg_branching(&self) -> f64 {
        mean(&self.branching_factors)
    }

    /// Mean terms per leaf list
    pub fn avg_leaf_size(&self) -> f64 {
        mean(&self.leaf_sizes)
    }
}

fn mean(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

/// Walk a structure and gather its statistics
pub fn compute_stats(node: &Node) -> StructureStats {
    let mut stats = StructureStats::default();
    walk(node, 0, &mut stats);
    stats
}

fn walk(node: &Node, depth: usize, stats: &mut StructureStats) {
    stats.total_nodes += 1;
    stats.max_depth = stats.max_depth.max(depth);
    match node {
        Node::Category(children) => {
            if !children.is_empty() {
                stats.branching_factors.push(children.len());
            }
            for child in children.values() {
                walk(child, depth + 1, stats);
            }
        }
        Node::Leaf(terms) => {
            stats.total_leaves += terms.len();
            stats.leaf_lists += 1;
            stats.leaf_sizes.push(terms.len());
        }
    }
}

// ============================================================================
// SUGGESTIONS
// ============================================================================

/// Suggested smart-pruning thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSuggestion {
    /// Significance depth
    pub min_depth: usize,
    /// Significance hyponym count
    pub min_hyponyms: usize,
    /// Minimum leaf list size
    pub min_leaf_size: usize,
}

/// Derive pruning thresholds from structure statistics.
///
/// Deep trees can afford aggressive depth pruning; large vocabularies need
/// higher flattening thresholds to stay readable; denser trees support
/// larger leaf lists.
pub fn suggest_thresholds(stats: &StructureStats) -> ThresholdSuggestion {
    let min_depth = stats.max_depth.saturating_sub(2).min(4).max(2);
    let min_hyponyms = (stats.total_leaves / 100).max(50);
    let min_leaf_size = ((stats.avg_branching() as usize) / 5).max(3);

    ThresholdSuggestion {
        min_depth,
        min_hyponyms,
        min_leaf_size,
    }
}

// ============================================================================
// TESTS
// ============================================================================
