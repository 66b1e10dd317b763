//! Smart pruning and arrangement configuration
//!
//! One record of tuning parameters consumed by the pruner, the traversal
//! engine, and the arranger. Per-category overrides propagate recursively:
//! when an override matches a child, its fields become the defaults for the
//! whole subtree below that child.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

// ============================================================================
// ENUMS
// ============================================================================

/// Embedding model selection for semantic cleaning and arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticModel {
    /// all-MiniLM-L12-v2 (fast, 384 dimensions)
    #[default]
    Minilm,
    /// paraphrase-multilingual-mpnet-base-v2 (768 dimensions)
    Mpnet,
    /// High-quality default backend
    Qwen3,
}

impl SemanticModel {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticModel::Minilm => "minilm",
            SemanticModel::Mpnet => "mpnet",
            SemanticModel::Qwen3 => "qwen3",
        }
    }
}

/// Cluster selection method for density clustering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    /// Excess of mass: favors larger, stabler clusters
    #[default]
    Eom,
    /// Leaf: favors fine-grained micro-clusters
    Leaf,
}

impl SelectionMethod {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::Eom => "eom",
            SelectionMethod::Leaf => "leaf",
        }
    }
}

// ============================================================================
// SMART CONFIG
// ============================================================================

/// Tuning parameters for semantic significance pruning and arrangement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartConfig {
    /// Master switch; when off the pruner defers to the caller's depth rule
    pub enabled: bool,
    /// Concepts at or above this depth are significant (shallow = fundamental)
    pub min_depth: usize,
    /// Concepts with at least this many transitive hyponyms are significant
    pub min_hyponyms: usize,
    /// Leaf lists shorter than this are bubbled up as orphans (or kept small)
    pub min_leaf_size: usize,
    /// Bubble small leaf lists upward into a parent miscellaneous bucket
    pub merge_orphans: bool,
    /// Per-category overrides keyed by identifier or lower-cased display name
    pub category_overrides: HashMap<String, CategoryOverride>,
    /// Remove semantic outliers from flattened lists
    pub semantic_cleanup: bool,
    /// Embedding model for cleaning and arrangement
    pub semantic_model: SemanticModel,
    /// Outlier threshold for cleaning
    pub semantic_threshold: f32,
    /// Re-group flattened lists into semantic sub-categories
    pub semantic_arrangement: bool,
    /// Minimum mean membership probability for an accepted cluster
    pub semantic_arrangement_threshold: f32,
    /// Minimum cluster size for the primary arrangement pass
    pub semantic_arrangement_min_cluster: usize,
    /// Cluster selection method for arrangement
    pub semantic_arrangement_method: SelectionMethod,
    /// Nodes elided from the structure; their children are promoted in place
    pub skip_nodes: HashSet<String>,
    /// Label for orphan buckets; `{}` is replaced by the parent name
    pub orphans_label_template: String,
    /// Traversal budget; `None` means unlimited
    pub preview_limit: Option<u64>,
    /// Neighborhood size for dimensionality reduction
    pub umap_n_neighbors: usize,
    /// Minimum distance parameter for dimensionality reduction
    pub umap_min_dist: f32,
    /// Output dimensionality for reduction
    pub umap_n_components: usize,
    /// Density clustering min_samples; defaults to min_cluster_size when unset
    pub hdbscan_min_samples: Option<usize>,
}

impl Default for SmartConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_depth: 6,
            min_hyponyms: 10,
            min_leaf_size: 3,
            merge_orphans: false,
            category_overrides: HashMap::new(),
            semantic_cleanup: false,
            semantic_model: SemanticModel::Minilm,
            semantic_threshold: 0.5,
            semantic_arrangement: false,
            semantic_arrangement_threshold: 0.1,
            semantic_arrangement_min_cluster: 5,
            semantic_arrangement_method: SelectionMethod::Eom,
            skip_nodes: HashSet::new(),
            orphans_label_template: "misc".to_string(),
            preview_limit: None,
            umap_n_neighbors: 15,
            umap_min_dist: 0.1,
            umap_n_components: 5,
            hdbscan_min_samples: None,
        }
    }
}

impl SmartConfig {
    /// Produce the configuration for a child subtree, applying any matching
    /// override. Identifier matches take precedence over name matches; name
    /// matches are case-insensitive. Returns `None` when no override applies
    /// so callers can keep sharing the current config.
    pub fn child_config(&self, name: &str, id: Option<&str>) -> Option<SmartConfig> {
        if !self.enabled || self.category_overrides.is_empty() {
            return None;
        }

        let override_ = id
            .and_then(|id| self.category_overrides.get(id))
            .or_else(|| self.category_overrides.get(name))
            .or_else(|| self.category_overrides.get(&name.to_lowercase()))?;

        let mut child = self.clone();
        override_.apply(&mut child);
        Some(child)
    }

    /// True when a node name, identifier, or lemma is in the skip set
    /// (case-insensitive).
    pub fn is_skipped(&self, id: &str, name: &str, lemmas: &[String]) -> bool {
        if self.skip_nodes.is_empty() {
            return false;
        }
        let matches = |s: &str| {
            self.skip_nodes.contains(s) || self.skip_nodes.contains(&s.to_lowercase())
        };
        matches(id) || matches(name) || lemmas.iter().any(|l| matches(l))
    }

    /// Resolve the orphan bucket label for a parent category
    pub fn orphans_label(&self, parent: &str) -> String {
        if self.orphans_label_template.contains("{}") {
            self.orphans_label_template.replace("{}", parent)
        } else {
            self.orphans_label_template.clone()
        }
    }
}

// ============================================================================
// CATEGORY OVERRIDES
// ============================================================================

/// A partial configuration applied to one category and its subtree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryOverride {
    pub min_depth: Option<usize>,
    pub min_hyponyms: Option<usize>,
    pub min_leaf_size: Option<usize>,
    pub merge_orphans: Option<bool>,
    pub semantic_cleanup: Option<bool>,
    pub semantic_model: Option<SemanticModel>,
    pub semantic_threshold: Option<f32>,
    pub semantic_arrangement: Option<bool>,
    pub semantic_arrangement_threshold: Option<f32>,
    pub semantic_arrangement_min_cluster: Option<usize>,
    pub semantic_arrangement_method: Option<SelectionMethod>,
}

impl CategoryOverride {
    /// Apply the present fields onto a config; absent fields keep their value
    fn apply(&self, config: &mut SmartConfig) {
        if let Some(v) = self.min_depth {
            config.min_depth = v;
        }
        if let Some(v) = self.min_hyponyms {
            config.min_hyponyms = v;
        }
        if let Some(v) = self.min_leaf_size {
            config.min_leaf_size = v;
        }
        if let Some(v) = self.merge_orphans {
            config.merge_orphans = v;
        }
        if let Some(v) = self.semantic_cleanup {
            config.semantic_cleanup = v;
        }
        if let Some(v) = self.semantic_model {
            config.semantic_model = v;
        }
        if let Some(v) = self.semantic_threshold {
            config.semantic_threshold = v;
        }
        if let Some(v) = self.semantic_arrangement {
            config.semantic_arrangement = v;
        }
        if let Some(v) = self.semantic_arrangement_threshold {
            config.semantic_arrangement_threshold = v;
        }
        if let Some(v) = self.semantic_arrangement_min_cluster {
            config.semantic_arrangement_min_cluster = v;
        }
        if let Some(v) = self.semantic_arrangement_method {
            config.semantic_arrangement_method = v;
        }
    }

    /// Parse an override from a loose JSON value.
    ///
    /// Malformed entries yield `None` and are ignored by callers, so a bad
    /// override leaves the parent defaults in effect.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

// ============================================================================
// PRESETS
// ============================================================================

/// Named parameter bundles covering the useful pruning spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmartPreset {
    UltraDetailed,
    Detailed,
    Balanced,
    Compact,
    Flat,
    UltraFlat,
}

impl SmartPreset {
    /// Build the configuration for this preset
    pub fn config(&self) -> SmartConfig {
        // (min_depth, min_hyponyms, min_leaf, method)
        let (min_depth, min_hyponyms, min_leaf_size, method) = match self {
            SmartPreset::UltraDetailed => (8, 5, 1, SelectionMethod::Eom),
            SmartPreset::Detailed => (6, 10, 3, SelectionMethod::Eom),
            SmartPreset::Balanced => (4, 50, 5, SelectionMethod::Eom),
            SmartPreset::Compact => (3, 100, 8, SelectionMethod::Eom),
            SmartPreset::Flat => (2, 500, 10, SelectionMethod::Eom),
            // Leaf selection works best for ultra-flat micro-clusters
            SmartPreset::UltraFlat => (1, 1000, 20, SelectionMethod::Leaf),
        };

        SmartConfig {
            enabled: true,
            min_depth,
            min_hyponyms,
            min_leaf_size,
            merge_orphans: true,
            semantic_cleanup: true,
            semantic_arrangement: true,
            semantic_arrangement_method: method,
            ..SmartConfig::default()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
