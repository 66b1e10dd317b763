//! Semantic arrangement
//!
//! Re-groups a flat term list into named sub-categories: embed, reduce,
//! density-cluster, filter clusters by mean membership, then name the
//! survivors. A second recovery pass with tighter parameters sweeps large
//! leftover sets. `arrange_hierarchy` applies the same machinery
//! recursively to build nested structures from oversized lists.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::cluster::{ClusterParams, Clusterer, DensityClusterer};
use crate::config::{SelectionMethod, SmartConfig};
use crate::embedding::{EmbeddingCache, EncodeError};
use crate::events::{EventCollector, EventKind};
use crate::keywords::contextual_label;
use crate::namer::{ClusterMeta, ClusterNamer};
use crate::reduce::{PcaReducer, ReductionCache};
use crate::resolver::Resolver;
use crate::structure::Node;

/// Inputs shorter than this are returned as leftovers untouched
const MIN_ARRANGE_INPUT: usize = 3;

/// Leftover count that triggers the recovery pass
const RECOVERY_LEFTOVER_MIN: usize = 20;

/// Default recursion depth for hierarchical arrangement
pub const DEFAULT_HIERARCHY_DEPTH: usize = 2;

/// Default maximum leaf size for hierarchical arrangement
pub const DEFAULT_MAX_LEAF_SIZE: usize = 50;

// ============================================================================
// PARAMETERS & RESULTS
// ============================================================================

/// Tuning for one arrangement invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ArrangeParams {
    /// Minimum mean membership probability for an accepted cluster
    pub threshold: f32,
    /// Minimum cluster size for the primary pass
    pub min_cluster_size: usize,
    /// Core-distance sample count; defaults to `min_cluster_size`
    pub min_samples: Option<usize>,
    /// Cluster selection method
    pub method: SelectionMethod,
    /// Neighborhood size for dimensionality reduction
    pub neighbors: usize,
    /// Minimum distance parameter for dimensionality reduction
    pub min_dist: f32,
    /// Reduced dimensionality
    pub components: usize,
}

impl Default for ArrangeParams {
    fn default() -> Self {
        Self {
            threshold: 0.15,
            min_cluster_size: 5,
            min_samples: None,
            method: SelectionMethod::Eom,
            neighbors: 15,
            min_dist: 0.1,
            components: 5,
        }
    }
}

impl ArrangeParams {
    /// Derive arrangement parameters from a smart config
    pub fn from_config(config: &SmartConfig) -> Self {
        Self {
            threshold: config.semantic_arrangement_threshold,
            min_cluster_size: config.semantic_arrangement_min_cluster,
            min_samples: config.hdbscan_min_samples,
            method: config.semantic_arrangement_method,
            neighbors: config.umap_n_neighbors,
            min_dist: config.umap_min_dist,
            components: config.umap_n_components,
        }
    }
}

/// Diagnostics for one clustering pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassStats {
    /// Clusters the backend found
    pub clusters_found: usize,
    /// Clusters rejected by the membership threshold
    pub clusters_rejected: usize,
    /// Fraction of points the backend left unassigned
    pub noise_ratio: f32,
}

/// Diagnostics for a full arrangement invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrangeStats {
    /// Primary configured pass
    pub primary: PassStats,
    /// Recovery pass over leftovers, when it ran
    pub recovery: Option<PassStats>,
}

/// Result of arranging a term list
#[derive(Debug, Clone, Default)]
pub struct Arrangement {
    /// Accepted groups in descending-size order, terms sorted within
    pub groups: IndexMap<String, Vec<String>>,
    /// Terms no accepted cluster claimed, sorted
    pub leftovers: Vec<String>,
    /// Pass diagnostics
    pub stats: ArrangeStats,
    /// Naming metadata per group label
    pub metadata: HashMap<String, ClusterMeta>,
}

impl Arrangement {
    fn passthrough(terms: &[String]) -> Self {
        Self {
            leftovers: terms.to_vec(),
            ..Default::default()
        }
    }
}

// ============================================================================
// ARRANGER
// ============================================================================

/// Embedding-driven term arranger
pub struct Arranger {
    cache: Arc<EmbeddingCache>,
    reduction: Mutex<ReductionCache>,
    clusterer: Box<dyn Clusterer>,
    namer: ClusterNamer,
}

impl Arranger {
    /// Create an arranger with the default reduction and clustering backends
    pub fn new(cache: Arc<EmbeddingCache>, resolver: Arc<Resolver>) -> Self {
        Self::with_backends(
            cache,
            resolver,
            ReductionCache::new(Some(Box::new(PcaReducer))),
            Box::new(DensityClusterer),
        )
    }

    /// Create an arranger with explicit backends (tests inject scripted
    /// clusterers here)
    pub fn with_backends(
        cache: Arc<EmbeddingCache>,
        resolver: Arc<Resolver>,
        reduction: ReductionCache,
        clusterer: Box<dyn Clusterer>,
    ) -> Self {
        Self {
            cache,
            reduction: Mutex::new(reduction),
            clusterer,
            namer: ClusterNamer::new(resolver),
        }
    }

    /// Whether the embedding backend can produce vectors
    pub fn is_ready(&self) -> bool {
        self.cache.is_ready()
    }

    /// Arrange a flat list into named groups plus leftovers.
    ///
    /// Inputs shorter than three terms, or any run without a working
    /// encoder, pass through with every term as a leftover. Encoder
    /// failures propagate.
    pub fn arrange_list(
        &self,
        terms: &[String],
        params: &ArrangeParams,
        context: Option<&str>,
        events: &mut EventCollector,
    ) -> Result<Arrangement, EncodeError> {
        if terms.len() < MIN_ARRANGE_INPUT || !self.cache.is_ready() {
            return Ok(Arrangement::passthrough(terms));
        }

        // Normalize for hashing stability; groups keep the original forms
        let normalized: Vec<String> = terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect();
        let embeddings = self.cache.embeddings_for(&normalized)?;
        if embeddings.is_empty() {
            return Ok(Arrangement::passthrough(terms));
        }

        let mut existing: HashSet<String> = HashSet::new();
        let mut fallback_counter = 1_usize;

        let (mut groups, leftover_idx, primary_stats, mut metadata) = self.single_pass(
            terms,
            &embeddings,
            params.min_cluster_size,
            params.min_samples.unwrap_or(params.min_cluster_size),
            params.threshold,
            params.method,
            params,
            &mut existing,
            &mut fallback_counter,
        );

        let mut leftovers: Vec<String> =
            leftover_idx.iter().map(|&i| terms[i].clone()).collect();
        let mut recovery_stats = None;

        // Recovery pass: substantial leftovers get one tighter sweep
        if leftovers.len() > RECOVERY_LEFTOVER_MIN && params.min_cluster_size > 2 {
            let leftover_embeddings: Vec<Vec<f32>> =
                leftover_idx.iter().map(|&i| embeddings[i].clone()).collect();

            let (recovered, recovered_leftover_idx, stats, recovered_meta) = self.single_pass(
                &leftovers,
                &leftover_embeddings,
                2,
                2,
                (params.threshold * 1.5).max(0.15),
                SelectionMethod::Leaf,
                params,
                &mut existing,
                &mut fallback_counter,
            );

            let remaining: Vec<String> = recovered_leftover_idx
                .iter()
                .map(|&i| leftovers[i].clone())
                .collect();
            groups.extend(recovered);
            metadata.extend(recovered_meta);
            leftovers = remaining;
            recovery_stats = Some(stats);
        }

        leftovers.sort();

        let noise_ratio = leftovers.len() as f64 / terms.len() as f64;
        let mut data = Map::new();
        data.insert("items".to_string(), Value::from(terms.len()));
        data.insert("clusters".to_string(), Value::from(groups.len()));
        data.insert("noise".to_string(), Value::from(noise_ratio));
        events.record(
            EventKind::Arrangement,
            format!(
                "arranged {} items into {} groups",
                terms.len(),
                groups.len()
            ),
            context,
            Some(data),
        );

        Ok(Arrangement {
            groups,
            leftovers,
            stats: ArrangeStats {
                primary: primary_stats,
                recovery: recovery_stats,
            },
            metadata,
        })
    }

    /// Recursively arrange an oversized list into a nested structure.
    ///
    /// Lists at or under `max_leaf_size` (or past `max_depth`) come back as
    /// sorted leaves; unproductive clustering falls back to a sorted flat
    /// list. Leftovers at each level land in a contextually-labeled bucket.
    pub fn arrange_hierarchy(
        &self,
        terms: &[String],
        max_depth: usize,
        max_leaf_size: usize,
        params: &ArrangeParams,
        context: Option<&str>,
        events: &mut EventCollector,
    ) -> Result<Node, EncodeError> {
        self.hierarchy_level(terms, 0, max_depth, max_leaf_size, params, context, events)
    }

    #[allow(clippy::too_many_arguments)]
    fn hierarchy_level(
        &self,
        terms: &[String],
        depth: usize,
        max_depth: usize,
        max_leaf_size: usize,
        params: &ArrangeParams,
        context: Option<&str>,
        events: &mut EventCollector,
    ) -> Result<Node, EncodeError> {
        if terms.len() <= max_leaf_size || depth >= max_depth {
            return Ok(Node::Leaf(sorted(terms)));
        }

        let arrangement = self.arrange_list(terms, params, context, events)?;
        let no_structure = arrangement.groups.is_empty()
            || (arrangement.groups.len() == 1 && arrangement.leftovers.is_empty());
        if no_structure {
            return Ok(Node::Leaf(sorted(terms)));
        }

        let mut children: IndexMap<String, Node> = IndexMap::new();
        for (name, items) in &arrangement.groups {
            let value = if items.len() > max_leaf_size {
                self.hierarchy_level(items, depth + 1, max_depth, max_leaf_size, params, None, events)?
            } else {
                Node::Leaf(sorted(items))
            };
            children.insert(name.clone(), value);
        }

        if !arrangement.leftovers.is_empty() {
            // Sample a few terms per group as negative context for labeling
            let mut context_terms: Vec<String> = Vec::new();
            for items in arrangement.groups.values() {
                context_terms.extend(items.iter().take(5).cloned());
            }
            let label = contextual_label(&arrangement.leftovers, &context_terms, "Other");

            let mut unique = label.clone();
            let mut counter = 2;
            while children.contains_key(&unique) {
                unique = format!("{label} {counter}");
                counter += 1;
            }
            children.insert(unique, Node::Leaf(sorted(&arrangement.leftovers)));
        }

        Ok(Node::Category(children))
    }

    /// Remove semantic outliers from a term list.
    ///
    /// Points density clustering cannot assign (with strong enough
    /// non-membership to clear the threshold) are dropped. Best-effort: any
    /// backend problem returns the list unchanged.
    pub fn clean_list(
        &self,
        terms: &[String],
        threshold: f32,
        context: Option<&str>,
        events: &mut EventCollector,
    ) -> Vec<String> {
        if terms.len() < MIN_ARRANGE_INPUT || !self.cache.is_ready() {
            return terms.to_vec();
        }

        let normalized: Vec<String> = terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect();
        let embeddings = match self.cache.embeddings_for(&normalized) {
            Ok(embeddings) => embeddings,
            Err(e) => {
                tracing::warn!("Semantic cleaning skipped: {e}");
                return terms.to_vec();
            }
        };

        let clustering = self.clusterer.cluster(
            &embeddings,
            ClusterParams {
                min_cluster_size: 2,
                min_samples: 1,
                method: SelectionMethod::Eom,
            },
        );

        let mut outliers: Vec<usize> = Vec::new();
        for (i, &label) in clustering.labels.iter().enumerate() {
            if label < 0 && (1.0 - clustering.probabilities[i]) > threshold {
                outliers.push(i);
            }
        }

        // Everything-is-noise means the list is just diverse, not dirty
        if outliers.is_empty() || outliers.len() == terms.len() {
            return terms.to_vec();
        }

        let outlier_set: HashSet<usize> = outliers.iter().copied().collect();
        let cleaned: Vec<String> = terms
            .iter()
            .enumerate()
            .filter(|(i, _)| !outlier_set.contains(i))
            .map(|(_, t)| t.clone())
            .collect();

        let mut data = Map::new();
        data.insert("removed".to_string(), Value::from(outliers.len()));
        data.insert("kept".to_string(), Value::from(cleaned.len()));
        events.record(
            EventKind::Cleaning,
            format!("removed {} outliers", outliers.len()),
            context,
            Some(data),
        );

        cleaned
    }

    #[allow(clippy::too_many_arguments)]
    fn single_pass(
        &self,
        terms: &[String],
        embeddings: &[Vec<f32>],
        min_cluster_size: usize,
        min_samples: usize,
        threshold: f32,
        method: SelectionMethod,
        params: &ArrangeParams,
        existing: &mut HashSet<String>,
        fallback_counter: &mut usize,
    ) -> (
        IndexMap<String, Vec<String>>,
        Vec<usize>,
        PassStats,
        HashMap<String, ClusterMeta>,
    ) {
        let mut stats = PassStats::default();
        if terms.len() < min_cluster_size + 1 {
            return (IndexMap::new(), (0..terms.len()).collect(), stats, HashMap::new());
        }

        let reduced = match self.reduction.lock() {
            Ok(mut cache) => {
                cache.reduce(embeddings, params.neighbors, params.min_dist, params.components)
            }
            Err(_) => embeddings.to_vec(),
        };

        let clustering = self.clusterer.cluster(
            &reduced,
            ClusterParams {
                min_cluster_size,
                min_samples,
                method,
            },
        );
        stats.noise_ratio = clustering.noise_ratio();

        let mut clusters: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in clustering.labels.iter().enumerate() {
            if label >= 0 {
                clusters.entry(label).or_default().push(idx);
            }
        }
        stats.clusters_found = clusters.len();

        // Descending-size emission for stable output ordering
        let mut sorted_labels: Vec<i32> = clusters.keys().copied().collect();
        sorted_labels.sort_by_key(|label| (std::cmp::Reverse(clusters[label].len()), *label));

        let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut metadata: HashMap<String, ClusterMeta> = HashMap::new();
        let mut used: HashSet<usize> = HashSet::new();

        for label in sorted_labels {
            let indices = &clusters[&label];
            let mean_prob: f32 = indices
                .iter()
                .map(|&i| clustering.probabilities[i])
                .sum::<f32>()
                / indices.len() as f32;
            if mean_prob < threshold {
                stats.clusters_rejected += 1;
                continue;
            }

            let cluster_terms: Vec<String> =
                indices.iter().map(|&i| terms[i].clone()).collect();
            let cluster_embeddings: Vec<Vec<f32>> =
                indices.iter().map(|&i| embeddings[i].clone()).collect();

            let (name, meta) = self.namer.name_cluster(
                &cluster_terms,
                &cluster_embeddings,
                existing,
                terms,
                fallback_counter,
            );

            let mut sorted_terms = cluster_terms;
            sorted_terms.sort();
            existing.insert(name.clone());
            metadata.insert(name.clone(), meta);
            groups.insert(name, sorted_terms);
            used.extend(indices.iter().copied());
        }

        let leftover_idx: Vec<usize> =
            (0..terms.len()).filter(|i| !used.contains(i)).collect();
        (groups, leftover_idx, stats, metadata)
    }
}

fn sorted(terms: &[String]) -> Vec<String> {
    let mut out = terms.to_vec();
    out.sort();
    out
}

// ============================================================================
// TESTS
// ============================================================================
