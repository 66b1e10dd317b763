//! Cluster naming cascade
//!
//! Names a cluster of terms by, in order: the lexical lowest common
//! ancestor (validated against the cluster medoid), the medoid's immediate
//! hypernym, and a generic fallback enriched by TF-IDF or a counter.
//! Collisions with already-used names get hybrid suffixes before integer
//! disambiguation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::concept::Concept;
use crate::embedding::{euclidean_distance, mean_vector};
use crate::keywords::{extract_unique_keywords, title_case};
use crate::resolver::Resolver;

/// Hypernym names too vague to use even for medoid naming
const GENERIC_HYPERNYMS: &[&str] = &["entity", "object", "whole"];

// ============================================================================
// METADATA
// ============================================================================

/// Which strategy produced a cluster's name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    /// Lowest common ancestor of the cluster terms
    Lca,
    /// Immediate hypernym of the cluster medoid
    MedoidHypernym,
    /// TF-IDF discriminative keyword
    Tfidf,
    /// Generic fallback counter
    Fallback,
}

impl NameSource {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NameSource::Lca => "lca",
            NameSource::MedoidHypernym => "medoid_hypernym",
            NameSource::Tfidf => "tfidf",
            NameSource::Fallback => "fallback",
        }
    }
}

/// Record of how a cluster was named
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMeta {
    /// The chosen label
    pub name: String,
    /// Strategy that produced it
    pub source: NameSource,
    /// Identifier of the naming concept, when one resolved
    pub sense_id: Option<String>,
    /// The cluster medoid term
    pub medoid: Option<String>,
    /// Up to three example terms
    pub examples: Vec<String>,
}

// ============================================================================
// NAMER
// ============================================================================

/// Names clusters through the LCA / medoid-hypernym / TF-IDF cascade
pub struct ClusterNamer {
    resolver: Arc<Resolver>,
}

impl ClusterNamer {
    /// Create a namer over a lexical resolver
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// Name one cluster.
    ///
    /// `pass_terms` is every term in the current arrangement pass; the
    /// difference against `cluster_terms` forms the TF-IDF context.
    /// `fallback_counter` numbers generic groups across the pass.
    pub fn name_cluster(
        &self,
        cluster_terms: &[String],
        cluster_embeddings: &[Vec<f32>],
        existing_names: &HashSet<String>,
        pass_terms: &[String],
        fallback_counter: &mut usize,
    ) -> (String, ClusterMeta) {
        let lca_name = self.lca_name(cluster_terms);
        let medoid = medoid_term(cluster_terms, cluster_embeddings);

        let lca_valid = self.validate_lca(lca_name.as_deref(), medoid.as_deref());

        let (mut name, mut source, sense_id) = if let (Some(lca), true) = (&lca_name, lca_valid) {
            let sense_id = self.resolver.primary_sense(lca).map(|s| s.id().to_string());
            (lca.clone(), NameSource::Lca, sense_id)
        } else if let Some(hypernym) = self.medoid_hypernym(medoid.as_deref()) {
            let sense_id = self
                .resolver
                .primary_sense(&hypernym)
                .map(|s| s.id().to_string());
            (hypernym, NameSource::MedoidHypernym, sense_id)
        } else {
            ("Group".to_string(), NameSource::Fallback, None)
        };

        // Hybrid enrichment for collisions and the generic fallback
        if existing_names.contains(&name) || name == "Group" {
            if name == "Group" {
                let cluster_set: HashSet<&str> =
                    cluster_terms.iter().map(String::as_str).collect();
                let others: Vec<String> = pass_terms
                    .iter()
                    .filter(|t| !cluster_set.contains(t.as_str()))
                    .cloned()
                    .collect();
                match extract_unique_keywords(cluster_terms, &others, 1).first() {
                    Some(keyword) => {
                        name = format!("Group ({})", title_case(keyword));
                        source = NameSource::Tfidf;
                    }
                    None => {
                        name = format!("Group {fallback_counter}");
                        *fallback_counter += 1;
                    }
                }
            } else if let Some(med) = &medoid {
                let clean = strip_parentheticals(med);
                if !clean.is_empty()
                    && clean.to_lowercase() != name.to_lowercase()
                    && clean.split_whitespace().count() <= 2
                {
                    name = format!("{name} ({clean})");
                }
            }
        }

        // Integer suffixes resolve whatever is still colliding
        let base = name.clone();
        let mut counter = 2;
        while existing_names.contains(&name) {
            name = format!("{base} {counter}");
            counter += 1;
        }

        let meta = ClusterMeta {
            name: name.clone(),
            source,
            sense_id,
            medoid,
            examples: cluster_terms.iter().take(3).cloned().collect(),
        };
        (name, meta)
    }

    /// Lowest-common-ancestor name for a set of terms, when at least two
    /// resolve and the ancestor is specific enough to be useful
    fn lca_name(&self, terms: &[String]) -> Option<String> {
        let senses: Vec<Arc<dyn Concept>> = terms
            .iter()
            .filter_map(|t| self.resolver.primary_sense(t))
            .collect();
        if senses.len() < 2 {
            return None;
        }
        self.resolver.lca(&senses).map(|c| c.name().to_string())
    }

    /// Confirm the LCA is an ancestor of the medoid's sense.
    ///
    /// When either side fails to resolve the LCA is accepted by default.
    fn validate_lca(&self, lca_name: Option<&str>, medoid: Option<&str>) -> bool {
        let (Some(lca), Some(med)) = (lca_name, medoid) else {
            return true;
        };
        let (Some(lca_sense), Some(med_sense)) = (
            self.resolver.primary_sense(lca),
            self.resolver.primary_sense(med),
        ) else {
            return true;
        };

        let is_ancestor = self
            .resolver
            .lowest_common_hypernym(&lca_sense, &med_sense)
            .map(|common| common.id() == lca_sense.id())
            .unwrap_or(false);
        is_ancestor || lca.to_lowercase() == med.to_lowercase()
    }

    /// Display name of the medoid's immediate hypernym, unless generic
    fn medoid_hypernym(&self, medoid: Option<&str>) -> Option<String> {
        let sense = self.resolver.primary_sense(medoid?)?;
        let hypernym = sense.hypernyms().into_iter().next()?;
        let name = hypernym.name().to_string();
        if GENERIC_HYPERNYMS.contains(&name.to_lowercase().as_str()) {
            return None;
        }
        Some(name)
    }
}

/// Term whose embedding sits closest to the cluster mean
fn medoid_term(terms: &[String], embeddings: &[Vec<f32>]) -> Option<String> {
    if terms.is_empty() || embeddings.len() != terms.len() {
        return None;
    }
    let centroid = mean_vector(embeddings);
    embeddings
        .iter()
        .enumerate()
        .map(|(i, row)| (i, euclidean_distance(row, &centroid)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| terms[i].clone())
}

fn strip_parentheticals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0_usize;
    for ch in text.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
