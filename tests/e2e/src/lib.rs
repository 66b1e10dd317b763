//! Shared fixtures for ramify journey tests
//!
//! Provides synthetic concept graphs, a scripted clustering backend, and
//! structural-invariant assertions used across the journey suites.

use std::sync::{Arc, Mutex};

use ramify_core::cluster::{ClusterParams, Clusterer, Clustering};
use ramify_core::embedding::{EmbeddingCache, HashingEncoder};
use ramify_core::keywords::title_case;
use ramify_core::reduce::ReductionCache;
use ramify_core::{
    Arranger, DensityClusterer, Node, Resolver, TaxonomySource, TraversalEngine,
};

/// A clusterer that replays scripted results, then reports noise
pub struct ScriptedClusterer {
    script: Mutex<Vec<Clustering>>,
}

impl ScriptedClusterer {
    pub fn new(script: Vec<Clustering>) -> Self {
        Self {
            script: Mutex::new(script),
        }
    }
}

impl Clusterer for ScriptedClusterer {
    fn cluster(&self, points: &[Vec<f32>], _params: ClusterParams) -> Clustering {
        let mut script = self.script.lock().expect("script lock");
        if script.is_empty() {
            return Clustering::noise(points.len());
        }
        script.remove(0)
    }
}

/// A compact food/animal taxonomy with glosses
pub fn grocery_source() -> TaxonomySource {
    let mut b = TaxonomySource::builder();
    b.concept("n00000001", "produce")
        .gloss("n00000001", "fresh goods sold at market")
        .concept("n00000010", "fruit")
        .gloss("n00000010", "sweet edible plant product")
        .concept("n00000011", "apple")
        .concept("n00000012", "banana")
        .concept("n00000013", "cherry")
        .concept("n00000014", "plum")
        .concept("n00000020", "vegetable")
        .concept("n00000021", "carrot")
        .concept("n00000022", "leek")
        .concept("n00000023", "potato")
        .concept("n00000024", "turnip")
        .concept("n00000030", "herb")
        .concept("n00000031", "basil")
        .concept("n00000032", "sage")
        .edge("n00000001", "n00000010")
        .edge("n00000001", "n00000020")
        .edge("n00000001", "n00000030")
        .edge("n00000010", "n00000011")
        .edge("n00000010", "n00000012")
        .edge("n00000010", "n00000013")
        .edge("n00000010", "n00000014")
        .edge("n00000020", "n00000021")
        .edge("n00000020", "n00000022")
        .edge("n00000020", "n00000023")
        .edge("n00000020", "n00000024")
        .edge("n00000030", "n00000031")
        .edge("n00000030", "n00000032");
    b.build().expect("valid grocery taxonomy")
}

/// A wide synthetic taxonomy: one root, `branches` children, `per_branch`
/// leaves under each
pub fn wide_source(branches: usize, per_branch: usize) -> TaxonomySource {
    let mut b = TaxonomySource::builder();
    b.concept("root", "everything");
    for i in 0..branches {
        let branch = format!("branch{i}");
        b.concept(&branch, &format!("branch {i}"));
        b.edge("root", &branch);
        for j in 0..per_branch {
            let leaf = format!("leaf{i}_{j}");
            b.concept(&leaf, &format!("item {i} {j}"));
            b.edge(&branch, &leaf);
        }
    }
    b.build().expect("valid wide taxonomy")
}

/// Build an engine over a source with the default density clusterer
pub fn engine(source: &TaxonomySource) -> TraversalEngine {
    engine_with_clusterer(source, Box::new(DensityClusterer))
}

/// Build an engine over a source with an injected clustering backend
pub fn engine_with_clusterer(
    source: &TaxonomySource,
    clusterer: Box<dyn Clusterer>,
) -> TraversalEngine {
    let resolver = Arc::new(Resolver::new(Arc::new(source.clone())));
    let cache = Arc::new(EmbeddingCache::in_memory(Box::new(HashingEncoder::default())));
    let arranger =
        Arranger::with_backends(cache, Arc::clone(&resolver), ReductionCache::new(None), clusterer);
    TraversalEngine::new(resolver, arranger)
}

/// Assert the post-shaping structural invariants hold for a whole tree:
/// leaf lists are non-empty, lower-cased, sorted, and deduplicated;
/// category keys are title-cased and case-insensitively unique; no
/// category key equals its sole child's key.
pub fn assert_shaped_invariants(node: &Node) {
    match node {
        Node::Leaf(terms) => {
            assert!(!terms.is_empty(), "leaf lists must be non-empty");
            for pair in terms.windows(2) {
                assert!(pair[0] < pair[1], "leaf terms must be sorted and unique");
            }
            for term in terms {
                assert_eq!(term, &term.to_lowercase(), "leaf terms must be lower-cased");
            }
        }
        Node::Category(children) => {
            assert!(!children.is_empty(), "categories must have children");
            let mut seen: Vec<String> = Vec::new();
            for (key, value) in children {
                assert_eq!(key, &title_case(key), "category keys must be title-cased");
                let normalized = key.to_lowercase();
                assert!(
                    !seen.contains(&normalized),
                    "sibling keys must be unique after normalization"
                );
                seen.push(normalized);

                if let Node::Category(inner) = value {
                    if inner.len() == 1 {
                        let child_key = inner.keys().next().expect("one child");
                        assert_ne!(
                            key.trim().to_lowercase(),
                            child_key.trim().to_lowercase(),
                            "tautological wrappers must be pruned"
                        );
                    }
                }
                assert_shaped_invariants(value);
            }
        }
    }
}
