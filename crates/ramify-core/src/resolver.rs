//! Lexical resolution over a concept source
//!
//! Wraps a read-only `ConceptSource` with the lookups the pipeline needs:
//! surface form to primary sense, identifier parsing, lowest common
//! ancestors, transitive hyponym listings, and glosses. Hot lookups are
//! memoized; `clear_cache` resets them between test runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::concept::{Concept, ConceptSource};

/// Over-abstract concepts that never make useful category names
const LCA_BLACKLIST: &[&str] = &[
    "entity",
    "physical entity",
    "abstraction",
    "object",
    "whole",
    "matter",
    "unit",
    "causal agent",
    "substance",
    "group",
];

const CACHE_SIZE: usize = 10_000;

// ============================================================================
// RESOLVER
// ============================================================================

/// Memoizing lexical resolver
pub struct Resolver {
    source: Arc<dyn ConceptSource>,
    primary: Mutex<LruCache<String, Option<Arc<dyn Concept>>>>,
    descendants: Mutex<LruCache<(String, usize), Arc<Vec<String>>>>,
    hyponym_counts: Mutex<LruCache<String, usize>>,
}

impl Resolver {
    /// Create a resolver over a concept source
    pub fn new(source: Arc<dyn ConceptSource>) -> Self {
        let capacity = NonZeroUsize::new(CACHE_SIZE).expect("cache size is non-zero");
        Self {
            source,
            primary: Mutex::new(LruCache::new(capacity)),
            descendants: Mutex::new(LruCache::new(capacity)),
            hyponym_counts: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The wrapped source
    pub fn source(&self) -> &Arc<dyn ConceptSource> {
        &self.source
    }

    /// Drop all memoized results (test isolation)
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.primary.lock() {
            cache.clear();
        }
        if let Ok(mut cache) = self.descendants.lock() {
            cache.clear();
        }
        if let Ok(mut cache) = self.hyponym_counts.lock() {
            cache.clear();
        }
    }

    /// Most common sense for a surface string.
    ///
    /// Lemma tokens are normalized both ways (spaces <-> underscores) so
    /// either convention resolves.
    pub fn primary_sense(&self, name: &str) -> Option<Arc<dyn Concept>> {
        let key = name.to_lowercase();
        if let Ok(mut cache) = self.primary.lock() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }

        let mut result = self.source.senses(&key).into_iter().next();
        if result.is_none() && key.contains(' ') {
            result = self.source.senses(&key.replace(' ', "_")).into_iter().next();
        }
        if result.is_none() && key.contains('_') {
            result = self.source.senses(&key.replace('_', " ")).into_iter().next();
        }

        if let Ok(mut cache) = self.primary.lock() {
            cache.put(key, result.clone());
        }
        result
    }

    /// Resolve a stable identifier of the form `<pos letter><offset>`.
    ///
    /// The offset is re-rendered zero-padded to 8 digits, so `n42` and
    /// `n00000042` name the same concept.
    pub fn sense_from_id(&self, id: &str) -> Option<Arc<dyn Concept>> {
        let mut chars = id.chars();
        let pos = chars.next()?;
        let rest = chars.as_str();
        if !pos.is_ascii_alphabetic() || rest.is_empty() {
            return None;
        }
        let offset: u64 = rest.parse().ok()?;
        self.source.by_id(&format!("{pos}{offset:08}"))
    }

    /// Iterated lowest common hypernym of two or more senses.
    ///
    /// Returns `None` when any pair has no common hypernym or when the
    /// computed ancestor is too abstract to be a useful label.
    pub fn lca(&self, senses: &[Arc<dyn Concept>]) -> Option<Arc<dyn Concept>> {
        if senses.len() < 2 {
            return None;
        }

        let mut current = Arc::clone(&senses[0]);
        for sense in &senses[1..] {
            current = self.lowest_common_hypernym(&current, sense)?;
        }

        if LCA_BLACKLIST.contains(&current.name().to_lowercase().as_str()) {
            return None;
        }
        Some(current)
    }

    /// Deepest common ancestor of a pair (each sense counts as its own
    /// ancestor). Ties break on identifier for determinism.
    pub fn lowest_common_hypernym(
        &self,
        a: &Arc<dyn Concept>,
        b: &Arc<dyn Concept>,
    ) -> Option<Arc<dyn Concept>> {
        let ancestors_a = ancestor_map(a);
        let ancestors_b = ancestor_map(b);

        ancestors_a
            .into_iter()
            .filter(|(id, _)| ancestors_b.contains_key(id))
            .max_by(|(id_a, (_, depth_a)), (id_b, (_, depth_b))| {
                depth_a.cmp(depth_b).then_with(|| id_b.cmp(id_a))
            })
            .map(|(_, (concept, _))| concept)
    }

    /// Sorted display names of every transitive hyponym, optionally
    /// restricted to a set of valid identifiers. Memoized per sense and
    /// filter identity.
    pub fn descendants(
        &self,
        sense: &Arc<dyn Concept>,
        filter: Option<&Arc<HashSet<String>>>,
    ) -> Arc<Vec<String>> {
        let key = (
            sense.id().to_string(),
            filter.map(|f| Arc::as_ptr(f) as usize).unwrap_or(0),
        );
        if let Ok(mut cache) = self.descendants.lock() {
            if let Some(hit) = cache.get(&key) {
                return Arc::clone(hit);
            }
        }

        let mut names: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Arc<dyn Concept>> = sense.children().into();
        while let Some(concept) = queue.pop_front() {
            if !seen.insert(concept.id().to_string()) {
                continue;
            }
            let keep = filter
                .map(|valid| valid.contains(concept.id()))
                .unwrap_or(true);
            if keep {
                names.push(concept.name().to_string());
            }
            queue.extend(concept.children());
        }
        names.sort();
        names.dedup();

        let result = Arc::new(names);
        if let Ok(mut cache) = self.descendants.lock() {
            cache.put(key, Arc::clone(&result));
        }
        result
    }

    /// Number of transitive hyponyms, memoized per sense
    pub fn hyponym_count(&self, sense: &Arc<dyn Concept>) -> usize {
        let key = sense.id().to_string();
        if let Ok(mut cache) = self.hyponym_counts.lock() {
            if let Some(&hit) = cache.get(&key) {
                return hit;
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Arc<dyn Concept>> = sense.children().into();
        while let Some(concept) = queue.pop_front() {
            if seen.insert(concept.id().to_string()) {
                queue.extend(concept.children());
            }
        }

        let count = seen.len();
        if let Ok(mut cache) = self.hyponym_counts.lock() {
            cache.put(key, count);
        }
        count
    }

    /// Definition text for a sense, with a readable fallback
    pub fn gloss(&self, sense: &Arc<dyn Concept>) -> String {
        sense
            .gloss()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Items related to {}", sense.name()))
    }
}

fn ancestor_map(concept: &Arc<dyn Concept>) -> HashMap<String, (Arc<dyn Concept>, usize)> {
    let mut ancestors = HashMap::new();
    for path in concept.hypernym_paths() {
        for node in path {
            ancestors
                .entry(node.id().to_string())
                .or_insert_with(|| (Arc::clone(&node), node.depth()));
        }
    }
    ancestors
}

// ============================================================================
// TESTS
// ============================================================================
