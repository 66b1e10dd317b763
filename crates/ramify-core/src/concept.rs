//! Concept graph abstraction
//!
//! The engine consumes a rooted graph of immutable concepts through the
//! `Concept` and `ConceptSource` traits. Any backing store that satisfies
//! the contract can feed a run: a lexical-database wrapper, an image-dataset
//! adapter, or the in-memory `TaxonomySource` built from parent/child edges.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

// ============================================================================
// TRAITS
// ============================================================================

/// A node in the source concept graph.
///
/// Concepts are immutable values owned by their source; the engine only
/// reads them.
pub trait Concept: Send + Sync {
    /// Stable identifier (e.g. a part-of-speech letter plus 8-digit offset)
    fn id(&self) -> &str;
    /// Display name
    fn name(&self) -> &str;
    /// Human-readable definition, if the source has one
    fn gloss(&self) -> Option<&str>;
    /// Surface forms that resolve to this concept (lower-cased)
    fn lemmas(&self) -> Vec<String>;
    /// More-specific concepts, in source order
    fn children(&self) -> Vec<Arc<dyn Concept>>;
    /// More-general concepts (immediate hypernyms)
    fn hypernyms(&self) -> Vec<Arc<dyn Concept>>;
    /// Every root-to-self path through the hypernym graph
    fn hypernym_paths(&self) -> Vec<Vec<Arc<dyn Concept>>>;
    /// Shortest distance to the graph root
    fn depth(&self) -> usize;
}

/// A traversable source of concepts
pub trait ConceptSource: Send + Sync {
    /// The graph root, if the source is non-empty
    fn root(&self) -> Option<Arc<dyn Concept>>;
    /// Look up a concept by stable identifier
    fn by_id(&self, id: &str) -> Option<Arc<dyn Concept>>;
    /// Concepts a surface form can denote, most common sense first
    fn senses(&self, lemma: &str) -> Vec<Arc<dyn Concept>>;
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

/// Errors from building an in-memory taxonomy
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    /// An edge referenced an identifier that was never added
    #[error("unknown concept: {0}")]
    UnknownConcept(String),
    /// The graph has no root (every node has a parent)
    #[error("taxonomy has no root")]
    NoRoot,
}

#[derive(Debug)]
struct ConceptRecord {
    id: String,
    name: String,
    gloss: Option<String>,
    lemmas: Vec<String>,
    children: Vec<usize>,
    parents: Vec<usize>,
    depth: usize,
}

#[derive(Debug)]
struct TaxonomyData {
    records: Vec<ConceptRecord>,
    by_id: HashMap<String, usize>,
    by_lemma: HashMap<String, Vec<usize>>,
    roots: Vec<usize>,
}

/// An in-memory concept source built from explicit edges.
///
/// Sense order for a lemma follows concept insertion order, so callers add
/// the most common sense first.
#[derive(Debug, Clone)]
pub struct TaxonomySource {
    data: Arc<TaxonomyData>,
}

impl TaxonomySource {
    /// Start building a taxonomy
    pub fn builder() -> TaxonomyBuilder {
        TaxonomyBuilder::default()
    }

    /// All root concepts (nodes without parents), in insertion order
    pub fn roots(&self) -> Vec<Arc<dyn Concept>> {
        self.data
            .roots
            .iter()
            .map(|&idx| self.handle(idx))
            .collect()
    }

    /// Number of concepts in the graph
    pub fn len(&self) -> usize {
        self.data.records.len()
    }

    /// True when the graph has no concepts
    pub fn is_empty(&self) -> bool {
        self.data.records.is_empty()
    }

    fn handle(&self, idx: usize) -> Arc<dyn Concept> {
        Arc::new(ConceptHandle {
            data: Arc::clone(&self.data),
            idx,
        })
    }
}

impl ConceptSource for TaxonomySource {
    fn root(&self) -> Option<Arc<dyn Concept>> {
        self.data.roots.first().map(|&idx| self.handle(idx))
    }

    fn by_id(&self, id: &str) -> Option<Arc<dyn Concept>> {
        self.data.by_id.get(id).map(|&idx| self.handle(idx))
    }

    fn senses(&self, lemma: &str) -> Vec<Arc<dyn Concept>> {
        self.data
            .by_lemma
            .get(&lemma.to_lowercase())
            .map(|indices| indices.iter().map(|&idx| self.handle(idx)).collect())
            .unwrap_or_default()
    }
}

struct ConceptHandle {
    data: Arc<TaxonomyData>,
    idx: usize,
}

impl ConceptHandle {
    fn record(&self) -> &ConceptRecord {
        &self.data.records[self.idx]
    }

    fn wrap(&self, idx: usize) -> Arc<dyn Concept> {
        Arc::new(ConceptHandle {
            data: Arc::clone(&self.data),
            idx,
        })
    }

    fn paths_up(&self, idx: usize, seen: &mut Vec<usize>) -> Vec<Vec<usize>> {
        let record = &self.data.records[idx];
        if record.parents.is_empty() {
            return vec![vec![idx]];
        }
        let mut paths = Vec::new();
        for &parent in &record.parents {
            // Cycle guard: the source is expected to be a DAG, but a bad
            // edge must not hang the traversal.
            if seen.contains(&parent) {
                continue;
            }
            seen.push(parent);
            for mut path in self.paths_up(parent, seen) {
                path.push(idx);
                paths.push(path);
            }
            seen.pop();
        }
        if paths.is_empty() {
            paths.push(vec![idx]);
        }
        paths
    }
}

impl Concept for ConceptHandle {
    fn id(&self) -> &str {
        &self.record().id
    }

    fn name(&self) -> &str {
        &self.record().name
    }

    fn gloss(&self) -> Option<&str> {
        self.record().gloss.as_deref()
    }

    fn lemmas(&self) -> Vec<String> {
        self.record().lemmas.clone()
    }

    fn children(&self) -> Vec<Arc<dyn Concept>> {
        self.record()
            .children
            .iter()
            .map(|&idx| self.wrap(idx))
            .collect()
    }

    fn hypernyms(&self) -> Vec<Arc<dyn Concept>> {
        self.record()
            .parents
            .iter()
            .map(|&idx| self.wrap(idx))
            .collect()
    }

    fn hypernym_paths(&self) -> Vec<Vec<Arc<dyn Concept>>> {
        let mut seen = vec![self.idx];
        self.paths_up(self.idx, &mut seen)
            .into_iter()
            .map(|path| path.into_iter().map(|idx| self.wrap(idx)).collect())
            .collect()
    }

    fn depth(&self) -> usize {
        self.record().depth
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for `TaxonomySource`
#[derive(Debug, Default)]
pub struct TaxonomyBuilder {
    records: Vec<(String, String, Option<String>, Vec<String>)>,
    by_id: HashMap<String, usize>,
    edges: Vec<(String, String)>,
}

impl TaxonomyBuilder {
    /// Add a concept. Re-adding an existing identifier is a no-op.
    pub fn concept(&mut self, id: &str, name: &str) -> &mut Self {
        if !self.by_id.contains_key(id) {
            self.by_id.insert(id.to_string(), self.records.len());
            self.records
                .push((id.to_string(), name.to_string(), None, Vec::new()));
        }
        self
    }

    /// Attach a gloss to an existing concept
    pub fn gloss(&mut self, id: &str, gloss: &str) -> &mut Self {
        if let Some(&idx) = self.by_id.get(id) {
            self.records[idx].2 = Some(gloss.to_string());
        }
        self
    }

    /// Register an extra surface form for an existing concept
    pub fn lemma(&mut self, id: &str, lemma: &str) -> &mut Self {
        if let Some(&idx) = self.by_id.get(id) {
            self.records[idx].3.push(lemma.to_lowercase());
        }
        self
    }

    /// Add a hypernym -> hyponym edge
    pub fn edge(&mut self, parent: &str, child: &str) -> &mut Self {
        self.edges.push((parent.to_string(), child.to_string()));
        self
    }

    /// Freeze the graph. Fails on edges referencing unknown concepts or
    /// when no parentless root exists.
    pub fn build(self) -> Result<TaxonomySource, TaxonomyError> {
        let mut records: Vec<ConceptRecord> = self
            .records
            .into_iter()
            .map(|(id, name, gloss, mut lemmas)| {
                let canonical = name.to_lowercase();
                if !lemmas.contains(&canonical) {
                    lemmas.insert(0, canonical);
                }
                ConceptRecord {
                    id,
                    name,
                    gloss,
                    lemmas,
                    children: Vec::new(),
                    parents: Vec::new(),
                    depth: usize::MAX,
                }
            })
            .collect();

        for (parent, child) in &self.edges {
            let &p = self
                .by_id
                .get(parent)
                .ok_or_else(|| TaxonomyError::UnknownConcept(parent.clone()))?;
            let &c = self
                .by_id
                .get(child)
                .ok_or_else(|| TaxonomyError::UnknownConcept(child.clone()))?;
            if !records[p].children.contains(&c) {
                records[p].children.push(c);
                records[c].parents.push(p);
            }
        }

        let roots: Vec<usize> = (0..records.len())
            .filter(|&idx| records[idx].parents.is_empty())
            .collect();
        if roots.is_empty() && !records.is_empty() {
            return Err(TaxonomyError::NoRoot);
        }

        // Shortest distance to a root, breadth-first
        let mut queue: VecDeque<usize> = VecDeque::new();
        for &root in &roots {
            records[root].depth = 0;
            queue.push_back(root);
        }
        while let Some(idx) = queue.pop_front() {
            let next_depth = records[idx].depth + 1;
            let children = records[idx].children.clone();
            for child in children {
                if next_depth < records[child].depth {
                    records[child].depth = next_depth;
                    queue.push_back(child);
                }
            }
        }

        let mut by_lemma: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            for lemma in &record.lemmas {
                by_lemma.entry(lemma.clone()).or_default().push(idx);
            }
        }

        Ok(TaxonomySource {
            data: Arc::new(TaxonomyData {
                by_id: self.by_id,
                by_lemma,
                roots,
                records,
            }),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
