//! Structure Nodes - the nested output representation
//!
//! A skeleton is a tree of tagged nodes: categories (insertion-ordered
//! label -> node maps) and leaf lists of terms. Instruction strings ride
//! alongside the tree in a parallel path-keyed map and are merged with the
//! structure only at serialization time.

use std::collections::BTreeMap;

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// NODE
// ============================================================================

/// A node in the output skeleton: either a category or a leaf list.
///
/// Category children preserve insertion order; that order is part of the
/// output contract and survives every transformation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// An ordered mapping from label to sub-node
    Category(IndexMap<String, Node>),
    /// An ordered sequence of leaf terms
    Leaf(Vec<String>),
}

impl Node {
    /// Create an empty category
    pub fn category() -> Self {
        Node::Category(IndexMap::new())
    }

    /// Create a leaf list from terms
    pub fn leaf(terms: Vec<String>) -> Self {
        Node::Leaf(terms)
    }

    /// Borrow the category children, if this is a category
    pub fn as_category(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Category(children) => Some(children),
            Node::Leaf(_) => None,
        }
    }

    /// Borrow the leaf terms, if this is a leaf list
    pub fn as_leaf(&self) -> Option<&[String]> {
        match self {
            Node::Category(_) => None,
            Node::Leaf(terms) => Some(terms),
        }
    }

    /// True when a category has no children or a leaf has no terms
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Category(children) => children.is_empty(),
            Node::Leaf(terms) => terms.is_empty(),
        }
    }

    /// Collect every leaf term in the subtree, in traversal order
    pub fn terms(&self) -> Vec<String> {
        let mut found = Vec::new();
        self.collect_terms(&mut found);
        found
    }

    fn collect_terms(&self, out: &mut Vec<String>) {
        match self {
            Node::Category(children) => {
                for child in children.values() {
                    child.collect_terms(out);
                }
            }
            Node::Leaf(terms) => out.extend(terms.iter().cloned()),
        }
    }

    /// Count nodes in the subtree (categories and leaf lists, including self)
    pub fn node_count(&self) -> usize {
        match self {
            Node::Category(children) => {
                1 + children.values().map(Node::node_count).sum::<usize>()
            }
            Node::Leaf(_) => 1,
        }
    }
}

/// Merge an incoming node into an existing one.
///
/// Lists combine with case-folded sorted deduplication; categories merge
/// recursively. Mismatched kinds keep the existing node.
pub fn merge_nodes(existing: &mut Node, incoming: Node) {
    match (existing, incoming) {
        (Node::Leaf(a), Node::Leaf(b)) => {
            a.extend(b);
            dedup_casefold(a);
        }
        (Node::Category(a), Node::Category(b)) => {
            for (key, value) in b {
                match a.entry(key) {
                    Entry::Occupied(mut slot) => merge_nodes(slot.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        // Kind conflict: the first writer wins.
        (_, _) => {}
    }
}

/// Sort terms case-insensitively and drop duplicates (case-sensitive identity)
pub fn dedup_casefold(terms: &mut Vec<String>) {
    terms.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
    terms.dedup();
}

// ============================================================================
// ANNOTATIONS
// ============================================================================

/// Separator for label paths in the annotation side-channel
const PATH_SEP: char = '/';

/// Join a label path into an annotation key
pub fn join_path(parts: &[String]) -> String {
    parts.join(&PATH_SEP.to_string())
}

/// Extend a label path by one key
pub fn child_path(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}{PATH_SEP}{key}")
    }
}

/// Side-channel instruction annotations, keyed by label path.
///
/// Stored separately from the node tree so structural passes can rename and
/// promote freely; the serializer renders each entry as an end-of-line
/// `instruction: <text>` comment on the matching key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    entries: BTreeMap<String, String>,
}

impl Annotations {
    /// Create an empty annotation map
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an instruction to a label path (first writer wins)
    pub fn set(&mut self, path: impl Into<String>, instruction: impl Into<String>) {
        self.entries.entry(path.into()).or_insert_with(|| instruction.into());
    }

    /// Look up the instruction for a label path
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Number of annotated paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no paths are annotated
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over (path, instruction) pairs in path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Move the annotation at `old` (and every descendant path) to `new`.
    ///
    /// Existing annotations at the destination are kept.
    pub fn rename(&mut self, old: &str, new: &str) {
        if old == new {
            return;
        }
        let prefix = format!("{old}{PATH_SEP}");
        let moved: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|(k, _)| k.as_str() == old || k.starts_with(&prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in moved {
            self.entries.remove(&key);
            let dest = if key == old {
                new.to_string()
            } else if new.is_empty() {
                key[prefix.len()..].to_string()
            } else {
                format!("{new}{PATH_SEP}{}", &key[prefix.len()..])
            };
            if !dest.is_empty() {
                self.entries.entry(dest).or_insert(value);
            }
        }
    }

    /// Drop the annotation at `path` and every descendant path
    pub fn remove(&mut self, path: &str) {
        let prefix = format!("{path}{PATH_SEP}");
        self.entries
            .retain(|k, _| k != path && !k.starts_with(&prefix));
    }
}

// ============================================================================
// SKELETON
// ============================================================================

/// The final output of a run: a structure tree plus its annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    /// The nested category structure
    pub root: Node,
    /// Instruction side-channel, keyed by label path
    pub annotations: Annotations,
}

// ============================================================================
// TESTS
// ============================================================================
