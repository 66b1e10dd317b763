//! Structural normalization
//!
//! The final pass over a generated structure: pool undersized sibling lists
//! into a contextually-labeled bucket, collapse tautological wrappers,
//! promote single-child categories, and normalize casing. Shaping is
//! idempotent and never fails on structural quirks; nodes it does not
//! understand pass through unchanged.

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::keywords::{contextual_label, title_case};
use crate::structure::{child_path, Annotations, Node};

/// Keys treated as generic miscellaneous bins
const GENERIC_BINS: &[&str] = &["other", "misc"];

/// Upper bound on fixpoint iterations; real structures settle in two or
/// three rounds
const MAX_SHAPE_ROUNDS: usize = 5;

// ============================================================================
// OPTIONS
// ============================================================================

/// Tuning for a shaping run
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeOptions {
    /// Sibling lists shorter than this are pooled into the orphan bucket
    pub min_leaf_size: usize,
    /// Promote single-child categories
    pub flatten_singles: bool,
    /// Keep the top-level wrapper even when it has a single entry
    pub preserve_roots: bool,
    /// Orphan bucket label; `{}` is replaced by the parent key.
    /// Defaults to "Other" when unset.
    pub orphans_label_template: Option<String>,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            min_leaf_size: 10,
            flatten_singles: true,
            preserve_roots: true,
            orphans_label_template: None,
        }
    }
}

/// Contextual labeling callback: (orphans, context, fallback) -> label
pub type Labeler = dyn Fn(&[String], &[String], &str) -> String + Send + Sync;

// ============================================================================
// SHAPER
// ============================================================================

/// Post-processing pass enforcing the output's structural invariants
pub struct Shaper {
    options: ShapeOptions,
    labeler: Box<Labeler>,
}

impl Shaper {
    /// Create a shaper with TF-IDF contextual labeling
    pub fn new(options: ShapeOptions) -> Self {
        Self::with_labeler(
            options,
            Box::new(|orphans, context, fallback| contextual_label(orphans, context, fallback)),
        )
    }

    /// Create a shaper with an explicit labeling callback
    pub fn with_labeler(options: ShapeOptions, labeler: Box<Labeler>) -> Self {
        Self { options, labeler }
    }

    /// Run the shaping passes until the structure stabilizes.
    ///
    /// Later passes can create new undersized lists (a flattened single
    /// child, for instance), so the pass round repeats until a fixpoint;
    /// that is what makes shaping idempotent.
    pub fn shape(&self, node: Node, notes: &mut Annotations) -> Node {
        let mut current = node;
        for _ in 0..MAX_SHAPE_ROUNDS {
            let next = self.shape_round(current.clone(), notes);
            if next == current {
                return next;
            }
            current = next;
        }
        current
    }

    fn shape_round(&self, node: Node, notes: &mut Annotations) -> Node {
        let node = self.merge_orphans(node, "", notes);
        let node = self.prune_tautologies(node, "", notes);
        let node = if self.options.flatten_singles {
            self.flatten_singles(node, self.options.preserve_roots, "", notes)
        } else {
            node
        };
        self.normalize_casing(node, "", notes)
    }

    // ------------------------------------------------------------------
    // Pass 1: orphan merge
    // ------------------------------------------------------------------

    fn merge_orphans(&self, node: Node, path: &str, notes: &mut Annotations) -> Node {
        let children = match node {
            Node::Leaf(mut terms) => {
                terms.sort();
                return Node::Leaf(terms);
            }
            Node::Category(children) => children,
        };

        let mut processed: IndexMap<String, Node> = IndexMap::new();
        for (key, value) in children {
            let merged = self.merge_orphans(value, &child_path(path, &key), notes);
            processed.insert(key, merged);
        }

        let mut small_keys: Vec<String> = Vec::new();
        let mut orphan_items: Vec<String> = Vec::new();
        let mut context_items: Vec<String> = Vec::new();
        for (key, value) in &processed {
            let Node::Leaf(terms) = value else {
                continue;
            };
            if terms.len() < self.options.min_leaf_size || is_generic_key(key) {
                small_keys.push(key.clone());
                orphan_items.extend(terms.iter().cloned());
            } else {
                context_items.extend(terms.iter().cloned());
            }
        }
        if small_keys.is_empty() {
            return Node::Category(processed);
        }

        let base = self
            .options
            .orphans_label_template
            .as_deref()
            .unwrap_or("Other");
        let parent_key = path.rsplit('/').next().unwrap_or("");
        let base = if base.contains("{}") {
            base.replace("{}", parent_key)
        } else {
            base.to_string()
        };

        let is_generic = GENERIC_BINS.contains(&base.to_lowercase().as_str());
        let label = if is_generic {
            (self.labeler)(&orphan_items, &context_items, &base)
        } else {
            base
        };

        // The destination must not merge into itself
        small_keys.retain(|k| k != &label);

        if !processed.contains_key(&label) {
            processed.insert(label.clone(), Node::Leaf(Vec::new()));
            notes.set(child_path(path, &label), bucket_instruction(&label, is_generic));
        }

        // A pre-existing sub-category under the chosen label blocks the
        // merge; the small lists stay where they are rather than vanish
        if matches!(processed.get(&label), Some(Node::Leaf(_))) {
            let mut pooled: Vec<String> = Vec::new();
            for key in &small_keys {
                if let Some(Node::Leaf(terms)) = processed.shift_remove(key) {
                    pooled.extend(terms);
                }
                notes.remove(&child_path(path, key));
            }
            if let Some(Node::Leaf(terms)) = processed.get_mut(&label) {
                terms.extend(pooled);
                crate::structure::dedup_casefold(terms);
            }
        }

        Node::Category(processed)
    }

    // ------------------------------------------------------------------
    // Pass 2: tautology prune
    // ------------------------------------------------------------------

    fn prune_tautologies(&self, node: Node, path: &str, notes: &mut Annotations) -> Node {
        let children = match node {
            Node::Category(children) => children,
            other => return other,
        };

        let mut out: IndexMap<String, Node> = IndexMap::new();
        for (key, value) in children {
            let key_path = child_path(path, &key);
            let value = self.prune_tautologies(value, &key_path, notes);

            let Node::Category(mut inner) = value else {
                out.insert(key, value);
                continue;
            };

            let normalized = key.trim().to_lowercase();
            let duplicate = inner
                .keys()
                .find(|ck| ck.trim().to_lowercase() == normalized)
                .cloned();

            match duplicate {
                Some(child_key) if inner.len() == 1 => {
                    // The only child repeats the parent label; promote it
                    let promoted = inner.shift_remove(&child_key).expect("key just found");
                    notes.rename(&child_path(&key_path, &child_key), &key_path);
                    out.insert(key, promoted);
                }
                Some(child_key) => {
                    // Siblings exist: rename the duplicate to keep content
                    let renamed = format!("General {key}");
                    if let Some(dup) = inner.shift_remove(&child_key) {
                        notes.rename(
                            &child_path(&key_path, &child_key),
                            &child_path(&key_path, &renamed),
                        );
                        inner.insert(renamed, dup);
                    }
                    out.insert(key, Node::Category(inner));
                }
                None => {
                    out.insert(key, Node::Category(inner));
                }
            }
        }
        Node::Category(out)
    }

    // ------------------------------------------------------------------
    // Pass 3: flatten singles
    // ------------------------------------------------------------------

    fn flatten_singles(
        &self,
        node: Node,
        is_root: bool,
        path: &str,
        notes: &mut Annotations,
    ) -> Node {
        let children = match node {
            Node::Category(children) => children,
            other => return other,
        };

        let mut out: IndexMap<String, Node> = IndexMap::new();
        for (key, value) in children {
            let flattened = self.flatten_singles(value, false, &child_path(path, &key), notes);
            out.insert(key, flattened);
        }

        if out.len() != 1 || is_root {
            return Node::Category(out);
        }

        let (key, value) = out.pop().expect("single entry");
        match value {
            Node::Leaf(terms) => {
                // A leaf wrapper keeps its category name unless generic
                if GENERIC_BINS.contains(&key.to_lowercase().as_str()) {
                    notes.rename(&child_path(path, &key), path);
                    Node::Leaf(terms)
                } else {
                    out.insert(key, Node::Leaf(terms));
                    Node::Category(out)
                }
            }
            sub_category => {
                // Promote the sole sub-category
                notes.rename(&child_path(path, &key), path);
                sub_category
            }
        }
    }

    // ------------------------------------------------------------------
    // Pass 4: casing normalization
    // ------------------------------------------------------------------

    fn normalize_casing(&self, node: Node, path: &str, notes: &mut Annotations) -> Node {
        let children = match node {
            Node::Leaf(terms) => {
                let mut lowered: Vec<String> =
                    terms.iter().map(|t| t.to_lowercase()).collect();
                lowered.sort();
                lowered.dedup();
                return Node::Leaf(lowered);
            }
            Node::Category(children) => children,
        };

        let mut out: IndexMap<String, Node> = IndexMap::new();
        for (key, value) in children {
            let titled = title_case(&key);
            notes.rename(&child_path(path, &key), &child_path(path, &titled));
            let normalized = self.normalize_casing(value, &child_path(path, &titled), notes);

            if normalized.is_empty() {
                notes.remove(&child_path(path, &titled));
                continue;
            }

            match out.entry(titled) {
                Entry::Occupied(mut slot) => merge_normalized(slot.get_mut(), normalized),
                Entry::Vacant(slot) => {
                    slot.insert(normalized);
                }
            }
        }
        Node::Category(out)
    }
}

/// Merge two normalized values that collided under one title-cased key:
/// lists dedup-merge, categories merge per key, mismatched kinds keep the
/// incoming value.
fn merge_normalized(existing: &mut Node, incoming: Node) {
    match (&mut *existing, incoming) {
        (Node::Leaf(a), Node::Leaf(b)) => {
            a.extend(b);
            a.sort();
            a.dedup();
        }
        (Node::Category(a), Node::Category(b)) => {
            for (key, value) in b {
                match a.entry(key) {
                    Entry::Occupied(mut slot) => merge_normalized(slot.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

fn is_generic_key(key: &str) -> bool {
    GENERIC_BINS.contains(&key.to_lowercase().as_str())
        || key.starts_with("Other (")
        || key.starts_with("misc (")
}

fn bucket_instruction(label: &str, is_generic: bool) -> String {
    if is_generic {
        if let Some(inner) = paren_content(label) {
            return format!("Miscellaneous {inner} items");
        }
        return "Miscellaneous items".to_string();
    }
    format!("Miscellaneous {label}")
}

fn paren_content(label: &str) -> Option<&str> {
    let start = label.find('(')?;
    let end = label[start..].find(')')? + start;
    let inner = label[start + 1..end].trim();
    (!inner.is_empty()).then_some(inner)
}

// ============================================================================
// TESTS
// ============================================================================
