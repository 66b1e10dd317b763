//! Budget-aware taxonomy traversal
//!
//! Walks a concept source, composing the pruner's flatten decisions with
//! the arranger's re-grouping, and bubbles undersized leaf lists upward as
//! orphans. Each recursive call returns `(value, orphans)`: the node to
//! emit (if any) plus the terms this subtree could not place locally.
//! The traversal budget is the sole early-termination mechanism; when it
//! runs out, the walk returns partial results and records one
//! `limit_reached` event.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::arrange::{ArrangeParams, Arranger, DEFAULT_HIERARCHY_DEPTH, DEFAULT_MAX_LEAF_SIZE};
use crate::concept::{Concept, ConceptSource};
use crate::config::SmartConfig;
use crate::embedding::EncodeError;
use crate::events::{EventCollector, EventKind};
use crate::prune::Pruner;
use crate::resolver::Resolver;
use crate::shape::{ShapeOptions, Shaper};
use crate::structure::{child_path, dedup_casefold, merge_nodes, Annotations, Node, Skeleton};

/// Cap on skip-node child promotions per parent (cycle backstop)
const MAX_SKIP_PROMOTIONS: usize = 1000;

// ============================================================================
// BUDGET
// ============================================================================

/// Monotonic node-visit counter with a fixed limit.
///
/// Not refillable within a run; exhaustion is reported exactly once.
#[derive(Debug, Clone)]
pub struct TraversalBudget {
    limit: Option<u64>,
    used: u64,
    reported: bool,
}

impl TraversalBudget {
    /// Budget allowing `limit` node visits
    pub fn new(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            used: 0,
            reported: false,
        }
    }

    /// Budget without a limit
    pub fn unlimited() -> Self {
        Self {
            limit: None,
            used: 0,
            reported: false,
        }
    }

    /// Budget from a config's preview limit
    pub fn from_config(config: &SmartConfig) -> Self {
        match config.preview_limit {
            Some(limit) => Self::new(limit),
            None => Self::unlimited(),
        }
    }

    /// Spend one visit. Returns false when the budget is exhausted.
    pub fn consume(&mut self) -> bool {
        if let Some(limit) = self.limit {
            if self.used >= limit {
                return false;
            }
        }
        self.used += 1;
        true
    }

    /// Whether the limit has been hit
    pub fn is_exhausted(&self) -> bool {
        self.limit.map(|l| self.used >= l).unwrap_or(false)
    }

    /// Visits spent so far
    pub fn used(&self) -> u64 {
        self.used
    }

    /// The configured limit, if any
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// True exactly once, at the first exhausted call
    fn report_exhausted(&mut self) -> bool {
        if self.reported {
            return false;
        }
        self.reported = true;
        true
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Traversal error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum TraverseError {
    /// Embedding backend failure during arrangement
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// The concept source has no root
    #[error("concept source has no root")]
    EmptySource,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Walks a concept source into an annotated skeleton
pub struct TraversalEngine {
    resolver: Arc<Resolver>,
    pruner: Pruner,
    arranger: Arranger,
    max_depth: Option<usize>,
}

impl TraversalEngine {
    /// Create an engine over a resolver and arranger
    pub fn new(resolver: Arc<Resolver>, arranger: Arranger) -> Self {
        let pruner = Pruner::new(Arc::clone(&resolver));
        Self {
            resolver,
            pruner,
            arranger,
            max_depth: None,
        }
    }

    /// Use a classic depth cutoff when smart pruning is disabled
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Run the full pipeline: traverse from the source root, then shape.
    pub fn run(
        &self,
        source: &dyn ConceptSource,
        config: &SmartConfig,
        events: &mut EventCollector,
    ) -> Result<Skeleton, TraverseError> {
        let root = source.root().ok_or(TraverseError::EmptySource)?;
        let mut budget = TraversalBudget::from_config(config);
        let mut skeleton = self.traverse(&root, config, &mut budget, events)?;

        if config.enabled && (config.min_leaf_size > 0 || config.merge_orphans) {
            let shaper = Shaper::new(ShapeOptions {
                min_leaf_size: config.min_leaf_size,
                flatten_singles: true,
                preserve_roots: true,
                orphans_label_template: Some(config.orphans_label_template.clone()),
            });
            let unshaped = std::mem::replace(&mut skeleton.root, Node::Category(IndexMap::new()));
            skeleton.root = shaper.shape(unshaped, &mut skeleton.annotations);
        }
        Ok(skeleton)
    }

    /// Traverse one root concept into a skeleton, without shaping.
    pub fn traverse(
        &self,
        root: &Arc<dyn Concept>,
        config: &SmartConfig,
        budget: &mut TraversalBudget,
        events: &mut EventCollector,
    ) -> Result<Skeleton, TraverseError> {
        let mut notes = Annotations::new();
        let root_name = root.name().to_string();
        let (value, orphans) =
            self.visit(root, true, 0, config, &root_name, &mut notes, budget, events)?;

        let mut top: IndexMap<String, Node> = IndexMap::new();
        match value {
            Some(Node::Category(mut children)) => {
                if !orphans.is_empty() {
                    let label = config.orphans_label(&root_name);
                    let mut pooled = orphans;
                    dedup_casefold(&mut pooled);
                    attach_leaf(&mut children, &label, pooled);
                }
                top.insert(root_name.clone(), Node::Category(children));
            }
            Some(Node::Leaf(mut terms)) => {
                terms.extend(orphans);
                dedup_casefold(&mut terms);
                top.insert(root_name.clone(), Node::Leaf(terms));
            }
            None => {
                if !orphans.is_empty() {
                    let mut pooled = orphans;
                    dedup_casefold(&mut pooled);
                    top.insert(root_name.clone(), Node::Leaf(pooled));
                }
            }
        }

        if top.contains_key(&root_name) {
            notes.set(&root_name, self.resolver.gloss(root));
        }

        Ok(Skeleton {
            root: Node::Category(top),
            annotations: notes,
        })
    }

    /// Visit one concept. Returns the node to emit under the parent (if
    /// any) and the orphan terms bubbling up past this level.
    #[allow(clippy::too_many_arguments)]
    fn visit(
        &self,
        concept: &Arc<dyn Concept>,
        is_root: bool,
        depth: usize,
        config: &SmartConfig,
        path: &str,
        notes: &mut Annotations,
        budget: &mut TraversalBudget,
        events: &mut EventCollector,
    ) -> Result<(Option<Node>, Vec<String>), TraverseError> {
        if !budget.consume() {
            if budget.report_exhausted() {
                let limit = budget.limit().unwrap_or_default();
                let mut data = Map::new();
                data.insert("limit".to_string(), Value::from(limit));
                events.record(
                    EventKind::LimitReached,
                    format!("traversal limit {limit} reached"),
                    None,
                    Some(data),
                );
            }
            return Ok((None, vec![]));
        }

        let name = concept.name().to_string();
        let children = concept.children();

        // A bare leaf is an item for the parent to place
        if children.is_empty() {
            return Ok((None, vec![name]));
        }

        let should_flatten = if config.enabled {
            self.pruner
                .should_flatten(concept, children.len(), is_root, config)
        } else {
            self.max_depth.map(|d| depth >= d).unwrap_or(false)
        };

        if should_flatten {
            let leaves = (*self.resolver.descendants(concept, None)).clone();
            return self.emit_flattened(&name, leaves, Vec::new(), config, path, notes, events);
        }

        // Skip-node elision: promote children of skip-listed nodes in
        // place, breadth-first, bounded against pathological cycles
        let mut effective: Vec<Arc<dyn Concept>> = Vec::new();
        let mut queue: VecDeque<Arc<dyn Concept>> = children.into();
        let mut promoted = 0_usize;
        while let Some(child) = queue.pop_front() {
            let skip = config.enabled
                && config.is_skipped(child.id(), child.name(), &child.lemmas());
            if skip && promoted < MAX_SKIP_PROMOTIONS {
                queue.extend(child.children());
                promoted += 1;
            } else {
                effective.push(child);
            }
        }

        let mut emitted: IndexMap<String, Node> = IndexMap::new();
        let mut orphans: Vec<String> = Vec::new();
        let mut placed = 0_usize;

        for child in effective {
            let child_name = child.name().to_string();
            let child_config: Cow<'_, SmartConfig> =
                match config.child_config(&child_name, Some(child.id())) {
                    Some(overridden) => Cow::Owned(overridden),
                    None => Cow::Borrowed(config),
                };

            let (value, child_orphans) = self.visit(
                &child,
                false,
                depth + 1,
                &child_config,
                &child_path(path, &child_name),
                notes,
                budget,
                events,
            )?;
            orphans.extend(child_orphans);

            let Some(value) = value else {
                continue;
            };
            match emitted.entry(child_name.clone()) {
                Entry::Occupied(mut slot) => merge_nodes(slot.get_mut(), value),
                Entry::Vacant(slot) => {
                    slot.insert(value);
                    notes.set(child_path(path, &child_name), self.resolver.gloss(&child));
                    placed += 1;
                }
            }
        }

        // Nothing placed: this node dissolves into a flat list of whatever
        // bubbled up (plus, outside smart mode, its own descendants)
        if placed == 0 {
            // An exhausted budget must not turn into a descendant sweep;
            // only what was actually visited may surface
            if budget.is_exhausted() {
                return Ok((None, orphans));
            }
            let leaves = if config.enabled {
                Vec::new()
            } else {
                (*self.resolver.descendants(concept, None)).clone()
            };
            return self.emit_flattened(&name, leaves, orphans, config, path, notes, events);
        }

        // Place orphans from children under this category
        if !orphans.is_empty() {
            dedup_casefold(&mut orphans);
            if config.enabled && config.semantic_cleanup {
                orphans = self.arranger.clean_list(
                    &orphans,
                    config.semantic_threshold,
                    Some(&name),
                    events,
                );
            }

            if config.enabled && config.semantic_arrangement && !orphans.is_empty() {
                let context = format!("orphans of {name}");
                let arrangement = self.arranger.arrange_list(
                    &orphans,
                    &ArrangeParams::from_config(config),
                    Some(&context),
                    events,
                )?;
                if !arrangement.groups.is_empty() {
                    for (group, terms) in arrangement.groups {
                        self.annotate_group(path, &group, notes);
                        attach_leaf(&mut emitted, &group, terms);
                    }
                    orphans = arrangement.leftovers;
                }
            }

            if !orphans.is_empty() {
                let label = config.orphans_label(&name);
                notes.set(
                    child_path(path, &label),
                    format!("Miscellaneous {name} items"),
                );
                attach_leaf(&mut emitted, &label, orphans);
            }
        }

        Ok((Some(Node::Category(emitted)), vec![]))
    }

    /// Emit a flattened subtree: filter, clean, bubble-or-arrange.
    #[allow(clippy::too_many_arguments)]
    fn emit_flattened(
        &self,
        name: &str,
        leaves: Vec<String>,
        extra: Vec<String>,
        config: &SmartConfig,
        path: &str,
        notes: &mut Annotations,
        events: &mut EventCollector,
    ) -> Result<(Option<Node>, Vec<String>), TraverseError> {
        let normalized_name = name.to_lowercase();
        let mut terms = leaves;
        terms.extend(extra);
        terms.retain(|t| t.to_lowercase() != normalized_name);
        dedup_casefold(&mut terms);

        if config.enabled && config.semantic_cleanup {
            terms = self
                .arranger
                .clean_list(&terms, config.semantic_threshold, Some(name), events);
        }

        if config.enabled && terms.len() < config.min_leaf_size {
            if config.merge_orphans {
                return Ok((None, terms));
            }
            return Ok(((!terms.is_empty()).then_some(Node::Leaf(terms)), vec![]));
        }

        if config.enabled && config.semantic_arrangement {
            let node = self.arranger.arrange_hierarchy(
                &terms,
                DEFAULT_HIERARCHY_DEPTH,
                DEFAULT_MAX_LEAF_SIZE,
                &ArrangeParams::from_config(config),
                Some(name),
                events,
            )?;
            return Ok(match node {
                Node::Category(groups) => {
                    for group in groups.keys() {
                        self.annotate_group(path, group, notes);
                    }
                    (Some(Node::Category(groups)), vec![])
                }
                Node::Leaf(list) if list.is_empty() => (None, vec![]),
                leaf => (Some(leaf), vec![]),
            });
        }

        Ok(((!terms.is_empty()).then_some(Node::Leaf(terms)), vec![]))
    }

    /// Attach a gloss to an arranged group key when its name resolves
    fn annotate_group(&self, path: &str, group: &str, notes: &mut Annotations) {
        if let Some(sense) = self.resolver.primary_sense(group) {
            if let Some(gloss) = sense.gloss() {
                notes.set(child_path(path, group), gloss);
            }
        }
    }
}

/// Insert a leaf under `label`, merging with any existing node
fn attach_leaf(map: &mut IndexMap<String, Node>, label: &str, mut terms: Vec<String>) {
    dedup_casefold(&mut terms);
    if terms.is_empty() {
        return;
    }
    match map.entry(label.to_string()) {
        Entry::Occupied(mut slot) => merge_nodes(slot.get_mut(), Node::Leaf(terms)),
        Entry::Vacant(slot) => {
            slot.insert(Node::Leaf(terms));
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::TaxonomySource;
    use crate::embedding::{EmbeddingCache, HashingEncoder};
    use crate::reduce::ReductionCache;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// entity -> (animal -> (canine -> dog/wolf, feline -> cat/lion),
    ///            food -> (fruit -> apple/banana, bread))
    fn sample_source() -> TaxonomySource {
        let mut b = TaxonomySource::builder();
        b.concept("n001", "entity")
            .concept("n010", "animal")
            .gloss("n010", "a living organism")
            .concept("n011", "canine")
            .gloss("n011", "a doglike carnivore")
            .concept("n012", "feline")
            .concept("n013", "dog")
            .concept("n014", "wolf")
            .concept("n015", "cat")
            .concept("n016", "lion")
            .concept("n020", "food")
            .concept("n021", "fruit")
            .concept("n022", "apple")
            .concept("n023", "banana")
            .concept("n024", "bread")
            .edge("n001", "n010")
            .edge("n001", "n020")
            .edge("n010", "n011")
            .edge("n010", "n012")
            .edge("n011", "n013")
            .edge("n011", "n014")
            .edge("n012", "n015")
            .edge("n012", "n016")
            .edge("n020", "n021")
            .edge("n020", "n024")
            .edge("n021", "n022")
            .edge("n021", "n023");
        b.build().unwrap()
    }

    fn engine_for(source: &TaxonomySource) -> TraversalEngine {
        let resolver = Arc::new(Resolver::new(Arc::new(source.clone())));
        let cache = Arc::new(EmbeddingCache::in_memory(Box::new(HashingEncoder::default())));
        let arranger = Arranger::with_backends(
            cache,
            Arc::clone(&resolver),
            ReductionCache::new(None),
            Box::new(crate::cluster::DensityClusterer),
        );
        TraversalEngine::new(resolver, arranger)
    }

    #[test]
    fn test_budget_consume_and_exhaustion() {
        let mut budget = TraversalBudget::new(2);
        assert!(budget.consume());
        assert!(budget.consume());
        assert!(!budget.consume());
        assert!(budget.is_exhausted());
        assert_eq!(budget.used(), 2);
        assert!(budget.report_exhausted());
        assert!(!budget.report_exhausted());

        let mut unlimited = TraversalBudget::unlimited();
        for _ in 0..1000 {
            assert!(unlimited.consume());
        }
        assert!(!unlimited.is_exhausted());
    }

    #[test]
    fn test_plain_traversal_emits_full_tree() {
        let source = sample_source();
        let engine = engine_for(&source);
        let mut events = EventCollector::new();
        let config = SmartConfig::default();

        let skeleton = engine.run(&source, &config, &mut events).unwrap();
        let top = skeleton.root.as_category().unwrap();
        let entity = top["entity"].as_category().unwrap();
        let animal = entity["animal"].as_category().unwrap();
        assert_eq!(
            animal["canine"].as_leaf().unwrap(),
            &["dog", "wolf"]
        );
        assert_eq!(animal["feline"].as_leaf().unwrap(), &["cat", "lion"]);
        // Instruction side-channel carries the gloss
        assert_eq!(
            skeleton.annotations.get("entity/animal"),
            Some("a living organism")
        );
        assert_eq!(
            skeleton.annotations.get("entity/animal/canine"),
            Some("a doglike carnivore")
        );
        // Missing glosses fall back to a readable default
        assert_eq!(
            skeleton.annotations.get("entity/food"),
            Some("Items related to food")
        );
    }

    #[test]
    fn test_depth_rule_flattens_when_disabled() {
        let source = sample_source();
        let engine = engine_for(&source).with_max_depth(1);
        let mut events = EventCollector::new();
        let config = SmartConfig::default();

        let skeleton = engine.run(&source, &config, &mut events).unwrap();
        let top = skeleton.root.as_category().unwrap();
        let entity = top["entity"].as_category().unwrap();
        // Children of the root hit the depth cutoff and flatten
        assert_eq!(
            entity["animal"].as_leaf().unwrap(),
            &["canine", "cat", "dog", "feline", "lion", "wolf"]
        );
        assert_eq!(
            entity["food"].as_leaf().unwrap(),
            &["apple", "banana", "bread", "fruit"]
        );
    }

    #[test]
    fn test_smart_flattening_with_orphan_merge() {
        let source = sample_source();
        let engine = engine_for(&source);
        let mut events = EventCollector::new();
        // Everything below the root is insignificant; subtrees of fewer
        // than 7 descendants bubble up as orphans
        let config = SmartConfig {
            enabled: true,
            min_depth: 0,
            min_hyponyms: 100,
            min_leaf_size: 7,
            merge_orphans: true,
            ..Default::default()
        };

        let mut budget = TraversalBudget::unlimited();
        let root = source.root().unwrap();
        let skeleton = engine.traverse(&root, &config, &mut budget, &mut events).unwrap();
        let top = skeleton.root.as_category().unwrap();
        // animal (6 descendants) and food (4) both bubbled; the dissolved
        // root emits the pooled terms as one flat list
        let entity = top["entity"].as_leaf().unwrap();
        assert_eq!(
            entity,
            &[
                "apple", "banana", "bread", "canine", "cat", "dog", "feline", "fruit", "lion",
                "wolf"
            ]
        );
    }

    #[test]
    fn test_skip_nodes_promote_children() {
        let source = sample_source();
        let engine = engine_for(&source);
        let mut events = EventCollector::new();
        let config = SmartConfig {
            enabled: true,
            min_depth: 10,
            min_hyponyms: 2,
            min_leaf_size: 1,
            skip_nodes: ["animal".to_string()].into_iter().collect(),
            ..Default::default()
        };

        let skeleton = engine.run(&source, &config, &mut events).unwrap();
        let top = skeleton.root.as_category().unwrap();
        let entity = top["Entity"].as_category().unwrap();
        // "animal" was elided; canine and feline surface as direct children
        assert!(!entity.contains_key("Animal"));
        assert!(entity.contains_key("Canine"));
        assert!(entity.contains_key("Feline"));
        assert!(entity.contains_key("Food"));
    }

    #[test]
    fn test_budget_truncation_records_one_event() {
        // A wide tree of 1000 nodes under one root
        let mut b = TaxonomySource::builder();
        b.concept("root", "everything");
        for i in 0..40 {
            let branch = format!("branch{i}");
            b.concept(&branch, &format!("branch {i}"));
            b.edge("root", &branch);
            for j in 0..24 {
                let leaf = format!("leaf{i}_{j}");
                b.concept(&leaf, &format!("item {i} {j}"));
                b.edge(&branch, &leaf);
            }
        }
        let source = b.build().unwrap();
        assert_eq!(source.len(), 1 + 40 + 40 * 24);

        let engine = engine_for(&source);
        let mut events = EventCollector::new();
        let config = SmartConfig {
            preview_limit: Some(500),
            ..Default::default()
        };

        let mut budget = TraversalBudget::from_config(&config);
        let root = source.root().unwrap();
        let skeleton = engine
            .traverse(&root, &config, &mut budget, &mut events)
            .unwrap();

        assert_eq!(events.count_of(EventKind::LimitReached), 1);
        assert!(budget.used() <= 500);
        // The partial structure holds no more terms than visits spent
        assert!(skeleton.root.terms().len() <= 500);
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let source = sample_source();
        let config = SmartConfig {
            enabled: true,
            min_depth: 2,
            min_hyponyms: 3,
            min_leaf_size: 1,
            ..Default::default()
        };

        let engine = engine_for(&source);
        let mut events_a = EventCollector::new();
        let first = engine.run(&source, &config, &mut events_a).unwrap();

        let engine = engine_for(&source);
        let mut events_b = EventCollector::new();
        let second = engine.run(&source, &config, &mut events_b).unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_empty_source_errors() {
        let source = TaxonomySource::builder().build().unwrap();
        let engine = engine_for(&sample_source());
        let mut events = EventCollector::new();
        assert!(matches!(
            engine.run(&source, &SmartConfig::default(), &mut events),
            Err(TraverseError::EmptySource)
        ));
    }
}
