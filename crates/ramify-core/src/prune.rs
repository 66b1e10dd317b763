//! Semantic significance pruning
//!
//! Decides per concept whether to keep it as a category or flatten its
//! subtree into a list. A concept earns a category when it is shallow in
//! the lexical graph (fundamental) or rich in descendants (useful for
//! organization); linear chains and skip-listed nodes always flatten.

use std::sync::Arc;

use crate::concept::Concept;
use crate::config::SmartConfig;
use crate::resolver::Resolver;

// ============================================================================
// PRUNER
// ============================================================================

/// Flatten-or-keep decisions over a lexical resolver
pub struct Pruner {
    resolver: Arc<Resolver>,
}

impl Pruner {
    /// Create a pruner over a resolver
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// Whether a concept is structurally important enough to keep as a
    /// category: shallow in the hierarchy, or with enough transitive
    /// hyponyms.
    pub fn is_significant(&self, concept: &Arc<dyn Concept>, config: &SmartConfig) -> bool {
        if !config.enabled {
            return false;
        }
        if concept.depth() <= config.min_depth {
            return true;
        }
        self.resolver.hyponym_count(concept) >= config.min_hyponyms
    }

    /// Whether a node should be flattened into a leaf list.
    ///
    /// Evaluated in order: disabled config defers to the caller's depth
    /// rule, roots are never flattened, skip-listed nodes always are,
    /// linear chains (one child or fewer) always are, significant concepts
    /// never are, and everything else flattens.
    pub fn should_flatten(
        &self,
        concept: &Arc<dyn Concept>,
        child_count: usize,
        is_root: bool,
        config: &SmartConfig,
    ) -> bool {
        if !config.enabled {
            return false;
        }
        if is_root {
            return false;
        }
        if config.is_skipped(concept.id(), concept.name(), &concept.lemmas()) {
            return true;
        }
        // A single-child chain only adds noise depth
        if child_count <= 1 {
            return true;
        }
        if self.is_significant(concept, config) {
            return false;
        }
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================
