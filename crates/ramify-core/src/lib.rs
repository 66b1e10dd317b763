//! # Ramify Core
//!
//! Taxonomy shaping engine. Transforms large, flat label vocabularies into
//! clean nested taxonomies ready for prompt templating:
//!
//! - **Significance Pruning**: keep concepts that are shallow or rich in
//!   descendants as categories, flatten the rest
//! - **Semantic Arrangement**: re-group flattened lists via embedding-based
//!   density clustering with a two-pass recovery stage
//! - **Hybrid Cluster Naming**: lexical-ancestor / medoid-hypernym / TF-IDF
//!   cascade with collision handling
//! - **Structural Shaping**: orphan merging, tautology pruning,
//!   single-child flattening, casing normalization
//! - **Two-Tier Embedding Cache**: in-memory plus a process-safe SQLite
//!   store shared between workers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ramify_core::prelude::*;
//!
//! let source: TaxonomySource = build_concept_graph()?;
//! let resolver = Arc::new(Resolver::new(Arc::new(source.clone())));
//! let cache = Arc::new(EmbeddingCache::in_memory(Box::new(HashingEncoder::default())));
//! let arranger = Arranger::new(cache, Arc::clone(&resolver));
//! let engine = TraversalEngine::new(resolver, arranger);
//!
//! let mut events = EventCollector::new();
//! let skeleton = engine.run(&source, &SmartPreset::Balanced.config(), &mut events)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `embeddings` (default): local embedding generation with fastembed
//! - `bundled-sqlite` (default): bundled SQLite for the persistent cache

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod analyze;
pub mod arrange;
pub mod cluster;
pub mod concept;
pub mod config;
pub mod embedding;
pub mod events;
pub mod keywords;
pub mod namer;
pub mod prune;
pub mod reduce;
pub mod resolver;
pub mod shape;
pub mod structure;
pub mod traverse;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Structure types
pub use structure::{child_path, merge_nodes, Annotations, Node, Skeleton};

// Configuration
pub use config::{CategoryOverride, SelectionMethod, SemanticModel, SmartConfig, SmartPreset};

// Concept graph
pub use concept::{Concept, ConceptSource, TaxonomyBuilder, TaxonomyError, TaxonomySource};

// Lexical resolution
pub use resolver::Resolver;

// Embeddings
pub use embedding::{
    cosine_similarity, euclidean_distance, EmbeddingCache, EncodeError, Encoder, HashingEncoder,
};

#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
pub use embedding::FastembedEncoder;

// Reduction & clustering
pub use cluster::{ClusterParams, Clusterer, Clustering, DensityClusterer};
pub use reduce::{PcaReducer, Reducer, ReductionCache};

// Naming & arrangement
pub use arrange::{ArrangeParams, Arrangement, Arranger};
pub use namer::{ClusterMeta, ClusterNamer, NameSource};

// Pruning & traversal
pub use prune::Pruner;
pub use traverse::{TraversalBudget, TraversalEngine, TraverseError};

// Shaping & analysis
pub use analyze::{compute_stats, suggest_thresholds, StructureStats, ThresholdSuggestion};
pub use shape::{ShapeOptions, Shaper};

// Events
pub use events::{Event, EventCollector, EventKind};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Annotations, ArrangeParams, Arranger, EmbeddingCache, EventCollector, EventKind,
        HashingEncoder, Node, Resolver, ShapeOptions, Shaper, Skeleton, SmartConfig, SmartPreset,
        TaxonomySource, TraversalBudget, TraversalEngine,
    };
}
