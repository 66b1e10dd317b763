//! Dimensionality reduction with a bounded projection cache
//!
//! Density clustering works best on a low-dimensional manifold, but
//! projections are expensive, so results are cached by input content and
//! parameters. The reducer itself is a pluggable seam; the built-in default
//! is a deterministic variance-preserving linear projection. Inputs too
//! small for the configured neighborhood pass through untouched and are not
//! cached, as does everything when no reducer is installed.

use std::collections::{HashMap, VecDeque};

// ============================================================================
// REDUCER TRAIT
// ============================================================================

/// Projects embeddings down to `components` dimensions
pub trait Reducer: Send + Sync {
    /// Reduce a matrix; rows are preserved in order
    fn reduce(
        &self,
        embeddings: &[Vec<f32>],
        neighbors: usize,
        min_dist: f32,
        components: usize,
    ) -> Vec<Vec<f32>>;
}

// ============================================================================
// PCA REDUCER
// ============================================================================

const POWER_ITERATIONS: usize = 50;

/// Principal-component projection via deterministic power iteration.
///
/// The neighborhood parameters do not affect a linear projection; they
/// remain part of the seam (and the cache key) for manifold reducers.
#[derive(Debug, Clone, Default)]
pub struct PcaReducer;

impl Reducer for PcaReducer {
    fn reduce(
        &self,
        embeddings: &[Vec<f32>],
        _neighbors: usize,
        _min_dist: f32,
        components: usize,
    ) -> Vec<Vec<f32>> {
        let rows = embeddings.len();
        let Some(first) = embeddings.first() else {
            return Vec::new();
        };
        let dims = first.len();
        if components == 0 || components >= dims || rows < 2 {
            return embeddings.to_vec();
        }

        // Center the data
        let mean = crate::embedding::mean_vector(embeddings);
        let centered: Vec<Vec<f32>> = embeddings
            .iter()
            .map(|row| row.iter().zip(&mean).map(|(x, m)| x - m).collect())
            .collect();

        // Top components by power iteration with deflation
        let mut axes: Vec<Vec<f32>> = Vec::with_capacity(components);
        let mut residual = centered.clone();
        let start = 1.0 / (dims as f32).sqrt();
        for _ in 0..components {
            let mut axis = vec![start; dims];
            for _ in 0..POWER_ITERATIONS {
                let mut next = vec![0.0_f32; dims];
                for row in &residual {
                    let projection = dot(row, &axis);
                    for (slot, value) in next.iter_mut().zip(row) {
                        *slot += projection * value;
                    }
                }
                let norm = dot(&next, &next).sqrt();
                if norm < 1e-9 {
                    break;
                }
                for slot in &mut next {
                    *slot /= norm;
                }
                axis = next;
            }

            for row in &mut residual {
                let projection = dot(row, &axis);
                for (slot, value) in row.iter_mut().zip(&axis) {
                    *slot -= projection * value;
                }
            }
            axes.push(axis);
        }

        centered
            .iter()
            .map(|row| axes.iter().map(|axis| dot(row, axis)).collect())
            .collect()
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// REDUCTION CACHE
// ============================================================================

/// Default number of cached projections
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

type ReductionKey = (String, usize, u32, usize);

/// Bounded projection cache keyed by (input content, neighbors, min_dist,
/// components). When full, the oldest entry by insertion order is evicted.
pub struct ReductionCache {
    reducer: Option<Box<dyn Reducer>>,
    capacity: usize,
    entries: HashMap<ReductionKey, Vec<Vec<f32>>>,
    order: VecDeque<ReductionKey>,
}

impl ReductionCache {
    /// Create a cache with the default capacity
    pub fn new(reducer: Option<Box<dyn Reducer>>) -> Self {
        Self::with_capacity(reducer, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a cache with an explicit capacity
    pub fn with_capacity(reducer: Option<Box<dyn Reducer>>, capacity: usize) -> Self {
        Self {
            reducer,
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Number of cached projections
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reduce a matrix, reusing a cached projection when available.
    ///
    /// Inputs with fewer rows than `neighbors + 1` are returned verbatim
    /// and not cached; the same holds when no reducer is installed.
    pub fn reduce(
        &mut self,
        embeddings: &[Vec<f32>],
        neighbors: usize,
        min_dist: f32,
        components: usize,
    ) -> Vec<Vec<f32>> {
        if embeddings.len() < neighbors + 1 {
            return embeddings.to_vec();
        }
        let Some(reducer) = &self.reducer else {
            return embeddings.to_vec();
        };

        let key = (
            content_hash(embeddings),
            neighbors,
            min_dist.to_bits(),
            components,
        );
        if let Some(hit) = self.entries.get(&key) {
            tracing::debug!("Projection cache hit for {} rows", embeddings.len());
            return hit.clone();
        }

        let reduced = reducer.reduce(embeddings, neighbors, min_dist, components);

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key.clone(), reduced.clone());
        self.order.push_back(key);

        reduced
    }
}

fn content_hash(embeddings: &[Vec<f32>]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(embeddings.len() as u64).to_le_bytes());
    for row in embeddings {
        for value in row {
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

// ============================================================================
// TESTS
// ============================================================================
