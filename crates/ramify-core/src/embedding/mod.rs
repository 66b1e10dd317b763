//! Semantic embeddings
//!
//! Provides the pluggable encoder seam, vector math helpers, and the
//! two-tier (memory + SQLite) embedding cache keyed by term-set content.

mod cache;
mod encoder;

pub use cache::{EmbeddingCache, DEFAULT_DB_FILE};
pub use encoder::{
    default_encoder, EncodeError, Encoder, HashingEncoder, BATCH_SIZE, MAX_TEXT_LENGTH,
};

#[cfg(feature = "embeddings")]
pub use encoder::FastembedEncoder;

/// Cosine similarity of two equal-length vectors, in [-1, 1].
///
/// Mismatched lengths and zero vectors score 0.0, so degenerate rows sort
/// to the bottom instead of poisoning a comparison.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (dot, sq_a, sq_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, sq_a, sq_b), (x, y)| {
            (dot + x * y, sq_a + x * x, sq_b + y * y)
        });

    let scale = (sq_a * sq_b).sqrt();
    if scale > 0.0 { dot / scale } else { 0.0 }
}

/// Euclidean distance between two equal-length vectors.
///
/// Mismatched lengths are treated as infinitely far apart, which keeps
/// medoid selection away from malformed rows.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }

    let squared: f32 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let delta = x - y;
            delta * delta
        })
        .sum();
    squared.sqrt()
}

/// Component-wise mean of a set of vectors
pub fn mean_vector(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut mean = vec![0.0_f32; first.len()];
    for vector in vectors {
        for (slot, value) in mean.iter_mut().zip(vector.iter()) {
            *slot += value;
        }
    }
    let count = vectors.len() as f32;
    for slot in &mut mean {
        *slot /= count;
    }
    mean
}

// ============================================================================
// TESTS
// ============================================================================
