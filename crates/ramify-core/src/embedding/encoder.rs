//! Embedding encoders
//!
//! The `Encoder` trait is the seam between the pipeline and whatever model
//! produces dense vectors. Two implementations ship here:
//!
//! - `FastembedEncoder` (feature `embeddings`): local ONNX inference
//! - `HashingEncoder`: deterministic character-trigram hashing, no model
//!   download, suitable for previews and offline runs

use crate::config::SemanticModel;

/// Batch size for encoder calls
pub const BATCH_SIZE: usize = 32;

/// Maximum text length passed to a model (longer inputs are truncated)
pub const MAX_TEXT_LENGTH: usize = 8192;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Encoder error types
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum EncodeError {
    /// Failed to initialize the embedding model
    #[error("Model initialization failed: {0}")]
    ModelInit(String),
    /// Failed to generate embeddings
    #[error("Embedding generation failed: {0}")]
    Failed(String),
}

// ============================================================================
// ENCODER TRAIT
// ============================================================================

/// Produces one dense vector per input term
pub trait Encoder: Send + Sync {
    /// Model name for diagnostics
    fn name(&self) -> &str;

    /// Output vector dimensionality
    fn dimensions(&self) -> usize;

    /// Encode a batch of terms, one row per term in input order
    fn encode(&self, terms: &[String]) -> Result<Vec<Vec<f32>>, EncodeError>;

    /// Whether the backend can produce vectors right now
    fn is_ready(&self) -> bool {
        true
    }
}

// ============================================================================
// HASHING ENCODER
// ============================================================================

/// Deterministic model-free encoder.
///
/// Hashes character trigrams into a fixed-width bucket vector and
/// L2-normalizes the result. Terms sharing surface fragments land near each
/// other, which is enough for previews, tests, and offline runs where no
/// model backend is available.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dimensions: usize,
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl HashingEncoder {
    /// Create an encoder with the given output width
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, term: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let padded: Vec<char> = format!(" {term} ").chars().collect();
        for window in padded.windows(3) {
            let trigram: String = window.iter().collect();
            let digest = blake3::hash(trigram.as_bytes());
            let bucket = u64::from_le_bytes(
                digest.as_bytes()[..8].try_into().expect("digest has 32 bytes"),
            ) as usize
                % self.dimensions;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Encoder for HashingEncoder {
    fn name(&self) -> &str {
        "hashing-trigram"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, terms: &[String]) -> Result<Vec<Vec<f32>>, EncodeError> {
        Ok(terms.iter().map(|t| self.embed_one(t)).collect())
    }
}

// ============================================================================
// FASTEMBED ENCODER
// ============================================================================

#[cfg(feature = "embeddings")]
mod fast {
    use std::sync::Mutex;

    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    use super::{EncodeError, Encoder, BATCH_SIZE, MAX_TEXT_LENGTH};
    use crate::config::SemanticModel;

    /// Get the cache directory for model files.
    /// Uses FASTEMBED_CACHE_PATH env var, or falls back to the platform
    /// cache directory.
    fn cache_dir() -> std::path::PathBuf {
        if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
            return std::path::PathBuf::from(path);
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "ramify", "core") {
            return proj_dirs.cache_dir().join("fastembed");
        }

        std::path::PathBuf::from(".fastembed_cache")
    }

    /// Local ONNX embedding encoder
    pub struct FastembedEncoder {
        model: Mutex<TextEmbedding>,
        name: &'static str,
        dimensions: usize,
    }

    impl FastembedEncoder {
        /// Initialize the model for a semantic-model selection, downloading
        /// files on first use.
        pub fn new(selection: SemanticModel) -> Result<Self, EncodeError> {
            let (embedding_model, name, dimensions) = match selection {
                SemanticModel::Minilm => (
                    EmbeddingModel::AllMiniLML12V2,
                    "all-MiniLM-L12-v2",
                    384,
                ),
                SemanticModel::Mpnet => (
                    EmbeddingModel::ParaphraseMLMpnetBaseV2,
                    "paraphrase-multilingual-mpnet-base-v2",
                    768,
                ),
                SemanticModel::Qwen3 => {
                    // No Qwen3 text embedder is exposed locally; substitute
                    // the strongest available default.
                    tracing::debug!("qwen3 embedder unavailable, using nomic-embed-text-v1.5");
                    (
                        EmbeddingModel::NomicEmbedTextV15,
                        "nomic-embed-text-v1.5",
                        768,
                    )
                }
            };

            let cache = cache_dir();
            if let Err(e) = std::fs::create_dir_all(&cache) {
                tracing::warn!("Failed to create cache directory {:?}: {}", cache, e);
            }

            let options = InitOptions::new(embedding_model)
                .with_show_download_progress(false)
                .with_cache_dir(cache);

            let model = TextEmbedding::try_new(options).map_err(|e| {
                EncodeError::ModelInit(format!(
                    "Failed to initialize {name}: {e}. Ensure ONNX runtime is \
                     available and model files can be downloaded."
                ))
            })?;

            Ok(Self {
                model: Mutex::new(model),
                name,
                dimensions,
            })
        }
    }

    impl Encoder for FastembedEncoder {
        fn name(&self) -> &str {
            self.name
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn encode(&self, terms: &[String]) -> Result<Vec<Vec<f32>>, EncodeError> {
            if terms.is_empty() {
                return Ok(vec![]);
            }

            let mut model = self
                .model
                .lock()
                .map_err(|e| EncodeError::Failed(format!("Lock poisoned: {e}")))?;

            let mut all_embeddings = Vec::with_capacity(terms.len());
            for chunk in terms.chunks(BATCH_SIZE) {
                let truncated: Vec<&str> = chunk
                    .iter()
                    .map(|t| {
                        if t.len() > MAX_TEXT_LENGTH {
                            &t[..MAX_TEXT_LENGTH]
                        } else {
                            t.as_str()
                        }
                    })
                    .collect();

                let embeddings = model
                    .embed(truncated, None)
                    .map_err(|e| EncodeError::Failed(e.to_string()))?;
                all_embeddings.extend(embeddings);
            }

            Ok(all_embeddings)
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fast::FastembedEncoder;

/// Build the default encoder for a model selection.
///
/// With the `embeddings` feature this initializes the local model backend;
/// on init failure (or without the feature) it returns `None` and callers
/// degrade to passthrough behavior.
pub fn default_encoder(selection: SemanticModel) -> Option<Box<dyn Encoder>> {
    #[cfg(feature = "embeddings")]
    {
        match FastembedEncoder::new(selection) {
            Ok(encoder) => return Some(Box::new(encoder)),
            Err(e) => {
                tracing::warn!("Embedding backend unavailable: {e}");
                return None;
            }
        }
    }

    #[cfg(not(feature = "embeddings"))]
    {
        let _ = selection;
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
