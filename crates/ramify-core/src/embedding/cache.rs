//! Two-tier embedding cache
//!
//! Memory tier first, then a single-file SQLite store shared between worker
//! processes, then the encoder. The key is a content hash over the sorted
//! unique term set, so callers with the same terms in any order share an
//! entry. Persistent-tier failures are never fatal: reads fall through to
//! computation and writes are best-effort.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use super::encoder::{EncodeError, Encoder};

/// File name for the default persistent store
pub const DEFAULT_DB_FILE: &str = "embeddings.db";

/// Lock wait for readers and writers sharing the store (milliseconds)
const BUSY_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// EMBEDDING CACHE
// ============================================================================

/// Two-tier (memory + persistent) embedding cache over a pluggable encoder
pub struct EmbeddingCache {
    encoder: Box<dyn Encoder>,
    memory: Mutex<HashMap<String, Arc<Vec<Vec<f32>>>>>,
    store: Option<Mutex<Connection>>,
}

impl EmbeddingCache {
    /// Create a cache with a persistent tier at `db_path` (or the platform
    /// default location). Falls back to memory-only when the store cannot
    /// be opened.
    pub fn new(encoder: Box<dyn Encoder>, db_path: Option<PathBuf>) -> Self {
        let store = match open_store(db_path) {
            Ok(conn) => Some(Mutex::new(conn)),
            Err(e) => {
                tracing::warn!("Embedding store unavailable, running memory-only: {e}");
                None
            }
        };

        Self {
            encoder,
            memory: Mutex::new(HashMap::new()),
            store,
        }
    }

    /// Create a memory-only cache (no persistent tier)
    pub fn in_memory(encoder: Box<dyn Encoder>) -> Self {
        Self {
            encoder,
            memory: Mutex::new(HashMap::new()),
            store: None,
        }
    }

    /// Whether the encoder can produce vectors
    pub fn is_ready(&self) -> bool {
        self.encoder.is_ready()
    }

    /// Name of the wrapped encoder
    pub fn encoder_name(&self) -> &str {
        self.encoder.name()
    }

    /// Whether the persistent tier is active
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Return one embedding row per term, in input order.
    ///
    /// Duplicate terms share a row; the cache entry covers the sorted
    /// unique term set.
    pub fn embeddings_for(&self, terms: &[String]) -> Result<Vec<Vec<f32>>, EncodeError> {
        if terms.is_empty() {
            return Ok(vec![]);
        }

        let unique: Vec<String> = terms
            .iter()
            .cloned()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        let key = cache_key(&unique);

        let rows = match self.lookup(&key) {
            Some(rows) => rows,
            None => {
                let computed = Arc::new(self.encoder.encode(&unique)?);
                self.insert(&key, &computed);
                computed
            }
        };

        let index: HashMap<&str, usize> = unique
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        Ok(terms
            .iter()
            .map(|t| rows[index[t.as_str()]].clone())
            .collect())
    }

    fn lookup(&self, key: &str) -> Option<Arc<Vec<Vec<f32>>>> {
        if let Ok(memory) = self.memory.lock() {
            if let Some(hit) = memory.get(key) {
                return Some(Arc::clone(hit));
            }
        }

        let rows = self.read_store(key)?;
        let rows = Arc::new(rows);
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(key.to_string(), Arc::clone(&rows));
        }
        Some(rows)
    }

    fn read_store(&self, key: &str) -> Option<Vec<Vec<f32>>> {
        let store = self.store.as_ref()?;
        let conn = store.lock().ok()?;
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT vector FROM embeddings WHERE hash = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or_else(|e| {
                tracing::debug!("Embedding store read failed: {e}");
                None
            });
        decode_matrix(&blob?)
    }

    fn insert(&self, key: &str, rows: &Arc<Vec<Vec<f32>>>) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.insert(key.to_string(), Arc::clone(rows));
        }

        if let Some(store) = &self.store {
            if let Ok(conn) = store.lock() {
                let blob = encode_matrix(rows);
                // First writer wins; concurrent workers race safely
                if let Err(e) = conn.execute(
                    "INSERT OR IGNORE INTO embeddings (hash, vector) VALUES (?1, ?2)",
                    params![key, blob],
                ) {
                    tracing::warn!("Embedding store write failed: {e}");
                }
            }
        }
    }
}

// ============================================================================
// STORE SETUP
// ============================================================================

fn default_db_path() -> Option<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "ramify", "core")?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir).ok()?;
    Some(data_dir.join(DEFAULT_DB_FILE))
}

fn open_store(db_path: Option<PathBuf>) -> Result<Connection, rusqlite::Error> {
    let path = db_path
        .or_else(default_db_path)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));

    let conn = Connection::open(path)?;
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
    ))?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS embeddings (
            hash TEXT PRIMARY KEY,
            vector BLOB
        )",
        [],
    )?;
    Ok(conn)
}

// ============================================================================
// KEYS & BLOB CODEC
// ============================================================================

/// Content key over a sorted unique term list
pub fn cache_key(sorted_unique_terms: &[String]) -> String {
    blake3::hash(sorted_unique_terms.join("|").as_bytes())
        .to_hex()
        .to_string()
}

/// Serialize a matrix as `rows: u32, cols: u32, f32-LE payload`
fn encode_matrix(rows: &[Vec<f32>]) -> Vec<u8> {
    let cols = rows.first().map(Vec::len).unwrap_or(0);
    let mut out = Vec::with_capacity(8 + rows.len() * cols * 4);
    out.extend((rows.len() as u32).to_le_bytes());
    out.extend((cols as u32).to_le_bytes());
    for row in rows {
        for value in row {
            out.extend(value.to_le_bytes());
        }
    }
    out
}

fn decode_matrix(bytes: &[u8]) -> Option<Vec<Vec<f32>>> {
    if bytes.len() < 8 {
        return None;
    }
    let rows = u32::from_le_bytes(bytes[0..4].try_into().ok()?) as usize;
    let cols = u32::from_le_bytes(bytes[4..8].try_into().ok()?) as usize;
    let payload = &bytes[8..];
    if payload.len() != rows * cols * 4 {
        return None;
    }

    let mut matrix = Vec::with_capacity(rows);
    for r in 0..rows {
        let mut row = Vec::with_capacity(cols);
        for c in 0..cols {
            let start = (r * cols + c) * 4;
            row.push(f32::from_le_bytes(
                payload[start..start + 4].try_into().ok()?,
            ));
        }
        matrix.push(row);
    }
    Some(matrix)
}

// ============================================================================
// TESTS
// ============================================================================
