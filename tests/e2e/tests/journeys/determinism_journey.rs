//! Determinism journeys: identical input, config, and backends must yield
//! byte-identical output, and the persistent embedding cache must hand back
//! the same vectors it stored.

use std::sync::Arc;

use ramify_core::embedding::{EmbeddingCache, HashingEncoder};
use ramify_core::{EventCollector, SmartConfig, SmartPreset};
use ramify_e2e_tests::{engine, grocery_source, wide_source};

#[test]
fn rerun_produces_byte_identical_output() {
    let source = grocery_source();
    let config = SmartConfig {
        enabled: true,
        min_depth: 0,
        min_hyponyms: 100,
        min_leaf_size: 3,
        merge_orphans: true,
        ..Default::default()
    };

    let first = {
        let engine = engine(&source);
        let mut events = EventCollector::new();
        engine.run(&source, &config, &mut events).unwrap()
    };
    let second = {
        let engine = engine(&source);
        let mut events = EventCollector::new();
        engine.run(&source, &config, &mut events).unwrap()
    };

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn preset_runs_are_deterministic_too() {
    let source = wide_source(6, 8);
    let config = SmartPreset::Balanced.config();

    let first = {
        let engine = engine(&source);
        let mut events = EventCollector::new();
        engine.run(&source, &config, &mut events).unwrap()
    };
    let second = {
        let engine = engine(&source);
        let mut events = EventCollector::new();
        engine.run(&source, &config, &mut events).unwrap()
    };

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn embedding_cache_returns_identical_vectors_across_calls() {
    let cache = EmbeddingCache::in_memory(Box::new(HashingEncoder::default()));
    let terms: Vec<String> = ["salmon", "trout", "herring"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let first = cache.embeddings_for(&terms).unwrap();
    let second = cache.embeddings_for(&terms).unwrap();
    assert_eq!(first, second);
}

#[test]
fn persistent_cache_round_trips_between_processes() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("embeddings.db");
    let terms: Vec<String> = ["cobalt", "azure", "teal"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let written = {
        let cache = EmbeddingCache::new(
            Box::new(HashingEncoder::default()),
            Some(db_path.clone()),
        );
        cache.embeddings_for(&terms).unwrap()
    };

    // A fresh cache (fresh memory tier) reads the same vectors back
    let cache = EmbeddingCache::new(Box::new(HashingEncoder::default()), Some(db_path));
    let read = cache.embeddings_for(&terms).unwrap();
    assert_eq!(written, read);

    let shared = Arc::new(cache);
    let reread = shared.embeddings_for(&terms).unwrap();
    assert_eq!(read, reread);
}
