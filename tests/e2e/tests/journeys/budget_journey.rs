//! Budget truncation journeys: runs over large sources stop cleanly at the
//! visit limit with exactly one limit event and partial output.

use ramify_core::{ConceptSource, EventCollector, EventKind, SmartConfig, TraversalBudget};
use ramify_e2e_tests::{engine, wide_source};

#[test]
fn budget_truncates_large_run_with_one_event() {
    // 1 root + 40 branches + 960 leaves = 1001 nodes
    let source = wide_source(40, 24);
    let engine = engine(&source);
    let mut events = EventCollector::new();

    let config = SmartConfig::default();
    let mut budget = TraversalBudget::new(500);
    let root = source.root().unwrap();

    let skeleton = engine
        .traverse(&root, &config, &mut budget, &mut events)
        .unwrap();

    assert_eq!(events.count_of(EventKind::LimitReached), 1);
    assert!(budget.is_exhausted());
    assert_eq!(budget.used(), 500);

    // Partial structure: some branches made it, later ones did not
    let top = skeleton.root.as_category().unwrap();
    let everything = top["everything"].as_category().unwrap();
    assert!(!everything.is_empty());
    assert!(everything.len() < 40);

    let event = events.events_of(EventKind::LimitReached)[0];
    assert_eq!(event.data["limit"], serde_json::json!(500));
}

#[test]
fn unlimited_budget_visits_every_node() {
    let source = wide_source(10, 10);
    let engine = engine(&source);
    let mut events = EventCollector::new();

    let mut budget = TraversalBudget::unlimited();
    let root = source.root().unwrap();
    engine
        .traverse(&root, &SmartConfig::default(), &mut budget, &mut events)
        .unwrap();

    assert_eq!(budget.used(), 111);
    assert_eq!(events.count_of(EventKind::LimitReached), 0);
}

#[test]
fn preview_limit_flows_from_config() {
    let source = wide_source(40, 24);
    let engine = engine(&source);
    let mut events = EventCollector::new();

    let config = SmartConfig {
        preview_limit: Some(100),
        ..Default::default()
    };
    let skeleton = engine.run(&source, &config, &mut events).unwrap();

    assert_eq!(events.count_of(EventKind::LimitReached), 1);
    assert!(!skeleton.root.is_empty());
}

#[test]
fn exhausted_run_still_completes_without_error() {
    let source = wide_source(5, 5);
    let engine = engine(&source);
    let mut events = EventCollector::new();

    // A budget of one covers the root only
    let mut budget = TraversalBudget::new(1);
    let root = source.root().unwrap();
    let skeleton = engine
        .traverse(&root, &SmartConfig::default(), &mut budget, &mut events)
        .unwrap();

    assert_eq!(events.count_of(EventKind::LimitReached), 1);
    // Nothing below the root could be visited
    assert!(skeleton.root.terms().is_empty());
}
