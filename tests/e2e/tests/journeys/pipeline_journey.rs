//! Full pipeline journeys: source graph -> traversal -> arrangement ->
//! shaping, with deterministic backends.

use ramify_core::cluster::Clustering;
use ramify_core::{EventCollector, EventKind, Node, SmartConfig};
use ramify_e2e_tests::{
    assert_shaped_invariants, engine, engine_with_clusterer, grocery_source, wide_source,
    ScriptedClusterer,
};

#[test]
fn grocery_run_produces_shaped_taxonomy() {
    let source = grocery_source();
    let engine = engine(&source);
    let mut events = EventCollector::new();

    let config = SmartConfig {
        enabled: true,
        min_depth: 0,
        min_hyponyms: 100,
        min_leaf_size: 3,
        merge_orphans: true,
        ..Default::default()
    };

    let skeleton = engine.run(&source, &config, &mut events).unwrap();
    assert_shaped_invariants(&skeleton.root);

    let top = skeleton.root.as_category().unwrap();
    let produce = top["Produce"].as_category().unwrap();

    // fruit and vegetable kept their lists; the undersized herb subtree
    // was pooled into a contextual bucket
    assert_eq!(
        produce["Fruit"].as_leaf().unwrap(),
        &["apple", "banana", "cherry", "plum"]
    );
    assert_eq!(
        produce["Vegetable"].as_leaf().unwrap(),
        &["carrot", "leek", "potato", "turnip"]
    );
    assert!(!produce.contains_key("Herb"));
    let bucket = produce
        .keys()
        .find(|k| k.starts_with("Misc"))
        .expect("orphan bucket present");
    assert_eq!(produce[bucket].as_leaf().unwrap(), &["basil", "sage"]);

    // Instruction side-channel survives shaping under the re-cased keys
    assert_eq!(
        skeleton.annotations.get("Produce"),
        Some("fresh goods sold at market")
    );
    assert_eq!(
        skeleton.annotations.get("Produce/Fruit"),
        Some("sweet edible plant product")
    );
}

#[test]
fn oversized_list_is_rearranged_into_groups() {
    let source = wide_source(1, 60);
    let script = vec![Clustering {
        labels: (0..60).map(|i| if i < 30 { 0 } else { 1 }).collect(),
        probabilities: vec![1.0; 60],
    }];
    let engine = engine_with_clusterer(&source, Box::new(ScriptedClusterer::new(script)));
    let mut events = EventCollector::new();

    let config = SmartConfig {
        enabled: true,
        min_depth: 0,
        min_hyponyms: 1000,
        min_leaf_size: 3,
        merge_orphans: true,
        semantic_arrangement: true,
        semantic_arrangement_threshold: 0.5,
        semantic_arrangement_min_cluster: 5,
        ..Default::default()
    };

    let skeleton = engine.run(&source, &config, &mut events).unwrap();
    assert_shaped_invariants(&skeleton.root);

    // One arrangement ran over the 60-term flattened branch
    let arrangements = events.events_of(EventKind::Arrangement);
    assert_eq!(arrangements.len(), 1);
    assert_eq!(arrangements[0].data["items"], serde_json::json!(60));
    assert_eq!(arrangements[0].data["clusters"], serde_json::json!(2));

    // Both clusters were named by the lexical ancestor; the collision got
    // an integer suffix, and the tautological echo of the parent was
    // renamed by the shaper
    let top = skeleton.root.as_category().unwrap();
    let everything = top["Everything"].as_category().unwrap();
    assert_eq!(everything.len(), 2);
    assert!(everything.contains_key("Branch 0 2"));
    assert!(everything.contains_key("General Branch 0"));
    for value in everything.values() {
        assert_eq!(value.as_leaf().unwrap().len(), 30);
    }
}

#[test]
fn disabled_config_keeps_full_structure() {
    let source = grocery_source();
    let engine = engine(&source);
    let mut events = EventCollector::new();

    let skeleton = engine
        .run(&source, &SmartConfig::default(), &mut events)
        .unwrap();

    // No shaping, no arrangement: raw traversal output
    let top = skeleton.root.as_category().unwrap();
    let produce = top["produce"].as_category().unwrap();
    assert!(produce.contains_key("fruit"));
    assert!(produce.contains_key("vegetable"));
    assert!(produce.contains_key("herb"));
    assert_eq!(events.count_of(EventKind::Arrangement), 0);

    let mut all_terms = skeleton.root.terms();
    all_terms.sort();
    assert_eq!(
        all_terms,
        vec![
            "apple", "banana", "basil", "carrot", "cherry", "leek", "plum", "potato", "sage",
            "turnip"
        ]
    );
}

#[test]
fn leaf_terms_never_duplicate_within_a_list() {
    let source = grocery_source();
    let engine = engine(&source);
    let mut events = EventCollector::new();

    let config = SmartConfig {
        enabled: true,
        min_depth: 0,
        min_hyponyms: 100,
        min_leaf_size: 8,
        merge_orphans: true,
        ..Default::default()
    };

    let skeleton = engine.run(&source, &config, &mut events).unwrap();
    assert_shaped_invariants(&skeleton.root);

    fn check(node: &Node) {
        match node {
            Node::Leaf(terms) => {
                let mut deduped = terms.clone();
                deduped.dedup();
                assert_eq!(&deduped, terms);
            }
            Node::Category(children) => children.values().for_each(check),
        }
    }
    check(&skeleton.root);
}
