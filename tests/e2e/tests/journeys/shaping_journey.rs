//! Shaping journeys: the normalization scenarios end-to-end, plus
//! idempotence over real pipeline output.

use ramify_core::{Annotations, EventCollector, Node, ShapeOptions, Shaper, SmartConfig};
use ramify_e2e_tests::{assert_shaped_invariants, engine, grocery_source};

fn leaf(items: &[&str]) -> Node {
    Node::Leaf(items.iter().map(|s| s.to_string()).collect())
}

fn category(entries: Vec<(&str, Node)>) -> Node {
    Node::Category(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn shape(node: Node, options: ShapeOptions) -> Node {
    let mut notes = Annotations::new();
    Shaper::new(options).shape(node, &mut notes)
}

#[test]
fn casing_and_dedup_scenario() {
    let tree = category(vec![
        (
            "FOOD",
            category(vec![("fruit", leaf(&["Apple", "BANANA", "Apple"]))]),
        ),
        ("vegetable", leaf(&["CARROT"])),
    ]);
    let result = shape(
        tree,
        ShapeOptions {
            min_leaf_size: 0,
            flatten_singles: false,
            ..Default::default()
        },
    );

    let children = result.as_category().unwrap();
    let food = children["Food"].as_category().unwrap();
    assert_eq!(food["Fruit"].as_leaf().unwrap(), &["apple", "banana"]);
    assert_eq!(children["Vegetable"].as_leaf().unwrap(), &["carrot"]);
}

#[test]
fn tautology_scenario() {
    let tree = category(vec![(
        "Fish",
        category(vec![("Fish", leaf(&["salmon", "trout"]))]),
    )]);
    let result = shape(
        tree,
        ShapeOptions {
            min_leaf_size: 0,
            flatten_singles: false,
            ..Default::default()
        },
    );
    assert_eq!(result, category(vec![("Fish", leaf(&["salmon", "trout"]))]));
}

#[test]
fn orphan_merge_scenario_gets_contextual_bucket() {
    let tree = category(vec![
        ("Apple", leaf(&["granny smith"])),
        ("Banana", leaf(&["cavendish"])),
        ("Meat", leaf(&["beef", "chicken", "pork", "lamb", "turkey"])),
    ]);
    let result = shape(
        tree,
        ShapeOptions {
            min_leaf_size: 5,
            flatten_singles: false,
            ..Default::default()
        },
    );

    let children = result.as_category().unwrap();
    assert!(children.contains_key("Meat"));
    assert!(!children.contains_key("Apple"));
    assert!(!children.contains_key("Banana"));
    let bucket = children
        .keys()
        .find(|k| k.starts_with("Other"))
        .expect("contextual bucket exists");
    assert_eq!(
        children[bucket].as_leaf().unwrap(),
        &["cavendish", "granny smith"]
    );
}

#[test]
fn leaf_wrapper_is_preserved() {
    let tree = category(vec![("Category", leaf(&["item1", "item2"]))]);
    let result = shape(
        tree,
        ShapeOptions {
            min_leaf_size: 0,
            preserve_roots: false,
            ..Default::default()
        },
    );
    let children = result.as_category().unwrap();
    assert_eq!(children["Category"].as_leaf().unwrap(), &["item1", "item2"]);
}

#[test]
fn nested_single_chain_with_preserved_root() {
    // The documented rule: keep the root wrapper, recurse into its value
    let tree = category(vec![(
        "A",
        category(vec![("B", category(vec![("C", leaf(&["x"]))]))]),
    )]);
    let result = shape(
        tree,
        ShapeOptions {
            min_leaf_size: 0,
            preserve_roots: true,
            ..Default::default()
        },
    );
    let children = result.as_category().unwrap();
    assert_eq!(children.len(), 1);
    let a = children["A"].as_category().unwrap();
    assert_eq!(a["C"].as_leaf().unwrap(), &["x"]);
}

#[test]
fn shaping_pipeline_output_is_idempotent() {
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

    // Same options the engine used for its own shaping pass
    let shaper = Shaper::new(ShapeOptions {
        min_leaf_size: 3,
        orphans_label_template: Some("misc".to_string()),
        ..Default::default()
    });
    let mut notes = skeleton.annotations.clone();
    let reshaped = shaper.shape(skeleton.root.clone(), &mut notes);
    assert_eq!(reshaped, skeleton.root);
}
