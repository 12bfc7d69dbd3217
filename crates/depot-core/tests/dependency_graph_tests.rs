#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{component, new_engine, register_all};
use depot_core::errors::DepotError;
use depot_core::graph::{sort_by_dependencies, Dependent};
use depot_core::Entity;
use proptest::prelude::*;

#[tokio::test]
async fn test_dependency_symmetry() {
    let mut engine = new_engine();
    register_all(
        &mut engine,
        vec![
            component("base", &[]),
            component("theme", &[]),
            component("button", &["base", "theme"]),
        ],
    )
    .await;

    assert_eq!(
        engine.get_dependencies("button", false),
        vec!["base".to_string(), "theme".to_string()]
    );
    assert!(engine.get_dependents("base", false).contains(&"button".to_string()));
    assert!(engine.get_dependents("theme", false).contains(&"button".to_string()));
    assert!(engine.check_integrity().is_empty());
}

#[tokio::test]
async fn test_direct_dependencies_keep_declared_order() {
    let mut engine = new_engine();
    register_all(
        &mut engine,
        vec![
            component("a", &[]),
            component("m", &[]),
            component("z", &[]),
            component("e", &["z", "a"]),
        ],
    )
    .await;

    assert_eq!(engine.get("e").unwrap().dependencies, vec!["z", "a"]);
    assert_eq!(engine.get_dependencies("e", false), vec!["z", "a"]);

    engine.add_dependency("e", "m").unwrap();
    assert_eq!(engine.get_dependencies("e", false), vec!["z", "a", "m"]);

    assert!(engine.remove_dependency("e", "a"));
    assert_eq!(engine.get_dependencies("e", false), vec!["z", "m"]);
    assert!(engine.check_integrity().is_empty());
}

#[tokio::test]
async fn test_recursive_queries_exclude_self() {
    let mut engine = new_engine();
    register_all(
        &mut engine,
        vec![
            component("a", &[]),
            component("b", &["a"]),
            component("c", &["b"]),
            component("d", &["c", "a"]),
        ],
    )
    .await;

    assert_eq!(engine.get_dependencies("d", true), vec!["a", "b", "c"]);
    assert_eq!(engine.get_dependents("a", true), vec!["b", "c", "d"]);
    assert_eq!(engine.get_dependents("a", false), vec!["b", "d"]);
}

#[tokio::test]
async fn test_cyclic_batch_registers_nothing() {
    let mut engine = new_engine();
    let result = engine
        .register_batch(vec![component("A", &["B"]), component("B", &["A"])])
        .await;

    assert!(matches!(result, Err(DepotError::CycleDetected { .. })));
    assert!(!engine.has("A"));
    assert!(!engine.has("B"));
}

#[tokio::test]
async fn test_batch_orders_dependencies_first() {
    let mut engine = new_engine();
    let outcome = engine
        .register_batch(vec![
            component("app", &["ui", "data"]),
            component("ui", &["core"]),
            component("data", &["core"]),
            component("core", &[]),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.success, 4);
    assert_eq!(outcome.failed, 0);
    let order: Vec<&str> = outcome.details.iter().map(|d| d.id.as_str()).collect();
    let pos = |id: &str| order.iter().position(|x| *x == id).unwrap();
    assert!(pos("core") < pos("ui"));
    assert!(pos("core") < pos("data"));
    assert!(pos("ui") < pos("app"));
    assert!(pos("data") < pos("app"));
}

#[tokio::test]
async fn test_batch_records_item_failures() {
    let mut engine = new_engine();
    register_all(&mut engine, vec![component("taken", &[])]).await;

    let outcome = engine
        .register_batch(vec![component("taken", &[]), component("fresh", &[])])
        .await
        .unwrap();

    assert_eq!(outcome.success, 1);
    assert_eq!(outcome.failed, 1);
    let failed = outcome.details.iter().find(|d| !d.success).unwrap();
    assert_eq!(failed.id, "taken");
    assert!(failed.error.as_deref().unwrap().contains("taken"));
}

#[tokio::test]
async fn test_register_refuses_cycle_through_existing_graph() {
    let mut engine = new_engine();
    register_all(&mut engine, vec![component("a", &[]), component("b", &["a"])]).await;

    // a -> b would close a -> b -> a
    let result = engine.add_dependency("a", "b");
    assert!(matches!(result, Err(DepotError::CycleDetected { .. })));
    assert!(engine.get_dependencies("a", false).is_empty());
    assert!(engine.detect_cycles().is_empty());
}

#[tokio::test]
async fn test_add_and_remove_dependency_keep_entity_in_sync() {
    let mut engine = new_engine();
    register_all(&mut engine, vec![component("a", &[]), component("b", &[])]).await;

    engine.add_dependency("b", "a").unwrap();
    assert_eq!(engine.get("b").unwrap().dependencies, vec!["a".to_string()]);
    assert_eq!(engine.get_dependents("a", false), vec!["b".to_string()]);

    assert!(engine.remove_dependency("b", "a"));
    assert!(!engine.remove_dependency("b", "a"));
    assert!(engine.get("b").unwrap().dependencies.is_empty());
    assert!(engine.get_dependents("a", false).is_empty());
    assert!(engine.check_integrity().is_empty());
}

#[tokio::test]
async fn test_blocked_delete_then_forced() {
    let mut engine = new_engine();
    register_all(&mut engine, vec![component("A", &[]), component("B", &["A"])]).await;

    assert!(!engine.unregister("A", false).await);
    assert!(engine.has("A"));
    assert!(matches!(
        engine.try_unregister("A", false).await,
        Err(DepotError::HasDependents { .. })
    ));

    assert!(engine.unregister("A", true).await);
    assert!(!engine.has("A"));
    assert_eq!(engine.get("B").unwrap().dependencies, vec!["A".to_string()]);

    let missing = engine.missing_dependencies();
    assert_eq!(
        missing,
        vec![DepotError::DependencyMissing {
            entity_id: "B".to_string(),
            dependency_id: "A".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_deprecate_allowed_with_dependents() {
    let mut engine = new_engine();
    register_all(&mut engine, vec![component("A", &[]), component("B", &["A"])]).await;

    assert!(engine.deprecate("A").await);
    assert_eq!(
        engine.get("A").unwrap().status,
        depot_core::EntityStatus::Deprecated
    );
    assert!(engine.missing_dependencies().is_empty());
}

#[tokio::test]
async fn test_forward_reference_is_recorded_not_rejected() {
    let mut engine = new_engine();
    register_all(&mut engine, vec![component("late", &["early"])]).await;

    assert_eq!(engine.missing_dependencies().len(), 1);
    register_all(&mut engine, vec![component("early", &[])]).await;
    assert!(engine.missing_dependencies().is_empty());
    assert_eq!(engine.get_dependents("early", false), vec!["late".to_string()]);
}

#[tokio::test]
async fn test_teardown_order_reverses_setup() {
    let engine = new_engine();
    let items = vec![component("top", &["mid"]), component("mid", &["low"]), component("low", &[])];
    let teardown = engine.teardown_order(items).unwrap();
    let ids: Vec<&str> = teardown.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["top", "mid", "low"]);
}

/// Acyclic dependency sets: each node may only depend on lower-numbered ones
fn acyclic_entities() -> impl Strategy<Value = Vec<Entity>> {
    (1usize..12).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<prop::sample::Index>(), 0..4), n)
            .prop_map(move |picks| {
                picks
                    .into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let deps: Vec<String> = if i == 0 {
                            Vec::new()
                        } else {
                            deps.iter().map(|ix| format!("n{}", ix.index(i))).collect()
                        };
                        Entity::new(format!("n{}", i), format!("N{}", i), depot_core::EntityType::General)
                            .with_dependencies(deps)
                    })
                    .rev()
                    .collect()
            })
    })
}

proptest! {
    #[test]
    fn prop_sort_places_dependencies_first(entities in acyclic_entities()) {
        let sorted = sort_by_dependencies(entities.clone()).unwrap();
        prop_assert_eq!(sorted.len(), entities.len());

        let position = |id: &str| sorted.iter().position(|e| e.dependent_id() == id);
        for entity in &sorted {
            let me = position(&entity.id).unwrap();
            for dep in entity.dependency_ids() {
                let theirs = position(dep).unwrap();
                prop_assert!(theirs < me, "{} must precede {}", dep, entity.id);
            }
        }
    }
}
