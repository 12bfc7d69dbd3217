#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{component, event_names, new_engine, record_events, register_all, CountingValidator, ScriptedHooks};
use depot_core::errors::DepotError;
use depot_core::lifecycle::{RejectAllValidator, RequiredContentKeys};
use depot_core::{
    EngineConfig, Entity, EntityPatch, EntityStatus, EntityType, RegistryEngine, RegistryItem,
};
use serde_json::json;

#[tokio::test]
async fn test_duplicate_registration_keeps_original() {
    let mut engine = new_engine();
    let original = component("dup", &[]).with_content(json!({"v": 1}));
    register_all(&mut engine, vec![original.clone()]).await;

    let again = component("dup", &[]).with_content(json!({"v": 2}));
    assert!(!engine.register(again.clone()).await);
    assert!(matches!(
        engine.try_register(again).await,
        Err(DepotError::DuplicateId { .. })
    ));
    assert_eq!(engine.get("dup").unwrap(), original);
    assert_eq!(engine.len(), 1);
}

#[tokio::test]
async fn test_metadata_is_checked_first() {
    let mut engine = new_engine();
    let no_name = Entity::new("x", "  ", EntityType::Plugin);
    let bad_version = Entity::new("y", "Y", EntityType::Plugin).with_version("1.0");

    assert!(matches!(
        engine.try_register(no_name).await,
        Err(DepotError::MetadataInvalid { .. })
    ));
    assert!(matches!(
        engine.try_register(bad_version).await,
        Err(DepotError::MetadataInvalid { .. })
    ));
    assert!(engine.is_empty());
}

#[tokio::test]
async fn test_initialize_failure_leaves_no_trace() {
    let mut engine = new_engine();
    register_all(&mut engine, vec![component("base", &[])]).await;
    let events = record_events(&mut engine);

    let hooks = Arc::new(ScriptedHooks {
        fail_initialize: true,
        ..Default::default()
    });
    let item = RegistryItem::new(
        component("widget", &["base"])
            .with_category("forms")
            .with_tags(["input"]),
    )
    .with_hooks(hooks.clone());

    let result = engine.try_register(item).await;
    assert!(matches!(result, Err(DepotError::HookFailed { ref hook, .. }) if hook == "initialize"));
    assert_eq!(hooks.initialized.load(Ordering::SeqCst), 1);

    assert!(!engine.has("widget"));
    assert!(engine.get_dependents("base", false).is_empty());
    assert!(engine.get_by_category("forms").is_empty());
    assert!(engine.get_by_tag("input").is_empty());
    assert_eq!(engine.get_by_type(EntityType::Component).len(), 1);
    assert!(engine.check_integrity().is_empty());
    assert_eq!(event_names(&events), vec!["error"]);
}

#[tokio::test]
async fn test_validate_hook_and_provider_errors_are_collected() {
    let mut engine = new_engine();
    engine.set_validation_provider(
        EntityType::DataSource,
        Arc::new(RequiredContentKeys::new(["endpoint"])),
    );
    let hooks = Arc::new(ScriptedHooks {
        reject: Some("hook says no".to_string()),
        ..Default::default()
    });
    let item = RegistryItem::new(Entity::new("feed", "Feed", EntityType::DataSource)).with_hooks(hooks.clone());

    match engine.try_register(item).await {
        Err(DepotError::ValidationFailed { errors, .. }) => {
            assert_eq!(errors.len(), 2);
            assert_eq!(errors[0], "hook says no");
        }
        other => panic!("expected ValidationFailed, got {:?}", other),
    }
    assert_eq!(hooks.initialized.load(Ordering::SeqCst), 0);
    assert!(!engine.has("feed"));
}

#[tokio::test]
async fn test_provider_only_applies_to_its_type() {
    let mut engine = new_engine();
    engine.set_validation_provider(EntityType::Theme, Arc::new(RejectAllValidator::new("no themes")));

    assert!(engine.register(component("c", &[])).await);
    assert!(!engine.register(Entity::new("t", "T", EntityType::Theme)).await);
}

#[tokio::test]
async fn test_cleanup_hook_runs_on_delete_and_can_abort() {
    let mut engine = new_engine();
    let ok_hooks = Arc::new(ScriptedHooks::default());
    let bad_hooks = Arc::new(ScriptedHooks {
        fail_cleanup: true,
        ..Default::default()
    });
    engine
        .try_register(RegistryItem::new(component("ok", &[])).with_hooks(ok_hooks.clone()))
        .await
        .unwrap();
    engine
        .try_register(RegistryItem::new(component("stuck", &[])).with_hooks(bad_hooks.clone()))
        .await
        .unwrap();

    assert!(engine.unregister("ok", false).await);
    assert_eq!(ok_hooks.cleaned_up.load(Ordering::SeqCst), 1);

    let result = engine.try_unregister("stuck", true).await;
    assert!(matches!(result, Err(DepotError::HookFailed { ref hook, .. }) if hook == "cleanup"));
    assert!(engine.has("stuck"));
}

#[tokio::test]
async fn test_validation_cache_hit_and_invalidation() {
    let mut engine = new_engine();
    let validator = Arc::new(CountingValidator::default());
    engine.set_validation_provider(EntityType::Component, validator.clone());

    register_all(&mut engine, vec![component("a", &[])]).await;
    assert_eq!(validator.calls(), 1);

    engine.validate_entity("a").await.unwrap();
    engine.validate_entity("a").await.unwrap();
    assert_eq!(validator.calls(), 1);
    assert_eq!(engine.get_stats().validation_cache.hits, 2);

    engine
        .try_update("a", EntityPatch::new().content(json!({"k": 1})))
        .await
        .unwrap();
    assert_eq!(validator.calls(), 2);

    engine.validate_entity("a").await.unwrap();
    assert_eq!(validator.calls(), 2);
}

#[tokio::test]
async fn test_rejected_registration_can_be_retried() {
    let mut engine = new_engine();
    let rejecting = Arc::new(ScriptedHooks {
        reject: Some("no".to_string()),
        ..Default::default()
    });
    let first = engine
        .try_register(RegistryItem::new(component("r", &[])).with_hooks(rejecting))
        .await;
    assert!(matches!(first, Err(DepotError::ValidationFailed { .. })));
    assert_eq!(engine.get_stats().validation_cache.entries, 0);

    let accepting = Arc::new(ScriptedHooks::default());
    engine
        .try_register(RegistryItem::new(component("r", &[])).with_hooks(accepting.clone()))
        .await
        .unwrap();
    assert!(engine.has("r"));
    assert_eq!(accepting.initialized.load(Ordering::SeqCst), 1);
    assert_eq!(engine.get_stats().validation_cache.entries, 1);
}

#[tokio::test]
async fn test_expired_validation_results_are_purged() {
    let config = EngineConfig {
        validation_cache_ttl_secs: 0,
        ..EngineConfig::default()
    };
    let mut engine = RegistryEngine::new(config);

    register_all(&mut engine, vec![component("a", &[])]).await;
    assert_eq!(engine.get_stats().validation_cache.entries, 1);

    register_all(&mut engine, vec![component("b", &[])]).await;
    assert_eq!(engine.get_stats().validation_cache.entries, 1);

    engine.revalidate_all().await;
    assert_eq!(engine.get_stats().validation_cache.entries, 2);
    engine.revalidate_all().await;
    assert_eq!(engine.get_stats().validation_cache.entries, 2);
}

#[tokio::test]
async fn test_validation_cache_expires_with_zero_ttl() {
    let config = EngineConfig {
        validation_cache_ttl_secs: 0,
        ..EngineConfig::default()
    };
    let mut engine = RegistryEngine::new(config);
    let validator = Arc::new(CountingValidator::default());
    engine.set_validation_provider(EntityType::Component, validator.clone());

    register_all(&mut engine, vec![component("a", &[])]).await;
    engine.validate_entity("a").await.unwrap();
    engine.validate_entity("a").await.unwrap();
    assert_eq!(validator.calls(), 3);
}

#[tokio::test]
async fn test_failed_update_keeps_content_and_marks_error() {
    let mut engine = new_engine();
    engine.set_validation_provider(EntityType::Component, Arc::new(CountingValidator::default()));
    register_all(
        &mut engine,
        vec![component("a", &[])
            .with_status(EntityStatus::Active)
            .with_content(json!({"n": 1}))],
    )
    .await;

    let result = engine
        .try_update("a", EntityPatch::new().content(json!({"valid": false})))
        .await;
    assert!(matches!(result, Err(DepotError::ValidationFailed { .. })));

    let entity = engine.get("a").unwrap();
    assert_eq!(entity.content, json!({"n": 1}));
    assert_eq!(entity.status, EntityStatus::Error);
    assert_eq!(engine.get_by_status(EntityStatus::Error).len(), 1);
    assert!(engine.check_integrity().is_empty());
}

#[tokio::test]
async fn test_update_reindexes_changed_dimensions() {
    let mut engine = new_engine();
    register_all(
        &mut engine,
        vec![component("a", &[]).with_category("old").with_tags(["x", "y"])],
    )
    .await;

    let updated = engine
        .try_update(
            "a",
            EntityPatch::new()
                .category(Some("new".to_string()))
                .tags(["y", "z"])
                .status(EntityStatus::Active),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, EntityStatus::Active);
    assert!(engine.get_by_category("old").is_empty());
    assert_eq!(engine.get_by_category("new").len(), 1);
    assert!(engine.get_by_tag("x").is_empty());
    assert_eq!(engine.get_by_tag("z").len(), 1);
    assert_eq!(engine.categories(), vec!["new".to_string()]);
    assert!(engine.check_integrity().is_empty());
}

#[tokio::test]
async fn test_update_rewires_edges_and_refuses_cycles() {
    let mut engine = new_engine();
    register_all(
        &mut engine,
        vec![component("a", &[]), component("b", &[]), component("c", &["a"])],
    )
    .await;

    engine
        .try_update("c", EntityPatch::new().dependencies(["b"]))
        .await
        .unwrap();
    assert!(engine.get_dependents("a", false).is_empty());
    assert_eq!(engine.get_dependents("b", false), vec!["c".to_string()]);

    let cyclic = engine
        .try_update("b", EntityPatch::new().dependencies(["c"]))
        .await;
    assert!(matches!(cyclic, Err(DepotError::CycleDetected { .. })));
    assert!(engine.get("b").unwrap().dependencies.is_empty());
    assert!(engine.check_integrity().is_empty());
}

#[tokio::test]
async fn test_update_missing_entity() {
    let mut engine = new_engine();
    assert!(!engine.update("ghost", EntityPatch::new().name("x")).await);
}

#[tokio::test]
async fn test_revalidate_all_moves_active_to_error_and_back() {
    let mut engine = new_engine();
    register_all(
        &mut engine,
        vec![
            component("a", &[]).with_status(EntityStatus::Active),
            component("b", &[]),
            Entity::new("t", "T", EntityType::Theme).with_status(EntityStatus::Active),
        ],
    )
    .await;
    let events = record_events(&mut engine);

    engine.set_validation_provider(EntityType::Component, Arc::new(RejectAllValidator::new("revoked")));
    let failing = engine.revalidate_all().await;

    assert_eq!(failing, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(engine.get("a").unwrap().status, EntityStatus::Error);
    // Only Active entities move to Error
    assert_eq!(engine.get("b").unwrap().status, EntityStatus::Draft);
    assert_eq!(engine.get("t").unwrap().status, EntityStatus::Active);
    assert!(event_names(&events).contains(&"validation-failed"));

    engine.remove_validation_provider(EntityType::Component);
    assert!(engine.revalidate_all().await.is_empty());
    assert_eq!(engine.get("a").unwrap().status, EntityStatus::Active);
}

#[tokio::test]
async fn test_clear_resets_everything() {
    let mut engine = new_engine();
    register_all(&mut engine, vec![component("a", &[]), component("b", &["a"])]).await;
    engine.create_version("a", "init", depot_core::ChangeType::Major, "t");
    let events = record_events(&mut engine);

    engine.clear();

    assert!(engine.is_empty());
    assert!(engine.get_dependents("a", false).is_empty());
    assert!(engine.get_by_type(EntityType::Component).is_empty());
    assert_eq!(engine.version_stats().total_versions, 0);
    assert_eq!(event_names(&events), vec!["clear"]);
}
