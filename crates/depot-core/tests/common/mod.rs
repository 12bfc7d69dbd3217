use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use depot_core::{
    EngineConfig, Entity, EntityHooks, EntityType, RegistryEngine, RegistryEvent,
    ValidationProvider,
};
use uuid::Uuid;

/// Fresh engine with default configuration
#[allow(dead_code)]
pub fn new_engine() -> RegistryEngine {
    RegistryEngine::new(EngineConfig::default())
}

/// Component entity with the given dependencies
#[allow(dead_code)]
pub fn component(id: &str, deps: &[&str]) -> Entity {
    Entity::new(id, id.to_uppercase(), EntityType::Component).with_dependencies(deps.iter().copied())
}

/// Id that no other test in the binary uses
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::now_v7())
}

/// Register every entity, panicking on the first failure
#[allow(dead_code)]
pub async fn register_all(engine: &mut RegistryEngine, entities: Vec<Entity>) {
    for entity in entities {
        let id = entity.id.clone();
        engine
            .try_register(entity)
            .await
            .unwrap_or_else(|e| panic!("register {} failed: {}", id, e));
    }
}

/// Subscribe a recorder that keeps every event name in order
#[allow(dead_code)]
pub fn record_events(engine: &mut RegistryEngine) -> Arc<Mutex<Vec<RegistryEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    seen
}

#[allow(dead_code)]
pub fn event_names(events: &Arc<Mutex<Vec<RegistryEvent>>>) -> Vec<&'static str> {
    events.lock().unwrap().iter().map(RegistryEvent::name).collect()
}

/// Hooks with scripted outcomes that count their calls
#[derive(Default)]
#[allow(dead_code)]
pub struct ScriptedHooks {
    pub fail_initialize: bool,
    pub fail_cleanup: bool,
    pub reject: Option<String>,
    pub initialized: AtomicUsize,
    pub cleaned_up: AtomicUsize,
}

#[async_trait]
impl EntityHooks for ScriptedHooks {
    async fn validate(&self, _entity: &Entity) -> Result<(), Vec<String>> {
        match &self.reject {
            Some(reason) => Err(vec![reason.clone()]),
            None => Ok(()),
        }
    }

    async fn initialize(&self, _entity: &Entity) -> Result<(), String> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize {
            Err("initialize refused".to_string())
        } else {
            Ok(())
        }
    }

    async fn cleanup(&self, _entity: &Entity) -> Result<(), String> {
        self.cleaned_up.fetch_add(1, Ordering::SeqCst);
        if self.fail_cleanup {
            Err("cleanup refused".to_string())
        } else {
            Ok(())
        }
    }
}

/// Validation provider that counts calls and rejects content with
/// `"valid": false`
#[derive(Default)]
#[allow(dead_code)]
pub struct CountingValidator {
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl CountingValidator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValidationProvider for CountingValidator {
    async fn validate(&self, entity: &Entity) -> Result<(), Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if entity.content.get("valid") == Some(&serde_json::Value::Bool(false)) {
            Err(vec!["content marked invalid".to_string()])
        } else {
            Ok(())
        }
    }
}
