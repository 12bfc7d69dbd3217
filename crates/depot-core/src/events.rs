//! Registry event dispatch
//!
//! The engine owns one `EventDispatcher` and publishes after each state
//! change has been committed. Handlers run synchronously, in subscription
//! order, on the caller's task; a handler must not call back into the engine.

use std::sync::Arc;

use depot_core_types::schema::{
    REGISTRY_EVENT_BATCH_COMPLETE, REGISTRY_EVENT_CHANGE, REGISTRY_EVENT_CLEAR,
    REGISTRY_EVENT_ERROR, REGISTRY_EVENT_REGISTER, REGISTRY_EVENT_UNREGISTER,
    REGISTRY_EVENT_VALIDATION_FAILED, REGISTRY_EVENT_VERSION_CREATED,
    REGISTRY_EVENT_VERSION_ROLLBACK,
};

use crate::model::{ChangeType, DeleteMode, Entity};

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Registered {
        entity: Entity,
    },
    Unregistered {
        entity_id: String,
        mode: DeleteMode,
    },
    Changed {
        entity: Entity,
    },
    Error {
        op: String,
        entity_id: Option<String>,
        code: &'static str,
        message: String,
    },
    BatchComplete {
        success: usize,
        failed: usize,
    },
    ValidationFailed {
        entity_ids: Vec<String>,
    },
    Cleared {
        removed: usize,
    },
    VersionCreated {
        entity_id: String,
        version: String,
        change_type: ChangeType,
    },
    VersionRollback {
        entity_id: String,
        target_version: String,
        new_version: String,
    },
}

impl RegistryEvent {
    /// Wire name, shared with the logging schema
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::Registered { .. } => REGISTRY_EVENT_REGISTER,
            RegistryEvent::Unregistered { .. } => REGISTRY_EVENT_UNREGISTER,
            RegistryEvent::Changed { .. } => REGISTRY_EVENT_CHANGE,
            RegistryEvent::Error { .. } => REGISTRY_EVENT_ERROR,
            RegistryEvent::BatchComplete { .. } => REGISTRY_EVENT_BATCH_COMPLETE,
            RegistryEvent::ValidationFailed { .. } => REGISTRY_EVENT_VALIDATION_FAILED,
            RegistryEvent::Cleared { .. } => REGISTRY_EVENT_CLEAR,
            RegistryEvent::VersionCreated { .. } => REGISTRY_EVENT_VERSION_CREATED,
            RegistryEvent::VersionRollback { .. } => REGISTRY_EVENT_VERSION_ROLLBACK,
        }
    }

    /// Entity the event concerns, if any
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            RegistryEvent::Registered { entity } | RegistryEvent::Changed { entity } => {
                Some(&entity.id)
            }
            RegistryEvent::Unregistered { entity_id, .. }
            | RegistryEvent::VersionCreated { entity_id, .. }
            | RegistryEvent::VersionRollback { entity_id, .. } => Some(entity_id),
            RegistryEvent::Error { entity_id, .. } => entity_id.as_deref(),
            _ => None,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    /// `None` receives every event
    name: Option<&'static str>,
    handler: EventHandler,
}

#[derive(Default)]
pub struct EventDispatcher {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.push(None, Arc::new(handler))
    }

    /// Receive only events whose `name()` equals `name`
    pub fn subscribe_to<F>(&mut self, name: &'static str, handler: F) -> SubscriptionId
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.push(Some(name), Arc::new(handler))
    }

    /// Returns false if the id was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn dispatch(&self, event: &RegistryEvent) {
        let name = event.name();
        for sub in &self.subscriptions {
            if sub.name.map_or(true, |n| n == name) {
                (sub.handler)(event);
            }
        }
    }

    fn push(&mut self, name: Option<&'static str>, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, name, handler });
        id
    }
}
