//! Registration lifecycle: hooks, validation providers, validation cache

pub mod cache;
pub mod hooks;
pub mod validation;

pub use cache::{CacheStats, ValidationCache};
pub use hooks::{
    EntityHooks, NoopHooks, RegistryItem, RejectAllValidator, RequiredContentKeys,
    ValidationProvider,
};
pub use validation::{run_validators, validate_metadata};
