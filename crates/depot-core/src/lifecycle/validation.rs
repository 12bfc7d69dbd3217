use crate::errors::{DepotError, Result};
use crate::lifecycle::hooks::{EntityHooks, ValidationProvider};
use crate::model::{Entity, SemVer};

/// Check required fields before anything else touches the entity
///
/// # Errors
///
/// Returns `MetadataInvalid` naming the first bad field.
pub fn validate_metadata(entity: &Entity) -> Result<()> {
    let invalid = |reason: &str| DepotError::MetadataInvalid {
        entity_id: entity.id.clone(),
        reason: reason.to_string(),
    };

    if entity.id.trim().is_empty() {
        return Err(invalid("id must not be empty"));
    }
    if entity.id.chars().any(char::is_whitespace) {
        return Err(invalid("id must not contain whitespace"));
    }
    if entity.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if let Err(e) = entity.version.parse::<SemVer>() {
        return Err(invalid(&format!("version: {}", e)));
    }
    if entity.dependencies.iter().any(|d| d.trim().is_empty()) {
        return Err(invalid("dependency ids must not be empty"));
    }
    if entity.tags.iter().any(|t| t.trim().is_empty()) {
        return Err(invalid("tags must not be empty"));
    }
    if entity.category.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(invalid("category must not be blank"));
    }
    Ok(())
}

/// Run the entity's validate hook and its type's provider
///
/// Both run even if the first rejects, so the caller sees every message.
pub async fn run_validators(
    entity: &Entity,
    hooks: Option<&dyn EntityHooks>,
    provider: Option<&dyn ValidationProvider>,
) -> std::result::Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if let Some(hooks) = hooks {
        if let Err(mut e) = hooks.validate(entity).await {
            errors.append(&mut e);
        }
    }
    if let Some(provider) = provider {
        if let Err(mut e) = provider.validate(entity).await {
            errors.append(&mut e);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
