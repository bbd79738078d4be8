//! Prompt loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use grounded_core::{AppError, AppResult};
use std::path::Path;

/// Load a prompt definition from a YAML file and validate it.
pub fn load_prompt(path: &Path) -> AppResult<PromptDefinition> {
    tracing::debug!("Loading prompt from: {:?}", path);

    if !path.exists() {
        return Err(AppError::Prompt(format!("Prompt file not found: {:?}", path)));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", path, e))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {}", definition.id);

    Ok(definition)
}

/// Load the prompt at `path`, or the built-in default when no path is configured.
pub fn load_prompt_or_default(path: Option<&Path>) -> AppResult<PromptDefinition> {
    match path {
        Some(path) => load_prompt(path),
        None => Ok(PromptDefinition::grounded_answer()),
    }
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    // A template without the question cannot answer anything.
    if !def.template.contains("question") {
        return Err(AppError::Prompt(format!(
            "Prompt template {} does not reference {{{{question}}}}",
            def.id
        )));
    }

    Ok(())
}
