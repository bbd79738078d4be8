//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use grounded_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::BTreeMap;

/// Build a prompt from a definition and a question with its retrieved context.
///
/// # Example
/// ```
/// use grounded_prompt::{build_prompt, PromptDefinition};
///
/// let built = build_prompt(&PromptDefinition::default(), "What is Rust?", "").unwrap();
/// assert!(built.user.contains("Question: What is Rust?"));
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    question: &str,
    context: &str,
) -> AppResult<BuiltPrompt> {
    tracing::debug!(prompt_id = %definition.id, "Building prompt");

    let mut variables = BTreeMap::new();
    variables.insert("question".to_string(), question.to_string());
    variables.insert("context".to_string(), context.to_string());

    let user = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        system: definition.system.clone(),
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            variable_lengths: variables
                .iter()
                .map(|(k, v)| (k.clone(), v.len()))
                .collect(),
        },
    })
}

/// Render a Handlebars template with variables.
///
/// Strict mode is on, so a template naming an unknown variable fails
/// instead of rendering it as empty.
pub(crate) fn render_template(
    template: &str,
    variables: &BTreeMap<String, String>,
) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
