//! Prompt types for grounded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of the built-in grounded-answer prompt.
pub const DEFAULT_PROMPT_ID: &str = "grounded.answer.default";

const DEFAULT_TEMPLATE: &str = "You are a precise assistant. Use the following context to answer the question.
Cite sources as [source] if helpful. If unsure, say you don't know.

Question: {{question}}

Context:
{{context}}

Answer:";

/// A prompt definition, either built in or loaded from YAML.
///
/// The template is Handlebars and is rendered with the `question` and
/// `context` variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    #[serde(default)]
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,

    /// Optional system message sent alongside the rendered template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Template string with Handlebars syntax
    pub template: String,
}

fn default_api_version() -> String {
    "1.0".to_string()
}

impl PromptDefinition {
    /// The built-in grounded-answer prompt.
    pub fn grounded_answer() -> Self {
        Self {
            id: DEFAULT_PROMPT_ID.to_string(),
            title: "Answer from retrieved context".to_string(),
            api_version: default_api_version(),
            system: None,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl Default for PromptDefinition {
    fn default() -> Self {
        Self::grounded_answer()
    }
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Byte length of each template variable that was supplied
    #[serde(rename = "variableLengths")]
    pub variable_lengths: BTreeMap<String, usize>,
}
