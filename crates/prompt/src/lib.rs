//! Prompt system for grounded.
//!
//! - YAML-based prompt definitions with a built-in grounded-answer default
//! - Handlebars rendering of the `question` and `context` variables

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{load_prompt, load_prompt_or_default};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, DEFAULT_PROMPT_ID};
