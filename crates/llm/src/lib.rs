//! Generative model integration for grounded.
//!
//! A provider-agnostic [`LlmClient`] trait plus the Ollama implementation
//! used to turn an assembled prompt into an answer.
//!
//! # Example
//! ```no_run
//! use grounded_llm::{create_client, LlmRequest};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_client("ollama", None, Duration::from_secs(30))?;
//! let request = LlmRequest::new("Hello, world!", "mistral");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::OllamaClient;
