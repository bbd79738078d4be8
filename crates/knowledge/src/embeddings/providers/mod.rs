//! Embedding backend implementations.

pub mod hashing;
pub mod ollama;

pub use hashing::HashingBackend;
pub use ollama::OllamaBackend;
