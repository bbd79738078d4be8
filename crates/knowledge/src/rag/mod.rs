//! Retrieval-augmented answering.
//!
//! A question is embedded, the collection is searched with MMR, the
//! retrieved passages fill the prompt, and the model's completion comes
//! back with the cited sources.

pub mod ask;
pub mod types;

pub use ask::{build_context, AnswerSettings, Answerer};
pub use types::{snippet, ConversationExchange, RagResponse, RequestState, SourceRef};
