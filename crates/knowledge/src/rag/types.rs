//! Answer types.

use crate::types::RetrievalResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snippets longer than this many characters are truncated.
pub const SNIPPET_CHARS: usize = 300;

/// A retrieved passage cited in an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,

    /// Leading text of the passage, truncated to [`SNIPPET_CHARS`] with `...`
    pub snippet: String,
}

impl SourceRef {
    pub fn from_result(result: &RetrievalResult) -> Self {
        Self {
            source: result.chunk.source.clone(),
            snippet: snippet(&result.chunk.text),
        }
    }
}

/// First [`SNIPPET_CHARS`] characters of `text`, with `...` appended only
/// when something was cut.
pub fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// The query endpoint response: `{answer, sources}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// One question and its answer. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationExchange {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

impl From<ConversationExchange> for RagResponse {
    fn from(exchange: ConversationExchange) -> Self {
        Self {
            answer: exchange.answer,
            sources: exchange.sources,
        }
    }
}

/// Lifecycle of one answer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Embedding,
    Retrieving,
    Generating,
    Completed,
    Failed,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Received => "RECEIVED",
            RequestState::Embedding => "EMBEDDING",
            RequestState::Retrieving => "RETRIEVING",
            RequestState::Generating => "GENERATING",
            RequestState::Completed => "COMPLETED",
            RequestState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Failed)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
