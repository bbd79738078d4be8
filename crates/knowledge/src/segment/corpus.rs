//! Corpus text partitioned by source.
//!
//! Each section starts with a header line `### Source: <identifier>`.

use serde::{Deserialize, Serialize};

/// Header prefix that opens a source section.
pub const SOURCE_HEADER: &str = "### Source:";

/// Source identifier for text that precedes the first header.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// The text of one corpus source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Split corpus text into per-source documents, in order.
///
/// Sections whose body is blank are dropped. A header with an empty
/// identifier is attributed to [`UNKNOWN_SOURCE`].
pub fn parse_corpus(corpus: &str) -> Vec<SourceDocument> {
    let mut documents = Vec::new();
    let mut source = UNKNOWN_SOURCE.to_string();
    let mut body: Vec<&str> = Vec::new();

    for line in corpus.lines() {
        if let Some(rest) = line.trim_start().strip_prefix(SOURCE_HEADER) {
            push_section(&mut documents, &source, &body);
            let id = rest.trim();
            source = if id.is_empty() {
                UNKNOWN_SOURCE.to_string()
            } else {
                id.to_string()
            };
            body.clear();
        } else {
            body.push(line);
        }
    }
    push_section(&mut documents, &source, &body);

    documents
}

fn push_section(documents: &mut Vec<SourceDocument>, source: &str, body: &[&str]) {
    let text = body.join("\n");
    let text = text.trim();
    if !text.is_empty() {
        documents.push(SourceDocument::new(source, text));
    }
}

/// Render documents back into corpus form.
pub fn render_corpus(documents: &[SourceDocument]) -> String {
    documents
        .iter()
        .map(|d| format!("{} {}\n\n{}", SOURCE_HEADER, d.source, d.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections() {
        let corpus = "### Source: https://a.example/one\n\nFirst body.\nMore.\n\n### Source: https://b.example/two\n\nSecond body.";
        let docs = parse_corpus(corpus);
        assert_eq!(
            docs,
            vec![
                SourceDocument::new("https://a.example/one", "First body.\nMore."),
                SourceDocument::new("https://b.example/two", "Second body."),
            ]
        );
    }

    #[test]
    fn test_preamble_is_unknown_and_blank_sections_dropped() {
        let corpus = "Loose text.\n### Source: empty\n\n   \n### Source:\nNo id here.";
        let docs = parse_corpus(corpus);
        assert_eq!(
            docs,
            vec![
                SourceDocument::new("unknown", "Loose text."),
                SourceDocument::new("unknown", "No id here."),
            ]
        );
    }

    #[test]
    fn test_render_then_parse_preserves_documents() {
        let docs = vec![
            SourceDocument::new("doc-1", "Alpha text."),
            SourceDocument::new("doc-2", "Beta text.\n\nWith a second paragraph."),
        ];
        let rendered = render_corpus(&docs);
        assert!(rendered.starts_with("### Source: doc-1\n\nAlpha text.\n\n### Source: doc-2"));
        assert_eq!(parse_corpus(&rendered), docs);
    }

    #[test]
    fn test_empty_corpus() {
        assert!(parse_corpus("").is_empty());
    }
}
