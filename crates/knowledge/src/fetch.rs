//! Source fetching and text extraction.
//!
//! A source location is either an `http(s)://` URL, fetched and stripped of
//! markup, or a local path. Directories are walked recursively.

use crate::segment::SourceDocument;
use async_trait::async_trait;
use grounded_core::{AppError, AppResult};
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};
use walkdir::WalkDir;

const SERVICE: &str = "http-fetch";

/// Elements whose whole subtree is dropped from page text.
const SKIPPED_ELEMENTS: &[&str] = &["nav", "aside", "script", "style", "footer", "header"];

/// Turns a source location into documents.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch one location. A directory yields one document per text file.
    async fn fetch(&self, location: &str) -> AppResult<Vec<SourceDocument>>;
}

/// Strips HTML down to its readable text.
#[derive(Debug, Clone)]
pub struct HtmlCleaner {
    blank_lines: Regex,
    spaces: Regex,
    line_edges: Regex,
}

impl HtmlCleaner {
    pub fn new() -> AppResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| AppError::Other(format!("Invalid pattern {}: {}", pattern, e)))
        };
        Ok(Self {
            blank_lines: compile(r"\n{2,}")?,
            spaces: compile(r"[ \t]+")?,
            line_edges: compile(r" ?\n ?")?,
        })
    }

    /// Text nodes outside skipped elements, one per line, with runs of
    /// spaces and blank lines collapsed.
    pub fn clean(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let mut parts = Vec::new();
        collect_text(document.root_element(), &mut parts);

        let text = parts.join("\n");
        let text = self.spaces.replace_all(&text, " ");
        let text = self.line_edges.replace_all(&text, "\n");
        let text = self.blank_lines.replace_all(&text, "\n\n");
        text.trim().to_string()
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if !SKIPPED_ELEMENTS.contains(&child_element.value().name()) {
                collect_text(child_element, out);
            }
        } else if let Some(text) = child.value().as_text() {
            let text: &str = text;
            out.push(text.to_string());
        }
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

fn is_html(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html") | Some("htm")
    )
}

/// Fetches URLs over HTTP and reads local files.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    cleaner: HtmlCleaner,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("grounded/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            cleaner: HtmlCleaner::new()?,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_url(&self, url: &str) -> AppResult<SourceDocument> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::from_request_error(SERVICE, e, AppError::Other))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Other(format!("GET {} returned {}", url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::from_request_error(SERVICE, e, AppError::Other))?;

        let text = self.cleaner.clean(&body);
        debug!("Fetched {} ({} chars of text)", url, text.len());
        Ok(SourceDocument::new(url, text))
    }

    fn read_file(&self, path: &Path) -> AppResult<Option<String>> {
        let bytes = fs::read(path)?;
        if bytes.contains(&0) {
            debug!("Skipping binary file: {:?}", path);
            return Ok(None);
        }
        let raw = String::from_utf8(bytes)
            .map_err(|_| AppError::Validation(format!("{:?} is not valid UTF-8", path)))?;

        Ok(Some(if is_html(path) {
            self.cleaner.clean(&raw)
        } else {
            raw
        }))
    }

    fn read_path(&self, location: &str) -> AppResult<Vec<SourceDocument>> {
        let root = Path::new(location);
        if !root.exists() {
            return Err(AppError::Validation(format!(
                "Source path does not exist: {}",
                location
            )));
        }

        if root.is_file() {
            return match self.read_file(root)? {
                Some(text) => Ok(vec![SourceDocument::new(location, text)]),
                None => Err(AppError::Validation(format!(
                    "Source is a binary file: {}",
                    location
                ))),
            };
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| AppError::Other(format!("Failed to walk {}: {}", location, e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            match self.read_file(entry.path()) {
                Ok(Some(text)) => documents.push(SourceDocument::new(
                    entry.path().to_string_lossy(),
                    text,
                )),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping {:?}: {}", entry.path(), e),
            }
        }
        debug!("Read {} files under {}", documents.len(), location);
        Ok(documents)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> AppResult<Vec<SourceDocument>> {
        if is_url(location) {
            Ok(vec![self.fetch_url(location).await?])
        } else {
            self.read_path(location)
        }
    }
}
