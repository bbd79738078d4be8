//! Ingest command handler.
//!
//! With no arguments, ingests the sources listed in the configuration, so
//! a scheduler can re-run it unchanged.

use super::print_json;
use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::{IngestRequest, PipelineConfig, ProgressEvent, ProgressReporter};
use std::path::PathBuf;
use std::sync::Arc;

/// Fetch, segment, embed and index the corpus
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Corpus file with `### Source: <id>` section headers
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Source location (URL, file or directory); replaces the configured sources
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Delete all points in the collection before writing
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");
        tracing::debug!("Ingest options: {:?}", self);

        let pipeline = PipelineConfig::from_app_config(config)?;

        let sources = if !self.sources.is_empty() {
            self.sources.clone()
        } else if self.corpus.is_some() {
            Vec::new()
        } else {
            pipeline.sources.clone()
        };

        let progress = if self.json {
            ProgressReporter::noop()
        } else {
            ProgressReporter::new(Arc::new(|event: ProgressEvent| eprintln!("{}", event.format_simple())))
        };

        let request = IngestRequest {
            sources,
            corpus: self.corpus.clone(),
            reset: self.reset,
        };
        let stats = grounded_knowledge::ingest(&pipeline, request, progress).await?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!(
                "Ingested {} sources into '{}': {} segments, {} chunks in {:.2}s",
                stats.sources_ingested,
                stats.collection,
                stats.segments,
                stats.chunks,
                stats.duration_ms as f64 / 1000.0
            );
            for failed in &stats.failed_sources {
                println!("  skipped {}: {}", failed.location, failed.error);
            }
        }

        Ok(())
    }
}
