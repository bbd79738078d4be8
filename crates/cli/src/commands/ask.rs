//! Ask command handler.

use super::print_json;
use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::{PipelineConfig, RagResponse, SearchParams};

/// Answer a question from the indexed corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Number of passages to use as context
    #[arg(short = 'k', long)]
    pub k: Option<usize>,

    /// Size of the candidate pool re-ranked for diversity
    #[arg(long)]
    pub fetch_k: Option<usize>,

    /// Relevance/diversity trade-off (1.0 = relevance only)
    #[arg(long)]
    pub lambda: Option<f32>,

    /// Print `{answer, sources}` as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask options: {:?}", self);

        let pipeline = PipelineConfig::from_app_config(config)?;
        let params = self.search_params(pipeline.search)?;
        let answerer = grounded_knowledge::build_answerer(&pipeline).await?;

        let response = RagResponse::from(answerer.answer_with(&self.query, &params).await?);

        if self.json {
            print_json(&response)?;
        } else {
            print!("{}", render_text(&response));
        }

        Ok(())
    }

    /// Configured retrieval parameters with the command-line overrides applied.
    fn search_params(&self, mut params: SearchParams) -> AppResult<SearchParams> {
        if let Some(k) = self.k {
            params.k = k;
        }
        if let Some(fetch_k) = self.fetch_k {
            params.fetch_k = fetch_k;
        }
        if let Some(lambda) = self.lambda {
            params.diversity_lambda = lambda;
        }
        params.validate()?;
        Ok(params)
    }
}

/// Answer followed by each source and its snippet.
fn render_text(response: &RagResponse) -> String {
    let mut out = format!("{}\n\n", response.answer);
    if response.sources.is_empty() {
        out.push_str("Sources: (none retrieved)\n");
        return out;
    }

    out.push_str("Sources:\n");
    for source in &response.sources {
        out.push_str(&format!("- {}\n", source.source));
        for line in source.snippet.lines() {
            out.push_str(&format!("    {}\n", line));
        }
    }
    out
}
