//! Stats command handler.

use super::print_json;
use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::PipelineConfig;

/// Show collection statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let pipeline = PipelineConfig::from_app_config(config)?;
        let stats = grounded_knowledge::stats(&pipeline).await?;

        if self.json {
            return print_json(&stats);
        }

        println!("Collection: {} ({})", stats.collection, stats.backend);
        println!("Location:   {}", stats.uri);
        if stats.exists {
            if let (Some(dimension), Some(metric)) = (stats.dimension, stats.distance_metric) {
                println!("Schema:     {} dimensions, {}", dimension, metric);
            }
            println!("Points:     {}", stats.points);
        } else {
            println!("Not created yet. Run `grounded ingest` first.");
        }

        Ok(())
    }
}
