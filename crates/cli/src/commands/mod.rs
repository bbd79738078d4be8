//! Command handlers for the grounded CLI.

pub mod ask;
pub mod ingest;
pub mod stats;

pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use stats::StatsCommand;

use grounded_core::{AppError, AppResult};
use serde::Serialize;

/// Pretty-print a value as JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(format!("JSON serialization failed: {}", e)))?;
    println!("{}", output);
    Ok(())
}
