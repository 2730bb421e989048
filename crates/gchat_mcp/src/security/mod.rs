//! Safety rails around tool execution
//!
//! - [`OutputBudget`]: caps the size of text returned to the client
//! - [`AuditLog`]: append-only NDJSON record of tool calls

mod audit;
mod output_budget;

pub use audit::{AuditLog, summarize_params};
pub use output_budget::OutputBudget;

use thiserror::Error;

/// Security-layer errors
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Output too large: {size} bytes (max {max})")]
    OutputTooLarge { size: usize, max: usize },

    #[error("Audit log error: {0}")]
    AuditError(String),
}
