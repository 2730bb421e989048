//! Output Budget - Response Size Limits
//!
//! Cross-space searches and message listings can return large documents.
//! Oversized tool output is replaced by a short JSON notice so the client's
//! context is not flooded.

use super::SecurityError;
use crate::protocol::ToolsCallResult;
use serde_json::json;

/// Characters of the original output kept in a truncation notice
const PREVIEW_CHARS: usize = 2_000;

/// Output budget for limiting response sizes
#[derive(Debug, Clone)]
pub struct OutputBudget {
    /// Maximum text size in bytes
    max_bytes: usize,
}

impl OutputBudget {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Default budget (1MB)
    pub fn default_budget() -> Self {
        Self {
            max_bytes: 1024 * 1024,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Check if response size is within budget
    pub fn check_size(&self, size: usize) -> Result<(), SecurityError> {
        if size > self.max_bytes {
            Err(SecurityError::OutputTooLarge {
                size,
                max: self.max_bytes,
            })
        } else {
            Ok(())
        }
    }

    /// Replace an oversized result with a truncation notice.
    ///
    /// The notice keeps a short prefix of the original text (cut on a char
    /// boundary) and is flagged as an error.
    pub fn enforce(&self, result: ToolsCallResult) -> ToolsCallResult {
        let size = result.first_text().len();
        if let Err(e) = self.check_size(size) {
            let preview: String = result.first_text().chars().take(PREVIEW_CHARS).collect();
            let notice = json!({
                "error": e.to_string(),
                "truncated": true,
                "size_bytes": size,
                "max_bytes": self.max_bytes,
                "preview": preview,
                "hint": "Narrow the request with a smaller limit or a specific space",
            });
            let text = serde_json::to_string_pretty(&notice).unwrap_or_else(|_| notice.to_string());
            return ToolsCallResult::error(text);
        }
        result
    }
}

impl Default for OutputBudget {
    fn default() -> Self {
        Self::default_budget()
    }
}
