//! Mapping of failures into error envelopes

use super::envelope::{Envelope, ErrorBody};
use crate::api::ApiError;
use tracing::error;

/// Convert a failed API call into an error envelope.
///
/// Well-known statuses get fixed, actionable messages; anything else names
/// the operation and carries the remote description.
pub fn map_api_error(err: &ApiError, operation: &str) -> Envelope {
    error!("Error during {}: {}", operation, err);

    let (message, kind) = match err.status {
        Some(403) => (
            "Permission denied. Check your authentication and API permissions.".to_string(),
            None,
        ),
        Some(404) => (
            "Resource not found. Check the space/message ID.".to_string(),
            None,
        ),
        Some(429) => (
            "Rate limit exceeded. Please try again later.".to_string(),
            None,
        ),
        _ => (
            format!("API error during {}: {}", operation, err),
            Some("ApiError".to_string()),
        ),
    };

    Envelope::Error(ErrorBody {
        error: message,
        status: err.status,
        kind,
        details: None,
    })
}
