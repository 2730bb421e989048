//! MCP Tool Implementations
//!
//! Tools are grouped into categories. Each category declares its tools
//! (name, description, input schema) and executes calls addressed to them.
//! The [`ToolRegistry`] merges all declarations for `tools/list` and routes
//! `tools/call` to the owning category.
//!
//! # Tool Categories
//!
//! - **message**: send_message, list_messages, get_message, update_message, delete_message
//! - **space**: list_spaces, get_space, create_space, update_space, delete_space
//! - **member**: list_members, get_member, create_membership, update_membership,
//!   delete_membership, find_direct_message
//! - **search**: search_messages, search_spaces, search_members, get_recent_activity
//! - **webhook**: send_webhook_message, create_card_message, parse_webhook_event,
//!   validate_webhook_signature, create_interactive_card
//!
//! Every execution produces exactly one [`Envelope`]. API failures go through
//! [`map_api_error`]; nothing is allowed to escape a category.

mod envelope;
mod errors;
mod registry;

mod members;
mod messages;
mod search;
mod spaces;
mod webhooks;

#[cfg(test)]
pub(crate) mod test_support;

pub use envelope::{Envelope, ErrorBody};
pub use errors::map_api_error;
pub use members::MemberTools;
pub use messages::MessageTools;
pub use registry::{CallFailure, RegistryError, ToolRegistry};
pub use search::SearchTools;
pub use spaces::SpaceTools;
pub use webhooks::{compute_signature, validate_signature, SignatureCheck, WebhookTools};

use crate::api::{ApiError, ChatApi};
use crate::auth::{AuthError, Authenticator};
use crate::protocol::ToolDefinition;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Number, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// A group of tools sharing one executor
#[async_trait]
pub trait ToolCategory: Send + Sync {
    /// Category label (e.g., "message")
    fn category(&self) -> &'static str;

    /// Declarations for tools/list
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Names this category answers to
    fn tool_names(&self) -> BTreeSet<String> {
        self.tools().into_iter().map(|t| t.name).collect()
    }

    /// Execute one of this category's tools.
    ///
    /// Never fails: every outcome, including failures, is an envelope.
    async fn execute(&self, tool: &str, args: Value) -> Envelope;
}

/// Failures inside a tool executor, before they become envelopes
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("No space specified and no default space configured")]
    MissingSpace,

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Unexpected(String),
}

impl ToolError {
    pub fn into_envelope(self, operation: &str) -> Envelope {
        match self {
            ToolError::Api(err) => map_api_error(&err, operation),
            ToolError::MissingSpace | ToolError::InvalidParams(_) => {
                Envelope::typed_error(self.to_string(), "ValidationError")
            }
            ToolError::Auth(err) => {
                error!("Authentication failed during {}: {}", operation, err);
                Envelope::typed_error(err.to_string(), "AuthError")
            }
            ToolError::Unexpected(message) => {
                error!("Unexpected error during {}: {}", operation, message);
                Envelope::error(message)
            }
        }
    }
}

/// Collapse an executor result into its envelope
pub(crate) fn finish(operation: &str, result: Result<Envelope, ToolError>) -> Envelope {
    result.unwrap_or_else(|err| err.into_envelope(operation))
}

/// Answer for a name routed to the wrong category (registry bug)
pub(crate) fn unknown_in_category(category: &str, tool: &str) -> Envelope {
    Envelope::error(format!("Unknown {} tool: {}", category, tool))
}

/// Services shared by the API-backed categories
#[derive(Clone)]
pub struct ChatContext {
    auth: Arc<dyn Authenticator>,
    default_space: Option<String>,
}

impl ChatContext {
    pub fn new(auth: Arc<dyn Authenticator>, default_space: Option<String>) -> Self {
        Self {
            auth,
            default_space: default_space.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn default_space(&self) -> Option<&str> {
        self.default_space.as_deref()
    }

    /// The explicit space, else the default space.
    pub fn resolve_space(&self, space: Option<String>) -> Result<String, ToolError> {
        let space = space
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.default_space.clone())
            .ok_or(ToolError::MissingSpace)?;
        check_name(&space, "space")?;
        Ok(space)
    }

    /// Refresh credentials if needed and hand out the current client
    pub async fn client(&self) -> Result<Arc<dyn ChatApi>, ToolError> {
        self.auth.ensure_authenticated().await?;
        Ok(self.auth.client()?)
    }
}

/// Deserialize a tool's argument bag; a missing bag counts as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

/// Reject a caller-supplied resource name unless it is `spaces/...` made of
/// plain path segments. Names are placed verbatim in request paths.
pub(crate) fn check_name(name: &str, what: &str) -> Result<(), ToolError> {
    let segments: Vec<&str> = name.split('/').collect();
    let plain = |segment: &&str| {
        !segment.is_empty()
            && *segment != "."
            && *segment != ".."
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_.@+".contains(c))
    };
    if segments.len() >= 2 && segments[0] == "spaces" && segments[1..].iter().all(plain) {
        Ok(())
    } else {
        Err(ToolError::InvalidParams(format!(
            "{} name must look like spaces/...: {}",
            what, name
        )))
    }
}

/// Clamp a requested limit into `[1, max]`.
///
/// Any JSON number is accepted: fractions are truncated and values outside
/// the i64 range saturate.
pub(crate) fn clamp_limit(requested: &Number, max: u32) -> u32 {
    let requested = match (requested.as_i64(), requested.as_f64()) {
        (Some(n), _) => n as f64,
        (None, Some(f)) => f,
        (None, None) => f64::from(max),
    };
    requested.trunc().clamp(1.0, f64::from(max)) as u32
}

/// `users/{id}` form of a user reference (email, bare id or resource name)
pub(crate) fn normalize_user(user: &str) -> String {
    let user = user.trim();
    if user.starts_with("users/") {
        user.to_string()
    } else {
        format!("users/{}", user)
    }
}

/// Schema for the optional `space` argument
pub(crate) fn space_property() -> Value {
    json!({
        "type": "string",
        "description": "Space name (e.g., 'spaces/AAAA1234567') or leave empty for default space"
    })
}

/// Schema for a clamped `limit` argument
pub(crate) fn limit_property(what: &str, default: u32, max: u32) -> Value {
    json!({
        "type": "integer",
        "description": format!(
            "Maximum number of {} to return (default: {}, max: {})",
            what, default, max
        ),
        "minimum": 1,
        "maximum": max,
        "default": default
    })
}

/// Build the default set of categories
pub fn default_categories(ctx: ChatContext, http: reqwest::Client) -> Vec<Arc<dyn ToolCategory>> {
    vec![
        Arc::new(MessageTools::new(ctx.clone())),
        Arc::new(SpaceTools::new(ctx.clone())),
        Arc::new(MemberTools::new(ctx.clone())),
        Arc::new(SearchTools::new(ctx)),
        Arc::new(WebhookTools::new(http)),
    ]
}

/// Create a registry holding every built-in tool
pub fn create_default_registry(
    ctx: ChatContext,
    http: reqwest::Client,
) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::new(default_categories(ctx, http))
}
