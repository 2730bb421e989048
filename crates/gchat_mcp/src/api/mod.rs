//! Google Chat REST API seam
//!
//! Tool categories never talk HTTP directly. They call a [`ChatApi`], which
//! is implemented by [`RestChatClient`] in production and by in-memory fakes
//! in tests.

mod rest;

pub use rest::{RestChatClient, DEFAULT_API_BASE_URL};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure of a single remote call.
///
/// `status` is the HTTP status code when the server answered; it is `None`
/// for transport failures (DNS, TLS, connection reset, bad JSON body).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

/// Query for `spaces.list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSpacesQuery {
    pub page_size: Option<u32>,
    pub filter: Option<String>,
}

/// Query for `spaces.messages.list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMessagesQuery {
    pub page_size: Option<u32>,
    pub order_by: Option<String>,
}

/// Query for `spaces.members.list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMembersQuery {
    pub page_size: Option<u32>,
    pub show_groups: Option<bool>,
    pub show_invited: Option<bool>,
}

/// The subset of the Chat API used by the tools.
///
/// Resource names are passed through verbatim (`spaces/AAA`,
/// `spaces/AAA/messages/BBB`, `spaces/AAA/members/CCC`). Every method returns
/// the decoded JSON response body.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_spaces(&self, query: &ListSpacesQuery) -> Result<Value, ApiError>;
    async fn get_space(&self, name: &str) -> Result<Value, ApiError>;
    async fn create_space(&self, body: &Value) -> Result<Value, ApiError>;
    async fn patch_space(&self, name: &str, update_mask: &str, body: &Value)
        -> Result<Value, ApiError>;
    async fn delete_space(&self, name: &str) -> Result<Value, ApiError>;

    async fn list_messages(&self, parent: &str, query: &ListMessagesQuery)
        -> Result<Value, ApiError>;
    async fn get_message(&self, name: &str) -> Result<Value, ApiError>;
    async fn create_message(&self, parent: &str, body: &Value) -> Result<Value, ApiError>;
    async fn patch_message(&self, name: &str, update_mask: &str, body: &Value)
        -> Result<Value, ApiError>;
    async fn delete_message(&self, name: &str) -> Result<Value, ApiError>;

    async fn list_members(&self, parent: &str, query: &ListMembersQuery)
        -> Result<Value, ApiError>;
    async fn get_member(&self, name: &str) -> Result<Value, ApiError>;
    async fn create_member(&self, parent: &str, body: &Value) -> Result<Value, ApiError>;
    async fn patch_member(&self, name: &str, update_mask: &str, body: &Value)
        -> Result<Value, ApiError>;
    async fn delete_member(&self, name: &str) -> Result<Value, ApiError>;
}

/// Pull a named array out of a list response, treating absence as empty.
pub fn items(response: &Value, key: &str) -> Vec<Value> {
    response
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
