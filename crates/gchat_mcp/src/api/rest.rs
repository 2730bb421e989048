//! reqwest-backed implementation of [`ChatApi`]

use super::{ApiError, ChatApi, ListMembersQuery, ListMessagesQuery, ListSpacesQuery};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::trace;

/// Production endpoint of the Chat API
pub const DEFAULT_API_BASE_URL: &str = "https://chat.googleapis.com/v1";

/// Chat API client bound to one bearer token.
///
/// Cheap to build: the underlying `reqwest::Client` is reference counted, so
/// the auth session hands out a fresh instance whenever the token changes.
#[derive(Clone)]
pub struct RestChatClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestChatClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn request(&self, method: Method, resource: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, resource.trim_start_matches('/'));
        trace!("{} {}", method, url);
        self.http.request(method, url).bearer_auth(&self.token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::transport(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = remote_error_message(&body)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(ApiError::with_status(status.as_u16(), message));
        }

        if body.trim().is_empty() {
            return Ok(json!({}));
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::transport(format!("Invalid JSON response: {}", e)))
    }

    async fn patch(&self, name: &str, update_mask: &str, body: &Value) -> Result<Value, ApiError> {
        let request = self
            .request(Method::PATCH, name)
            .query(&[("updateMask", update_mask)])
            .json(body);
        self.send(request).await
    }
}

/// Extract `error.message` from a Google API error body
fn remote_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl ChatApi for RestChatClient {
    async fn list_spaces(&self, query: &ListSpacesQuery) -> Result<Value, ApiError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(size) = query.page_size {
            params.push(("pageSize", size.to_string()));
        }
        if let Some(ref filter) = query.filter {
            params.push(("filter", filter.clone()));
        }
        self.send(self.request(Method::GET, "spaces").query(&params)).await
    }

    async fn get_space(&self, name: &str) -> Result<Value, ApiError> {
        self.send(self.request(Method::GET, name)).await
    }

    async fn create_space(&self, body: &Value) -> Result<Value, ApiError> {
        self.send(self.request(Method::POST, "spaces").json(body)).await
    }

    async fn patch_space(
        &self,
        name: &str,
        update_mask: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        self.patch(name, update_mask, body).await
    }

    async fn delete_space(&self, name: &str) -> Result<Value, ApiError> {
        self.send(self.request(Method::DELETE, name)).await
    }

    async fn list_messages(
        &self,
        parent: &str,
        query: &ListMessagesQuery,
    ) -> Result<Value, ApiError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(size) = query.page_size {
            params.push(("pageSize", size.to_string()));
        }
        if let Some(ref order_by) = query.order_by {
            params.push(("orderBy", order_by.clone()));
        }
        let resource = format!("{}/messages", parent);
        self.send(self.request(Method::GET, &resource).query(&params)).await
    }

    async fn get_message(&self, name: &str) -> Result<Value, ApiError> {
        self.send(self.request(Method::GET, name)).await
    }

    async fn create_message(&self, parent: &str, body: &Value) -> Result<Value, ApiError> {
        let resource = format!("{}/messages", parent);
        self.send(self.request(Method::POST, &resource).json(body)).await
    }

    async fn patch_message(
        &self,
        name: &str,
        update_mask: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        self.patch(name, update_mask, body).await
    }

    async fn delete_message(&self, name: &str) -> Result<Value, ApiError> {
        self.send(self.request(Method::DELETE, name)).await
    }

    async fn list_members(
        &self,
        parent: &str,
        query: &ListMembersQuery,
    ) -> Result<Value, ApiError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(size) = query.page_size {
            params.push(("pageSize", size.to_string()));
        }
        if let Some(show_groups) = query.show_groups {
            params.push(("showGroups", show_groups.to_string()));
        }
        if let Some(show_invited) = query.show_invited {
            params.push(("showInvited", show_invited.to_string()));
        }
        let resource = format!("{}/members", parent);
        self.send(self.request(Method::GET, &resource).query(&params)).await
    }

    async fn get_member(&self, name: &str) -> Result<Value, ApiError> {
        self.send(self.request(Method::GET, name)).await
    }

    async fn create_member(&self, parent: &str, body: &Value) -> Result<Value, ApiError> {
        let resource = format!("{}/members", parent);
        self.send(self.request(Method::POST, &resource).json(body)).await
    }

    async fn patch_member(
        &self,
        name: &str,
        update_mask: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        self.patch(name, update_mask, body).await
    }

    async fn delete_member(&self, name: &str) -> Result<Value, ApiError> {
        self.send(self.request(Method::DELETE, name)).await
    }
}
