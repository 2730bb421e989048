//! In-memory Chat API used by the category unit tests

use super::ChatContext;
use crate::api::{ApiError, ChatApi, ListMembersQuery, ListMessagesQuery, ListSpacesQuery};
use crate::auth::{AuthError, Authenticator};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One recorded API call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub target: String,
    pub page_size: Option<u32>,
    pub param: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
pub struct FakeChat {
    pub spaces: Vec<Value>,
    pub messages: HashMap<String, Vec<Value>>,
    pub members: HashMap<String, Vec<Value>>,
    /// Resource name → HTTP status every call on it fails with
    pub failures: HashMap<String, u16>,
    calls: Mutex<Vec<Call>>,
}

impl FakeChat {
    pub fn with_space(mut self, space: Value) -> Self {
        self.spaces.push(space);
        self
    }

    pub fn with_messages(mut self, space: &str, messages: Vec<Value>) -> Self {
        self.messages.insert(space.to_string(), messages);
        self
    }

    pub fn with_members(mut self, space: &str, members: Vec<Value>) -> Self {
        self.members.insert(space.to_string(), members);
        self
    }

    pub fn failing(mut self, resource: &str, status: u16) -> Self {
        self.failures.insert(resource.to_string(), status);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Call {
        self.calls().pop().expect("no API call recorded")
    }

    fn record(
        &self,
        op: &'static str,
        target: &str,
        page_size: Option<u32>,
        param: Option<String>,
        body: Option<&Value>,
    ) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(Call {
            op,
            target: target.to_string(),
            page_size,
            param,
            body: body.cloned(),
        });
        match self.failures.get(target) {
            Some(&status) => Err(ApiError::with_status(status, format!("{} failed", target))),
            None => Ok(()),
        }
    }
}

fn page(items: &[Value], page_size: Option<u32>) -> Vec<Value> {
    let take = page_size.map(|n| n as usize).unwrap_or(items.len());
    items.iter().take(take).cloned().collect()
}

fn find(items: &[Value], name: &str) -> Result<Value, ApiError> {
    items
        .iter()
        .find(|item| item["name"] == name)
        .cloned()
        .ok_or_else(|| ApiError::with_status(404, format!("{} not found", name)))
}

fn with_name(body: &Value, name: String) -> Value {
    let mut created = body.clone();
    created["name"] = Value::String(name);
    created
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn list_spaces(&self, query: &ListSpacesQuery) -> Result<Value, ApiError> {
        self.record("list_spaces", "spaces", query.page_size, query.filter.clone(), None)?;
        let wanted = query
            .filter
            .as_deref()
            .and_then(|f| f.strip_prefix("spaceType = "))
            .map(|t| t.trim_matches('"').to_string());
        let spaces: Vec<Value> = self
            .spaces
            .iter()
            .filter(|s| match &wanted {
                Some(t) => s["spaceType"] == t.as_str(),
                None => true,
            })
            .cloned()
            .collect();
        Ok(json!({ "spaces": page(&spaces, query.page_size) }))
    }

    async fn get_space(&self, name: &str) -> Result<Value, ApiError> {
        self.record("get_space", name, None, None, None)?;
        find(&self.spaces, name)
    }

    async fn create_space(&self, body: &Value) -> Result<Value, ApiError> {
        self.record("create_space", "spaces", None, None, Some(body))?;
        Ok(with_name(body, "spaces/NEW".into()))
    }

    async fn patch_space(&self, name: &str, mask: &str, body: &Value) -> Result<Value, ApiError> {
        self.record("patch_space", name, None, Some(mask.into()), Some(body))?;
        Ok(with_name(body, name.into()))
    }

    async fn delete_space(&self, name: &str) -> Result<Value, ApiError> {
        self.record("delete_space", name, None, None, None)?;
        Ok(json!({}))
    }

    async fn list_messages(
        &self,
        parent: &str,
        query: &ListMessagesQuery,
    ) -> Result<Value, ApiError> {
        self.record("list_messages", parent, query.page_size, query.order_by.clone(), None)?;
        let messages = self.messages.get(parent).cloned().unwrap_or_default();
        Ok(json!({ "messages": page(&messages, query.page_size) }))
    }

    async fn get_message(&self, name: &str) -> Result<Value, ApiError> {
        self.record("get_message", name, None, None, None)?;
        let all: Vec<Value> = self.messages.values().flatten().cloned().collect();
        find(&all, name)
    }

    async fn create_message(&self, parent: &str, body: &Value) -> Result<Value, ApiError> {
        self.record("create_message", parent, None, None, Some(body))?;
        Ok(with_name(body, format!("{}/messages/M1", parent)))
    }

    async fn patch_message(&self, name: &str, mask: &str, body: &Value) -> Result<Value, ApiError> {
        self.record("patch_message", name, None, Some(mask.into()), Some(body))?;
        Ok(with_name(body, name.into()))
    }

    async fn delete_message(&self, name: &str) -> Result<Value, ApiError> {
        self.record("delete_message", name, None, None, None)?;
        Ok(json!({}))
    }

    async fn list_members(&self, parent: &str, query: &ListMembersQuery) -> Result<Value, ApiError> {
        let flags = format!(
            "groups={:?} invited={:?}",
            query.show_groups, query.show_invited
        );
        self.record("list_members", parent, query.page_size, Some(flags), None)?;
        let members = self.members.get(parent).cloned().unwrap_or_default();
        Ok(json!({ "memberships": page(&members, query.page_size) }))
    }

    async fn get_member(&self, name: &str) -> Result<Value, ApiError> {
        self.record("get_member", name, None, None, None)?;
        let all: Vec<Value> = self.members.values().flatten().cloned().collect();
        find(&all, name)
    }

    async fn create_member(&self, parent: &str, body: &Value) -> Result<Value, ApiError> {
        self.record("create_member", parent, None, None, Some(body))?;
        Ok(with_name(body, format!("{}/members/NEW", parent)))
    }

    async fn patch_member(&self, name: &str, mask: &str, body: &Value) -> Result<Value, ApiError> {
        self.record("patch_member", name, None, Some(mask.into()), Some(body))?;
        Ok(with_name(body, name.into()))
    }

    async fn delete_member(&self, name: &str) -> Result<Value, ApiError> {
        self.record("delete_member", name, None, None, None)?;
        Ok(json!({}))
    }
}

/// Always-authenticated session handing out one fake client
pub struct FakeAuth {
    chat: Arc<FakeChat>,
    pub ensures: AtomicUsize,
}

impl FakeAuth {
    pub fn new(chat: Arc<FakeChat>) -> Self {
        Self {
            chat,
            ensures: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Authenticator for FakeAuth {
    async fn ensure_authenticated(&self) -> Result<(), AuthError> {
        self.ensures.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn client(&self) -> Result<Arc<dyn ChatApi>, AuthError> {
        Ok(self.chat.clone())
    }
}

/// Context over `chat`, with an optional default space
pub fn context(chat: Arc<FakeChat>, default_space: Option<&str>) -> ChatContext {
    let auth = Arc::new(FakeAuth::new(chat));
    ChatContext::new(auth, default_space.map(str::to_string))
}
