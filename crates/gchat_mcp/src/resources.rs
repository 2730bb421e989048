//! MCP Resources
//!
//! Every accessible space is exposed as a read-only resource
//! `gchat://space/{space name}`. Reading one returns the space details plus
//! its 10 most recent messages as a single JSON document.

use crate::protocol::{ResourceContents, ResourceDefinition};
use crate::tools::{Envelope, ToolRegistry};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::error;

pub const SPACE_URI_PREFIX: &str = "gchat://space/";
pub const SPACE_MIME_TYPE: &str = "application/vnd.google.chat.space";

/// Messages included when reading a space
const RECENT_MESSAGES: u32 = 10;

/// List spaces as resources, giving up when `cancel` fires. Failures are
/// logged and yield an empty list.
pub async fn list_resources(
    registry: &ToolRegistry,
    cancel: &CancellationToken,
) -> Vec<ResourceDefinition> {
    let spaces = match registry.execute_with("list_spaces", json!({}), cancel).await {
        Ok(Envelope::Success(ref payload)) => payload
            .get("spaces")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        Ok(other) => {
            error!("Error listing resources: {}", other.to_text());
            return Vec::new();
        }
        Err(e) => {
            error!("Error listing resources: {}", e);
            return Vec::new();
        }
    };

    spaces
        .iter()
        .filter_map(|space| {
            let name = space.get("name")?.as_str()?;
            let display_name = space
                .get("displayName")
                .and_then(Value::as_str)
                .unwrap_or(name);
            let kind = space
                .get("spaceType")
                .or_else(|| space.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("SPACE");
            Some(ResourceDefinition {
                uri: format!("{}{}", SPACE_URI_PREFIX, name),
                name: display_name.to_string(),
                description: Some(format!("Google Chat space: {}", kind)),
                mime_type: Some(SPACE_MIME_TYPE.to_string()),
            })
        })
        .collect()
}

/// Read a resource by URI, giving up when `cancel` fires. Always produces
/// a text document; failures are reported in the text.
pub async fn read_resource(
    registry: &ToolRegistry,
    uri: &str,
    cancel: &CancellationToken,
) -> ResourceContents {
    let text = match uri.strip_prefix(SPACE_URI_PREFIX) {
        Some(space) if !space.is_empty() => read_space(registry, space, cancel).await,
        _ => format!("Unknown resource type: {}", uri),
    };

    ResourceContents {
        uri: uri.to_string(),
        mime_type: Some(SPACE_MIME_TYPE.to_string()),
        text,
    }
}

async fn read_space(registry: &ToolRegistry, space: &str, cancel: &CancellationToken) -> String {
    let details = registry
        .execute_with("get_space", json!({ "space": space }), cancel)
        .await;
    let messages = registry
        .execute_with(
            "list_messages",
            json!({ "space": space, "limit": RECENT_MESSAGES }),
            cancel,
        )
        .await;

    match (details, messages) {
        (Err(e), _) | (_, Err(e)) => format!("Error reading space: {}", e),
        (Ok(Envelope::Error(e)), _) | (_, Ok(Envelope::Error(e))) => {
            format!("Error reading space: {}", e.error)
        }
        (Ok(details), Ok(messages)) => {
            let document = json!({
                "space": details.to_value(),
                "recent_messages": messages.to_value(),
            });
            serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{context, FakeChat};
    use crate::protocol::ToolDefinition;
    use crate::tools::{MessageTools, SpaceTools, ToolCategory};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    /// Space tools that hang or panic instead of answering
    struct BrokenSpaces {
        hang: bool,
    }

    #[async_trait]
    impl ToolCategory for BrokenSpaces {
        fn category(&self) -> &'static str {
            "space"
        }

        fn tools(&self) -> Vec<ToolDefinition> {
            ["list_spaces", "get_space", "list_messages"]
                .into_iter()
                .map(|name| ToolDefinition::new(name, "broken", json!({"type": "object"})))
                .collect()
        }

        async fn execute(&self, _tool: &str, _args: Value) -> Envelope {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            panic!("space listing bug");
        }
    }

    fn broken(hang: bool) -> ToolRegistry {
        ToolRegistry::new(vec![Arc::new(BrokenSpaces { hang }) as Arc<dyn ToolCategory>]).unwrap()
    }

    async fn read(registry: &ToolRegistry, uri: &str) -> ResourceContents {
        read_resource(registry, uri, &CancellationToken::new()).await
    }

    fn registry(chat: FakeChat) -> ToolRegistry {
        let ctx = context(Arc::new(chat), None);
        ToolRegistry::new(vec![
            Arc::new(MessageTools::new(ctx.clone())) as Arc<dyn ToolCategory>,
            Arc::new(SpaceTools::new(ctx)),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_spaces_listed_as_resources() {
        let registry = registry(
            FakeChat::default()
                .with_space(json!({"name": "spaces/A", "displayName": "Team", "spaceType": "SPACE"}))
                .with_space(json!({"name": "spaces/B"})),
        );

        let resources = list_resources(&registry, &CancellationToken::new()).await;
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].uri, "gchat://space/spaces/A");
        assert_eq!(resources[0].name, "Team");
        assert_eq!(resources[1].name, "spaces/B");
        assert_eq!(
            resources[1].description.as_deref(),
            Some("Google Chat space: SPACE")
        );
    }

    #[tokio::test]
    async fn test_listing_failure_yields_nothing() {
        let registry = registry(FakeChat::default().failing("spaces", 500));
        assert!(list_resources(&registry, &CancellationToken::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_read_space_includes_recent_messages() {
        let registry = registry(
            FakeChat::default()
                .with_space(json!({"name": "spaces/A", "displayName": "Team"}))
                .with_messages("spaces/A", vec![json!({"name": "spaces/A/messages/1"})]),
        );

        let contents = read(&registry, "gchat://space/spaces/A").await;
        let document: Value = serde_json::from_str(&contents.text).unwrap();
        assert_eq!(document["space"]["space"]["displayName"], "Team");
        assert_eq!(
            document["recent_messages"]["messages"][0]["name"],
            "spaces/A/messages/1"
        );
    }

    #[tokio::test]
    async fn test_read_missing_space_reports_error() {
        let registry = registry(FakeChat::default());
        let contents = read(&registry, "gchat://space/spaces/GONE").await;
        assert!(contents.text.starts_with("Error reading space:"));
    }

    #[tokio::test]
    async fn test_unknown_uri() {
        let registry = registry(FakeChat::default());
        let contents = read(&registry, "file:///etc/passwd").await;
        assert_eq!(contents.text, "Unknown resource type: file:///etc/passwd");
    }

    #[tokio::test]
    async fn test_panicking_executor_is_contained() {
        let registry = broken(false);

        assert!(list_resources(&registry, &CancellationToken::new())
            .await
            .is_empty());
        let contents = read(&registry, "gchat://space/spaces/A").await;
        assert_eq!(
            contents.text,
            "Error reading space: tool get_space failed unexpectedly"
        );
    }

    #[tokio::test]
    async fn test_hung_read_gives_up_when_cancelled() {
        let registry = broken(true);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let contents = read_resource(&registry, "gchat://space/spaces/A", &cancel).await;
        assert_eq!(
            contents.text,
            "Error reading space: Tool call cancelled: get_space"
        );
        assert!(list_resources(&registry, &cancel).await.is_empty());
    }
}
