//! Space tools: list, get, create, update, delete

use super::{
    check_name, clamp_limit, finish, parse_args, unknown_in_category, ChatContext, Envelope,
    ToolCategory, ToolError,
};
use crate::api::{items, ListSpacesQuery};
use crate::protocol::ToolDefinition;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use tracing::info;

const MAX_LIMIT: u32 = 100;
const SPACE_GUIDELINES: &str = "Space created via MCP server";

fn default_limit() -> Number {
    Number::from(25)
}

fn default_space_mask() -> String {
    "displayName,spaceDetails".to_string()
}

/// Kinds of space that can be created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum CreatableSpaceType {
    #[default]
    Space,
    GroupChat,
}

impl CreatableSpaceType {
    fn as_str(self) -> &'static str {
        match self {
            CreatableSpaceType::Space => "SPACE",
            CreatableSpaceType::GroupChat => "GROUP_CHAT",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListSpacesArgs {
    #[serde(default = "default_limit")]
    limit: Number,
    #[serde(default)]
    filter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpaceRef {
    space: String,
}

#[derive(Debug, Deserialize)]
struct CreateSpaceArgs {
    display_name: String,
    #[serde(default)]
    space_type: CreatableSpaceType,
    #[serde(default)]
    threaded: Option<bool>,
    #[serde(default)]
    external_user_allowed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct UpdateSpaceArgs {
    space: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    threaded: Option<bool>,
    #[serde(default)]
    external_user_allowed: Option<bool>,
    #[serde(default = "default_space_mask")]
    update_mask: String,
}

fn threading_state(threaded: bool) -> &'static str {
    if threaded {
        "THREADED_MESSAGES"
    } else {
        "UNTHREADED_MESSAGES"
    }
}

fn create_body(args: &CreateSpaceArgs) -> Value {
    let mut details = Map::new();
    details.insert("guidelines".into(), json!(SPACE_GUIDELINES));
    if let Some(allowed) = args.external_user_allowed {
        details.insert("externalUserAllowed".into(), json!(allowed));
    }

    let mut body = Map::new();
    body.insert("displayName".into(), json!(args.display_name));
    body.insert("spaceType".into(), json!(args.space_type.as_str()));
    body.insert("spaceDetails".into(), Value::Object(details));
    if let Some(threaded) = args.threaded {
        body.insert("spaceThreadingState".into(), json!(threading_state(threaded)));
    }
    Value::Object(body)
}

fn update_body(args: &UpdateSpaceArgs) -> Value {
    let mut body = Map::new();
    if let Some(ref name) = args.display_name {
        body.insert("displayName".into(), json!(name));
    }
    if let Some(threaded) = args.threaded {
        body.insert("spaceThreadingState".into(), json!(threading_state(threaded)));
    }
    if let Some(allowed) = args.external_user_allowed {
        body.insert(
            "spaceDetails".into(),
            json!({ "externalUserAllowed": allowed }),
        );
    }
    Value::Object(body)
}

/// Space management tools
pub struct SpaceTools {
    ctx: ChatContext,
}

impl SpaceTools {
    pub fn new(ctx: ChatContext) -> Self {
        Self { ctx }
    }

    async fn list_spaces(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: ListSpacesArgs = parse_args(args)?;
        let client = self.ctx.client().await?;

        let query = ListSpacesQuery {
            page_size: Some(clamp_limit(&args.limit, MAX_LIMIT)),
            filter: args.filter.filter(|f| !f.trim().is_empty()),
        };
        let response = client.list_spaces(&query).await?;
        let spaces = items(&response, "spaces");

        info!("Retrieved {} spaces", spaces.len());
        Ok(Envelope::success(json!({
            "count": spaces.len(),
            "spaces": spaces,
        })))
    }

    async fn get_space(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: SpaceRef = parse_args(args)?;
        check_name(&args.space, "space")?;
        let client = self.ctx.client().await?;

        let space = client.get_space(&args.space).await?;

        info!("Retrieved space details for {}", args.space);
        Ok(Envelope::success(json!({ "space": space })))
    }

    async fn create_space(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: CreateSpaceArgs = parse_args(args)?;
        let client = self.ctx.client().await?;

        let space = client.create_space(&create_body(&args)).await?;
        let space_id = space.get("name").cloned().unwrap_or(Value::Null);

        info!("Created new space: {}", space_id);
        Ok(Envelope::success(json!({
            "space": space,
            "space_id": space_id,
        })))
    }

    async fn update_space(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: UpdateSpaceArgs = parse_args(args)?;
        check_name(&args.space, "space")?;
        let client = self.ctx.client().await?;

        let space = client
            .patch_space(&args.space, &args.update_mask, &update_body(&args))
            .await?;

        info!("Updated space {}", args.space);
        Ok(Envelope::success(json!({ "space": space })))
    }

    async fn delete_space(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: SpaceRef = parse_args(args)?;
        check_name(&args.space, "space")?;
        let client = self.ctx.client().await?;

        client.delete_space(&args.space).await?;

        info!("Deleted space {}", args.space);
        Ok(Envelope::success(json!({
            "message": format!("Space {} deleted successfully", args.space),
        })))
    }
}

#[async_trait]
impl ToolCategory for SpaceTools {
    fn category(&self) -> &'static str {
        "space"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        let space_name = json!({
            "type": "string",
            "description": "Space name (e.g., 'spaces/AAAA1234567')"
        });

        vec![
            ToolDefinition::new(
                "list_spaces",
                "List Google Chat spaces the caller is a member of",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": super::limit_property("spaces", 25, MAX_LIMIT),
                        "filter": {
                            "type": "string",
                            "description": "Filter query (e.g., 'spaceType = \"SPACE\"')"
                        }
                    }
                }),
            ),
            ToolDefinition::new(
                "get_space",
                "Get details about a specific Google Chat space",
                json!({
                    "type": "object",
                    "properties": { "space": space_name },
                    "required": ["space"]
                }),
            ),
            ToolDefinition::new(
                "create_space",
                "Create a new Google Chat space (group chat)",
                json!({
                    "type": "object",
                    "properties": {
                        "display_name": {
                            "type": "string",
                            "description": "Display name for the new space"
                        },
                        "space_type": {
                            "type": "string",
                            "description": "Type of space to create",
                            "enum": ["SPACE", "GROUP_CHAT"],
                            "default": "SPACE"
                        },
                        "threaded": {
                            "type": "boolean",
                            "description": "Whether the space should support threaded messages",
                            "default": false
                        },
                        "external_user_allowed": {
                            "type": "boolean",
                            "description": "Whether external users can be added to the space",
                            "default": false
                        }
                    },
                    "required": ["display_name"]
                }),
            ),
            ToolDefinition::new(
                "update_space",
                "Update an existing Google Chat space",
                json!({
                    "type": "object",
                    "properties": {
                        "space": space_name,
                        "display_name": {
                            "type": "string",
                            "description": "New display name for the space"
                        },
                        "threaded": {
                            "type": "boolean",
                            "description": "Whether the space should support threaded messages"
                        },
                        "external_user_allowed": {
                            "type": "boolean",
                            "description": "Whether external users can be added to the space"
                        },
                        "update_mask": {
                            "type": "string",
                            "description": "Fields to update (default: 'displayName,spaceDetails')",
                            "default": "displayName,spaceDetails"
                        }
                    },
                    "required": ["space"]
                }),
            ),
            ToolDefinition::new(
                "delete_space",
                "Delete a Google Chat space",
                json!({
                    "type": "object",
                    "properties": { "space": space_name },
                    "required": ["space"]
                }),
            ),
        ]
    }

    async fn execute(&self, tool: &str, args: Value) -> Envelope {
        let result = match tool {
            "list_spaces" => self.list_spaces(args).await,
            "get_space" => self.get_space(args).await,
            "create_space" => self.create_space(args).await,
            "update_space" => self.update_space(args).await,
            "delete_space" => self.delete_space(args).await,
            _ => return unknown_in_category(self.category(), tool),
        };
        finish(tool, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{context, FakeChat};
    use std::sync::Arc;

    fn tools(chat: FakeChat) -> (SpaceTools, Arc<FakeChat>) {
        let chat = Arc::new(chat);
        (SpaceTools::new(context(chat.clone(), None)), chat)
    }

    #[tokio::test]
    async fn test_list_spaces_clamps_limit() {
        let (tools, chat) = tools(
            FakeChat::default()
                .with_space(json!({"name": "spaces/A", "spaceType": "SPACE"}))
                .with_space(json!({"name": "spaces/B", "spaceType": "SPACE"})),
        );

        let envelope = tools.execute("list_spaces", json!({"limit": 1000})).await;

        assert_eq!(envelope.get("count"), Some(&json!(2)));
        let call = chat.last_call();
        assert_eq!(call.page_size, Some(100));
        assert_eq!(call.param, None);
    }

    #[test]
    fn test_create_body_defaults() {
        let args: CreateSpaceArgs = parse_args(json!({"display_name": "Team"})).unwrap();
        assert_eq!(
            create_body(&args),
            json!({
                "displayName": "Team",
                "spaceType": "SPACE",
                "spaceDetails": {"guidelines": "Space created via MCP server"}
            })
        );
    }

    #[test]
    fn test_create_body_optional_settings() {
        let args: CreateSpaceArgs = parse_args(json!({
            "display_name": "Ops",
            "space_type": "GROUP_CHAT",
            "threaded": false,
            "external_user_allowed": true
        }))
        .unwrap();
        let body = create_body(&args);
        assert_eq!(body["spaceType"], "GROUP_CHAT");
        assert_eq!(body["spaceThreadingState"], "UNTHREADED_MESSAGES");
        assert_eq!(body["spaceDetails"]["externalUserAllowed"], true);
    }

    #[test]
    fn test_create_rejects_direct_message_type() {
        let result: Result<CreateSpaceArgs, _> =
            parse_args(json!({"display_name": "x", "space_type": "DIRECT_MESSAGE"}));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_space_sends_only_present_fields() {
        let (tools, chat) = tools(FakeChat::default());

        let envelope = tools
            .execute(
                "update_space",
                json!({"space": "spaces/A", "threaded": true}),
            )
            .await;

        assert!(!envelope.is_error());
        let call = chat.last_call();
        assert_eq!(call.op, "patch_space");
        assert_eq!(call.param.as_deref(), Some("displayName,spaceDetails"));
        assert_eq!(
            call.body,
            Some(json!({"spaceThreadingState": "THREADED_MESSAGES"}))
        );
    }

    #[tokio::test]
    async fn test_create_space_reports_id() {
        let (tools, _chat) = tools(FakeChat::default());

        let envelope = tools
            .execute("create_space", json!({"display_name": "New"}))
            .await;

        assert_eq!(envelope.get("space_id"), Some(&json!("spaces/NEW")));
    }

    #[tokio::test]
    async fn test_permission_denied_is_mapped() {
        let (tools, _chat) = tools(FakeChat::default().failing("spaces/LOCKED", 403));

        let envelope = tools
            .execute("delete_space", json!({"space": "spaces/LOCKED"}))
            .await;

        let value = envelope.to_value();
        assert_eq!(value["status"], 403);
        assert!(value["error"].as_str().unwrap().starts_with("Permission denied"));
    }
}
