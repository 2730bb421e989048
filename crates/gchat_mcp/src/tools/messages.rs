//! Message tools: send, list, get, update, delete

use super::{
    check_name, clamp_limit, finish, parse_args, unknown_in_category, ChatContext, Envelope,
    ToolCategory, ToolError,
};
use crate::api::{items, ListMessagesQuery};
use crate::protocol::ToolDefinition;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use tracing::info;

const MAX_LIMIT: u32 = 100;

fn default_limit() -> Number {
    Number::from(25)
}

fn default_message_mask() -> String {
    "text,cards".to_string()
}

/// Ordering accepted by `list_messages`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
enum MessageOrder {
    #[default]
    #[serde(rename = "create_time desc")]
    NewestFirst,
    #[serde(rename = "create_time")]
    OldestFirst,
}

impl MessageOrder {
    /// `orderBy` value understood by the Chat API
    fn as_api(self) -> &'static str {
        match self {
            MessageOrder::NewestFirst => "createTime desc",
            MessageOrder::OldestFirst => "createTime asc",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendMessageArgs {
    #[serde(default)]
    space: Option<String>,
    text: String,
    #[serde(default)]
    cards: Option<Vec<Value>>,
    #[serde(default)]
    thread: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListMessagesArgs {
    #[serde(default)]
    space: Option<String>,
    #[serde(default = "default_limit")]
    limit: Number,
    #[serde(default)]
    order_by: MessageOrder,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UpdateMessageArgs {
    message: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    cards: Option<Vec<Value>>,
    #[serde(default = "default_message_mask")]
    update_mask: String,
}

/// Message body holding only the fields that were supplied
fn message_body(text: Option<String>, cards: Option<Vec<Value>>, thread: Option<String>) -> Value {
    let mut body = Map::new();
    if let Some(text) = text {
        body.insert("text".into(), Value::String(text));
    }
    if let Some(cards) = cards {
        body.insert("cards".into(), Value::Array(cards));
    }
    if let Some(thread) = thread {
        body.insert("thread".into(), json!({ "name": thread }));
    }
    Value::Object(body)
}

/// Message management tools
pub struct MessageTools {
    ctx: ChatContext,
}

impl MessageTools {
    pub fn new(ctx: ChatContext) -> Self {
        Self { ctx }
    }

    async fn send_message(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: SendMessageArgs = parse_args(args)?;
        let space = self.ctx.resolve_space(args.space)?;
        let client = self.ctx.client().await?;

        let body = message_body(Some(args.text), args.cards, args.thread);
        let message = client.create_message(&space, &body).await?;

        info!("Message sent successfully to {}", space);
        Ok(Envelope::success(json!({
            "message_id": message.get("name").cloned().unwrap_or(Value::Null),
            "message": message,
            "space": space,
        })))
    }

    async fn list_messages(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: ListMessagesArgs = parse_args(args)?;
        let space = self.ctx.resolve_space(args.space)?;
        let client = self.ctx.client().await?;

        let query = ListMessagesQuery {
            page_size: Some(clamp_limit(&args.limit, MAX_LIMIT)),
            order_by: Some(args.order_by.as_api().to_string()),
        };
        let response = client.list_messages(&space, &query).await?;
        let messages = items(&response, "messages");

        info!("Retrieved {} messages from {}", messages.len(), space);
        Ok(Envelope::success(json!({
            "count": messages.len(),
            "messages": messages,
            "space": space,
        })))
    }

    async fn get_message(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: MessageRef = parse_args(args)?;
        check_name(&args.message, "message")?;
        let client = self.ctx.client().await?;

        let message = client.get_message(&args.message).await?;

        info!("Retrieved message {}", args.message);
        Ok(Envelope::success(json!({ "message": message })))
    }

    async fn update_message(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: UpdateMessageArgs = parse_args(args)?;
        check_name(&args.message, "message")?;
        let client = self.ctx.client().await?;

        let body = message_body(args.text, args.cards, None);
        let message = client
            .patch_message(&args.message, &args.update_mask, &body)
            .await?;

        info!("Updated message {}", args.message);
        Ok(Envelope::success(json!({ "message": message })))
    }

    async fn delete_message(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: MessageRef = parse_args(args)?;
        check_name(&args.message, "message")?;
        let client = self.ctx.client().await?;

        client.delete_message(&args.message).await?;

        info!("Deleted message {}", args.message);
        Ok(Envelope::success(json!({
            "message": format!("Message {} deleted successfully", args.message),
        })))
    }
}

#[async_trait]
impl ToolCategory for MessageTools {
    fn category(&self) -> &'static str {
        "message"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "send_message",
                "Send a message to a Google Chat space",
                json!({
                    "type": "object",
                    "properties": {
                        "space": super::space_property(),
                        "text": {
                            "type": "string",
                            "description": "Plain text message to send"
                        },
                        "cards": {
                            "type": "array",
                            "description": "Card messages (rich content)",
                            "items": {"type": "object"}
                        },
                        "thread": {
                            "type": "string",
                            "description": "Thread to reply to (optional)"
                        }
                    },
                    "required": ["text"]
                }),
            ),
            ToolDefinition::new(
                "list_messages",
                "List messages in a Google Chat space",
                json!({
                    "type": "object",
                    "properties": {
                        "space": super::space_property(),
                        "limit": super::limit_property("messages", 25, MAX_LIMIT),
                        "order_by": {
                            "type": "string",
                            "description": "Order messages by (create_time desc or create_time)",
                            "enum": ["create_time desc", "create_time"],
                            "default": "create_time desc"
                        }
                    }
                }),
            ),
            ToolDefinition::new(
                "get_message",
                "Get a specific message by ID",
                json!({
                    "type": "object",
                    "properties": {
                        "message": message_property()
                    },
                    "required": ["message"]
                }),
            ),
            ToolDefinition::new(
                "update_message",
                "Update an existing message",
                json!({
                    "type": "object",
                    "properties": {
                        "message": message_property(),
                        "text": {
                            "type": "string",
                            "description": "New text content"
                        },
                        "cards": {
                            "type": "array",
                            "description": "New card content",
                            "items": {"type": "object"}
                        },
                        "update_mask": {
                            "type": "string",
                            "description": "Fields to update (default: 'text,cards')",
                            "default": "text,cards"
                        }
                    },
                    "required": ["message"]
                }),
            ),
            ToolDefinition::new(
                "delete_message",
                "Delete a message",
                json!({
                    "type": "object",
                    "properties": {
                        "message": message_property()
                    },
                    "required": ["message"]
                }),
            ),
        ]
    }

    async fn execute(&self, tool: &str, args: Value) -> Envelope {
        let result = match tool {
            "send_message" => self.send_message(args).await,
            "list_messages" => self.list_messages(args).await,
            "get_message" => self.get_message(args).await,
            "update_message" => self.update_message(args).await,
            "delete_message" => self.delete_message(args).await,
            _ => return unknown_in_category(self.category(), tool),
        };
        finish(tool, result)
    }
}

fn message_property() -> Value {
    json!({
        "type": "string",
        "description": "Full message name (e.g., 'spaces/AAAA1234567/messages/xyz')"
    })
}
