//! Webhook tools
//!
//! Incoming-webhook delivery, card builders, event parsing and signature
//! checks. None of these need Chat API credentials.

use super::{finish, parse_args, unknown_in_category, Envelope, ToolCategory, ToolError};
use crate::protocol::ToolDefinition;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use tracing::{error, info};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted clock difference for a signed request
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

// ============================================================================
// Signatures
// ============================================================================

fn signing_mac(secret: &str, timestamp: &str, body: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    mac
}

/// Base64 HMAC-SHA256 of `"{timestamp}.{body}"` keyed with `secret`
pub fn compute_signature(secret: &str, timestamp: &str, body: &str) -> String {
    STANDARD.encode(signing_mac(secret, timestamp, body).finalize().into_bytes())
}

/// Result of checking a signed webhook request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignatureCheck {
    /// The `v1` signature matches the body
    pub is_valid: bool,
    /// The timestamp is within tolerance of `now`
    pub is_recent: bool,
    pub time_difference_seconds: i64,
    /// `is_valid && is_recent`; the flag replay protection must use
    pub signature_valid: bool,
}

/// `v1` entry of a `key=value,key=value` signature header
fn provided_signature(header: &str) -> &str {
    header
        .split(',')
        .filter_map(|part| part.split_once('='))
        .filter(|(key, _)| key.trim() == "v1")
        .map(|(_, value)| value.trim())
        .last()
        .unwrap_or("")
}

/// Check a webhook signature header against the body, as of `now` (unix
/// seconds). The comparison is constant time.
pub fn validate_signature(
    secret: &str,
    timestamp: &str,
    body: &str,
    signature_header: &str,
    now: i64,
) -> Result<SignatureCheck, ToolError> {
    let request_time: i64 = timestamp.trim().parse().map_err(|_| {
        ToolError::InvalidParams(format!(
            "timestamp must be an integer number of seconds, got '{}'",
            timestamp
        ))
    })?;

    let is_valid = match STANDARD.decode(provided_signature(signature_header)) {
        Ok(provided) => signing_mac(secret, timestamp, body)
            .verify_slice(&provided)
            .is_ok(),
        Err(_) => false,
    };

    let time_difference_seconds = now.saturating_sub(request_time).saturating_abs();
    let is_recent = time_difference_seconds <= SIGNATURE_TOLERANCE_SECS;

    Ok(SignatureCheck {
        is_valid,
        is_recent,
        time_difference_seconds,
        signature_valid: is_valid && is_recent,
    })
}

// ============================================================================
// Cards and events
// ============================================================================

#[derive(Debug, Deserialize)]
struct CardButton {
    text: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CardMessageArgs {
    title: String,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    buttons: Vec<CardButton>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CardSection {
    #[serde(default)]
    header: Option<Value>,
    #[serde(default)]
    widgets: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CardAction {
    action_id: String,
    button_text: String,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct InteractiveCardArgs {
    title: String,
    #[serde(default)]
    sections: Vec<CardSection>,
    #[serde(default)]
    actions: Vec<CardAction>,
}

fn button_widget(button: &CardButton) -> Value {
    let mut text_button = json!({ "text": button.text });
    if let Some(ref url) = button.url {
        text_button["onClick"] = json!({ "openLink": { "url": url } });
    } else if let Some(ref action) = button.action {
        text_button["onClick"] = json!({ "action": { "actionMethodName": action } });
    }
    json!({ "buttons": [{ "textButton": text_button }] })
}

fn build_card(args: &CardMessageArgs) -> Value {
    let mut header = json!({ "title": args.title });
    if let Some(subtitle) = args.subtitle.as_deref().filter(|s| !s.is_empty()) {
        header["subtitle"] = json!(subtitle);
    }
    if let Some(image_url) = args.image_url.as_deref().filter(|s| !s.is_empty()) {
        header["imageUrl"] = json!(image_url);
    }
    if args.color.as_deref().is_some_and(|c| !c.is_empty()) {
        header["imageStyle"] = json!("IMAGE");
    }

    let mut sections = Vec::new();
    if let Some(text) = args.text.as_deref().filter(|s| !s.is_empty()) {
        sections.push(json!({ "widgets": [{ "textParagraph": { "text": text } }] }));
    }
    if !args.buttons.is_empty() {
        let widgets: Vec<Value> = args.buttons.iter().map(button_widget).collect();
        sections.push(json!({ "widgets": widgets }));
    }

    let mut card = json!({ "header": header });
    if !sections.is_empty() {
        card["sections"] = Value::Array(sections);
    }
    card
}

fn build_interactive_card(args: &InteractiveCardArgs) -> Value {
    let mut sections: Vec<Value> = args
        .sections
        .iter()
        .map(|section| {
            let mut out = Map::new();
            if let Some(ref header) = section.header {
                out.insert("header".into(), header.clone());
            }
            if let Some(ref widgets) = section.widgets {
                out.insert("widgets".into(), widgets.clone());
            }
            Value::Object(out)
        })
        .collect();

    if !args.actions.is_empty() {
        let widgets: Vec<Value> = args
            .actions
            .iter()
            .map(|action| {
                let mut on_click = json!({ "actionMethodName": action.action_id });
                if let Some(ref parameters) = action.parameters {
                    let pairs: Vec<Value> = parameters
                        .iter()
                        .map(|(key, value)| json!({ "key": key, "value": value }))
                        .collect();
                    on_click["parameters"] = Value::Array(pairs);
                }
                json!({
                    "buttons": [{
                        "textButton": {
                            "text": action.button_text,
                            "onClick": { "action": on_click }
                        }
                    }]
                })
            })
            .collect();
        sections.push(json!({ "widgets": widgets }));
    }

    json!({
        "header": { "title": args.title },
        "sections": sections,
    })
}

/// Flatten a Chat event into the fields callers usually need
fn parse_event(event: &Value) -> Value {
    let field = |pointer: &str| event.pointer(pointer).cloned().unwrap_or(Value::Null);

    let mut parsed = json!({
        "event_type": event.get("type").cloned().unwrap_or_else(|| json!("UNKNOWN")),
        "event_time": field("/eventTime"),
        "space": {
            "name": field("/space/name"),
            "display_name": field("/space/displayName"),
            "type": field("/space/type"),
        },
        "user": {
            "name": field("/user/name"),
            "display_name": field("/user/displayName"),
            "email": field("/user/email"),
            "type": field("/user/type"),
        },
    });

    if let Some(message) = event
        .get("message")
        .filter(|m| m.as_object().is_some_and(|o| !o.is_empty()))
    {
        parsed["message"] = json!({
            "name": message.get("name"),
            "text": message.get("text"),
            "create_time": message.get("createTime"),
            "sender": message.get("sender").cloned().unwrap_or_else(|| json!({})),
            "thread": message.get("thread").cloned().unwrap_or_else(|| json!({})),
            "annotations": message.get("annotations").cloned().unwrap_or_else(|| json!([])),
        });
    }

    if let Some(action) = event.get("action") {
        parsed["action"] = json!({
            "action_method_name": action.get("actionMethodName"),
            "parameters": action.get("parameters").cloned().unwrap_or_else(|| json!([])),
        });
    }

    parsed
}

// ============================================================================
// Category
// ============================================================================

#[derive(Debug, Deserialize)]
struct SendWebhookArgs {
    webhook_url: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    cards: Option<Vec<Value>>,
    #[serde(default)]
    thread: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParseEventArgs {
    event_data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ValidateSignatureArgs {
    request_body: String,
    signature: String,
    timestamp: String,
    webhook_secret: String,
}

/// Webhook tools
pub struct WebhookTools {
    http: reqwest::Client,
}

impl WebhookTools {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn send_webhook_message(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: SendWebhookArgs = parse_args(args)?;
        let url = reqwest::Url::parse(&args.webhook_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| {
                ToolError::InvalidParams(format!("invalid webhook_url: {}", args.webhook_url))
            })?;

        let mut body = Map::new();
        if let Some(text) = args.text {
            body.insert("text".into(), json!(text));
        }
        if let Some(cards) = args.cards {
            body.insert("cards".into(), Value::Array(cards));
        }
        if let Some(thread) = args.thread {
            body.insert("thread".into(), json!({ "name": thread }));
        }

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::Unexpected(format!("Webhook request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ToolError::Unexpected(format!("Failed to read webhook response: {}", e)))?;

        if status.as_u16() != 200 {
            error!("Webhook request failed: {} - {}", status.as_u16(), text);
            return Ok(Envelope::Error(super::ErrorBody {
                error: format!("Webhook request failed: {}", status.as_u16()),
                status: None,
                kind: None,
                details: Some(text),
            }));
        }

        let payload = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        info!("Webhook message sent successfully");
        Ok(Envelope::success(json!({
            "message": "Message sent via webhook",
            "response": payload,
        })))
    }

    fn create_card_message(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: CardMessageArgs = parse_args(args)?;
        let card = build_card(&args);

        info!("Created card message with title: {}", args.title);
        Ok(Envelope::success(json!({
            "card": card,
            "cards": [card],
        })))
    }

    fn parse_webhook_event(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: ParseEventArgs = parse_args(args)?;
        let event = Value::Object(args.event_data);
        let parsed = parse_event(&event);

        info!("Parsed webhook event of type: {}", parsed["event_type"]);
        Ok(Envelope::success(json!({
            "parsed_event": parsed,
            "original_event": event,
        })))
    }

    fn validate_webhook_signature(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: ValidateSignatureArgs = parse_args(args)?;
        let check = validate_signature(
            &args.webhook_secret,
            &args.timestamp,
            &args.request_body,
            &args.signature,
            Utc::now().timestamp(),
        )?;

        info!(
            "Webhook signature validation: valid={}, recent={}",
            check.is_valid, check.is_recent
        );
        let payload =
            serde_json::to_value(check).map_err(|e| ToolError::Unexpected(e.to_string()))?;
        Ok(Envelope::success(payload))
    }

    fn create_interactive_card(&self, args: Value) -> Result<Envelope, ToolError> {
        let args: InteractiveCardArgs = parse_args(args)?;
        let card = build_interactive_card(&args);

        info!("Created interactive card with title: {}", args.title);
        Ok(Envelope::success(json!({
            "card": card,
            "cards": [card],
        })))
    }
}

#[async_trait]
impl ToolCategory for WebhookTools {
    fn category(&self) -> &'static str {
        "webhook"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "send_webhook_message",
                "Send a message to a Google Chat space via incoming webhook",
                json!({
                    "type": "object",
                    "properties": {
                        "webhook_url": {
                            "type": "string",
                            "description": "Incoming webhook URL for the space"
                        },
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
                            "description": "Thread key to reply to (optional)"
                        }
                    },
                    "required": ["webhook_url"]
                }),
            ),
            ToolDefinition::new(
                "create_card_message",
                "Create a rich card message for Google Chat",
                json!({
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "Card title"},
                        "subtitle": {"type": "string", "description": "Card subtitle"},
                        "text": {"type": "string", "description": "Card text content"},
                        "image_url": {
                            "type": "string",
                            "description": "URL of image to include in card"
                        },
                        "buttons": {
                            "type": "array",
                            "description": "Action buttons for the card",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "text": {"type": "string"},
                                    "url": {"type": "string"},
                                    "action": {"type": "string"}
                                },
                                "required": ["text"]
                            }
                        },
                        "color": {
                            "type": "string",
                            "description": "Accent color for the card (hex color code)"
                        }
                    },
                    "required": ["title"]
                }),
            ),
            ToolDefinition::new(
                "parse_webhook_event",
                "Parse an incoming webhook event from Google Chat",
                json!({
                    "type": "object",
                    "properties": {
                        "event_data": {
                            "type": "object",
                            "description": "Raw event data from Google Chat webhook"
                        }
                    },
                    "required": ["event_data"]
                }),
            ),
            ToolDefinition::new(
                "validate_webhook_signature",
                "Validate the signature of an incoming webhook request",
                json!({
                    "type": "object",
                    "properties": {
                        "request_body": {
                            "type": "string",
                            "description": "Raw request body from webhook"
                        },
                        "signature": {
                            "type": "string",
                            "description": "Signature header value (e.g., 't=1700000000,v1=...')"
                        },
                        "timestamp": {
                            "type": "string",
                            "description": "Request timestamp header value (unix seconds)"
                        },
                        "webhook_secret": {
                            "type": "string",
                            "description": "Secret key for webhook validation"
                        }
                    },
                    "required": ["request_body", "signature", "timestamp", "webhook_secret"]
                }),
            ),
            ToolDefinition::new(
                "create_interactive_card",
                "Create an interactive card with buttons and actions",
                json!({
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "Card title"},
                        "sections": {
                            "type": "array",
                            "description": "Card sections with content",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "header": {"type": "string"},
                                    "widgets": {"type": "array", "items": {"type": "object"}}
                                }
                            }
                        },
                        "actions": {
                            "type": "array",
                            "description": "Interactive actions for the card",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "action_id": {"type": "string"},
                                    "button_text": {"type": "string"},
                                    "parameters": {"type": "object"}
                                },
                                "required": ["action_id", "button_text"]
                            }
                        }
                    },
                    "required": ["title"]
                }),
            ),
        ]
    }

    async fn execute(&self, tool: &str, args: Value) -> Envelope {
        let result = match tool {
            "send_webhook_message" => self.send_webhook_message(args).await,
            "create_card_message" => self.create_card_message(args),
            "parse_webhook_event" => self.parse_webhook_event(args),
            "validate_webhook_signature" => self.validate_webhook_signature(args),
            "create_interactive_card" => self.create_interactive_card(args),
            _ => return unknown_in_category(self.category(), tool),
        };
        finish(tool, result)
    }
}
