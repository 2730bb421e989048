//! MCP Protocol implementation
//!
//! JSON-RPC 2.0 message types, the MCP payloads this server speaks, and a
//! line-delimited framing over any async reader/writer pair (stdio in
//! production, in-memory buffers in tests).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::{debug, trace};

use crate::tools::Envelope;

/// JSON-RPC version string
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision announced in `initialize`
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
}

// =============================================================================
// JSON-RPC Types
// =============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Request ID (absent for notifications)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Request ID this response corresponds to
    pub id: RequestId,

    /// Result (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Standard JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
        }
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,

    /// Error message
    pub message: String,

    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }
}

/// Request ID (can be string, number, or null)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
    #[default]
    Null,
}

// =============================================================================
// MCP-Specific Types
// =============================================================================

/// MCP Initialize request params
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version
    pub protocol_version: String,

    /// Client capabilities
    #[serde(default)]
    pub capabilities: Value,

    /// Client info
    pub client_info: ClientInfo,
}

/// Client info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// MCP Initialize result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

/// Server capabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChangedCapability>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ListChangedCapability>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChangedCapability>,
}

/// `{ "listChanged": bool }` capability shape shared by tools/prompts/resources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChangedCapability {
    pub list_changed: bool,
}

/// Server info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Tool definition for tools/list response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// tools/list result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
}

/// tools/call params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,

    #[serde(default)]
    pub arguments: Value,
}

/// tools/call result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCallResult {
    pub content: Vec<ContentBlock>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolsCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
        }
    }

    /// Render a tool envelope as one pretty-printed JSON text block
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            content: vec![ContentBlock::text(envelope.to_text())],
            is_error: envelope.is_error(),
        }
    }

    /// Text of the first block (every result this server builds has one)
    pub fn first_text(&self) -> &str {
        match self.content.first() {
            Some(ContentBlock::Text { text }) => text,
            None => "",
        }
    }
}

/// Content block in tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// Prompt listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub name: String,
    pub description: String,
}

/// prompts/list result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsListResult {
    pub prompts: Vec<PromptDefinition>,
}

/// prompts/get params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsGetParams {
    pub name: String,
}

/// prompts/get result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsGetResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
}

/// A single prompt message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: ContentBlock,
}

/// Resource listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// resources/list result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesListResult {
    pub resources: Vec<ResourceDefinition>,
}

/// resources/read params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesReadParams {
    pub uri: String,
}

/// resources/read result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesReadResult {
    pub contents: Vec<ResourceContents>,
}

/// Text contents of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub text: String,
}

// =============================================================================
// Framing
// =============================================================================

/// Protocol-level I/O failures
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One inbound line
#[derive(Debug)]
pub enum Inbound {
    Request(JsonRpcRequest),
    /// Line that is not JSON at all; carries the parse error
    Malformed(String),
    /// JSON that is not a JSON-RPC request, with its id when one was readable
    Invalid { id: RequestId, reason: String },
}

/// Classify one non-blank input line
fn classify(line: &str) -> Inbound {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return Inbound::Malformed(e.to_string()),
    };
    let id = value
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value(id).ok())
        .unwrap_or_default();
    match serde_json::from_value::<JsonRpcRequest>(value) {
        Ok(request) => Inbound::Request(request),
        Err(e) => Inbound::Invalid {
            id,
            reason: e.to_string(),
        },
    }
}

/// Line-delimited JSON-RPC transport
pub struct McpProtocol<R, W> {
    reader: R,
    writer: W,
}

impl McpProtocol<BufReader<Stdin>, Stdout> {
    /// Protocol over the process's stdin/stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> McpProtocol<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read the next message.
    ///
    /// Returns None if the input is closed (EOF). Blank lines are skipped.
    pub async fn read(&mut self) -> Result<Option<Inbound>, ProtocolError> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                debug!("input closed (EOF)");
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            trace!("Received: {}", trimmed);

            return Ok(Some(classify(trimmed)));
        }
    }

    /// Write a JSON-RPC response followed by a newline
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> Result<(), ProtocolError> {
        let json = serde_json::to_string(response)?;
        trace!("Sending: {}", json);

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Give back the writer (tests inspect what was written)
    pub fn into_writer(self) -> W {
        self.writer
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_has_no_id() {
        let json = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let request: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert!(request.is_notification());
    }

    #[test]
    fn test_request_id_variants() {
        let numeric: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        assert_eq!(numeric.id, Some(RequestId::Number(7)));

        let text: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"abc","method":"ping"}"#).unwrap();
        assert_eq!(text.id, Some(RequestId::String("abc".into())));
    }

    #[test]
    fn test_response_error_code() {
        let response = JsonRpcResponse::error(
            RequestId::Number(1),
            JsonRpcError::new(ErrorCode::MethodNotFound, "Unknown method: nope"),
        );
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[test]
    fn test_tool_definition_uses_camel_case_schema_key() {
        let def = ToolDefinition::new("list_spaces", "List spaces", json!({"type": "object"}));
        let value = serde_json::to_value(&def).unwrap();
        assert!(value.get("inputSchema").is_some());
        assert!(value.get("input_schema").is_none());
    }

    #[test]
    fn test_call_result_omits_false_is_error() {
        let ok = serde_json::to_value(ToolsCallResult::text("hi")).unwrap();
        assert!(ok.get("isError").is_none());
        assert_eq!(ok["content"][0]["type"], "text");

        let err = serde_json::to_value(ToolsCallResult::error("boom")).unwrap();
        assert_eq!(err["isError"], true);
    }

    #[test]
    fn test_tools_call_params_default_arguments() {
        let params: ToolsCallParams = serde_json::from_str(r#"{"name": "list_spaces"}"#).unwrap();
        assert_eq!(params.name, "list_spaces");
        assert!(params.arguments.is_null());
    }

    #[tokio::test]
    async fn test_framing_reads_requests_and_reports_malformed_lines() {
        let input = b"\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\nnot json\n".to_vec();
        let mut protocol = McpProtocol::new(&input[..], Vec::new());

        match protocol.read().await.unwrap() {
            Some(Inbound::Request(request)) => assert_eq!(request.method, "ping"),
            other => panic!("expected request, got {:?}", other),
        }
        assert!(matches!(
            protocol.read().await.unwrap(),
            Some(Inbound::Malformed(_))
        ));
        assert!(protocol.read().await.unwrap().is_none());
    }

    #[test]
    fn test_json_without_method_is_invalid_not_malformed() {
        match classify(r#"{"jsonrpc":"2.0","id":"abc"}"#) {
            Inbound::Invalid { id, .. } => assert_eq!(id, RequestId::String("abc".into())),
            other => panic!("expected invalid request, got {:?}", other),
        }
        match classify("[1, 2]") {
            Inbound::Invalid { id, .. } => assert_eq!(id, RequestId::Null),
            other => panic!("expected invalid request, got {:?}", other),
        }
        assert!(matches!(classify("{\"jsonrpc\""), Inbound::Malformed(_)));
    }

    #[tokio::test]
    async fn test_write_response_is_newline_delimited() {
        let mut protocol = McpProtocol::new(&b""[..], Vec::new());
        protocol
            .write_response(&JsonRpcResponse::success(RequestId::Number(3), json!({})))
            .await
            .unwrap();

        let written = String::from_utf8(protocol.into_writer()).unwrap();
        assert!(written.ends_with('\n'));
        let parsed: Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(parsed["id"], 3);
    }
}
