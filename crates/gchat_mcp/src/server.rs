//! MCP Server Implementation
//!
//! JSON-RPC 2.0 server over stdio for the Model Context Protocol.
//!
//! # Architecture
//!
//! The server reads one request per line from stdin and writes responses to
//! stdout; logs go to stderr. Requests are handled in arrival order, so every
//! request that reaches the Chat API (`tools/call`, `resources/list`,
//! `resources/read`) runs under the tool deadline: when it expires the work
//! is cancelled and its in-flight HTTP requests are dropped.
//!
//! # Example
//!
//! ```ignore
//! let server = McpServer::from_auth_config(McpServerConfig::default(), &auth_config)?;
//! server.run().await?;
//! ```

use crate::api::DEFAULT_API_BASE_URL;
use crate::auth::{AuthConfig, AuthError, AuthSession, Authenticator};
use crate::prompts;
use crate::protocol::{
    methods, ErrorCode, Inbound, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListChangedCapability, McpProtocol, PromptsGetParams,
    PromptsListResult, RequestId, ResourcesListResult, ResourcesReadParams, ResourcesReadResult,
    ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCallResult, ToolsListResult,
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::resources;
use crate::security::{AuditLog, OutputBudget};
use crate::tools::{create_default_registry, ChatContext, ToolRegistry};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// MCP Server configuration
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name (reported in initialize)
    pub server_name: String,

    /// Server version (reported in initialize)
    pub server_version: String,

    /// Space used when a tool call names none
    pub default_space: Option<String>,

    /// Chat REST API root
    pub api_base_url: String,

    /// Maximum tool output size in bytes
    pub max_response_bytes: usize,

    /// Deadline for a single tool call
    pub tool_timeout: Duration,

    /// Path to audit log file
    pub audit_log_path: Option<PathBuf>,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            server_name: "google-chat-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            default_space: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_response_bytes: 1024 * 1024, // 1MB
            tool_timeout: Duration::from_secs(120),
            audit_log_path: None,
        }
    }
}

/// MCP Server
pub struct McpServer {
    config: McpServerConfig,
    auth: Arc<dyn Authenticator>,
    tools: ToolRegistry,
    output_budget: OutputBudget,
    audit_log: Option<AuditLog>,
}

impl McpServer {
    /// Create a server around an existing authenticator
    pub fn new(
        config: McpServerConfig,
        auth: Arc<dyn Authenticator>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let audit_log = config
            .audit_log_path
            .as_ref()
            .map(|p| AuditLog::new(p.clone()))
            .transpose()
            .context("Failed to open audit log")?;

        let ctx = ChatContext::new(Arc::clone(&auth), config.default_space.clone());
        let tools =
            create_default_registry(ctx, http).context("Failed to build tool registry")?;
        info!("Registered {} tools", tools.len());

        Ok(Self {
            output_budget: OutputBudget::new(config.max_response_bytes),
            config,
            auth,
            tools,
            audit_log,
        })
    }

    /// Create a server, choosing the credential source from `auth_config`.
    ///
    /// Fails when no credential source is configured or the key file is
    /// unusable. No token is fetched here.
    pub fn from_auth_config(config: McpServerConfig, auth_config: &AuthConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.tool_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let session = AuthSession::from_config(auth_config, http.clone(), config.api_base_url.clone())
            .context("Failed to configure authentication")?;
        Self::new(config, Arc::new(session), http)
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Fetch the first access token, bounded by the tool deadline.
    pub async fn authenticate(&self) -> Result<(), AuthError> {
        let timeout = self.config.tool_timeout;
        match tokio::time::timeout(timeout, self.auth.ensure_authenticated()).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::TimedOut(timeout.as_secs())),
        }
    }

    /// Run the server over stdin/stdout until stdin closes
    pub async fn run(&self) -> Result<()> {
        self.serve(&mut McpProtocol::stdio()).await
    }

    /// Run the server over any line-delimited transport until EOF
    pub async fn serve<R, W>(&self, protocol: &mut McpProtocol<R, W>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP server starting");

        while let Some(inbound) = protocol.read().await.context("Failed to read request")? {
            let response = match inbound {
                Inbound::Request(request) => self.handle_request(request).await,
                Inbound::Malformed(e) => Some(JsonRpcResponse::error(
                    RequestId::Null,
                    JsonRpcError::new(ErrorCode::ParseError, format!("Invalid JSON: {}", e)),
                )),
                Inbound::Invalid { id, reason } => Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(
                        ErrorCode::InvalidRequest,
                        format!("Invalid request: {}", reason),
                    ),
                )),
            };

            if let Some(response) = response {
                protocol
                    .write_response(&response)
                    .await
                    .context("Failed to write response")?;
            }
        }

        info!("MCP server shutting down");
        Ok(())
    }

    /// Handle a single JSON-RPC request.
    ///
    /// Returns None for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return request.id.map(|id| {
                JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(
                        ErrorCode::InvalidRequest,
                        format!("Invalid JSON-RPC version: {}", request.jsonrpc),
                    ),
                )
            });
        }

        let Some(id) = request.id else {
            debug!("Notification: {}", request.method);
            return None;
        };

        let outcome = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request.params),
            methods::PING => Ok(Value::Object(Default::default())),
            methods::INITIALIZED => Ok(Value::Object(Default::default())),
            methods::TOOLS_LIST => to_result(&ToolsListResult {
                tools: self.tools.list_tools(),
            }),
            methods::TOOLS_CALL => self.handle_tools_call(request.params).await,
            methods::PROMPTS_LIST => to_result(&PromptsListResult {
                prompts: prompts::list_prompts(),
            }),
            methods::PROMPTS_GET => self.handle_prompts_get(request.params),
            methods::RESOURCES_LIST => {
                let deadline = Deadline::start(self.config.tool_timeout);
                to_result(&ResourcesListResult {
                    resources: resources::list_resources(&self.tools, deadline.token()).await,
                })
            }
            methods::RESOURCES_READ => self.handle_resources_read(request.params).await,
            other => Err(JsonRpcError::new(
                ErrorCode::MethodNotFound,
                format!("Unknown method: {}", other),
            )),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(id, e),
        })
    }

    /// Handle initialize request
    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        match params.map(serde_json::from_value::<InitializeParams>) {
            Some(Ok(params)) => info!(
                "Initialize from {} v{} (protocol {})",
                params.client_info.name, params.client_info.version, params.protocol_version
            ),
            Some(Err(e)) => warn!("Unrecognised initialize params: {}", e),
            None => debug!("Initialize without params"),
        }

        let unchanging = || Some(ListChangedCapability { list_changed: false });
        to_result(&InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: unchanging(),
                resources: unchanging(),
                prompts: unchanging(),
            },
            server_info: ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
            },
        })
    }

    /// Handle tools/call request
    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ToolsCallParams = parse_params(params, "tool call")?;
        info!("Tool call: {}", params.name);

        let started = Instant::now();
        let result = self.call_with_deadline(&params.name, params.arguments.clone()).await;
        let result = self.output_budget.enforce(result);

        if let Some(audit) = &self.audit_log {
            let elapsed = started.elapsed().as_millis() as u64;
            if let Err(e) =
                audit.log_tool_call(&params.name, &params.arguments, outcome_of(&result), elapsed)
            {
                error!("Audit log write failed: {}", e);
            }
        }

        to_result(&result)
    }

    async fn call_with_deadline(&self, name: &str, args: Value) -> ToolsCallResult {
        let deadline = Deadline::start(self.config.tool_timeout);
        let result = self.tools.call_tool_with(name, args, deadline.token()).await;
        if deadline.expired() {
            warn!("Tool {} exceeded {:?} deadline", name, self.config.tool_timeout);
        }
        result
    }

    /// Handle prompts/get request
    fn handle_prompts_get(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: PromptsGetParams = parse_params(params, "prompt")?;
        match prompts::get_prompt(&params.name) {
            Some(prompt) => to_result(&prompt),
            None => Err(JsonRpcError::new(
                ErrorCode::InvalidParams,
                format!("Unknown prompt: {}", params.name),
            )),
        }
    }

    /// Handle resources/read request
    async fn handle_resources_read(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ResourcesReadParams = parse_params(params, "resource")?;
        let deadline = Deadline::start(self.config.tool_timeout);
        let contents = resources::read_resource(&self.tools, &params.uri, deadline.token()).await;
        if deadline.expired() {
            warn!("Reading {} exceeded {:?} deadline", params.uri, self.config.tool_timeout);
        }
        to_result(&ResourcesReadResult {
            contents: vec![contents],
        })
    }
}

/// A cancellation token that fires once the timeout elapses
struct Deadline {
    cancel: CancellationToken,
    timer: JoinHandle<()>,
}

impl Deadline {
    fn start(timeout: Duration) -> Self {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            trigger.cancel();
        });
        Self { cancel, timer }
    }

    fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn expired(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>, what: &str) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| {
        JsonRpcError::new(ErrorCode::InvalidParams, format!("Missing {} params", what))
    })?;
    serde_json::from_value(params).map_err(|e| {
        JsonRpcError::new(
            ErrorCode::InvalidParams,
            format!("Invalid {} params: {}", what, e),
        )
    })
}

fn to_result<T: Serialize>(result: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|e| {
        error!("Failed to serialize response: {}", e);
        JsonRpcError::new(ErrorCode::InternalError, "Failed to serialize response")
    })
}

/// Audit outcome of a rendered tool result
fn outcome_of(result: &ToolsCallResult) -> &'static str {
    if result.is_error {
        return "error";
    }
    let declined = serde_json::from_str::<Value>(result.first_text())
        .ok()
        .and_then(|v| v.get("success").and_then(Value::as_bool))
        == Some(false);
    if declined {
        "unsuccessful"
    } else {
        "success"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{FakeAuth, FakeChat};
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::io::BufReader;

    fn server(config: McpServerConfig, chat: FakeChat) -> McpServer {
        let auth = Arc::new(FakeAuth::new(Arc::new(chat)));
        McpServer::new(config, auth, reqwest::Client::new()).unwrap()
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(RequestId::Number(id)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    #[test]
    fn test_config_default() {
        let config = McpServerConfig::default();
        assert_eq!(config.server_name, "google-chat-mcp");
        assert_eq!(config.max_response_bytes, 1024 * 1024);
        assert_eq!(config.tool_timeout, Duration::from_secs(120));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert!(config.audit_log_path.is_none());
    }

    #[test]
    fn test_missing_credentials_fail_construction() {
        let result = McpServer::from_auth_config(McpServerConfig::default(), &AuthConfig::default());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_initialize_announces_capabilities() {
        let server = server(McpServerConfig::default(), FakeChat::default());
        let response = server
            .handle_request(request(
                1,
                methods::INITIALIZE,
                json!({
                    "protocolVersion": "2024-11-05",
                    "clientInfo": {"name": "test", "version": "1"}
                }),
            ))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "google-chat-mcp");
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["prompts"].is_object());
        assert!(result["capabilities"]["resources"].is_object());
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let server = server(McpServerConfig::default(), FakeChat::default());
        let notification = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: methods::INITIALIZED.to_string(),
            params: None,
        };
        assert!(server.handle_request(notification).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_and_prompt() {
        let server = server(McpServerConfig::default(), FakeChat::default());

        let response = server
            .handle_request(request(2, "sampling/createMessage", json!({})))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);

        let response = server
            .handle_request(request(3, methods::PROMPTS_GET, json!({"name": "nope"})))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_tools_call_missing_params() {
        let server = server(McpServerConfig::default(), FakeChat::default());
        let mut req = request(4, methods::TOOLS_CALL, json!({}));
        req.params = None;
        let response = server.handle_request(req).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_tools_call_is_audited_and_budgeted() {
        let temp = TempDir::new().unwrap();
        let audit_path = temp.path().join("audit.ndjson");
        let config = McpServerConfig {
            audit_log_path: Some(audit_path.clone()),
            max_response_bytes: 64,
            ..Default::default()
        };
        let chat = FakeChat::default()
            .with_space(json!({"name": "spaces/A", "displayName": "A very long display name"}));
        let server = server(config, chat);

        let response = server
            .handle_request(request(
                5,
                methods::TOOLS_CALL,
                json!({"name": "list_spaces", "arguments": {"limit": 10}}),
            ))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        let notice: Value =
            serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(notice["truncated"], true);

        let audit = std::fs::read_to_string(&audit_path).unwrap();
        let entry: Value = serde_json::from_str(audit.lines().next().unwrap()).unwrap();
        assert_eq!(entry["tool"], "list_spaces");
        assert_eq!(entry["outcome"], "error");
    }

    #[tokio::test]
    async fn test_serve_answers_malformed_lines() {
        let server = server(McpServerConfig::default(), FakeChat::default());
        let input = b"not json\n\n{\"jsonrpc\":\"2.0\",\"id\":6}\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\n";
        let mut protocol = McpProtocol::new(BufReader::new(&input[..]), Vec::new());

        server.serve(&mut protocol).await.unwrap();

        let output = String::from_utf8(protocol.into_writer()).unwrap();
        let lines: Vec<Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["error"]["code"], -32700);
        assert_eq!(lines[0]["id"], Value::Null);
        assert_eq!(lines[1]["error"]["code"], -32600);
        assert_eq!(lines[1]["id"], 6);
        assert_eq!(lines[2]["id"], 7);
        assert!(lines[2]["result"].is_object());
    }

    /// Authenticator whose token fetch never completes
    struct StalledAuth;

    #[async_trait::async_trait]
    impl Authenticator for StalledAuth {
        async fn ensure_authenticated(&self) -> Result<(), AuthError> {
            std::future::pending().await
        }

        fn client(&self) -> Result<Arc<dyn crate::api::ChatApi>, AuthError> {
            Err(AuthError::NotInitialized)
        }
    }

    fn stalled_server() -> McpServer {
        let config = McpServerConfig {
            tool_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        McpServer::new(config, Arc::new(StalledAuth), reqwest::Client::new()).unwrap()
    }

    #[tokio::test]
    async fn test_initial_authentication_is_bounded() {
        let err = stalled_server().authenticate().await.unwrap_err();
        assert!(matches!(err, AuthError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_stalled_resource_calls_hit_the_deadline() {
        let server = stalled_server();

        let response = server
            .handle_request(request(
                8,
                methods::RESOURCES_READ,
                json!({"uri": "gchat://space/spaces/A"}),
            ))
            .await
            .unwrap();
        let text = response.result.unwrap()["contents"][0]["text"].clone();
        assert_eq!(text, "Error reading space: Tool call cancelled: get_space");

        let response = server
            .handle_request(request(9, methods::RESOURCES_LIST, json!({})))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap()["resources"], json!([]));

        let response = server
            .handle_request(request(10, methods::TOOLS_LIST, json!({})))
            .await
            .unwrap();
        assert!(response.result.is_some());
    }

    #[test]
    fn test_outcome_of() {
        assert_eq!(outcome_of(&ToolsCallResult::error("x")), "error");
        assert_eq!(
            outcome_of(&ToolsCallResult::text(r#"{"success": false}"#)),
            "unsuccessful"
        );
        assert_eq!(
            outcome_of(&ToolsCallResult::text(r#"{"success": true}"#)),
            "success"
        );
    }
}
