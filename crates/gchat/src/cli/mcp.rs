//! MCP Server CLI launcher
//!
//! The server communicates via stdio using JSON-RPC, so nothing here may
//! print to stdout while serving.

use crate::CredentialArgs;
use anyhow::{Context, Result};
use gchat_mcp::auth::{AuthConfig, AuthSession, Authenticator, Unauthenticated};
use gchat_mcp::tools::{create_default_registry, ChatContext};
use gchat_mcp::{McpServer, McpServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Arguments for the serve command
pub struct ServeArgs {
    pub credentials: CredentialArgs,
    pub default_space: Option<String>,
    pub timeout_secs: u64,
    pub max_response_bytes: usize,
    pub audit_log_path: Option<PathBuf>,
}

impl CredentialArgs {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            credentials_path: self.credentials.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
            ..Default::default()
        }
    }
}

/// Run the MCP server until stdin closes.
///
/// Missing credentials abort startup. A failed first token fetch does not:
/// discovery keeps working and tool calls report the authentication error.
pub async fn serve(args: ServeArgs) -> Result<()> {
    let config = McpServerConfig {
        default_space: args.default_space,
        tool_timeout: Duration::from_secs(args.timeout_secs),
        max_response_bytes: args.max_response_bytes,
        audit_log_path: args.audit_log_path,
        ..Default::default()
    };

    let server = McpServer::from_auth_config(config, &args.credentials.auth_config())?;

    match server.authenticate().await {
        Ok(()) => info!("Google Chat authentication successful"),
        Err(e) => warn!("Initial authentication failed: {}", e),
    }

    info!(
        "MCP Server starting via stdio ({} tools registered)",
        server.tools().len()
    );
    server.run().await
}

/// Print the tool catalog (no credentials needed)
pub async fn list_tools(json: bool) -> Result<()> {
    let ctx = ChatContext::new(Arc::new(Unauthenticated), None);
    let registry = create_default_registry(ctx, reqwest::Client::new())?;
    let tools = registry.list_tools();

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    for tool in &tools {
        let category = registry.owner_of(&tool.name).unwrap_or("-");
        println!("{:<28} {:<8} {}", tool.name, category, tool.description);
    }
    println!("\n{} tools", tools.len());
    Ok(())
}

/// Fetch one access token with the configured credentials
pub async fn check_auth(credentials: CredentialArgs) -> Result<()> {
    let session = AuthSession::from_config(
        &credentials.auth_config(),
        reqwest::Client::new(),
        gchat_mcp::api::DEFAULT_API_BASE_URL,
    )?;
    session
        .ensure_authenticated()
        .await
        .context("Authentication failed")?;

    println!("Authentication successful");
    Ok(())
}
