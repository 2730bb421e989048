//! MCP (Model Context Protocol) Server for Google Chat
//!
//! This crate exposes the Google Chat REST API as MCP tools, so that AI
//! assistants can read and post messages, manage spaces and memberships, and
//! work with incoming webhooks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    AI Assistant (MCP client)                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               │ MCP Protocol (JSON-RPC over stdio)
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    crates/gchat_mcp/                             │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │                    Core Subsystems                        │   │
//! │  ├──────────────────────────────────────────────────────────┤   │
//! │  │  Server       │ JSON-RPC stdio, deadlines, prompts       │   │
//! │  │  Registry     │ name → category routing, cancellation    │   │
//! │  │  Auth         │ service account / refresh token session  │   │
//! │  │  Security     │ output budget, audit log                 │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │                    Tool Categories                        │   │
//! │  ├──────────────────────────────────────────────────────────┤   │
//! │  │  Messages     │ send, list, get, update, delete          │   │
//! │  │  Spaces       │ list, get, create, update, delete        │   │
//! │  │  Members      │ memberships, direct message lookup       │   │
//! │  │  Search       │ messages, spaces, members, activity      │   │
//! │  │  Webhooks     │ post, cards, events, signatures          │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! │                               │                                  │
//! │                               ▼                                  │
//! │              ChatApi (reqwest → chat.googleapis.com)             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! 1. **One envelope per call:** every tool execution ends in exactly one
//!    success or error envelope; API failures are mapped, never thrown.
//!
//! 2. **Categories own their tools:** a tool name belongs to exactly one
//!    category, checked when the registry is built.
//!
//! 3. **Validate before the network:** bad arguments are rejected before
//!    any token refresh or API request.

pub mod api;
pub mod auth;
pub mod protocol;
pub mod server;
pub mod tools;

pub mod prompts;
pub mod resources;
pub mod security;

// Re-exports for convenience
pub use api::{ApiError, ChatApi, RestChatClient};
pub use auth::{AuthConfig, AuthError, AuthSession, Authenticator};
pub use protocol::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use security::{AuditLog, OutputBudget};
pub use server::{McpServer, McpServerConfig};
pub use tools::{
    CallFailure, ChatContext, Envelope, RegistryError, ToolCategory, ToolError, ToolRegistry,
};
