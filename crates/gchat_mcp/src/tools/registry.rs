//! Tool Registry - Tool Discovery and Dispatch
//!
//! Merges every category's declarations and routes calls by name. The
//! name→owner map is built once; a name declared twice is rejected at
//! construction.

use super::{Envelope, ToolCategory};
use crate::protocol::{ToolDefinition, ToolsCallResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Registry construction errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate tool name '{name}' declared by both '{first}' and '{second}'")]
    DuplicateTool {
        name: String,
        first: &'static str,
        second: &'static str,
    },
}

/// Why a guarded execution produced no envelope
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallFailure {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool call cancelled: {0}")]
    Cancelled(String),

    #[error("tool {0} failed unexpectedly")]
    Panicked(String),
}

/// Registry of available MCP tools
pub struct ToolRegistry {
    categories: Vec<Arc<dyn ToolCategory>>,
    owners: HashMap<String, usize>,
    catalog: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(categories: Vec<Arc<dyn ToolCategory>>) -> Result<Self, RegistryError> {
        let mut owners = HashMap::new();
        let mut catalog = Vec::new();

        for (index, category) in categories.iter().enumerate() {
            for tool in category.tools() {
                if let Some(&previous) = owners.get(&tool.name) {
                    let first: &Arc<dyn ToolCategory> = &categories[previous];
                    return Err(RegistryError::DuplicateTool {
                        name: tool.name,
                        first: first.category(),
                        second: category.category(),
                    });
                }
                debug!("Registering tool: {} ({})", tool.name, category.category());
                owners.insert(tool.name.clone(), index);
                catalog.push(tool);
            }
        }

        debug!(
            "Registered {} tools across {} categories",
            catalog.len(),
            categories.len()
        );

        Ok(Self {
            categories,
            owners,
            catalog,
        })
    }

    /// List all available tools (category order, then declaration order)
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.catalog.clone()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.owners.contains_key(name)
    }

    /// Category owning `name`
    pub fn owner_of(&self, name: &str) -> Option<&'static str> {
        self.owners
            .get(name)
            .map(|&index| self.categories[index].category())
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Run a tool to its raw envelope, with no deadline.
    pub async fn execute(&self, name: &str, args: Value) -> Result<Envelope, CallFailure> {
        self.execute_with(name, args, &CancellationToken::new())
            .await
    }

    /// Run a tool to its raw envelope, giving up as soon as `cancel` fires.
    ///
    /// The executor runs in its own task so cancellation drops its in-flight
    /// requests and a panic cannot reach the caller.
    pub async fn execute_with(
        &self,
        name: &str,
        args: Value,
        cancel: &CancellationToken,
    ) -> Result<Envelope, CallFailure> {
        let Some(&index) = self.owners.get(name) else {
            warn!("Unknown tool: {}", name);
            return Err(CallFailure::UnknownTool(name.to_string()));
        };

        let category = Arc::clone(&self.categories[index]);
        let tool = name.to_string();
        let mut task = tokio::spawn(async move { category.execute(&tool, args).await });

        tokio::select! {
            joined = &mut task => joined.map_err(|e| {
                error!("Tool {} failed unexpectedly: {}", name, e);
                CallFailure::Panicked(name.to_string())
            }),
            _ = cancel.cancelled() => {
                task.abort();
                warn!("Tool call cancelled: {}", name);
                Err(CallFailure::Cancelled(name.to_string()))
            }
        }
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, args: Value) -> ToolsCallResult {
        self.call_tool_with(name, args, &CancellationToken::new())
            .await
    }

    /// Call a tool under `cancel`, rendering every outcome as a tool result
    pub async fn call_tool_with(
        &self,
        name: &str,
        args: Value,
        cancel: &CancellationToken,
    ) -> ToolsCallResult {
        match self.execute_with(name, args, cancel).await {
            Ok(envelope) => ToolsCallResult::from_envelope(&envelope),
            Err(failure @ CallFailure::Cancelled(_)) => {
                ToolsCallResult::error(failure.to_string())
            }
            Err(failure) => ToolsCallResult::error(format!("Error: {}", failure)),
        }
    }
}
