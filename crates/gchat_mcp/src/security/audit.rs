//! Audit Logging - Tool Invocation Recording
//!
//! Records every tool call to an append-only file, one JSON object per line.
//! Argument values are never written, only their key names.
//!
//! # Log Format
//!
//! ```json
//! {"type":"tool_call","ts":"2026-01-21T10:30:00Z","tool":"send_message","outcome":"success","duration_ms":412,"args":"{keys: [space, text]}"}
//! ```

use super::SecurityError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Audit log for recording tool calls
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl AuditLog {
    /// Open (or create) the log file, creating parent directories
    pub fn new(path: PathBuf) -> Result<Self, SecurityError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SecurityError::AuditError(format!("Failed to create audit log directory: {}", e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SecurityError::AuditError(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Record one tool call
    pub fn log_tool_call(
        &self,
        tool: &str,
        args: &Value,
        outcome: &str,
        duration_ms: u64,
    ) -> Result<(), SecurityError> {
        self.write_entry(&AuditEntry::ToolCall {
            ts: Utc::now(),
            tool: tool.to_string(),
            outcome: outcome.to_string(),
            duration_ms,
            args: summarize_params(args),
        })
    }

    fn write_entry(&self, entry: &AuditEntry) -> Result<(), SecurityError> {
        let json = serde_json::to_string(entry).map_err(|e| {
            SecurityError::AuditError(format!("Failed to serialize audit entry: {}", e))
        })?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|e| SecurityError::AuditError(format!("Failed to lock audit log: {}", e)))?;

        writeln!(writer, "{}", json)
            .and_then(|_| writer.flush())
            .map_err(|e| SecurityError::AuditError(format!("Failed to write audit entry: {}", e)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AuditEntry {
    ToolCall {
        ts: DateTime<Utc>,
        tool: String,
        outcome: String,
        duration_ms: u64,
        args: String,
    },
}

/// Describe an argument bag without its values
pub fn summarize_params(params: &Value) -> String {
    match params {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("{{keys: [{}]}}", keys.join(", "))
        }
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Null => "{}".to_string(),
        _ => "[value]".to_string(),
    }
}
