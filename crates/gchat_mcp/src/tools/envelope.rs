//! Result envelope returned by every tool execution

use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of one tool call.
///
/// Serialized shapes:
/// - `Success`: `{"success": true, ...payload}`
/// - `Unsuccessful`: `{"success": false, ...payload}` (a normal answer, e.g.
///   "no direct message exists yet", not a failure)
/// - `Error`: `{"error": "...", "status"?: n, "type"?: "..."}`
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Success(Map<String, Value>),
    Unsuccessful(Map<String, Value>),
    Error(ErrorBody),
}

/// Error variant payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Envelope {
    /// Success with the fields of `payload` (a JSON object) merged in.
    pub fn success(payload: Value) -> Self {
        Envelope::Success(into_map(payload))
    }

    pub fn unsuccessful(payload: Value) -> Self {
        Envelope::Unsuccessful(into_map(payload))
    }

    /// Error with a message only
    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error(ErrorBody {
            error: message.into(),
            status: None,
            kind: None,
            details: None,
        })
    }

    /// Error tagged with a `type`
    pub fn typed_error(message: impl Into<String>, kind: &str) -> Self {
        Envelope::Error(ErrorBody {
            error: message.into(),
            status: None,
            kind: Some(kind.to_string()),
            details: None,
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Error(_))
    }

    /// Outcome label used by the audit log
    pub fn outcome(&self) -> &'static str {
        match self {
            Envelope::Success(_) => "success",
            Envelope::Unsuccessful(_) => "unsuccessful",
            Envelope::Error(_) => "error",
        }
    }

    /// A field of the success payload
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Envelope::Success(map) | Envelope::Unsuccessful(map) => map.get(key),
            Envelope::Error(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Envelope::Success(payload) => with_flag(true, payload),
            Envelope::Unsuccessful(payload) => with_flag(false, payload),
            Envelope::Error(body) => serde_json::to_value(body).unwrap_or_else(|_| {
                let mut map = Map::new();
                map.insert("error".into(), Value::String(body.error.clone()));
                Value::Object(map)
            }),
        }
    }

    /// Pretty-printed JSON, as placed in the tool result text block
    pub fn to_text(&self) -> String {
        let value = self.to_value();
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }
}

fn with_flag(success: bool, payload: &Map<String, Value>) -> Value {
    let mut map = Map::with_capacity(payload.len() + 1);
    map.insert("success".into(), Value::Bool(success));
    for (key, value) in payload {
        if key != "success" {
            map.insert(key.clone(), value.clone());
        }
    }
    Value::Object(map)
}

fn into_map(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("result".into(), other);
            map
        }
    }
}
