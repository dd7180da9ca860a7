// Local MCP Gateway - JSON-RPC 2.0 Message Types
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One JSON object per line. Requests carry an `id` (any JSON value, null
// included) and get exactly one response; notifications have no `id`
// and get none.

use crate::error::GatewayError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "local-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// JSON-RPC response envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Methods this server understands. Anything else lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Ping,
    ToolsList,
    ToolsCall,
    ResourcesList,
    ResourcesRead,
    PromptsList,
    PromptsGet,
    Other(String),
}

impl Method {
    pub fn parse(name: &str) -> Self {
        match name {
            "initialize" => Self::Initialize,
            "ping" => Self::Ping,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            "resources/list" => Self::ResourcesList,
            "resources/read" => Self::ResourcesRead,
            "prompts/list" => Self::PromptsList,
            "prompts/get" => Self::PromptsGet,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Initialize => "initialize",
            Self::Ping => "ping",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::ResourcesList => "resources/list",
            Self::ResourcesRead => "resources/read",
            Self::PromptsList => "prompts/list",
            Self::PromptsGet => "prompts/get",
            Self::Other(name) => name,
        }
    }
}

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        id: Value,
        method: Method,
        params: Option<Value>,
    },
    Notification {
        method: Method,
    },
}

/// Why a line could not become a `Message`.
/// `id` is whatever could be recovered; `None` means nobody is listening.
#[derive(Debug)]
pub struct Rejected {
    pub id: Option<Value>,
    pub error: GatewayError,
}

impl Message {
    /// Parse a single protocol line
    pub fn parse(line: &str) -> Result<Self, Rejected> {
        let value: Value = serde_json::from_str(line).map_err(|e| Rejected {
            id: recover_id(line),
            error: GatewayError::Parse(e.to_string()),
        })?;

        let obj = match value {
            Value::Object(obj) => obj,
            _ => {
                return Err(Rejected {
                    id: None,
                    error: GatewayError::InvalidRequest("message is not a JSON object".to_string()),
                })
            }
        };

        Self::from_object(obj)
    }

    fn from_object(mut obj: Map<String, Value>) -> Result<Self, Rejected> {
        let id = obj.remove("id");
        let method = match obj.get("method").and_then(Value::as_str) {
            Some(m) => Method::parse(m),
            None => {
                return Err(Rejected {
                    id,
                    error: GatewayError::InvalidRequest("missing string field: method".to_string()),
                })
            }
        };

        match id {
            Some(id) => Ok(Self::Request {
                id,
                method,
                params: obj.remove("params"),
            }),
            None => Ok(Self::Notification { method }),
        }
    }
}

/// Best-effort `id` extraction from text that failed to parse as JSON.
/// Numbers and plain strings only; anything fancier is unrecoverable.
/// Only an `id` key of the outermost object counts.
pub fn recover_id(line: &str) -> Option<Value> {
    static ID_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = ID_RE
        .get_or_init(|| Regex::new(r#"^"id"\s*:\s*(-?\d+|"(?:[^"\\]|\\.)*"|null)"#).ok())
        .as_ref()?;
    top_level_strings(line)
        .into_iter()
        .find_map(|start| re.captures(&line[start..]))
        .and_then(|caps| serde_json::from_str(caps.get(1)?.as_str()).ok())
}

/// Byte offsets of strings sitting directly inside the outermost object
fn top_level_strings(line: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in line.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => {
                in_string = true;
                if depth == 1 {
                    starts.push(i);
                }
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    starts
}

// ============================================================================
// TESTS
// ============================================================================
