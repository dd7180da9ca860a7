// Local MCP Gateway - Error Taxonomy
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Every failure a single message can produce, and its JSON-RPC mapping.
// Caught at the message boundary in mcp.rs; none of these end the loop.

use crate::protocol::JsonRpcError;
use serde_json::{json, Value};
use thiserror::Error;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Server-defined: a tool ran (or was refused) and failed
pub const TOOL_ERROR: i64 = -32000;

/// Errors surfaced to the client as JSON-RPC error objects
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Line is not valid JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// Valid JSON, but not a usable request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Missing or structurally invalid argument, unknown named connection/host,
    /// or no allowed roots configured
    #[error("{0}")]
    InvalidParams(String),

    /// Path outside allowed roots, or SQL refused by write policy
    #[error("{0}")]
    PolicyViolation(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// External process, database driver, or filesystem failure
    #[error("{0}")]
    Collaborator(String),

    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub fn policy(msg: impl Into<String>) -> Self {
        Self::PolicyViolation(msg.into())
    }

    /// Stable JSON-RPC code
    pub fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::PolicyViolation(_)
            | Self::UnknownTool(_)
            | Self::Collaborator(_)
            | Self::Timeout { .. } => TOOL_ERROR,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Machine-readable kind, attached as `error.data.kind`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::MethodNotFound(_) => "method_not_found",
            Self::InvalidParams(_) => "invalid_params",
            Self::PolicyViolation(_) => "policy_violation",
            Self::UnknownTool(_) => "unknown_tool",
            Self::Collaborator(_) => "collaborator_failure",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal_error",
        }
    }

    /// True for failures raised while executing (or refusing) a tool
    pub fn is_tool_error(&self) -> bool {
        self.code() == TOOL_ERROR
    }

    /// Protocol-level error object (no tool context)
    pub fn to_rpc(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            data: None,
        }
    }

    /// Error object for a failed `tools/call`.
    /// Tool-execution failures get the "Tool error: " prefix; the kind and
    /// tool name ride in `data`, never in the message.
    pub fn to_tool_rpc(&self, tool: &str) -> JsonRpcError {
        let message = if self.is_tool_error() {
            format!("Tool error: {}", self)
        } else {
            self.to_string()
        };
        JsonRpcError {
            code: self.code(),
            message,
            data: Some(self.data(tool)),
        }
    }

    fn data(&self, tool: &str) -> Value {
        json!({ "kind": self.kind(), "tool": tool })
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

// ============================================================================
// TESTS
// ============================================================================
