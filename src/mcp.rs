// Local MCP Gateway - MCP Server (JSON-RPC 2.0 over stdio)
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One line in, at most one line out. Every tools/call routes through the
// invoker, which runs policy before any collaborator is touched.
// stdout carries protocol frames only; logging goes to stderr.

use crate::audit::AuditLog;
use crate::config::Config;
use crate::error::GatewayError;
use crate::invoker::ToolInvoker;
use crate::protocol::{
    recover_id, JsonRpcResponse, Message, Method, Rejected, PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION,
};
use crate::registry;
use serde_json::{json, Map, Value};
use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};

pub struct Server<'a> {
    invoker: ToolInvoker<'a>,
    audit: AuditLog,
}

impl<'a> Server<'a> {
    pub fn new(invoker: ToolInvoker<'a>, audit: AuditLog) -> Self {
        Self { invoker, audit }
    }

    /// Server over the real local collaborators, audit log per config
    pub fn local(config: &'a Config) -> Self {
        Self::new(ToolInvoker::local(config), AuditLog::new(config.logging.audit_log.as_deref()))
    }

    /// Handle one input line. `None` means nothing is written back.
    /// A panic anywhere below becomes an internal error for this line only.
    pub fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| self.handle_message(line))) {
            Ok(response) => response,
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                log::error!("handler panicked: {}", reason);
                let id = request_id(line)?;
                Some(JsonRpcResponse::failure(id, GatewayError::Internal(reason).to_rpc()))
            }
        }
    }

    fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        match Message::parse(line) {
            Ok(Message::Request { id, method, params }) => {
                log::debug!("Received: {}", method.as_str());
                Some(self.dispatch(id, method, params))
            }
            Ok(Message::Notification { method }) => {
                log::debug!("Notification: {}", method.as_str());
                None
            }
            Err(Rejected { id, error }) => {
                log::warn!("Rejected line: {}", error);
                id.map(|id| JsonRpcResponse::failure(id, error.to_rpc()))
            }
        }
    }

    fn dispatch(&self, id: Value, method: Method, params: Option<Value>) -> JsonRpcResponse {
        let result = match method {
            Method::Initialize => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION,
                }
            })),
            Method::Ping => Ok(json!({})),
            Method::ToolsList => Ok(json!({ "tools": registry::descriptors() })),
            Method::ToolsCall => return self.tools_call(id, params),
            Method::ResourcesList => Ok(json!({ "resources": [] })),
            Method::PromptsList => Ok(json!({ "prompts": [] })),
            Method::ResourcesRead | Method::PromptsGet => {
                Err(GatewayError::invalid_params(format!("{} is not supported", method.as_str())))
            }
            Method::Other(name) => Err(GatewayError::MethodNotFound(name)),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::failure(id, e.to_rpc()),
        }
    }

    fn tools_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params = match params {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                let err = GatewayError::invalid_params("params must be an object");
                return JsonRpcResponse::failure(id, err.to_rpc());
            }
        };
        let name = match params.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => {
                let err = GatewayError::invalid_params("Missing tool name");
                return JsonRpcResponse::failure(id, err.to_rpc());
            }
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        self.audit.call(name, &arguments);

        match self.invoker.call(name, &arguments) {
            Ok(text) => {
                log::info!("{} ok ({} bytes)", name, text.len());
                JsonRpcResponse::success(id, json!({ "content": [{ "type": "text", "text": text }] }))
            }
            Err(e) => {
                log::warn!("{} failed [{}]: {}", name, e.kind(), e);
                self.audit.fail(name, &e.to_string());
                JsonRpcResponse::failure(id, e.to_tool_rpc(name))
            }
        }
    }

    /// Serve until `reader` is exhausted. Only a broken output stream ends
    /// the loop early.
    pub fn run<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> io::Result<()> {
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    log::warn!("dropping non UTF-8 input line: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(response) = self.handle_line(&line) {
                match serde_json::to_string(&response) {
                    Ok(frame) => {
                        writer.write_all(frame.as_bytes())?;
                        writer.write_all(b"\n")?;
                        writer.flush()?;
                    }
                    Err(e) => log::error!("response serialization failed: {}", e),
                }
            }
        }
        log::info!("input closed, shutting down");
        Ok(())
    }
}

/// Run the stdio server for a loaded configuration
pub fn run_stdio(config: &Config) -> io::Result<()> {
    log::info!("Starting {} v{}", SERVER_NAME, SERVER_VERSION);
    log::info!("Allowed roots: {:?}", config.allowed_roots);
    if config.allowed_roots.is_empty() {
        log::warn!("allowed_roots is empty: every tools/call will be rejected");
    }

    let server = Server::local(config);
    let stdin = io::stdin();
    let stdout = io::stdout();
    server.run(stdin.lock(), stdout.lock())
}

/// `id` of the line, if it has one. Used after a panic lost the parsed message.
fn request_id(line: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(mut obj)) => obj.remove("id"),
        Ok(_) => None,
        Err(_) => recover_id(line),
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
