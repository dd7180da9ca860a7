// Local MCP Gateway - Tool Invoker
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Validate → admit → dispatch. A call that fails any step before dispatch
// has touched nothing: no file, no process, no connection.

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::policy;
use crate::providers::Providers;
use crate::registry::{self, ParamKind, ParamSpec, PolicyCheck, ToolArgs, ToolSpec};
use serde_json::{json, Map, Value};

pub struct ToolInvoker<'a> {
    config: &'a Config,
    providers: Providers<'a>,
}

impl<'a> ToolInvoker<'a> {
    pub fn new(config: &'a Config, providers: Providers<'a>) -> Self {
        Self { config, providers }
    }

    /// Invoker over the real local collaborators
    pub fn local(config: &'a Config) -> Self {
        Self::new(config, Providers::local(config))
    }

    /// Run one tool call end to end
    pub fn call(&self, name: &str, arguments: &Value) -> GatewayResult<String> {
        if self.config.allowed_roots.is_empty() {
            return Err(GatewayError::invalid_params("allowed_roots is not configured; set it in config.yaml"));
        }
        let tool = registry::find(name).ok_or_else(|| GatewayError::UnknownTool(name.to_string()))?;
        let args = self.admit(tool, arguments)?;
        log::debug!("dispatch {}", tool.name);
        (tool.call)(&args, &self.providers)
    }

    /// Everything short of dispatch: validated, admitted arguments
    pub fn admit(&self, tool: &ToolSpec, arguments: &Value) -> GatewayResult<ToolArgs> {
        let mut args = validate_args(tool, arguments)?;
        for check in tool.checks {
            match *check {
                PolicyCheck::Path(arg) => {
                    let resolved = policy::ensure_path_allowed(args.text(arg)?, &self.config.allowed_roots)?;
                    args.set(arg, json!(resolved.to_string_lossy()));
                }
                PolicyCheck::SqlWrite(arg) => {
                    let sql = policy::admit_sql_write(args.text(arg)?, self.config.write_policy())?;
                    args.set(arg, json!(sql));
                }
                PolicyCheck::NotAnOption(arg) => {
                    if args.text(arg)?.starts_with('-') {
                        return Err(GatewayError::invalid_params(format!(
                            "Argument '{}' must not start with '-'",
                            arg
                        )));
                    }
                }
            }
        }
        Ok(args)
    }
}

/// Type-check declared parameters, fill defaults, drop undeclared keys
pub fn validate_args(tool: &ToolSpec, arguments: &Value) -> GatewayResult<ToolArgs> {
    let empty = Map::new();
    let supplied = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(GatewayError::invalid_params("arguments must be an object")),
    };

    let path_args: Vec<&str> = tool
        .checks
        .iter()
        .filter_map(|c| match c {
            PolicyCheck::Path(a) => Some(*a),
            PolicyCheck::SqlWrite(_) | PolicyCheck::NotAnOption(_) => None,
        })
        .collect();

    let mut values = Map::new();
    for spec in tool.params {
        match supplied.get(spec.name).filter(|v| !v.is_null()) {
            Some(value) => {
                check_value(spec, value)?;
                if path_args.contains(&spec.name) && value.as_str().map(str::is_empty).unwrap_or(false) {
                    return Err(GatewayError::invalid_params(format!("Argument '{}' must not be empty", spec.name)));
                }
                values.insert(spec.name.to_string(), value.clone());
            }
            None if spec.required => {
                return Err(GatewayError::invalid_params(format!("Missing required argument: {}", spec.name)));
            }
            None => {
                if let Some(default) = default_value(spec.kind) {
                    values.insert(spec.name.to_string(), default);
                }
            }
        }
    }
    Ok(ToolArgs::new(values))
}

fn default_value(kind: ParamKind) -> Option<Value> {
    match kind {
        ParamKind::Flag => Some(json!(false)),
        ParamKind::Integer { default, .. } => Some(json!(default)),
        ParamKind::Number { default, .. } => Some(json!(default)),
        ParamKind::Text | ParamKind::TextList => None,
    }
}

fn check_value(spec: &ParamSpec, value: &Value) -> GatewayResult<()> {
    let bad_type = |expected: &str| {
        GatewayError::invalid_params(format!("Argument '{}' must be {}", spec.name, expected))
    };
    match spec.kind {
        ParamKind::Text => {
            value.as_str().ok_or_else(|| bad_type("a string"))?;
        }
        ParamKind::Flag => {
            value.as_bool().ok_or_else(|| bad_type("a boolean"))?;
        }
        ParamKind::Integer { min, max, .. } => {
            let n = value.as_i64().ok_or_else(|| bad_type("an integer"))?;
            if n < min || n > max {
                return Err(GatewayError::invalid_params(format!(
                    "Argument '{}' must be between {} and {}",
                    spec.name, min, max
                )));
            }
        }
        ParamKind::Number { min, max, .. } => {
            let n = value.as_f64().ok_or_else(|| bad_type("a number"))?;
            if !(min..=max).contains(&n) {
                return Err(GatewayError::invalid_params(format!(
                    "Argument '{}' must be between {} and {}",
                    spec.name, min, max
                )));
            }
        }
        ParamKind::TextList => {
            let items = value.as_array().ok_or_else(|| bad_type("an array of strings"))?;
            if !items.iter().all(Value::is_string) {
                return Err(bad_type("an array of strings"));
            }
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
