// Local MCP Gateway - Tool Registry
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// The static tool table. Each entry carries its schema, the policy checks
// the invoker must pass before the call, and the collaborator call itself.
// Adding a tool is a data addition here; nothing else dispatches on names.

use crate::error::{GatewayError, GatewayResult};
use crate::pg::apply_default_limit;
use crate::providers::Providers;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::Path;

// ============================================================================
// SCHEMA TYPES
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub enum ParamKind {
    Text,
    Flag,
    Integer { min: i64, max: i64, default: i64 },
    Number { min: f64, max: f64, default: f64 },
    TextList,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

/// Admission checks run by the invoker, in declared order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCheck {
    /// Named argument must resolve under an allowed root
    Path(&'static str),
    /// Named argument must pass the SQL write policy
    SqlWrite(&'static str),
    /// Named argument is a positional CLI operand and may not read as an option
    NotAnOption(&'static str),
}

pub type Handler = fn(&ToolArgs, &Providers) -> GatewayResult<String>;

pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub checks: &'static [PolicyCheck],
    pub call: Handler,
}

/// Wire shape of a `tools/list` entry
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ParamSpec {
    const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self { name, kind, required: true, description }
    }

    const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self { name, kind, required: false, description }
    }

    fn schema(&self) -> Value {
        let mut prop = match self.kind {
            ParamKind::Text => json!({ "type": "string" }),
            ParamKind::Flag => json!({ "type": "boolean", "default": false }),
            ParamKind::Integer { min, max, default } => {
                json!({ "type": "integer", "minimum": min, "maximum": max, "default": default })
            }
            ParamKind::Number { min, max, default } => {
                json!({ "type": "number", "minimum": min, "maximum": max, "default": default })
            }
            ParamKind::TextList => json!({ "type": "array", "items": { "type": "string" } }),
        };
        prop["description"] = json!(self.description);
        prop
    }
}

impl ToolSpec {
    pub fn descriptor(&self) -> ToolDescriptor {
        let properties: Map<String, Value> = self.params.iter().map(|p| (p.name.to_string(), p.schema())).collect();
        let required: Vec<&str> = self.params.iter().filter(|p| p.required).map(|p| p.name).collect();
        ToolDescriptor {
            name: self.name,
            description: self.description,
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

pub fn find(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|t| t.name == name)
}

/// The catalogue, in registration order
pub fn descriptors() -> Vec<ToolDescriptor> {
    TOOLS.iter().map(ToolSpec::descriptor).collect()
}

// ============================================================================
// VALIDATED ARGUMENTS
// Built by the invoker: types checked, defaults filled, admitted paths
// already replaced by their resolved form. Accessors only fail on a
// registry/handler mismatch.
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ToolArgs {
    values: Map<String, Value>,
}

impl ToolArgs {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    fn missing(name: &str) -> GatewayError {
        GatewayError::Internal(format!("argument '{}' missing after validation", name))
    }

    pub fn text(&self, name: &str) -> GatewayResult<&str> {
        self.opt_text(name).ok_or_else(|| Self::missing(name))
    }

    pub fn opt_text(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn path(&self, name: &str) -> GatewayResult<&Path> {
        self.text(name).map(Path::new)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.values.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn integer(&self, name: &str) -> GatewayResult<i64> {
        self.values.get(name).and_then(Value::as_i64).ok_or_else(|| Self::missing(name))
    }

    pub fn number(&self, name: &str) -> GatewayResult<f64> {
        self.values.get(name).and_then(Value::as_f64).ok_or_else(|| Self::missing(name))
    }

    pub fn text_list(&self, name: &str) -> GatewayResult<Vec<String>> {
        let items = self.values.get(name).and_then(Value::as_array).ok_or_else(|| Self::missing(name))?;
        Ok(items.iter().filter_map(Value::as_str).map(str::to_string).collect())
    }
}

// ============================================================================
// THE TABLE
// ============================================================================

use ParamKind::*;

const REPO: ParamSpec = ParamSpec::required("repo", Text, "Repository directory (must be under an allowed root)");
const NERDCTL_ARGS: ParamSpec = ParamSpec::required("args", TextList, "Arguments passed to nerdctl, e.g. [\"ps\", \"-a\"]");

pub static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "fs_read",
        description: "Read a text file under an allowed root.",
        params: &[ParamSpec::required("path", Text, "File to read")],
        checks: &[PolicyCheck::Path("path")],
        call: fs_read,
    },
    ToolSpec {
        name: "fs_write",
        description: "Write a text file under an allowed root, creating parent directories.",
        params: &[
            ParamSpec::required("path", Text, "File to write"),
            ParamSpec::required("content", Text, "Full file content"),
        ],
        checks: &[PolicyCheck::Path("path")],
        call: fs_write,
    },
    ToolSpec {
        name: "fs_list",
        description: "List a directory under an allowed root.",
        params: &[ParamSpec::required("path", Text, "Directory to list")],
        checks: &[PolicyCheck::Path("path")],
        call: fs_list,
    },
    ToolSpec {
        name: "fs_glob",
        description: "Find files under a root by shell-style pattern (supports **).",
        params: &[
            ParamSpec::required("root", Text, "Directory to search from"),
            ParamSpec::required("pattern", Text, "Pattern relative to root, e.g. **/*.rs"),
        ],
        checks: &[PolicyCheck::Path("root")],
        call: fs_glob,
    },
    ToolSpec {
        name: "git_status",
        description: "git status --porcelain -b for a repository.",
        params: &[REPO],
        checks: &[PolicyCheck::Path("repo")],
        call: git_status,
    },
    ToolSpec {
        name: "git_diff",
        description: "git diff for a repository, optionally of the staged changes.",
        params: &[REPO, ParamSpec::optional("staged", Flag, "Diff the index instead of the working tree")],
        checks: &[PolicyCheck::Path("repo")],
        call: git_diff,
    },
    ToolSpec {
        name: "git_log",
        description: "Recent commits, one line each.",
        params: &[REPO, ParamSpec::optional("n", Integer { min: 1, max: 200, default: 20 }, "Number of commits")],
        checks: &[PolicyCheck::Path("repo")],
        call: git_log,
    },
    ToolSpec {
        name: "git_checkout",
        description: "Check out a branch.",
        params: &[REPO, ParamSpec::required("branch", Text, "Branch to check out")],
        checks: &[PolicyCheck::Path("repo"), PolicyCheck::NotAnOption("branch")],
        call: git_checkout,
    },
    ToolSpec {
        name: "git_commit",
        description: "Commit all tracked changes (git commit -am).",
        params: &[REPO, ParamSpec::required("message", Text, "Commit message")],
        checks: &[PolicyCheck::Path("repo")],
        call: git_commit,
    },
    ToolSpec {
        name: "rg_search",
        description: "Exact/regex search with ripgrep under a root.",
        params: &[
            ParamSpec::required("root", Text, "Directory or file to search"),
            ParamSpec::required("query", Text, "ripgrep pattern"),
            ParamSpec::optional("glob", Text, "Only search files matching this glob"),
            ParamSpec::optional("max_results", Integer { min: 1, max: 5000, default: 200 }, "Cap on returned lines"),
        ],
        checks: &[PolicyCheck::Path("root")],
        call: rg_search,
    },
    ToolSpec {
        name: "mgrep_search",
        description: "Fuzzy line search in one file, ranked by similarity.",
        params: &[
            ParamSpec::required("path", Text, "File to search"),
            ParamSpec::required("query", Text, "Text to approximate"),
            ParamSpec::optional(
                "min_probability",
                Number { min: 0.0, max: 1.0, default: 0.5 },
                "Minimum similarity (0.0-1.0)",
            ),
            ParamSpec::optional("max_results", Integer { min: 1, max: 500, default: 20 }, "Cap on returned matches"),
        ],
        checks: &[PolicyCheck::Path("path")],
        call: mgrep_search,
    },
    ToolSpec {
        name: "pg_query",
        description: "Run a read-only query on a named Postgres connection.",
        params: &[
            ParamSpec::required("conn", Text, "Connection name from config.yaml"),
            ParamSpec::required("sql", Text, "Query text"),
            ParamSpec::optional("limit", Integer { min: 1, max: 10000, default: 2000 }, "Row cap; appended to a bare SELECT"),
        ],
        checks: &[],
        call: pg_query,
    },
    ToolSpec {
        name: "pg_exec",
        description: "Execute a write statement on a named Postgres connection, subject to the write policy.",
        params: &[
            ParamSpec::required("conn", Text, "Connection name from config.yaml"),
            ParamSpec::required("sql", Text, "Statement text"),
        ],
        checks: &[PolicyCheck::SqlWrite("sql")],
        call: pg_exec,
    },
    ToolSpec {
        name: "nerdctl",
        description: "Run nerdctl locally, or on a configured ssh host when host is given.",
        params: &[NERDCTL_ARGS, ParamSpec::optional("host", Text, "ssh host name from config.yaml")],
        checks: &[],
        call: nerdctl,
    },
    ToolSpec {
        name: "nerdctl_local",
        description: "Run nerdctl on this machine.",
        params: &[NERDCTL_ARGS],
        checks: &[],
        call: nerdctl_local,
    },
    ToolSpec {
        name: "nerdctl_ssh",
        description: "Run nerdctl on a configured ssh host.",
        params: &[ParamSpec::required("host", Text, "ssh host name from config.yaml"), NERDCTL_ARGS],
        checks: &[],
        call: nerdctl_ssh,
    },
];

// ============================================================================
// HANDLERS
// ============================================================================

fn fs_read(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    p.fs.read(args.path("path")?)
}

fn fs_write(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    let path = args.path("path")?;
    let n = p.fs.write(path, args.text("content")?)?;
    Ok(format!("Wrote {} bytes to {}", n, path.display()))
}

fn fs_list(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    let entries = p.fs.list(args.path("path")?)?;
    if entries.is_empty() {
        return Ok("(empty)".to_string());
    }
    let lines: Vec<String> = entries.iter().map(|e| format!("{}\t{}", e.kind.as_str(), e.name)).collect();
    Ok(lines.join("\n"))
}

fn fs_glob(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    let found = p.fs.glob(args.path("root")?, args.text("pattern")?)?;
    if found.is_empty() {
        return Ok("(no matches)".to_string());
    }
    let lines: Vec<String> = found.iter().map(|f| f.display().to_string()).collect();
    Ok(lines.join("\n"))
}

fn git_status(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    p.vcs.status(args.path("repo")?)
}

fn git_diff(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    p.vcs.diff(args.path("repo")?, args.flag("staged"))
}

fn git_log(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    p.vcs.log(args.path("repo")?, args.integer("n")? as u64)
}

fn git_checkout(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    p.vcs.checkout(args.path("repo")?, args.text("branch")?)
}

fn git_commit(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    p.vcs.commit(args.path("repo")?, args.text("message")?)
}

fn rg_search(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    let max_results = args.integer("max_results")? as usize;
    let found = p.exact_search.search(args.path("root")?, args.text("query")?, args.opt_text("glob"), max_results)?;
    if found.hits.is_empty() {
        return Ok("(no matches)".to_string());
    }
    let mut lines: Vec<String> = found.hits.iter().map(|h| format!("{}:{}:{}", h.path, h.line_no, h.text)).collect();
    if found.truncated {
        lines.push(format!("... truncated to {} results", max_results));
    }
    Ok(lines.join("\n"))
}

fn mgrep_search(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    let path = args.path("path")?;
    let min_probability = args.number("min_probability")?;
    let max_results = args.integer("max_results")? as usize;
    let matches = p.approx_search.search(path, args.text("query")?, min_probability, max_results)?;
    if matches.is_empty() {
        return Ok(format!("(no matches >= {:.2})", min_probability));
    }
    let lines: Vec<String> = matches
        .iter()
        .map(|m| format!("{}:{}:{:.1}%: {}", path.display(), m.line_no, m.score * 100.0, m.snippet))
        .collect();
    Ok(lines.join("\n"))
}

fn pg_query(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    let limit = args.integer("limit")? as usize;
    let sql = apply_default_limit(args.text("sql")?, limit);
    let result = p.db.query(args.text("conn")?, &sql, limit)?;
    let payload = json!({
        "columns": result.columns,
        "rows": result.rows,
        "rowCount": result.row_count,
    });
    pretty(&payload)
}

fn pg_exec(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    let affected = p.db.exec(args.text("conn")?, args.text("sql")?)?;
    pretty(&json!({ "status": "ok", "rowCount": affected }))
}

fn nerdctl(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    let argv = args.text_list("args")?;
    match args.opt_text("host").filter(|h| !h.is_empty()) {
        Some(host) => p.containers.run_remote(host, &argv),
        None => p.containers.run_local(&argv),
    }
}

fn nerdctl_local(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    p.containers.run_local(&args.text_list("args")?)
}

fn nerdctl_ssh(args: &ToolArgs, p: &Providers) -> GatewayResult<String> {
    p.containers.run_remote(args.text("host")?, &args.text_list("args")?)
}

fn pretty(value: &Value) -> GatewayResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| GatewayError::Internal(format!("serialize: {}", e)))
}

// ============================================================================
// TESTS
// ============================================================================
