// Local MCP Gateway - Audit Log
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Append-only command log: one CALL line per tools/call, one FAIL line per
// refused or failed call. Write failures are swallowed; auditing never
// changes the outcome of a call.

use crate::paths::expand_home;
use chrono::Local;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Longest value echoed into a summary or failure line
const SUMMARY_LIMIT: usize = 200;

pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(path: Option<&str>) -> Self {
        Self { path: path.filter(|p| !p.is_empty()).map(expand_home) }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn call(&self, tool: &str, args: &Value) {
        self.append(&format!("CALL {} | {}", tool, param_summary(tool, args)));
    }

    pub fn fail(&self, tool: &str, message: &str) {
        self.append(&format!("FAIL {} | {}", tool, clip(message)));
    }

    fn append(&self, msg: &str) {
        let Some(path) = &self.path else { return };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(mut f) => {
                let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(f, "[{}] {}", ts, msg);
            }
            Err(e) => log::warn!("audit log {} unavailable: {}", path.display(), e),
        }
    }
}

fn clip(text: &str) -> String {
    if text.chars().count() > SUMMARY_LIMIT {
        let head: String = text.chars().take(SUMMARY_LIMIT).collect();
        format!("{}…", head)
    } else {
        text.to_string()
    }
}

fn str_arg<'v>(args: &'v Value, key: &str) -> &'v str {
    args.get(key).and_then(|v| v.as_str()).unwrap_or("?")
}

/// Summarize tool arguments for the audit line. Bodies are reduced to sizes.
pub fn param_summary(tool: &str, args: &Value) -> String {
    match tool {
        "fs_write" => {
            let size = args.get("content").and_then(|v| v.as_str()).map(str::len).unwrap_or(0);
            format!("path={} content_len={}", str_arg(args, "path"), size)
        }
        "fs_read" | "fs_list" => format!("path={}", str_arg(args, "path")),
        "fs_glob" => format!("root={} pattern={}", str_arg(args, "root"), str_arg(args, "pattern")),
        t if t.starts_with("git_") => match args.get("branch").or_else(|| args.get("message")) {
            Some(v) => format!("repo={} {}", str_arg(args, "repo"), clip(v.as_str().unwrap_or("?"))),
            None => format!("repo={}", str_arg(args, "repo")),
        },
        "rg_search" => format!("root={} query={}", str_arg(args, "root"), clip(str_arg(args, "query"))),
        "mgrep_search" => format!("path={} query={}", str_arg(args, "path"), clip(str_arg(args, "query"))),
        "pg_query" | "pg_exec" => format!("conn={} sql={}", str_arg(args, "conn"), clip(str_arg(args, "sql"))),
        t if t.starts_with("nerdctl") => {
            let argv: Vec<&str> = args
                .get("args")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            match args.get("host").and_then(|v| v.as_str()) {
                Some(host) => format!("host={} args={}", host, clip(&argv.join(" "))),
                None => format!("args={}", clip(&argv.join(" "))),
            }
        }
        _ => clip(&args.to_string()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
