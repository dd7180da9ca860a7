// Local MCP Gateway - End-to-End Tests
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Drives the real server (real collaborators) over in-memory streams.

use local_mcp::audit::AuditLog;
use local_mcp::config::Config;
use local_mcp::invoker::ToolInvoker;
use local_mcp::mcp::Server;
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::Path;

fn call(id: u64, tool: &str, arguments: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": tool, "arguments": arguments },
    })
    .to_string()
}

/// Feed `lines` through a server over `config`, return parsed frames
fn session(config: &Config, audit: AuditLog, lines: &[String]) -> Vec<Value> {
    let server = Server::new(ToolInvoker::local(config), audit);
    let input = lines.join("\n") + "\n";
    let mut out = Vec::new();
    server.run(Cursor::new(input), &mut out).unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn config_for(root: &Path, extra: &str) -> Config {
    let yaml = format!("allowed_roots:\n  - {}\n{}", root.display(), extra);
    Config::from_yaml(&yaml).unwrap()
}

fn text(frame: &Value) -> &str {
    frame["result"]["content"][0]["text"].as_str().unwrap_or_default()
}

#[test]
fn shadow_file_outside_roots_is_refused() {
    let config = Config::from_yaml("allowed_roots: [\"/home/project\"]").unwrap();
    let frames = session(&config, AuditLog::disabled(), &[call(1, "fs_read", json!({"path": "/etc/shadow"}))]);

    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    assert_eq!(frame["id"], 1);
    assert!(frame.get("result").is_none());
    assert_eq!(frame["error"]["code"], -32000);
    assert_eq!(frame["error"]["data"], json!({"kind": "policy_violation", "tool": "fs_read"}));
    assert!(frame["error"]["message"].as_str().unwrap().contains("Path not allowed"));
}

#[test]
fn unguarded_delete_never_reaches_the_database() {
    // Port 1 is never a Postgres server: reaching it would be a collaborator failure
    let config = Config::from_yaml(
        "allowed_roots: [/srv]\npostgres:\n  connections:\n    app:\n      url: postgres://u@127.0.0.1:1/db\n",
    )
    .unwrap();
    let frames = session(
        &config,
        AuditLog::disabled(),
        &[call(2, "pg_exec", json!({"conn": "app", "sql": "DELETE FROM users"}))],
    );
    assert_eq!(frames[0]["error"]["code"], -32000);
    assert_eq!(frames[0]["error"]["message"], "Tool error: DELETE without WHERE blocked by policy.");
    assert_eq!(frames[0]["error"]["data"]["kind"], "policy_violation");
}

#[test]
fn filesystem_round_trip_inside_root() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let root = std::fs::canonicalize(dir.path())?;
    let config = config_for(&root, "");
    let target = root.join("notes/today.md");

    let frames = session(
        &config,
        AuditLog::disabled(),
        &[
            call(1, "fs_write", json!({"path": target, "content": "# hi\nline two\n"})),
            call(2, "fs_read", json!({"path": target})),
            call(3, "fs_list", json!({"path": root})),
            call(4, "fs_glob", json!({"root": root, "pattern": "**/*.md"})),
            call(5, "fs_glob", json!({"root": root, "pattern": "*.rs"})),
            call(6, "mgrep_search", json!({"path": target, "query": "line two"})),
        ],
    );

    assert_eq!(text(&frames[0]), format!("Wrote 14 bytes to {}", target.display()));
    assert_eq!(text(&frames[1]), "# hi\nline two\n");
    assert_eq!(text(&frames[2]), "dir\tnotes");
    assert_eq!(text(&frames[3]), target.display().to_string());
    assert_eq!(text(&frames[4]), "(no matches)");
    assert_eq!(text(&frames[5]), format!("{}:2:100.0%: line two", target.display()));
    Ok(())
}

#[test]
fn symlink_escape_is_refused() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let root = std::fs::canonicalize(dir.path())?.join("project");
    std::fs::create_dir(&root)?;
    std::os::unix::fs::symlink("/etc", root.join("etc-link"))?;
    let config = config_for(&root, "");

    let frames = session(
        &config,
        AuditLog::disabled(),
        &[call(1, "fs_read", json!({"path": root.join("etc-link/hostname")}))],
    );
    assert_eq!(frames[0]["error"]["data"]["kind"], "policy_violation");
    Ok(())
}

#[test]
fn dangling_symlink_cannot_plant_a_file_outside() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = std::fs::canonicalize(dir.path())?;
    let root = base.join("project");
    let outside = base.join("outside");
    std::fs::create_dir(&root)?;
    std::fs::create_dir(&outside)?;
    std::os::unix::fs::symlink(outside.join("pwned.txt"), root.join("innocent.txt"))?;
    let config = config_for(&root, "");

    let frames = session(
        &config,
        AuditLog::disabled(),
        &[call(1, "fs_write", json!({"path": root.join("innocent.txt"), "content": "escaped"}))],
    );
    assert_eq!(frames[0]["error"]["data"]["kind"], "policy_violation");
    assert!(!outside.join("pwned.txt").exists());
    Ok(())
}

#[test]
fn option_like_branch_is_invalid_params() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let root = std::fs::canonicalize(dir.path())?;
    let secret = root.join("secret.txt");
    std::fs::write(&secret, "TOP-SECRET-LINE\n")?;
    let config = config_for(&root, "");

    let branch = format!("--pathspec-from-file={}", secret.display());
    let frames = session(
        &config,
        AuditLog::disabled(),
        &[call(1, "git_checkout", json!({"repo": root, "branch": branch}))],
    );
    assert_eq!(frames[0]["error"]["code"], -32602);
    assert_eq!(frames[0]["error"]["data"]["tool"], "git_checkout");
    assert!(!frames[0].to_string().contains("TOP-SECRET-LINE"));
    Ok(())
}

#[test]
fn multi_statement_allowance_still_blocks_ddl() {
    let config = Config::from_yaml(
        "allowed_roots: [/srv]\npostgres:\n  connections:\n    app:\n      url: postgres://u@127.0.0.1:1/db\n  write_policy:\n    allow_multi_statement: true\n",
    )
    .unwrap();
    let frames = session(
        &config,
        AuditLog::disabled(),
        &[call(1, "pg_exec", json!({"conn": "app", "sql": "INSERT INTO t VALUES (1); DROP TABLE t"}))],
    );
    assert_eq!(frames[0]["error"]["message"], "Tool error: DDL (CREATE/ALTER/DROP) blocked by policy.");
    assert_eq!(frames[0]["error"]["data"]["kind"], "policy_violation");
}

#[test]
fn catalogue_is_stable_across_calls() {
    let config = Config::from_yaml("allowed_roots: [/srv]").unwrap();
    let list = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string();
    let frames = session(&config, AuditLog::disabled(), &[list.clone(), list]);
    assert_eq!(frames[0]["result"], frames[1]["result"]);
    let names: Vec<&str> = frames[0]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names.first(), Some(&"fs_read"));
    assert_eq!(names.last(), Some(&"nerdctl_ssh"));
}

#[test]
fn empty_roots_reject_calls_but_protocol_still_works() {
    let config = Config::default();
    let frames = session(
        &config,
        AuditLog::disabled(),
        &[
            json!({"jsonrpc": "2.0", "id": "a", "method": "initialize"}).to_string(),
            call(2, "nerdctl_local", json!({"args": ["ps"]})),
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}).to_string(),
            json!({"jsonrpc": "2.0", "id": 4, "method": "prompts/list"}).to_string(),
        ],
    );
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0]["result"]["serverInfo"]["name"], "local-mcp");
    assert_eq!(frames[1]["error"]["code"], -32602);
    assert_eq!(frames[2]["result"], json!({"resources": []}));
    assert_eq!(frames[3]["result"], json!({"prompts": []}));
}

#[test]
fn unknown_ssh_host_is_invalid_params() {
    let config = Config::from_yaml("allowed_roots: [/srv]").unwrap();
    let frames = session(
        &config,
        AuditLog::disabled(),
        &[call(1, "nerdctl_ssh", json!({"host": "prod", "args": ["ps"]}))],
    );
    assert_eq!(frames[0]["error"]["code"], -32602);
    assert_eq!(frames[0]["error"]["message"], "Unknown ssh host: prod");
    assert_eq!(frames[0]["error"]["data"]["tool"], "nerdctl_ssh");
}

#[test]
fn audit_log_records_calls_and_failures() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let root = std::fs::canonicalize(dir.path())?;
    let log_path = root.join("audit.log");
    let config = config_for(&root, "");

    session(
        &config,
        AuditLog::new(log_path.to_str()),
        &[
            call(1, "fs_list", json!({"path": root})),
            call(2, "fs_read", json!({"path": "/etc/passwd"})),
        ],
    );

    let log = std::fs::read_to_string(&log_path)?;
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("CALL fs_list | path="));
    assert!(lines[1].contains("CALL fs_read | path=/etc/passwd"));
    assert!(lines[2].contains("FAIL fs_read | Path not allowed: /etc/passwd"));
    Ok(())
}

#[test]
fn git_tools_run_in_admitted_repo() -> anyhow::Result<()> {
    if which::which("git").is_err() {
        return Ok(());
    }
    let dir = tempfile::tempdir()?;
    let root = std::fs::canonicalize(dir.path())?;
    let status = std::process::Command::new("git").args(["init", "-q", "-b", "main"]).current_dir(&root).status()?;
    assert!(status.success());
    let config = config_for(&root, "");

    let frames = session(
        &config,
        AuditLog::disabled(),
        &[
            call(1, "git_status", json!({"repo": root})),
            call(2, "git_checkout", json!({"repo": root, "branch": "does-not-exist"})),
        ],
    );
    assert!(text(&frames[0]).starts_with("## "));
    assert_eq!(frames[1]["error"]["data"]["kind"], "collaborator_failure");
    Ok(())
}
