// Local MCP Gateway - Git Collaborator
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Shells out to the git CLI inside an admitted repository path.
// Output is stdout + stderr; non-zero exit becomes a collaborator failure
// carrying that text.

use crate::error::{GatewayError, GatewayResult};
use crate::exec;
use crate::providers::VersionControlProvider;
use std::path::Path;
use std::time::Duration;

pub struct GitCli {
    program: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { program: "git".to_string(), timeout }
    }

    fn run(&self, repo: &Path, args: &[&str]) -> GatewayResult<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let output = exec::run(&self.program, &args, Some(repo), self.timeout)?;
        let text = output.combined();
        if !output.success() {
            if text.is_empty() {
                return Err(GatewayError::collaborator(format!("git failed ({})", output.code())));
            }
            return Err(GatewayError::collaborator(text));
        }
        Ok(text)
    }
}

impl VersionControlProvider for GitCli {
    fn status(&self, repo: &Path) -> GatewayResult<String> {
        self.run(repo, &["status", "--porcelain=v1", "-b"])
    }

    fn diff(&self, repo: &Path, staged: bool) -> GatewayResult<String> {
        if staged {
            self.run(repo, &["diff", "--staged"])
        } else {
            self.run(repo, &["diff"])
        }
    }

    fn log(&self, repo: &Path, count: u64) -> GatewayResult<String> {
        let n = format!("-n{}", count);
        self.run(repo, &["log", &n, "--oneline", "--decorate"])
    }

    fn checkout(&self, repo: &Path, branch: &str) -> GatewayResult<String> {
        self.run(repo, &["checkout", branch])
    }

    /// `commit -a`: tracked changes only, untracked files are never added
    fn commit(&self, repo: &Path, message: &str) -> GatewayResult<String> {
        self.run(repo, &["commit", "-am", message])
    }
}

// ============================================================================
// TESTS
// ============================================================================
