// Local MCP Gateway - Exact Search (ripgrep)
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// rg exits 1 on "no matches": a normal empty result, not a failure.
// `--null` separates the path from `line:text` so paths with ':' parse cleanly.

use crate::error::{GatewayError, GatewayResult};
use crate::exec;
use crate::providers::{ExactSearchProvider, SearchHit, SearchHits};
use std::path::Path;
use std::time::Duration;

pub struct Ripgrep {
    program: String,
    timeout: Duration,
}

impl Ripgrep {
    pub fn new(timeout: Duration) -> Self {
        Self { program: "rg".to_string(), timeout }
    }
}

impl ExactSearchProvider for Ripgrep {
    fn search(&self, root: &Path, query: &str, glob: Option<&str>, max_results: usize) -> GatewayResult<SearchHits> {
        if exec::locate(&self.program).is_none() {
            return Err(GatewayError::collaborator("ripgrep (rg) not found in PATH. Install ripgrep."));
        }

        let mut args: Vec<String> = vec![
            "--no-heading".into(),
            "--with-filename".into(),
            "--line-number".into(),
            "--color".into(),
            "never".into(),
            "--null".into(),
        ];
        if let Some(g) = glob.filter(|g| !g.is_empty()) {
            args.push("-g".into());
            args.push(g.to_string());
        }
        args.push("-e".into());
        args.push(query.to_string());
        args.push("--".into());
        args.push(root.to_string_lossy().to_string());

        let output = exec::run(&self.program, &args, None, self.timeout)?;
        match output.code() {
            0 | 1 => {}
            code => {
                let msg = if !output.stderr.trim().is_empty() {
                    output.stderr.trim().to_string()
                } else if !output.stdout.trim().is_empty() {
                    output.stdout.trim().to_string()
                } else {
                    format!("rg failed ({})", code)
                };
                return Err(GatewayError::collaborator(msg));
            }
        }

        Ok(collect_hits(&output.stdout, max_results))
    }
}

/// Parse `path\0line:text` records, keeping at most `max_results`
fn collect_hits(stdout: &str, max_results: usize) -> SearchHits {
    let mut result = SearchHits::default();
    for line in stdout.lines().filter(|l| !l.is_empty()) {
        if result.hits.len() >= max_results {
            result.truncated = true;
            break;
        }
        if let Some(hit) = parse_hit(line) {
            result.hits.push(hit);
        }
    }
    result
}

fn parse_hit(line: &str) -> Option<SearchHit> {
    let (path, rest) = line.split_once('\0')?;
    let (line_no, text) = rest.split_once(':')?;
    Some(SearchHit {
        path: path.to_string(),
        line_no: line_no.parse().ok()?,
        text: text.to_string(),
    })
}

// ============================================================================
// TESTS
// ============================================================================
