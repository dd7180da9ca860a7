// Local MCP Gateway - Path Resolution
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Config discovery and `~` expansion.
// Discovery walks up from the binary location, like the gateway always has;
// the HOME fallback is last.

use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "LOCAL_MCP_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Current user's home directory, if one can be determined
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// Expand a leading `~` or `~/` to the home directory.
/// `~user` forms are left untouched.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Every location checked for a config file, in priority order.
///
/// Resolution order:
///   1. Explicit path (CLI flag)
///   2. LOCAL_MCP_CONFIG environment variable
///   3. config.yaml next to the binary, then in each ancestor directory
///   4. ~/.mcp/config.yaml
pub fn config_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(p) = explicit {
        candidates.push(p.to_path_buf());
    }

    if let Ok(p) = std::env::var(CONFIG_ENV) {
        if !p.is_empty() {
            candidates.push(expand_home(&p));
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Ok(canonical) = exe.canonicalize() {
            let mut dir = canonical.parent();
            while let Some(d) = dir {
                candidates.push(d.join(CONFIG_FILE_NAME));
                dir = d.parent();
            }
        }
    }

    if let Some(home) = home_dir() {
        candidates.push(home.join(".mcp").join(CONFIG_FILE_NAME));
    }

    candidates
}

/// First existing config file among the candidates
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    config_candidates(explicit).into_iter().find(|p| p.is_file())
}

// ============================================================================
// TESTS
// ============================================================================
