// Local MCP Gateway - Library Root
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// All modules exported here for use by the binary and tests.

pub mod paths;
pub mod config;
pub mod error;
pub mod protocol;
pub mod policy;
pub mod registry;
pub mod invoker;
pub mod audit;
pub mod mcp;

// ============================================================================
// COLLABORATORS - everything the gateway delegates to after admission
// ============================================================================

/// Collaborator traits and the bundle handed to the invoker
pub mod providers;

/// External process runner with a hard deadline
pub mod exec;

/// Local filesystem: read, write, list, glob
pub mod fs;

/// git CLI
pub mod git;

/// ripgrep exact search
pub mod search;

/// Fuzzy line ranking
pub mod fuzzy;

/// Postgres via sqlx, one connection per call
pub mod pg;

/// nerdctl, local or over ssh
pub mod nerdctl;
