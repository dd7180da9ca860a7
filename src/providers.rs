// Local MCP Gateway - Collaborator Interfaces
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// The capabilities the gateway delegates to after policy approval.
// Every call here has already passed its policy checks; implementations
// never re-check containment and never see a rejected request.

use crate::config::Config;
use crate::error::GatewayResult;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dir => "dir",
            Self::File => "file",
        }
    }
}

/// One directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub kind: EntryKind,
    pub name: String,
}

/// One exact-search match line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub path: String,
    pub line_no: u64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHits {
    pub hits: Vec<SearchHit>,
    /// More matches existed than `max_results`
    pub truncated: bool,
}

/// One approximate-search match
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// Similarity in [0.0, 1.0]
    pub score: f64,
    /// 1-based
    pub line_no: usize,
    pub snippet: String,
}

/// Rows returned by a read query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    /// At most `limit` rows
    pub rows: Vec<Vec<Value>>,
    /// Rows the database returned before truncation
    pub row_count: usize,
}

pub trait FilesystemProvider {
    fn read(&self, path: &Path) -> GatewayResult<String>;
    /// Returns bytes written
    fn write(&self, path: &Path, content: &str) -> GatewayResult<usize>;
    /// Sorted by lowercase name
    fn list(&self, path: &Path) -> GatewayResult<Vec<DirEntry>>;
    /// Sorted, de-duplicated matches confined to `root`
    fn glob(&self, root: &Path, pattern: &str) -> GatewayResult<Vec<PathBuf>>;
}

pub trait VersionControlProvider {
    fn status(&self, repo: &Path) -> GatewayResult<String>;
    fn diff(&self, repo: &Path, staged: bool) -> GatewayResult<String>;
    fn log(&self, repo: &Path, count: u64) -> GatewayResult<String>;
    fn checkout(&self, repo: &Path, branch: &str) -> GatewayResult<String>;
    fn commit(&self, repo: &Path, message: &str) -> GatewayResult<String>;
}

pub trait ExactSearchProvider {
    fn search(&self, root: &Path, query: &str, glob: Option<&str>, max_results: usize) -> GatewayResult<SearchHits>;
}

pub trait ApproximateSearchProvider {
    /// Descending score, then ascending line; only score >= `min_probability`
    fn search(&self, path: &Path, query: &str, min_probability: f64, max_results: usize) -> GatewayResult<Vec<FuzzyMatch>>;
}

pub trait DatabaseProvider {
    fn query(&self, conn: &str, sql: &str, limit: usize) -> GatewayResult<QueryResult>;
    /// Returns affected row count
    fn exec(&self, conn: &str, sql: &str) -> GatewayResult<u64>;
}

pub trait ContainerProvider {
    fn run_local(&self, args: &[String]) -> GatewayResult<String>;
    fn run_remote(&self, host: &str, args: &[String]) -> GatewayResult<String>;
}

/// Every collaborator the invoker can reach
pub struct Providers<'a> {
    pub fs: Box<dyn FilesystemProvider + 'a>,
    pub vcs: Box<dyn VersionControlProvider + 'a>,
    pub exact_search: Box<dyn ExactSearchProvider + 'a>,
    pub approx_search: Box<dyn ApproximateSearchProvider + 'a>,
    pub db: Box<dyn DatabaseProvider + 'a>,
    pub containers: Box<dyn ContainerProvider + 'a>,
}

impl<'a> Providers<'a> {
    /// Real local collaborators, reading settings from the snapshot
    pub fn local(config: &'a Config) -> Self {
        let timeout = config.tool_timeout();
        Self {
            fs: Box::new(crate::fs::LocalFs),
            vcs: Box::new(crate::git::GitCli::new(timeout)),
            exact_search: Box::new(crate::search::Ripgrep::new(timeout)),
            approx_search: Box::new(crate::fuzzy::FuzzyMatcher),
            db: Box::new(crate::pg::Postgres::new(config)),
            containers: Box::new(crate::nerdctl::Nerdctl::new(config)),
        }
    }
}
