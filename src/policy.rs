// Local MCP Gateway - Policy Engine
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Binary admission control for two resource classes:
// - Path containment: every path-bearing argument must resolve under an allowed root
// - SQL write safety: surface-text guards for the write-execution tool
//
// The SQL guards are a regex heuristic on raw text, NOT a SQL parser.
// They do not understand string literals or comments and are biased toward
// rejecting acceptable statements over admitting dangerous ones.

use crate::config::WritePolicy;
use crate::error::{GatewayError, GatewayResult};
use crate::paths::expand_home;
use regex::Regex;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

// ============================================================================
// PATH CONTAINMENT
// ============================================================================

/// Symlinks followed in one resolution before giving up (matches Linux MAXSYMLINKS)
const MAX_SYMLINK_HOPS: usize = 40;

/// Resolve a path to an absolute real path.
///
/// Expands `~`, anchors relative paths at the working directory, and
/// follows symlinks through every component that exists, including links
/// whose target does not exist yet. Components that do not exist (a file
/// about to be written) are appended lexically, with `..` popping the
/// pending tail.
pub fn resolve_path(raw: &str) -> std::io::Result<PathBuf> {
    let expanded = expand_home(raw);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };

    let mut resolved = PathBuf::new();
    let mut queue: VecDeque<OsString> = VecDeque::new();
    split_components(&absolute, &mut resolved, &mut queue);

    let mut pending: Vec<OsString> = Vec::new();
    let mut hops = 0;

    while let Some(name) = queue.pop_front() {
        if name == ".." {
            if pending.pop().is_none() {
                resolved.pop();
            }
            continue;
        }
        if !pending.is_empty() {
            pending.push(name);
            continue;
        }

        let next = resolved.join(&name);
        if let Ok(real) = std::fs::canonicalize(&next) {
            resolved = real;
            continue;
        }
        // Dangling link: resolve its target in place of the component
        match std::fs::symlink_metadata(&next) {
            Ok(meta) if meta.file_type().is_symlink() => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "too many levels of symbolic links",
                    ));
                }
                let target = std::fs::read_link(&next)?;
                let mut spliced = VecDeque::new();
                let mut anchor = PathBuf::new();
                split_components(&target, &mut anchor, &mut spliced);
                if target.has_root() {
                    resolved = anchor;
                }
                while let Some(part) = spliced.pop_back() {
                    queue.push_front(part);
                }
            }
            // Missing, not a directory, permission: resolution stops here
            _ => pending.push(name),
        }
    }

    for name in pending {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Root/prefix into `anchor`, named steps and `..` into `names`
fn split_components(path: &Path, anchor: &mut PathBuf, names: &mut VecDeque<OsString>) {
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => anchor.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => names.push_back(OsString::from("..")),
            Component::Normal(name) => names.push_back(name.to_os_string()),
        }
    }
}

/// Component-wise containment: equal to `root` or nested under it.
/// `/allowed-root-evil` is NOT under `/allowed-root`.
pub fn is_within(candidate: &Path, root: &Path) -> bool {
    candidate.starts_with(root)
}

/// Admit `path` only if it resolves under one of `allowed_roots`.
/// Returns the resolved path the collaborator should operate on.
pub fn ensure_path_allowed(path: &str, allowed_roots: &[String]) -> GatewayResult<PathBuf> {
    let resolved = resolve_path(path)
        .map_err(|e| GatewayError::policy(format!("Path not resolvable: {} ({})", path, e)))?;

    let admitted = allowed_roots
        .iter()
        .filter_map(|root| resolve_path(root).ok())
        .any(|root| is_within(&resolved, &root));

    if admitted {
        Ok(resolved)
    } else {
        Err(GatewayError::policy(format!("Path not allowed: {}", resolved.display())))
    }
}

// ============================================================================
// SQL WRITE SAFETY
// ============================================================================

fn sql_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|e| panic!("bad SQL guard regex {}: {}", pattern, e)))
}

fn ddl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    sql_regex(&RE, r"(?i)\b(CREATE|ALTER|DROP)\b")
}

fn truncate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    sql_regex(&RE, r"(?i)\bTRUNCATE\b")
}

fn update_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    sql_regex(&RE, r"(?i)^\s*UPDATE\b")
}

fn delete_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    sql_regex(&RE, r"(?i)^\s*DELETE\b")
}

fn where_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    sql_regex(&RE, r"(?i)\bWHERE\b")
}

/// Multi-statement guard.
///
/// Unless `allow_multi` is set, a semicolon anywhere other than a single
/// trailing terminator is refused. The terminator is stripped and the
/// remainder returned as one statement.
pub fn split_single_statement(sql: &str, allow_multi: bool) -> GatewayResult<String> {
    if allow_multi {
        return Ok(sql.to_string());
    }
    let trimmed = sql.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
    if body.contains(';') {
        return Err(GatewayError::policy("Multi-statement SQL is disabled by policy."));
    }
    Ok(body.to_string())
}

/// DDL → TRUNCATE → WHERE-required, in that order; first violation wins.
pub fn check_sql_write_policy(sql: &str, policy: &WritePolicy) -> GatewayResult<()> {
    if !policy.allow_ddl && ddl_re().is_match(sql) {
        return Err(GatewayError::policy("DDL (CREATE/ALTER/DROP) blocked by policy."));
    }
    if !policy.allow_truncate && truncate_re().is_match(sql) {
        return Err(GatewayError::policy("TRUNCATE blocked by policy."));
    }
    if policy.require_where && !where_re().is_match(sql) {
        if update_re().is_match(sql) {
            return Err(GatewayError::policy("UPDATE without WHERE blocked by policy."));
        }
        if delete_re().is_match(sql) {
            return Err(GatewayError::policy("DELETE without WHERE blocked by policy."));
        }
    }
    Ok(())
}

/// Full write-execution admission: multi-statement guard, then content guards.
/// Returns the statement to execute.
pub fn admit_sql_write(sql: &str, policy: &WritePolicy) -> GatewayResult<String> {
    let statement = split_single_statement(sql, policy.allow_multi_statement)?;
    check_sql_write_policy(&statement, policy)?;
    Ok(statement)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn roots(paths: &[&Path]) -> Vec<String> {
        paths.iter().map(|p| p.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn admits_root_itself_and_descendants() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("project");
        std::fs::create_dir_all(root.join("src"))?;
        std::fs::write(root.join("src/main.rs"), "fn main() {}")?;
        let allowed = roots(&[&root]);

        let real_root = std::fs::canonicalize(&root)?;
        assert_eq!(ensure_path_allowed(root.to_str().unwrap(), &allowed)?, real_root);
        assert!(ensure_path_allowed(root.join("src/main.rs").to_str().unwrap(), &allowed).is_ok());
        // Not yet existing file under an allowed root (fs_write)
        assert_eq!(
            ensure_path_allowed(root.join("new/deeper/file.txt").to_str().unwrap(), &allowed)?,
            real_root.join("new/deeper/file.txt")
        );
        Ok(())
    }

    #[test]
    fn rejects_adjacent_name_collision() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("allowed-root");
        let evil = dir.path().join("allowed-root-evil");
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(&evil)?;
        std::fs::write(evil.join("secret"), "x")?;

        let err = ensure_path_allowed(evil.join("secret").to_str().unwrap(), &roots(&[&root])).unwrap_err();
        assert!(matches!(err, GatewayError::PolicyViolation(_)));
        assert!(err.to_string().starts_with("Path not allowed: "));
        Ok(())
    }

    #[test]
    fn rejects_traversal_out_of_root() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("root");
        std::fs::create_dir_all(&root)?;
        std::fs::write(dir.path().join("outside.txt"), "x")?;

        let sneaky = format!("{}/../outside.txt", root.display());
        assert!(ensure_path_allowed(&sneaky, &roots(&[&root])).is_err());

        // `..` through a directory that does not exist yet is still lexical
        let sneaky = format!("{}/missing/../../outside.txt", root.display());
        assert!(ensure_path_allowed(&sneaky, &roots(&[&root])).is_err());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinks_out_of_root() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("root");
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(&outside)?;
        std::fs::write(outside.join("data.txt"), "secret")?;
        std::os::unix::fs::symlink(&outside, root.join("link"))?;

        let err = ensure_path_allowed(root.join("link/data.txt").to_str().unwrap(), &roots(&[&root])).unwrap_err();
        let real_outside = std::fs::canonicalize(&outside)?;
        assert_eq!(err.to_string(), format!("Path not allowed: {}", real_outside.join("data.txt").display()));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_resolves_to_its_target() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("project");
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(&outside)?;
        std::os::unix::fs::symlink(outside.join("pwned.txt"), root.join("innocent.txt"))?;

        let err = ensure_path_allowed(root.join("innocent.txt").to_str().unwrap(), &roots(&[&root])).unwrap_err();
        let real_outside = std::fs::canonicalize(&outside)?;
        assert_eq!(err.to_string(), format!("Path not allowed: {}", real_outside.join("pwned.txt").display()));

        // Relative dangling link that stays inside is admitted as its target
        std::os::unix::fs::symlink("drafts/next.md", root.join("next"))?;
        let real_root = std::fs::canonicalize(&root)?;
        assert_eq!(
            ensure_path_allowed(root.join("next").to_str().unwrap(), &roots(&[&root]))?,
            real_root.join("drafts/next.md")
        );

        // Relative dangling link climbing out
        std::os::unix::fs::symlink("../outside/x", root.join("climb"))?;
        assert!(ensure_path_allowed(root.join("climb").to_str().unwrap(), &roots(&[&root])).is_err());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_is_refused() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("root");
        std::fs::create_dir_all(&root)?;
        std::os::unix::fs::symlink(root.join("b"), root.join("a"))?;
        std::os::unix::fs::symlink(root.join("a"), root.join("b"))?;

        let err = ensure_path_allowed(root.join("a").to_str().unwrap(), &roots(&[&root])).unwrap_err();
        assert!(err.to_string().starts_with("Path not resolvable: "));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_root_is_canonicalized_too() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let real = dir.path().join("real");
        std::fs::create_dir_all(&real)?;
        std::fs::write(real.join("a.txt"), "a")?;
        let alias = dir.path().join("alias");
        std::os::unix::fs::symlink(&real, &alias)?;

        assert!(ensure_path_allowed(real.join("a.txt").to_str().unwrap(), &roots(&[&alias])).is_ok());
        Ok(())
    }

    #[test]
    fn etc_shadow_not_under_project() {
        let allowed = vec!["/home/project".to_string()];
        assert!(ensure_path_allowed("/etc/shadow", &allowed).is_err());
    }

    #[test]
    fn empty_roots_admit_nothing() {
        assert!(ensure_path_allowed("/", &[]).is_err());
    }

    #[test]
    fn is_within_requires_separator_boundary() {
        assert!(is_within(Path::new("/root"), Path::new("/root")));
        assert!(is_within(Path::new("/root/a/b"), Path::new("/root")));
        assert!(!is_within(Path::new("/root2"), Path::new("/root")));
        assert!(!is_within(Path::new("/roo"), Path::new("/root")));
    }

    // ------------------------------------------------------------------------
    // SQL
    // ------------------------------------------------------------------------

    fn strict() -> WritePolicy {
        WritePolicy::default()
    }

    #[test]
    fn trailing_terminator_is_stripped() {
        assert_eq!(split_single_statement("SELECT 1;", false).unwrap(), "SELECT 1");
        assert_eq!(split_single_statement("  INSERT INTO t VALUES (1) ;  ", false).unwrap(), "INSERT INTO t VALUES (1)");
        assert_eq!(split_single_statement("SELECT 1", false).unwrap(), "SELECT 1");
    }

    #[test]
    fn second_statement_is_rejected() {
        let err = split_single_statement("SELECT 1; SELECT 2", false).unwrap_err();
        assert_eq!(err.to_string(), "Multi-statement SQL is disabled by policy.");
        assert!(split_single_statement("SELECT 1;;", false).is_err());
        assert_eq!(split_single_statement("SELECT 1; SELECT 2", true).unwrap(), "SELECT 1; SELECT 2");
    }

    #[test]
    fn ddl_blocked_unless_allowed() {
        for sql in ["CREATE TABLE t (id int)", "alter table t add c int", "INSERT INTO t SELECT 1; drop table t"] {
            let err = check_sql_write_policy(sql, &strict()).unwrap_err();
            assert_eq!(err.to_string(), "DDL (CREATE/ALTER/DROP) blocked by policy.");
        }
        let relaxed = WritePolicy { allow_ddl: true, ..strict() };
        assert!(check_sql_write_policy("CREATE TABLE t (id int)", &relaxed).is_ok());
    }

    #[test]
    fn ddl_match_is_whole_word() {
        assert!(check_sql_write_policy("INSERT INTO created_items VALUES (1)", &strict()).is_ok());
        assert!(check_sql_write_policy("UPDATE t SET dropped = true WHERE id = 1", &strict()).is_ok());
    }

    #[test]
    fn truncate_blocked_unless_allowed() {
        let err = check_sql_write_policy("TRUNCATE audit", &strict()).unwrap_err();
        assert_eq!(err.to_string(), "TRUNCATE blocked by policy.");
        let relaxed = WritePolicy { allow_truncate: true, ..strict() };
        assert!(check_sql_write_policy("truncate audit", &relaxed).is_ok());
    }

    #[test]
    fn update_and_delete_need_where() {
        assert_eq!(
            check_sql_write_policy("UPDATE users SET admin = true", &strict()).unwrap_err().to_string(),
            "UPDATE without WHERE blocked by policy."
        );
        assert_eq!(
            check_sql_write_policy("  delete from users", &strict()).unwrap_err().to_string(),
            "DELETE without WHERE blocked by policy."
        );
        assert!(check_sql_write_policy("DELETE FROM users WHERE id = 4", &strict()).is_ok());
        assert!(check_sql_write_policy("INSERT INTO users (name) VALUES ('a')", &strict()).is_ok());

        let relaxed = WritePolicy { require_where: false, ..strict() };
        assert!(check_sql_write_policy("DELETE FROM users", &relaxed).is_ok());
    }

    #[test]
    fn where_check_is_purely_syntactic() {
        // WHERE inside a literal still satisfies the guard
        assert!(check_sql_write_policy("UPDATE t SET note = 'where'", &strict()).is_ok());
    }

    #[test]
    fn first_violation_wins() {
        // DDL before TRUNCATE
        let err = check_sql_write_policy("DROP TABLE a; TRUNCATE b", &strict()).unwrap_err();
        assert!(err.to_string().starts_with("DDL"));
        // TRUNCATE before WHERE
        let sql = "DELETE FROM a USING (SELECT 1) x; TRUNCATE b";
        assert!(check_sql_write_policy(sql, &strict()).unwrap_err().to_string().starts_with("TRUNCATE"));
        // Multi-statement before everything
        let err = admit_sql_write("DROP TABLE a; DELETE FROM b", &strict()).unwrap_err();
        assert!(err.to_string().starts_with("Multi-statement"));
    }

    #[test]
    fn admit_returns_normalized_statement() {
        assert_eq!(
            admit_sql_write("DELETE FROM users WHERE id = 1;", &strict()).unwrap(),
            "DELETE FROM users WHERE id = 1"
        );
        assert!(admit_sql_write("DELETE FROM users", &strict()).is_err());
    }

    #[test]
    fn multi_statement_allowed_still_hits_content_guards() {
        let relaxed = WritePolicy { allow_multi_statement: true, ..strict() };
        let err = admit_sql_write("INSERT INTO t VALUES (1); DROP TABLE t", &relaxed).unwrap_err();
        assert_eq!(err.to_string(), "DDL (CREATE/ALTER/DROP) blocked by policy.");
        let err = admit_sql_write("UPDATE t SET a = 1; SELECT 1", &relaxed).unwrap_err();
        assert_eq!(err.to_string(), "UPDATE without WHERE blocked by policy.");
        assert_eq!(
            admit_sql_write("INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);", &relaxed).unwrap(),
            "INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);"
        );
    }
}
