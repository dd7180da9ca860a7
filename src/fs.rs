// Local MCP Gateway - Filesystem Collaborator
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Read/write/list/glob on the real filesystem.
// Paths arrive already resolved and admitted by the policy engine.

use crate::error::{GatewayError, GatewayResult};
use crate::providers::{DirEntry, EntryKind, FilesystemProvider};
use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct LocalFs;

impl FilesystemProvider for LocalFs {
    fn read(&self, path: &Path) -> GatewayResult<String> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GatewayError::collaborator(format!("File not found: {}", path.display())))
            }
            Err(e) => Err(GatewayError::collaborator(format!("read failed for {}: {}", path.display(), e))),
        }
    }

    fn write(&self, path: &Path, content: &str) -> GatewayResult<usize> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GatewayError::collaborator(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, content)
            .map_err(|e| GatewayError::collaborator(format!("write failed for {}: {}", path.display(), e)))?;
        Ok(content.len())
    }

    fn list(&self, path: &Path) -> GatewayResult<Vec<DirEntry>> {
        if !path.exists() {
            return Err(GatewayError::collaborator(format!("Not found: {}", path.display())));
        }
        if !path.is_dir() {
            return Err(GatewayError::collaborator(format!("Not a directory: {}", path.display())));
        }

        let reader = std::fs::read_dir(path)
            .map_err(|e| GatewayError::collaborator(format!("list failed for {}: {}", path.display(), e)))?;

        let mut entries = Vec::new();
        for entry in reader.flatten() {
            let kind = if entry.path().is_dir() { EntryKind::Dir } else { EntryKind::File };
            entries.push(DirEntry { kind, name: entry.file_name().to_string_lossy().to_string() });
        }
        entries.sort_by_key(|e| e.name.to_lowercase());
        Ok(entries)
    }

    fn glob(&self, root: &Path, pattern: &str) -> GatewayResult<Vec<PathBuf>> {
        let glob = RootGlob::compile(pattern)?;
        let mut matches = BTreeSet::new();

        for entry in WalkDir::new(root).min_depth(1).follow_links(false).into_iter().flatten() {
            let rel = match entry.path().strip_prefix(root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            if glob.matches(rel) {
                matches.insert(entry.path().to_path_buf());
            }
        }
        Ok(matches.into_iter().collect())
    }
}

// ============================================================================
// GLOB MATCHING
// Shell-style, relative to the root. `*` stays inside one directory, `**`
// spans any depth. Hidden names are skipped unless the pattern names a
// dot-segment itself.
// ============================================================================

struct RootGlob {
    matcher: GlobMatcher,
    include_hidden: bool,
}

impl RootGlob {
    fn compile(pattern: &str) -> GatewayResult<Self> {
        let segments: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
        if segments.contains(&"..") {
            return Err(GatewayError::invalid_params("glob pattern may not contain '..'"));
        }
        if segments.is_empty() {
            return Err(GatewayError::invalid_params("glob pattern is empty"));
        }

        let matcher = GlobBuilder::new(&segments.join("/"))
            .literal_separator(true)
            .build()
            .map_err(|e| GatewayError::invalid_params(format!("invalid glob pattern {:?}: {}", pattern, e)))?
            .compile_matcher();
        let include_hidden = segments.iter().any(|s| s.starts_with('.'));
        Ok(Self { matcher, include_hidden })
    }

    fn matches(&self, rel: &Path) -> bool {
        if !self.include_hidden && rel.components().any(|c| c.as_os_str().to_string_lossy().starts_with('.')) {
            return false;
        }
        self.matcher.is_match(rel)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) -> anyhow::Result<()> {
        let p = root.join(rel);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(p, rel)?;
        Ok(())
    }

    fn rel_names(root: &Path, found: Vec<PathBuf>) -> Vec<String> {
        found
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn write_creates_parents_and_read_returns_text() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("a/b/c.txt");
        let n = LocalFs.write(&target, "héllo")?;
        assert_eq!(n, "héllo".len());
        assert_eq!(LocalFs.read(&target)?, "héllo");
        Ok(())
    }

    #[test]
    fn read_missing_is_not_found() {
        let err = LocalFs.read(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert_eq!(err.to_string(), "File not found: /definitely/not/here.txt");
    }

    #[test]
    fn list_sorts_case_insensitively() -> anyhow::Result<()> {
        let dir = tempdir()?;
        touch(dir.path(), "beta.txt")?;
        touch(dir.path(), "Alpha.txt")?;
        std::fs::create_dir(dir.path().join("gamma"))?;

        let entries = LocalFs.list(dir.path())?;
        let rendered: Vec<String> = entries.iter().map(|e| format!("{}\t{}", e.kind.as_str(), e.name)).collect();
        assert_eq!(rendered, vec!["file\tAlpha.txt", "file\tbeta.txt", "dir\tgamma"]);
        Ok(())
    }

    #[test]
    fn list_rejects_files_and_missing() -> anyhow::Result<()> {
        let dir = tempdir()?;
        touch(dir.path(), "f.txt")?;
        assert!(LocalFs.list(&dir.path().join("f.txt")).unwrap_err().to_string().starts_with("Not a directory"));
        assert!(LocalFs.list(&dir.path().join("nope")).unwrap_err().to_string().starts_with("Not found"));
        Ok(())
    }

    #[test]
    fn glob_star_stays_in_one_directory() -> anyhow::Result<()> {
        let dir = tempdir()?;
        touch(dir.path(), "main.rs")?;
        touch(dir.path(), "lib.rs")?;
        touch(dir.path(), "src/nested.rs")?;
        touch(dir.path(), "README.md")?;

        let found = LocalFs.glob(dir.path(), "*.rs")?;
        assert_eq!(rel_names(dir.path(), found), vec!["lib.rs", "main.rs"]);
        Ok(())
    }

    #[test]
    fn glob_double_star_recurses() -> anyhow::Result<()> {
        let dir = tempdir()?;
        touch(dir.path(), "main.rs")?;
        touch(dir.path(), "src/a.rs")?;
        touch(dir.path(), "src/deep/b.rs")?;
        touch(dir.path(), "src/deep/c.txt")?;

        let found = LocalFs.glob(dir.path(), "**/*.rs")?;
        assert_eq!(rel_names(dir.path(), found), vec!["main.rs", "src/a.rs", "src/deep/b.rs"]);
        Ok(())
    }

    #[test]
    fn glob_skips_hidden_unless_explicit() -> anyhow::Result<()> {
        let dir = tempdir()?;
        touch(dir.path(), ".env")?;
        touch(dir.path(), ".git/config")?;
        touch(dir.path(), "visible.cfg")?;

        assert_eq!(rel_names(dir.path(), LocalFs.glob(dir.path(), "*")?), vec!["visible.cfg"]);
        assert_eq!(rel_names(dir.path(), LocalFs.glob(dir.path(), "**/config")?), Vec::<String>::new());
        assert_eq!(rel_names(dir.path(), LocalFs.glob(dir.path(), ".env")?), vec![".env"]);
        Ok(())
    }

    #[test]
    fn glob_character_classes() -> anyhow::Result<()> {
        let dir = tempdir()?;
        for name in ["a1.log", "a2.log", "b1.log"] {
            touch(dir.path(), name)?;
        }
        assert_eq!(rel_names(dir.path(), LocalFs.glob(dir.path(), "[ab]1.log")?), vec!["a1.log", "b1.log"]);
        assert_eq!(rel_names(dir.path(), LocalFs.glob(dir.path(), "a[!1].log")?), vec!["a2.log"]);
        assert_eq!(rel_names(dir.path(), LocalFs.glob(dir.path(), "a?.log")?), vec!["a1.log", "a2.log"]);
        Ok(())
    }

    #[test]
    fn glob_cannot_climb_out_of_root() {
        let err = LocalFs.glob(Path::new("/tmp"), "../etc/*").unwrap_err();
        assert_eq!(err.code(), crate::error::INVALID_PARAMS);
        let err = LocalFs.glob(Path::new("/tmp"), "src/../../*").unwrap_err();
        assert_eq!(err.code(), crate::error::INVALID_PARAMS);
    }

    #[test]
    fn malformed_or_empty_pattern_is_invalid_params() {
        let err = LocalFs.glob(Path::new("/tmp"), "[unclosed").unwrap_err();
        assert_eq!(err.code(), crate::error::INVALID_PARAMS);
        let err = LocalFs.glob(Path::new("/tmp"), "./").unwrap_err();
        assert_eq!(err.to_string(), "glob pattern is empty");
    }

    #[test]
    fn glob_accepts_leading_dot_slash() -> anyhow::Result<()> {
        let dir = tempdir()?;
        touch(dir.path(), "src/lib.rs")?;
        assert_eq!(rel_names(dir.path(), LocalFs.glob(dir.path(), "./src/*.rs")?), vec!["src/lib.rs"]);
        Ok(())
    }
}
