//! Project-tree file search.
//!
//! Walks the project with `ignore` (so `.gitignore`d paths and `.git` are
//! skipped like an editor's file search; other dot-directories are searched)
//! and matches root-relative paths against `glob` patterns.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;

use crate::host::FileSearch;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn compile(pattern: &str) -> Result<Pattern, String> {
    Pattern::new(pattern).map_err(|e| format!("Invalid glob pattern \"{pattern}\": {e}"))
}

/// True when every file inside `rel_dir` would be excluded, so the walk can
/// skip the directory instead of filtering its files one by one.
fn excludes_dir(exclude: &[Pattern], rel_dir: &Path) -> bool {
    let probe = rel_dir.join("_");
    exclude
        .iter()
        .any(|pattern| pattern.matches_path_with(&probe, MATCH_OPTIONS))
}

/// [`FileSearch`] over the local filesystem. Results are ordered shallowest
/// first, then by path, so the project-level file wins over nested copies.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkspaceSearch;

impl FileSearch for WorkspaceSearch {
    fn find_files(
        &self,
        root: &Path,
        pattern: &str,
        exclude: &[String],
        limit: usize,
    ) -> Result<Vec<PathBuf>, String> {
        if !root.is_dir() {
            return Err(format!("Not a directory: {}", root.display()));
        }
        let include = compile(pattern)?;
        let exclude = exclude
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        let walk_root = root.to_path_buf();
        let dir_exclude = exclude.clone();
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .parents(true)
            .filter_entry(move |entry| {
                if !entry.file_type().is_some_and(|t| t.is_dir()) {
                    return true;
                }
                if entry.file_name() == ".git" {
                    return false;
                }
                match entry.path().strip_prefix(&walk_root) {
                    Ok(rel) if !rel.as_os_str().is_empty() => !excludes_dir(&dir_exclude, rel),
                    _ => true,
                }
            })
            .build();

        let mut found: Vec<(usize, PathBuf)> = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            if !include.matches_path_with(rel, MATCH_OPTIONS) {
                continue;
            }
            if exclude.iter().any(|p| p.matches_path_with(rel, MATCH_OPTIONS)) {
                continue;
            }
            found.push((entry.depth(), entry.path().to_path_buf()));
        }

        found.sort();
        Ok(found.into_iter().take(limit).map(|(_, path)| path).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn node_modules() -> Vec<String> {
        vec!["**/node_modules/**".to_string()]
    }

    #[test]
    fn finds_root_level_file() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "manage.py");
        let found = WorkspaceSearch
            .find_files(dir.path(), "**/manage.py", &node_modules(), 1)
            .unwrap();
        assert_eq!(found, vec![dir.path().join("manage.py")]);
    }

    #[test]
    fn prefers_shallowest_match() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "apps/vendor/manage.py");
        touch(dir.path(), "backend/manage.py");
        let found = WorkspaceSearch
            .find_files(dir.path(), "**/manage.py", &node_modules(), 1)
            .unwrap();
        assert_eq!(found, vec![dir.path().join("backend/manage.py")]);
    }

    #[test]
    fn skips_excluded_directories() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "node_modules/pkg/manage.py");
        let found = WorkspaceSearch
            .find_files(dir.path(), "**/manage.py", &node_modules(), 1)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn searches_dot_directories() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".devcontainer/app/manage.py");
        let found = WorkspaceSearch
            .find_files(dir.path(), "**/manage.py", &node_modules(), 1)
            .unwrap();
        assert_eq!(found, vec![dir.path().join(".devcontainer/app/manage.py")]);
    }

    #[test]
    fn skips_git_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".git/hooks/manage.py");
        let found = WorkspaceSearch
            .find_files(dir.path(), "**/manage.py", &[], 1)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn does_not_match_similar_names() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "not_manage.py");
        touch(dir.path(), "manage.pyc");
        let found = WorkspaceSearch
            .find_files(dir.path(), "**/manage.py", &[], 5)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn respects_limit() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/manage.py");
        touch(dir.path(), "b/manage.py");
        touch(dir.path(), "c/manage.py");
        let found = WorkspaceSearch
            .find_files(dir.path(), "**/manage.py", &[], 2)
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn rejects_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let result = WorkspaceSearch.find_files(dir.path(), "[", &[], 1);
        assert!(result.unwrap_err().contains("Invalid glob pattern"));
    }

    #[test]
    fn rejects_missing_root() {
        let result = WorkspaceSearch.find_files(Path::new("/nonexistent/root-12345"), "**/x", &[], 1);
        assert!(result.is_err());
    }
}
