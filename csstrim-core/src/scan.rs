//! Glob expansion for the `content` and `css` options.
//!
//! Each pattern is split into a static directory prefix and a glob remainder.
//! Only the prefix directory is walked, with early pruning of excluded
//! directories via `WalkDir::filter_entry`, and entries are matched in
//! parallel against the remainder.
//!
//! `*` and `?` never cross a `/`; `**` matches any number of directories.

use globset::{GlobBuilder, GlobMatcher};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{CsstrimError, CsstrimResult};
use crate::logging::log_empty_glob;

/// Directories never descended into.
const EXCLUDED_DIRS: &[&str] = &[".git", ".csstrim"];

const GLOB_META: &[char] = &['*', '?', '[', '{'];

#[inline]
fn is_excluded_dir(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

/// Split `pattern` into the longest leading run of literal path components
/// and the glob remainder (empty when the pattern is a plain path).
fn split_static_prefix(pattern: &str) -> (PathBuf, String) {
    let normalized = pattern.replace('\\', "/");
    let mut prefix = PathBuf::new();
    let mut rest: Vec<&str> = Vec::new();

    for part in normalized.split('/') {
        if !rest.is_empty() || part.contains(GLOB_META) {
            rest.push(part);
        } else if part.is_empty() && prefix.as_os_str().is_empty() {
            // leading '/' of an absolute pattern
            prefix.push("/");
        } else if !part.is_empty() && part != "." {
            prefix.push(part);
        }
    }
    (prefix, rest.join("/"))
}

fn relative_slash_path(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

fn compile_glob(base: &Path, glob: &str) -> CsstrimResult<GlobMatcher> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| CsstrimError::config(base, format!("invalid glob `{}`: {}", glob, e)))
}

/// Expands a single glob pattern relative to `base`.
///
/// A pattern without glob characters names one file, which must exist.
pub fn expand_glob(base: &Path, pattern: &str) -> CsstrimResult<Vec<PathBuf>> {
    let (prefix, rest) = split_static_prefix(pattern);
    let root = if prefix.is_absolute() {
        prefix
    } else {
        base.join(prefix)
    };

    if rest.is_empty() {
        return match root.metadata() {
            Ok(meta) if meta.is_file() => Ok(vec![root]),
            Ok(_) => Err(CsstrimError::file_access_msg(&root, "not a regular file")),
            Err(e) => Err(CsstrimError::file_access(&root, e)),
        };
    }

    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let matcher = compile_glob(base, &rest)?;

    let mut files = WalkDir::new(&root)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e))
        .par_bridge()
        .filter_map(|entry| match entry {
            Ok(e) => {
                if !e.file_type().is_file() {
                    return None;
                }
                let rel = relative_slash_path(e.path(), &root)?;
                matcher.is_match(&rel).then(|| Ok(e.into_path()))
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                let message = e.to_string();
                Some(Err(match e.into_io_error() {
                    Some(io) => CsstrimError::file_access(path, io),
                    None => CsstrimError::file_access_msg(path, message),
                }))
            }
        })
        .collect::<CsstrimResult<Vec<_>>>()?;

    files.sort();
    Ok(files)
}

/// Expands every pattern of one config option, deduplicated and sorted.
///
/// Patterns that match nothing are logged, not rejected.
pub fn expand_globs(base: &Path, option: &str, patterns: &[String]) -> CsstrimResult<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    for pattern in patterns {
        let matched = expand_glob(base, pattern)?;
        if matched.is_empty() {
            log_empty_glob(option, pattern);
        }
        files.extend(matched);
    }
    Ok(files.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_tree(files: &[&str]) -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir()
            .join("csstrim_scan_tests")
            .join(format!("{}_{}", std::process::id(), id));
        let _ = fs::remove_dir_all(&dir);
        for f in files {
            let path = dir.join(f);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "x").unwrap();
        }
        dir
    }

    fn names(base: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| relative_slash_path(f, base).unwrap())
            .collect()
    }

    #[test]
    fn test_split_static_prefix() {
        assert_eq!(
            split_static_prefix("dist/css/*.css"),
            (PathBuf::from("dist/css"), "*.css".to_string())
        );
        assert_eq!(
            split_static_prefix("**/*.html"),
            (PathBuf::new(), "**/*.html".to_string())
        );
        assert_eq!(
            split_static_prefix("site/index.html"),
            (PathBuf::from("site/index.html"), String::new())
        );
        assert_eq!(split_static_prefix("/abs/*.css").0, PathBuf::from("/abs"));
        assert_eq!(
            split_static_prefix("./css/./a.css"),
            (PathBuf::from("css/a.css"), String::new())
        );
    }

    #[test]
    fn test_single_star_stays_in_directory() {
        let base = temp_tree(&["a.html", "sub/b.html", "c.css"]);
        let files = expand_glob(&base, "*.html").unwrap();
        assert_eq!(names(&base, &files), vec!["a.html"]);
    }

    #[test]
    fn test_double_star_recurses() {
        let base = temp_tree(&["a.html", "sub/b.html", "sub/deep/c.html", "d.css"]);
        let files = expand_glob(&base, "**/*.html").unwrap();
        assert_eq!(
            names(&base, &files),
            vec!["a.html", "sub/b.html", "sub/deep/c.html"]
        );
    }

    #[test]
    fn test_excluded_dirs_are_pruned() {
        let base = temp_tree(&["a.html", ".git/x.html", ".csstrim/y.html"]);
        let files = expand_glob(&base, "**/*.html").unwrap();
        assert_eq!(names(&base, &files), vec!["a.html"]);
    }

    #[test]
    fn test_literal_path_must_exist() {
        let base = temp_tree(&["a.html"]);
        assert_eq!(expand_glob(&base, "a.html").unwrap().len(), 1);
        let err = expand_glob(&base, "missing.html").unwrap_err();
        assert_eq!(err.kind(), "FileAccessError");
    }

    #[test]
    fn test_missing_glob_root_matches_nothing() {
        let base = temp_tree(&["a.html"]);
        assert!(expand_glob(&base, "nowhere/*.css").unwrap().is_empty());
    }

    #[test]
    fn test_expand_globs_dedupes() {
        let base = temp_tree(&["a.css", "b.css"]);
        let files = expand_globs(
            &base,
            "css",
            &["*.css".to_string(), "a.css".to_string(), "{a,b}.css".to_string()],
        )
        .unwrap();
        assert_eq!(names(&base, &files), vec!["a.css", "b.css"]);
    }

    #[test]
    fn test_current_dir_prefix_is_not_a_second_path() {
        let base = temp_tree(&["a.css", "sub/b.css"]);
        let files = expand_globs(
            &base,
            "css",
            &["./a.css".to_string(), "*.css".to_string(), "./sub/*.css".to_string(), "sub/b.css".to_string()],
        )
        .unwrap();
        assert_eq!(files, vec![base.join("a.css"), base.join("sub/b.css")]);
    }
}
