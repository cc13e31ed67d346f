// src/core/wildcards.rs

//! # Wildcard Expansion
//!
//! Expands a group's glob patterns (`src/*.cpp`, `**/*.h`) into concrete file
//! paths.
//!
//! ## Algorithm
//!
//! A pattern is split at `/` into segments. Expansion walks the segments from
//! a root directory (the declaring file's directory, or the file-system root
//! for absolute patterns):
//!
//! - A `**` segment switches to recursive matching of the next segment in the
//!   current directory and every directory below it. A trailing `**` matches
//!   every file.
//! - A segment that is not the last one is matched against directories only.
//! - The last segment is matched against files and symbolic links (so a
//!   trailing glob can pick up a linked directory too).
//!
//! Every directory visited is recorded with its modification time. Directories
//! under the build directory are never entered, so in-tree builds do not pick
//! up generated files. Hidden entries only match literal segments.

use crate::core::paths;
use crate::models::{FileTime, SourceArtifact};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum WildcardError {
    #[error("Invalid wildcard pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

type WildcardResult<T> = Result<T, WildcardError>;

/// Translates a shell wildcard into an anchored regular expression.
///
/// Supports `*`, `?` and bracket classes, including `[!...]` negation.
pub fn wildcard_to_regex(pattern: &str) -> WildcardResult<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    if inner == '\\' || inner == '[' {
                        class.push('\\');
                    }
                    class.push(inner);
                }
                if closed {
                    re.push('[');
                    re.push_str(&class);
                    re.push(']');
                } else {
                    re.push_str(&regex::escape("["));
                    re.push_str(&regex::escape(&class));
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|source| WildcardError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Wildcard patterns of a group together with what they expanded to.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SourceWildCards {
    /// The owning group's prefix, prepended to every pattern.
    pub prefix: String,
    pub patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Every directory visited during expansion, with its modification time.
    pub dir_time_stamps: Vec<(String, FileTime)>,
    pub files: Vec<SourceArtifact>,
}

impl SourceWildCards {
    pub fn new(prefix: impl Into<String>, patterns: Vec<String>, exclude_patterns: Vec<String>) -> Self {
        Self {
            prefix: prefix.into(),
            patterns,
            exclude_patterns,
            ..Self::default()
        }
    }

    /// Expands `patterns` minus `exclude_patterns` relative to `base_dir`.
    ///
    /// Recorded directory timestamps are reset first, so repeated calls over
    /// an unchanged tree yield identical results.
    ///
    /// # Errors
    /// Returns [`WildcardError::InvalidPattern`] for patterns that cannot be compiled.
    pub fn expand_patterns(&mut self, base_dir: &str, build_dir: &str) -> WildcardResult<BTreeSet<String>> {
        self.dir_time_stamps.clear();
        let patterns = self.patterns.clone();
        let excludes = self.exclude_patterns.clone();
        let mut files = self.expand_list(&patterns, base_dir, build_dir)?;
        let excluded = self.expand_list(&excludes, base_dir, build_dir)?;
        files.retain(|f| !excluded.contains(f));
        log::debug!(
            "Expanded {:?} (excluding {:?}) in '{}' to {} file(s).",
            patterns,
            excludes,
            base_dir,
            files.len()
        );
        Ok(files)
    }

    /// Returns `true` if any directory recorded during expansion was modified
    /// or removed since.
    pub fn has_changed(&self) -> bool {
        self.dir_time_stamps.iter().any(|(dir, stamp)| {
            match FileTime::of_path(Path::new(dir)) {
                Some(current) => current != *stamp,
                None => true,
            }
        })
    }

    fn expand_list(
        &mut self,
        patterns: &[String],
        base_dir: &str,
        build_dir: &str,
    ) -> WildcardResult<BTreeSet<String>> {
        let mut result = BTreeSet::new();
        let prefix = if self.prefix.starts_with("~/") {
            paths::expand_home(&self.prefix)
        } else {
            self.prefix.clone()
        };
        let build_dir = PathBuf::from(build_dir);

        for pattern in patterns {
            let full = paths::from_native_separators(&format!("{}{}", prefix, pattern));
            let mut parts: Vec<String> = full
                .split('/')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            let root = if paths::is_absolute_path(&full) {
                if cfg!(windows) && !full.starts_with('/') && !parts.is_empty() {
                    format!("{}/", parts.remove(0))
                } else {
                    "/".to_string()
                }
            } else {
                base_dir.to_string()
            };
            if parts.is_empty() {
                continue;
            }
            self.expand_segments(&mut result, Path::new(&root), &parts, &build_dir)?;
        }
        Ok(result)
    }

    fn expand_segments(
        &mut self,
        result: &mut BTreeSet<String>,
        base_dir: &Path,
        parts: &[String],
        build_dir: &Path,
    ) -> WildcardResult<()> {
        if paths::is_same_or_sub_path(base_dir, build_dir) {
            return Ok(());
        }
        self.record_dir(base_dir);

        // Collapse leading `**` segments.
        let mut recursive = false;
        let mut rest = parts;
        let mut segment = "*";
        while let Some((first, tail)) = rest.split_first() {
            rest = tail;
            if first == "**" {
                recursive = true;
                continue;
            }
            segment = first;
            break;
        }
        let is_dir = !rest.is_empty();

        // A literal intermediate segment (including `.` and `..`) is a plain step.
        if is_dir && !recursive && !paths::is_pattern(segment) {
            let next = base_dir.join(segment);
            if next.is_dir() {
                return self.expand_segments(result, &next, rest, build_dir);
            }
            return Ok(());
        }

        let matcher = wildcard_to_regex(segment)?;
        let walker = WalkDir::new(base_dir)
            .min_depth(1)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e.file_name()) || e.depth() == 0);

        for entry in walker.filter_map(Result::ok) {
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if !matcher.is_match(name) {
                continue;
            }
            let path = entry.path();
            let parent = path.parent().unwrap_or(base_dir);
            if paths::is_same_or_sub_path(parent, build_dir) {
                continue;
            }
            let file_type = entry.file_type();
            if is_dir {
                let is_dir_like = file_type.is_dir() || (file_type.is_symlink() && path.is_dir());
                if is_dir_like {
                    self.expand_segments(result, path, rest, build_dir)?;
                }
                continue;
            }
            if file_type.is_dir() {
                continue;
            }
            if parent != base_dir {
                self.record_dir(parent);
            }
            if let Some(p) = path.to_str() {
                result.insert(paths::clean_path(p));
            }
        }
        Ok(())
    }

    fn record_dir(&mut self, dir: &Path) {
        let key = paths::clean_path(&dir.to_string_lossy());
        if self.dir_time_stamps.iter().any(|(d, _)| *d == key) {
            return;
        }
        let stamp = FileTime::of_path(dir).unwrap_or_default();
        self.dir_time_stamps.push((key, stamp));
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    fn names(files: &BTreeSet<String>, root: &Path) -> Vec<String> {
        let root = root.to_str().unwrap();
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().trim_start_matches('/').to_string())
            .collect()
    }

    #[test]
    fn test_wildcard_regex() {
        let re = wildcard_to_regex("*.cpp").unwrap();
        assert!(re.is_match("main.cpp"));
        assert!(!re.is_match("main.cpp.orig"));
        let re = wildcard_to_regex("file?.[ch]").unwrap();
        assert!(re.is_match("file1.c"));
        assert!(!re.is_match("file12.c"));
        let re = wildcard_to_regex("[!a]*").unwrap();
        assert!(re.is_match("b.txt"));
        assert!(!re.is_match("a.txt"));
        assert!(wildcard_to_regex("a+b(1).txt").unwrap().is_match("a+b(1).txt"));
    }

    #[test]
    fn test_excludes_are_subtracted_and_expansion_is_idempotent() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.cpp");
        touch(dir.path(), "a_test.cpp");
        touch(dir.path(), "b.h");
        let base = dir.path().to_str().unwrap().to_string();
        let mut wildcards =
            SourceWildCards::new("", vec!["*.cpp".into()], vec!["*_test.cpp".into()]);

        // --- Execute ---
        let first = wildcards.expand_patterns(&base, "/nonexistent/build").unwrap();
        let first_stamps = wildcards.dir_time_stamps.clone();
        let second = wildcards.expand_patterns(&base, "/nonexistent/build").unwrap();

        // --- Assert ---
        assert_eq!(names(&first, dir.path()), vec!["a.cpp"]);
        assert_eq!(first, second);
        assert_eq!(first_stamps, wildcards.dir_time_stamps);
        assert!(!wildcards.has_changed());
    }

    #[test]
    fn test_recursive_pattern_skips_build_dir_and_hidden() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/main.cpp");
        touch(dir.path(), "src/util/helper.cpp");
        touch(dir.path(), "build/generated.cpp");
        touch(dir.path(), ".git/hook.cpp");
        let base = dir.path().to_str().unwrap();
        let build = dir.path().join("build");
        let mut wildcards = SourceWildCards::new("", vec!["**/*.cpp".into()], vec![]);

        // --- Execute ---
        let files = wildcards
            .expand_patterns(base, build.to_str().unwrap())
            .unwrap();

        // --- Assert ---
        assert_eq!(
            names(&files, dir.path()),
            vec!["src/main.cpp", "src/util/helper.cpp"]
        );
        assert!(
            wildcards
                .dir_time_stamps
                .iter()
                .any(|(d, _)| d.ends_with("src/util"))
        );
    }

    #[test]
    fn test_directory_segments_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "mod/a/x.h");
        touch(dir.path(), "mod/b/y.h");
        touch(dir.path(), "mod/b/y.cpp");
        let base = dir.path().to_str().unwrap();
        let mut wildcards = SourceWildCards::new("mod/", vec!["*/*.h".into()], vec![]);

        let files = wildcards.expand_patterns(base, "").unwrap();

        assert_eq!(names(&files, dir.path()), vec!["mod/a/x.h", "mod/b/y.h"]);
    }

    #[test]
    fn test_has_changed_detects_removed_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "sub/a.c");
        let base = dir.path().to_str().unwrap();
        let mut wildcards = SourceWildCards::new("", vec!["sub/*.c".into()], vec![]);
        wildcards.expand_patterns(base, "").unwrap();

        fs::remove_dir_all(dir.path().join("sub")).unwrap();

        assert!(wildcards.has_changed());
    }
}
