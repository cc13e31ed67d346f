// src/core/paths.rs

//! Path helpers working on `/`-separated strings, the form in which paths are
//! stored in the resolved model.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    // Any glob metacharacter turns a file entry into a wildcard pattern.
    static ref GLOB_CHARS_RE: Regex = Regex::new(r"[*?\[\]]").expect("static regex");
}

/// Returns `true` if `entry` contains glob metacharacters.
pub fn is_pattern(entry: &str) -> bool {
    GLOB_CHARS_RE.is_match(entry)
}

/// Converts backslashes to forward slashes.
pub fn from_native_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Returns `true` for `/x`, `C:/x` and `C:\x` style paths.
pub fn is_absolute_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    match bytes {
        [b'/', ..] | [b'\\', ..] => true,
        [drive, b':', b'/' | b'\\', ..] => drive.is_ascii_alphabetic(),
        _ => false,
    }
}

/// Normalizes a path lexically: collapses separators, removes `.` segments
/// and resolves `..` against preceding segments.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let path = from_native_separators(path);
    let (root, rest) = split_root(&path);

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // `..` above the root of an absolute path stays at the root.
                _ if !root.is_empty() => {}
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }

    let joined = segments.join("/");
    match (root.is_empty(), joined.is_empty()) {
        (true, true) => ".".to_string(),
        (true, false) => joined,
        (false, true) => root.to_string(),
        (false, false) => format!("{}{}", root, joined),
    }
}

fn split_root(path: &str) -> (&str, &str) {
    let bytes = path.as_bytes();
    match bytes {
        [drive, b':', b'/', ..] if drive.is_ascii_alphabetic() => path.split_at(3),
        [b'/', ..] => path.split_at(1),
        _ => ("", path),
    }
}

/// Resolves `path` against `base_dir` unless it is already absolute.
pub fn resolve_path(base_dir: &str, path: &str) -> String {
    if is_absolute_path(path) || base_dir.is_empty() {
        return clean_path(path);
    }
    if path.is_empty() {
        return clean_path(base_dir);
    }
    clean_path(&format!("{}/{}", base_dir, path))
}

/// The last segment of a path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// The directory part of a path; `"/"` for entries directly under the root.
pub fn parent_dir(path: &str) -> String {
    let cleaned = clean_path(path);
    match cleaned.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => cleaned.get(..idx).unwrap_or_default().to_string(),
        None => ".".to_string(),
    }
}

/// The file name without its last suffix, e.g. `app.qbs` -> `app`.
pub fn complete_base_name(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.get(..idx).unwrap_or(name),
        _ => name,
    }
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

/// Returns `true` if `path` equals `dir` or lies beneath it.
pub fn is_same_or_sub_path(path: &Path, dir: &Path) -> bool {
    !dir.as_os_str().is_empty() && path.starts_with(dir)
}

/// Makes `path` absolute against the current directory and strips Windows
/// verbatim prefixes, without touching the file system otherwise.
pub fn absolute_simplified(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(dunce::simplified(&absolute).to_path_buf())
}

/// Maps every character outside `[A-Za-z0-9-]` to `-`, giving a name that is
/// safe as a directory or host name component.
pub fn rfc1034_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}
