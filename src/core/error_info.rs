// src/core/error_info.rs

//! # Structured Diagnostics
//!
//! Resolution errors are rarely about a single place in the build description:
//! a duplicate product names two declarations, a dependency cycle names every
//! product on the cycle. [`ErrorInfo`] therefore holds an ordered list of
//! `(description, location)` items instead of a single message.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A position inside a build-description file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeLocation {
    pub file_path: String,
    pub line: u32,
    pub column: u32,
}

impl CodeLocation {
    pub fn new(file_path: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file_path: file_path.into(),
            line,
            column,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.file_path.is_empty()
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return Ok(());
        }
        write!(f, "{}", self.file_path)?;
        if self.line > 0 {
            write!(f, ":{}", self.line)?;
            if self.column > 0 {
                write!(f, ":{}", self.column)?;
            }
        }
        Ok(())
    }
}

/// One line of a diagnostic.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorItem {
    pub description: String,
    pub location: CodeLocation,
}

impl fmt::Display for ErrorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_valid() {
            write!(f, "{}: {}", self.location, self.description)
        } else {
            write!(f, "{}", self.description)
        }
    }
}

/// An ordered, multi-location diagnostic.
#[derive(Error, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[error("{}", render_items(.items))]
pub struct ErrorInfo {
    items: Vec<ErrorItem>,
}

fn render_items(items: &[ErrorItem]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl ErrorInfo {
    pub fn new(description: impl Into<String>, location: CodeLocation) -> Self {
        let mut info = Self::default();
        info.append(description, location);
        info
    }

    /// Creates a diagnostic without a source location.
    pub fn message(description: impl Into<String>) -> Self {
        Self::new(description, CodeLocation::default())
    }

    pub fn append(&mut self, description: impl Into<String>, location: CodeLocation) {
        self.items.push(ErrorItem {
            description: description.into(),
            location,
        });
    }

    pub fn prepend(&mut self, description: impl Into<String>, location: CodeLocation) {
        self.items.insert(
            0,
            ErrorItem {
                description: description.into(),
                location,
            },
        );
    }

    /// Appends every item of `other` after this diagnostic's own items.
    pub fn append_error(&mut self, other: &Self) {
        self.items.extend(other.items.iter().cloned());
    }

    pub fn items(&self) -> &[ErrorItem] {
        &self.items
    }

    pub fn has_error(&self) -> bool {
        !self.items.is_empty()
    }

    /// Returns `true` if any item's description contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.items.iter().any(|i| i.description.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_items_in_order() {
        // --- Setup ---
        let mut info = ErrorInfo::new("second", CodeLocation::new("/p/a.qbs", 3, 5));
        info.prepend("first", CodeLocation::default());
        info.append("third", CodeLocation::new("/p/b.qbs", 0, 0));

        // --- Execute ---
        let rendered = info.to_string();

        // --- Assert ---
        assert_eq!(rendered, "first\n/p/a.qbs:3:5: second\n/p/b.qbs: third");
        assert_eq!(info.items().len(), 3);
    }

    #[test]
    fn test_append_error_concatenates() {
        let mut outer = ErrorInfo::message("outer");
        let inner = ErrorInfo::message("inner");
        outer.append_error(&inner);
        assert!(outer.mentions("inner"));
        assert!(outer.has_error());
        assert!(!ErrorInfo::default().has_error());
    }
}
