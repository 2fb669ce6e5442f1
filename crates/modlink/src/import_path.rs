//! Dotted import targets
//!
//! `from .a.b import x` names the module `b` inside directory `a`, relative to
//! the importing module. The textual form is split on `.`, so a leading dot
//! produces an empty first segment and every further leading dot one more
//! empty segment, each meaning one parent directory.

use std::fmt;

/// Import target split into segments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportPath {
    parts: Vec<String>,
}

impl ImportPath {
    /// Create an import path from raw segments
    ///
    /// Callers must not pass an empty list.
    pub fn new(parts: Vec<String>) -> Self {
        debug_assert!(!parts.is_empty(), "import path must have at least one segment");
        Self { parts }
    }

    /// Parse the dotted form (`.a.b`, `..c`, `a.b`)
    pub fn parse(text: &str) -> Self {
        Self::new(text.split('.').map(str::to_string).collect())
    }

    /// Whether the import is resolved against the importing module's directory
    pub fn is_relative(&self) -> bool {
        self.parts.first().is_some_and(|p| p.is_empty())
    }

    /// Number of parent-directory steps
    ///
    /// Counts leading empty segments beyond the first one.
    pub fn directory_levels(&self) -> usize {
        if !self.is_relative() {
            return 0;
        }
        self.parts[1..].iter().take_while(|p| p.is_empty()).count()
    }

    /// Remaining non-empty segments; the last is the module base name
    pub fn segments(&self) -> &[String] {
        let start = self.parts.iter().take_while(|p| p.is_empty()).count();
        &self.parts[start..]
    }

    /// Package components preceding the module name
    pub fn packages(&self) -> &[String] {
        let segments = self.segments();
        &segments[..segments.len().saturating_sub(1)]
    }

    /// Base name of the target module
    pub fn module_name(&self) -> &str {
        self.segments().last().map(String::as_str).unwrap_or_default()
    }

    /// Raw segments, including the leading empty ones
    pub fn parts(&self) -> &[String] {
        &self.parts
    }
}

impl fmt::Display for ImportPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}
