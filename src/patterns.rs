//! Ignore-file patterns
//!
//! A small subset of gitignore syntax, matched against paths relative to the
//! validation target:
//!
//! - `build/` matches anything under `build/`
//! - `*.log` matches any path ending in `.log`
//! - anything else must equal the path exactly
//!
//! Negations (`!pattern`) and brace expansion are not supported; negated
//! lines are skipped.

use std::path::Path;

/// A single parsed ignore pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnorePattern {
    /// Trailing `/`: the directory and everything beneath it
    Directory(String),
    /// Leading `*`: path ends with the remainder
    Suffix(String),
    /// Whole-path match
    Exact(String),
}

impl IgnorePattern {
    /// Parse one ignore-file line. Blank lines, comments and negations yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            return None;
        }

        let line = line.trim_start();
        let line = line.strip_prefix('/').unwrap_or(line);

        if let Some(dir) = line.strip_suffix('/') {
            if dir.is_empty() {
                return None;
            }
            return Some(IgnorePattern::Directory(dir.to_string()));
        }
        if let Some(suffix) = line.strip_prefix('*') {
            return Some(IgnorePattern::Suffix(suffix.to_string()));
        }
        if line.is_empty() {
            return None;
        }
        Some(IgnorePattern::Exact(line.to_string()))
    }

    /// Match a `/`-separated relative path
    pub fn matches(&self, path: &str) -> bool {
        match self {
            IgnorePattern::Directory(dir) => {
                path == dir
                    || path
                        .strip_prefix(dir.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            IgnorePattern::Suffix(suffix) => path.ends_with(suffix.as_str()),
            IgnorePattern::Exact(exact) => path == exact,
        }
    }
}

impl std::fmt::Display for IgnorePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnorePattern::Directory(dir) => write!(f, "{}/", dir),
            IgnorePattern::Suffix(suffix) => write!(f, "*{}", suffix),
            IgnorePattern::Exact(exact) => write!(f, "{}", exact),
        }
    }
}

/// Patterns collected from ignore files and configuration
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse ignore-file text, one pattern per line
    pub fn parse(text: &str) -> Self {
        let mut set = Self::new();
        set.add_lines(text);
        set
    }

    /// Read and parse an ignore file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn add_lines(&mut self, text: &str) {
        self.patterns.extend(text.lines().filter_map(IgnorePattern::parse));
    }

    pub fn add(&mut self, pattern: &str) {
        if let Some(pattern) = IgnorePattern::parse(pattern) {
            self.patterns.push(pattern);
        }
    }

    pub fn extend(&mut self, other: IgnoreSet) {
        self.patterns.extend(other.patterns);
    }

    /// True if any pattern matches the relative path
    pub fn is_ignored(&self, relative: &str) -> bool {
        let relative = relative.replace('\\', "/");
        self.patterns.iter().any(|p| p.matches(&relative))
    }

    pub fn patterns(&self) -> &[IgnorePattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
