//! Rule loading from a rules directory
//!
//! Layout:
//!
//! ```text
//! .akao/rules/
//!   enabled/structure/one_class_per_file.yaml
//!   enabled/security/no_secrets.a
//!   disabled/testing/coverage.yaml
//! ```
//!
//! When an `enabled/` directory exists only rules beneath it are active;
//! everything else is loaded but marked disabled. One bad file never stops
//! the load: its error is collected and the remaining files are read.

use crate::config::RulesConfig;
use crate::document::{self, Node, ParseError};
use crate::rule::{Rule, RuleCategory};
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::{debug, warn};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Rule file extensions
pub const RULE_EXTENSIONS: &[&str] = &["yaml", "yml", "a"];

/// Error loading rules
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Rules directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("IO error reading {}: {source}", file.display())]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {}: {source}", file.display())]
    Parse {
        file: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Invalid rule in {}: {reason}", file.display())]
    Invalid { file: PathBuf, reason: String },

    #[error("Could not access {}: {source}", file.display())]
    Traverse {
        file: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl LoadError {
    /// File the error concerns, if any
    pub fn file(&self) -> Option<&Path> {
        match self {
            LoadError::DirectoryNotFound(_) => None,
            LoadError::Io { file, .. }
            | LoadError::Parse { file, .. }
            | LoadError::Invalid { file, .. }
            | LoadError::Traverse { file, .. } => Some(file),
        }
    }
}

/// Rules read from a directory, plus the files that failed
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    errors: Vec<LoadError>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            errors: Vec::new(),
        }
    }

    /// All loaded rules, in file order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules in the active set
    pub fn enabled(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    pub fn by_id(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn by_category(&self, category: &RuleCategory) -> Vec<&Rule> {
        self.rules.iter().filter(|r| &r.category == category).collect()
    }

    pub fn by_philosophy(&self, philosophy: &str) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.references_philosophy(philosophy))
            .collect()
    }

    /// Sorted unique category names
    pub fn categories(&self) -> Vec<String> {
        self.rules
            .iter()
            .map(|r| r.category.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sorted unique philosophy ids
    pub fn philosophies(&self) -> Vec<String> {
        self.rules
            .iter()
            .flat_map(|r| r.philosophies.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Per-file failures collected during loading
    pub fn errors(&self) -> &[LoadError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}

/// Walks a rules directory and materializes rules
pub struct RuleLoader {
    root: PathBuf,
    ignored_files: Vec<String>,
    ignored_patterns: GlobSet,
}

impl RuleLoader {
    /// Loader with the default ignore lists
    pub fn new(root: &Path) -> Self {
        Self::with_config(root, &RulesConfig::default())
    }

    /// Loader using the ignore lists from configuration
    pub fn with_config(root: &Path, config: &RulesConfig) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignored_patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!("Skipping invalid rule ignore pattern '{}': {}", pattern, e),
            }
        }

        Self {
            root: root.to_path_buf(),
            ignored_files: config.ignored_files.clone(),
            ignored_patterns: builder.build().unwrap_or_else(|_| GlobSet::empty()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every rule file under the root.
    ///
    /// Only a missing root is an error; per-file failures end up in
    /// [`RuleSet::errors`].
    pub fn load_all(&self) -> Result<RuleSet, LoadError> {
        if !self.root.is_dir() {
            return Err(LoadError::DirectoryNotFound(self.root.clone()));
        }

        let enabled_dir = self.root.join("enabled");
        let has_enabled_dir = enabled_dir.is_dir();
        let mut set = RuleSet::default();
        let mut seen = HashSet::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    let file = source.path().unwrap_or(&self.root).to_path_buf();
                    warn!("Could not access {}: {}", file.display(), source);
                    set.errors.push(LoadError::Traverse { file, source });
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !self.is_rule_file(path) {
                continue;
            }

            match load_rule_file(path) {
                Ok(mut rule) => {
                    if !seen.insert(rule.id.clone()) {
                        warn!("Duplicate rule id {} in {}", rule.id, path.display());
                        set.errors.push(LoadError::Invalid {
                            file: path.to_path_buf(),
                            reason: format!("duplicate rule id '{}'", rule.id),
                        });
                        continue;
                    }
                    rule.enabled = !has_enabled_dir || path.starts_with(&enabled_dir);
                    debug!(
                        "Loaded rule {} ({}) from {}",
                        rule.id,
                        if rule.enabled { "enabled" } else { "disabled" },
                        path.display()
                    );
                    set.rules.push(rule);
                }
                Err(e) => {
                    warn!("{}", e);
                    set.errors.push(e);
                }
            }
        }

        Ok(set)
    }

    fn is_rule_file(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !RULE_EXTENSIONS.contains(&ext) {
            return false;
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let ignored_name = self.ignored_files.iter().any(|ignored| {
            name == ignored || (ignored.starts_with('.') && name.ends_with(ignored.as_str()))
        });
        if ignored_name {
            debug!("Skipping ignored rule file {}", path.display());
            return false;
        }

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if self.ignored_patterns.is_match(relative) {
            debug!("Skipping rule file {} (ignored pattern)", path.display());
            return false;
        }
        true
    }
}

/// Load a single `.yaml`/`.yml` or `.a` rule file
pub fn load_rule_file(path: &Path) -> Result<Rule, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        file: path.to_path_buf(),
        source,
    })?;

    let invalid = |reason: String| LoadError::Invalid {
        file: path.to_path_buf(),
        reason,
    };
    let parse_failed = |source: ParseError| LoadError::Parse {
        file: path.to_path_buf(),
        source,
    };

    let rule = if path.extension().and_then(|e| e.to_str()) == Some("a") {
        let (header, body) = split_header(&content);
        let body = document::parse(body).map_err(parse_failed)?;
        Rule::from_header(&header, body).map_err(|e| invalid(e.to_string()))?
    } else {
        let node = document::parse(&content).map_err(parse_failed)?;
        if !matches!(node, Node::Mapping(_)) {
            return Err(invalid(format!(
                "expected a mapping at the top level, found {}",
                node.kind()
            )));
        }
        Rule::from_document(&node).map_err(|e| invalid(e.to_string()))?
    };

    Ok(rule.with_source(path.to_path_buf()))
}

/// Split leading `# key: value` lines from the body of a `.a` rule
fn split_header(content: &str) -> (Vec<(String, String)>, &str) {
    let mut header = Vec::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            offset += line.len();
            continue;
        }
        let Some(comment) = trimmed.strip_prefix('#') else {
            break;
        };
        if let Some((key, value)) = comment.split_once(':') {
            header.push((key.trim().to_string(), value.trim().to_string()));
        }
        offset += line.len();
    }

    (header, &content[offset..])
}
