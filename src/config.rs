//! Configuration for the validation engine
//!
//! Reads configuration from:
//! - `.akao/settings.yaml`, `akao.yaml` / `akao.json` or `.akao.yaml` in the target (project-level)
//! - the same names in the home directory (user-level)
//!
//! YAML files go through the crate's own document parser, so configuration
//! accepts exactly the syntax rule files do.

use crate::diagnostic::Severity;
use crate::document::{self, Node, ParseError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evaluate rules on a worker pool
    pub parallel: bool,

    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,

    /// Files per compliance batch
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            jobs: 0,
            batch_size: 10,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormat,

    /// Color mode
    pub color: ColorMode,

    /// Verbose output
    pub verbose: bool,

    /// Write `.akao/logs/validation_<timestamp>.log` after each run
    pub export_log: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: ColorMode::Auto,
            verbose: false,
            export_log: true,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
    Markdown,
    Log,
}

impl OutputFormat {
    /// Pick a report format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            "md" | "markdown" => Some(OutputFormat::Markdown),
            "log" => Some(OutputFormat::Log),
            "txt" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "log" => Ok(OutputFormat::Log),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// File handling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Ignore files read from the target root
    pub ignore_files: Vec<String>,

    /// Extra ignore patterns, same syntax as ignore files
    pub exclude: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            ignore_files: vec![".gitignore".to_string(), ".akaoignore".to_string()],
            exclude: Vec::new(),
        }
    }
}

/// Rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rules root, relative to the target (default `.akao/rules`)
    pub directory: Option<PathBuf>,

    /// Disabled rules
    pub disabled: Vec<String>,

    /// Enabled rules (empty = all)
    pub enabled: Vec<String>,

    /// Ignore rules by id prefix (e.g. `akao:rule::testing` ignores all testing rules)
    pub ignore: Vec<String>,

    /// Severity overrides (rule_id -> severity)
    pub severity: HashMap<String, Severity>,

    /// Rule file names the loader skips
    pub ignored_files: Vec<String>,

    /// Glob patterns of rule files the loader skips
    pub ignored_patterns: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            directory: None,
            disabled: Vec::new(),
            enabled: Vec::new(),
            ignore: Vec::new(),
            severity: HashMap::new(),
            ignored_files: vec![
                "index.yaml".to_string(),
                "README.yaml".to_string(),
                ".template.yaml".to_string(),
            ],
            ignored_patterns: vec![
                "**/test/**".to_string(),
                "**/tmp/**".to_string(),
                "**/.backup/**".to_string(),
            ],
        }
    }
}

/// Logic evaluator limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicConfig {
    /// Maximum expression nesting depth
    pub max_depth: usize,

    /// Iteration cap for fixpoints that do not set their own
    pub max_iterations: usize,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            max_depth: crate::logic::evaluator::DEFAULT_MAX_DEPTH,
            max_iterations: crate::logic::fixpoint::DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine settings
    pub engine: EngineConfig,

    /// Output settings
    pub output: OutputConfig,

    /// File handling settings
    pub files: FilesConfig,

    /// Rule configuration
    pub rules: RulesConfig,

    /// Evaluator limits
    pub logic: LogicConfig,
}

/// Default rules location inside a target
pub const DEFAULT_RULES_DIR: &str = ".akao/rules";

const CONFIG_NAMES: &[&str] = &[
    ".akao/settings.yaml",
    ".akao/settings.yml",
    "akao.yaml",
    "akao.yml",
    "akao.json",
    ".akao.yaml",
];

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext {
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Ok(serde_json::from_str(&content)?),
            _ => Err(ConfigError::Invalid(format!(
                "Unknown config file format: {}",
                ext
            ))),
        }
    }

    /// Parse YAML configuration text
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let node = document::parse(content)?;
        match node {
            Node::Null => Ok(Self::default()),
            Node::Mapping(_) => {
                let value = prune_empty(serde_json::Value::from(&node));
                Ok(serde_json::from_value(value)?)
            }
            other => Err(ConfigError::Invalid(format!(
                "expected a mapping at the top level, found {}",
                other.kind()
            ))),
        }
    }

    /// Load configuration from the target, then the home directory
    pub fn load_default(target: &Path) -> Result<Self, ConfigError> {
        for name in CONFIG_NAMES {
            let path = target.join(name);
            if path.is_file() {
                log::info!("Using configuration {}", path.display());
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in CONFIG_NAMES {
                let path = home.join(name);
                if path.is_file() {
                    log::info!("Using configuration {}", path.display());
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        if other.engine.jobs != 0 {
            self.engine.jobs = other.engine.jobs;
        }
        self.engine.parallel = other.engine.parallel;
        if other.engine.batch_size != EngineConfig::default().batch_size {
            self.engine.batch_size = other.engine.batch_size;
        }

        if other.output.format != OutputFormat::Text {
            self.output.format = other.output.format;
        }
        if other.output.verbose {
            self.output.verbose = true;
        }
        if other.output.color != ColorMode::Auto {
            self.output.color = other.output.color;
        }
        self.output.export_log = other.output.export_log;

        // Files - extend lists
        for name in other.files.ignore_files {
            if !self.files.ignore_files.contains(&name) {
                self.files.ignore_files.push(name);
            }
        }
        self.files.exclude.extend(other.files.exclude);

        if other.rules.directory.is_some() {
            self.rules.directory = other.rules.directory;
        }
        self.rules.disabled.extend(other.rules.disabled);
        if !other.rules.enabled.is_empty() {
            self.rules.enabled = other.rules.enabled;
        }
        self.rules.ignore.extend(other.rules.ignore);
        self.rules.severity.extend(other.rules.severity);
        for name in other.rules.ignored_files {
            if !self.rules.ignored_files.contains(&name) {
                self.rules.ignored_files.push(name);
            }
        }
        for pattern in other.rules.ignored_patterns {
            if !self.rules.ignored_patterns.contains(&pattern) {
                self.rules.ignored_patterns.push(pattern);
            }
        }

        let defaults = LogicConfig::default();
        if other.logic.max_depth != defaults.max_depth {
            self.logic.max_depth = other.logic.max_depth;
        }
        if other.logic.max_iterations != defaults.max_iterations {
            self.logic.max_iterations = other.logic.max_iterations;
        }
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        format: Option<OutputFormat>,
        verbose: Option<bool>,
        jobs: Option<usize>,
        disabled_rules: Option<Vec<String>>,
        enabled_rules: Option<Vec<String>>,
    ) {
        if let Some(f) = format {
            self.output.format = f;
        }
        if let Some(v) = verbose {
            self.output.verbose = v;
        }
        if let Some(j) = jobs {
            self.engine.jobs = j;
            self.engine.parallel = true;
        }
        if let Some(disabled) = disabled_rules {
            self.rules.disabled.extend(disabled);
        }
        if let Some(enabled) = enabled_rules {
            self.rules.enabled = enabled;
        }
    }

    /// Rules root for a target
    pub fn rules_dir(&self, target: &Path) -> PathBuf {
        match &self.rules.directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => target.join(dir),
            None => target.join(DEFAULT_RULES_DIR),
        }
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        if self.rules.disabled.iter().any(|r| r == rule_id) {
            return false;
        }

        if self.matches_ignore_prefix(rule_id) {
            return false;
        }

        if !self.rules.enabled.is_empty() {
            return self.rules.enabled.iter().any(|r| r == rule_id);
        }

        true
    }

    /// Check if a rule matches any prefix in the ignore list
    pub fn matches_ignore_prefix(&self, rule_id: &str) -> bool {
        let rule_lower = rule_id.to_lowercase();
        self.rules
            .ignore
            .iter()
            .any(|prefix| rule_lower.starts_with(&prefix.to_lowercase()))
    }

    /// Get severity override for a rule
    pub fn get_severity_override(&self, rule_id: &str) -> Option<Severity> {
        self.rules.severity.get(rule_id).copied()
    }
}

/// Drop mapping entries whose value was left empty (`key:` with nothing under it)
fn prune_empty(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .filter(|(_, v)| !matches!(v, serde_json::Value::String(s) if s.is_empty()))
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, prune_empty(v)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(prune_empty).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::new();
        assert!(!config.engine.parallel);
        assert_eq!(config.engine.jobs, 0);
        assert_eq!(config.engine.batch_size, 10);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.output.export_log);
        assert_eq!(config.files.ignore_files, vec![".gitignore", ".akaoignore"]);
        assert_eq!(config.rules.ignored_files.len(), 3);
        assert_eq!(config.logic.max_iterations, 1000);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(
            OutputFormat::from_path(Path::new("report.yml")),
            Some(OutputFormat::Yaml)
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("out/REPORT.MD")),
            Some(OutputFormat::Markdown)
        );
        assert_eq!(OutputFormat::from_path(Path::new("report")), None);
    }

    #[test]
    fn test_config_merge_cli() {
        let mut config = Config::new();
        config.merge_cli(
            Some(OutputFormat::Json),
            Some(true),
            Some(4),
            Some(vec!["rule1".to_string()]),
            None,
        );

        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.verbose);
        assert_eq!(config.engine.jobs, 4);
        assert!(config.engine.parallel);
        assert!(config.rules.disabled.contains(&"rule1".to_string()));
    }

    #[test]
    fn test_rule_enabled() {
        let mut config = Config::new();
        assert!(config.is_rule_enabled("any-rule"));

        config.rules.disabled.push("disabled-rule".to_string());
        assert!(!config.is_rule_enabled("disabled-rule"));
        assert!(config.is_rule_enabled("other-rule"));

        config.rules.enabled = vec!["only-this".to_string()];
        assert!(!config.is_rule_enabled("other-rule"));
        assert!(config.is_rule_enabled("only-this"));
    }

    #[test]
    fn test_ignore_prefix() {
        let mut config = Config::new();
        config.rules.ignore.push("akao:rule::testing".to_string());

        assert!(!config.is_rule_enabled("akao:rule::testing:coverage:v1"));
        assert!(!config.is_rule_enabled("AKAO:RULE::TESTING:other:v1"));
        assert!(config.is_rule_enabled("akao:rule::structure:one_class:v1"));
    }

    #[test]
    fn test_severity_override() {
        let mut config = Config::new();
        config.rules.severity.insert("rule1".to_string(), Severity::Error);

        assert_eq!(config.get_severity_override("rule1"), Some(Severity::Error));
        assert_eq!(config.get_severity_override("rule2"), None);
    }

    #[test]
    fn test_yaml_through_document_parser() {
        let yaml = r#"
engine:
  parallel: true
  jobs: 4
output:
  format: markdown
  verbose: yes
files:
  exclude:
    - vendor/
    - "*.generated.cpp"
rules:
  disabled:
  severity:
    "akao:rule::structure:one_class:v1": error
logic:
  max_iterations: 50
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.engine.parallel);
        assert_eq!(config.engine.jobs, 4);
        assert_eq!(config.output.format, OutputFormat::Markdown);
        assert!(config.output.verbose);
        assert_eq!(config.files.exclude, vec!["vendor/", "*.generated.cpp"]);
        assert!(config.rules.disabled.is_empty());
        assert_eq!(
            config.get_severity_override("akao:rule::structure:one_class:v1"),
            Some(Severity::Error)
        );
        assert_eq!(config.logic.max_iterations, 50);
        assert_eq!(config.logic.max_depth, 256);
    }

    #[test]
    fn test_invalid_yaml_config() {
        assert!(matches!(
            Config::from_yaml("- just\n- a list\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml("engine:\n  jobs: many\n"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_default_from_target() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".akao")).unwrap();
        std::fs::write(
            dir.path().join(".akao/settings.yaml"),
            "engine:\n  batch_size: 3\n",
        )
        .unwrap();

        let config = Config::load_default(dir.path()).unwrap();
        assert_eq!(config.engine.batch_size, 3);
        assert_eq!(config.rules_dir(dir.path()), dir.path().join(".akao/rules"));
    }

    #[test]
    fn test_merge() {
        let mut base = Config::new();
        let mut other = Config::new();
        other.engine.jobs = 8;
        other.files.exclude.push("build/".to_string());
        other.rules.ignore.push("akao:rule::build".to_string());
        other.logic.max_depth = 32;

        base.merge(other);
        assert_eq!(base.engine.jobs, 8);
        assert_eq!(base.files.exclude, vec!["build/"]);
        assert_eq!(base.files.ignore_files.len(), 2);
        assert!(!base.is_rule_enabled("akao:rule::build:modes:v1"));
        assert_eq!(base.logic.max_depth, 32);
    }
}
