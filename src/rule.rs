//! Rule definitions
//!
//! A rule is read from a document of this shape (the `metadata` block may be
//! omitted, with its fields at the top level instead):
//!
//! ```yaml
//! metadata:
//!   id: akao:rule::structure:one_class_per_file:v1
//!   name: One class per file
//!   category: structure
//! philosophies:
//!   - akao:philosophy::structure:isolation:v1
//! rule_definition:
//!   scope: file
//!   target: "*.cpp"
//!   pure_logic_expressions:
//!     - forall: ...
//! implementation:
//!   severity: high
//! validation:
//!   test_cases:
//!     - name: single class
//!       expected: pass
//! ```

use crate::diagnostic::Severity;
use crate::document::Node;
use crate::legacy::{self, LegacyError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix of every rule id
pub const RULE_ID_PREFIX: &str = "akao:rule::";

/// Prefix of every philosophy id
pub const PHILOSOPHY_ID_PREFIX: &str = "akao:philosophy::";

/// Phase a rule runs in unless it says otherwise
pub const DEFAULT_PHASE: &str = "compliance";

/// Rule category, deciding which native check (if any) handles a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleCategory {
    Structure,
    Interface,
    Language,
    Security,
    Testing,
    Build,
    Documentation,
    Automation,
    Measurement,
    Validation,
    Visualization,
    /// Any other category; always evaluated through the logic engine
    Generic(String),
}

impl RuleCategory {
    pub fn as_str(&self) -> &str {
        match self {
            RuleCategory::Structure => "structure",
            RuleCategory::Interface => "interface",
            RuleCategory::Language => "language",
            RuleCategory::Security => "security",
            RuleCategory::Testing => "testing",
            RuleCategory::Build => "build",
            RuleCategory::Documentation => "documentation",
            RuleCategory::Automation => "automation",
            RuleCategory::Measurement => "measurement",
            RuleCategory::Validation => "validation",
            RuleCategory::Visualization => "visualization",
            RuleCategory::Generic(name) => name,
        }
    }
}

impl From<&str> for RuleCategory {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "structure" => RuleCategory::Structure,
            "interface" => RuleCategory::Interface,
            "language" => RuleCategory::Language,
            "security" => RuleCategory::Security,
            "testing" => RuleCategory::Testing,
            "build" => RuleCategory::Build,
            "documentation" => RuleCategory::Documentation,
            "automation" => RuleCategory::Automation,
            "measurement" => RuleCategory::Measurement,
            "validation" => RuleCategory::Validation,
            "visualization" => RuleCategory::Visualization,
            other => RuleCategory::Generic(other.to_string()),
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The three parts of a qualified id such as `akao:rule::structure:one_class:v1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedId<'a> {
    pub category: &'a str,
    pub name: &'a str,
    /// Version digits without the leading `v`
    pub version: &'a str,
}

/// Parse `<prefix><category>:<name>:v<digits>`.
///
/// Category and name are ASCII letters and underscores only; the match is
/// case-sensitive and must cover the whole id.
pub fn parse_qualified_id<'a>(id: &'a str, prefix: &str) -> Option<QualifiedId<'a>> {
    let rest = id.strip_prefix(prefix)?;
    let mut parts = rest.split(':');
    let (category, name, version) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let is_word = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphabetic() || b == b'_');
    let digits = version.strip_prefix('v')?;
    if !is_word(category) || !is_word(name) || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(QualifiedId {
        category,
        name,
        version: digits,
    })
}

/// Check a rule id against `akao:rule::<category>:<name>:v<N>`
pub fn is_valid_rule_id(id: &str) -> bool {
    parse_qualified_id(id, RULE_ID_PREFIX).is_some()
}

/// Check a philosophy id against `akao:philosophy::<category>:<name>:v<N>`
pub fn is_valid_philosophy_id(id: &str) -> bool {
    parse_qualified_id(id, PHILOSOPHY_ID_PREFIX).is_some()
}

/// Map a rule file severity to a violation severity.
///
/// `critical`/`high` are errors, `medium` warnings, `low` info.
pub fn parse_severity(text: &str) -> Option<Severity> {
    match text.trim().to_lowercase().as_str() {
        "critical" | "high" => Some(Severity::Error),
        "medium" => Some(Severity::Warning),
        "low" => Some(Severity::Info),
        other => other.parse().ok(),
    }
}

/// Example declared under `validation.test_cases`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub name: String,
    pub description: String,
    /// Expected outcome, typically `pass` or `fail`
    pub expected: String,
}

/// The `audit` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Audit {
    pub compliance_checks: Vec<String>,
    pub violation_severity: Option<String>,
    pub auto_fix_available: bool,
}

/// Error building a rule from a document or header
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid rule id '{0}'")]
    InvalidId(String),

    #[error("invalid philosophy id '{0}'")]
    InvalidPhilosophy(String),

    #[error("unknown severity '{0}'")]
    UnknownSeverity(String),

    #[error("invalid applies_to pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid applies_to patterns: {0}")]
    InvalidPatternSet(#[source] globset::Error),

    #[error(transparent)]
    Legacy(#[from] LegacyError),
}

/// A loaded compliance rule
#[derive(Debug, Clone)]
pub struct Rule {
    /// Qualified id, e.g. `akao:rule::structure:one_class_per_file:v1`
    pub id: String,

    /// Human-readable name
    pub name: String,

    pub version: String,

    pub category: RuleCategory,

    pub description: String,

    /// Severity of violations reported by this rule
    pub severity: Severity,

    /// Referenced philosophy ids
    pub philosophies: Vec<String>,

    /// `file`, `project`, `repository`, `directory` or `global`
    pub scope: String,

    pub target: String,

    pub conditions: Vec<String>,

    pub exceptions: Vec<String>,

    /// Globs selecting the files a file-scoped rule runs on (empty = all)
    pub applies_to: Vec<String>,

    /// Logic expressions, all of which must hold
    pub expressions: Vec<Node>,

    /// Validation phases this rule takes part in
    pub phases: Vec<String>,

    pub check_method: Option<String>,

    pub auto_fix: bool,

    pub test_cases: Vec<TestCase>,

    pub audit: Audit,

    /// File the rule was loaded from
    pub source: Option<PathBuf>,

    /// Whether the rule belongs to the active set
    pub enabled: bool,

    matcher: Option<GlobSet>,
}

impl Rule {
    /// Create a file-scoped rule with no expressions
    pub fn new(id: &str, name: &str, category: RuleCategory) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: parse_qualified_id(id, RULE_ID_PREFIX)
                .map(|q| format!("v{}", q.version))
                .unwrap_or_default(),
            category,
            description: String::new(),
            severity: Severity::Warning,
            philosophies: Vec::new(),
            scope: "file".to_string(),
            target: "*".to_string(),
            conditions: Vec::new(),
            exceptions: Vec::new(),
            applies_to: Vec::new(),
            expressions: Vec::new(),
            phases: vec![DEFAULT_PHASE.to_string()],
            check_method: None,
            auto_fix: false,
            test_cases: Vec::new(),
            audit: Audit::default(),
            source: None,
            enabled: true,
            matcher: None,
        }
    }

    /// Build a rule from a parsed rule document, validating required fields
    pub fn from_document(doc: &Node) -> Result<Self, RuleError> {
        let metadata = doc.get("metadata");
        let definition = doc.get("rule_definition");
        let implementation = doc.get("implementation");

        let meta = |key: &str| metadata.and_then(|m| m.get(key)).or_else(|| doc.get(key));
        let def = |key: &str| definition.and_then(|d| d.get(key)).or_else(|| doc.get(key));
        let text = |node: Option<&Node>| {
            node.and_then(Node::scalar_text)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let list = |node: Option<&Node>| node.map(Node::text_list).unwrap_or_default();
        let required = |key: &'static str, node: Option<&Node>| {
            text(node).ok_or(RuleError::MissingField(key))
        };

        let id = required("id", meta("id"))?;
        let name = required("name", meta("name"))?;
        let category = required("category", meta("category"))?;
        let scope = required("scope", def("scope"))?;
        let target = required("target", def("target"))?;

        if !is_valid_rule_id(&id) {
            return Err(RuleError::InvalidId(id));
        }

        let philosophies = list(doc.get("philosophies"));
        if let Some(bad) = philosophies.iter().find(|p| !is_valid_philosophy_id(p)) {
            return Err(RuleError::InvalidPhilosophy(bad.clone()));
        }

        let mut rule = Rule::new(&id, &name, RuleCategory::from(category.as_str()));
        rule.scope = scope;
        rule.target = target;
        rule.philosophies = philosophies;
        if let Some(version) = text(meta("version")) {
            rule.version = version;
        }
        rule.description = text(meta("description")).unwrap_or_default();
        rule.conditions = list(def("conditions"));
        rule.exceptions = list(def("exceptions"));
        rule.set_applies_to(list(def("applies_to")))?;

        let phases = list(doc.get("phases").or_else(|| def("phases")));
        if !phases.is_empty() {
            rule.phases = phases;
        }

        rule.expressions = match def("pure_logic_expressions") {
            Some(Node::Sequence(items)) => items.clone(),
            Some(node @ Node::Mapping(_)) => vec![node.clone()],
            _ => Vec::new(),
        };
        if rule.expressions.is_empty() {
            for datalog in list(def("datalog_rules")) {
                rule.expressions.push(legacy::convert(&datalog)?);
            }
        }

        let audit = doc.get("audit");
        rule.audit = Audit {
            compliance_checks: list(audit.and_then(|a| a.get("compliance_checks"))),
            violation_severity: text(audit.and_then(|a| a.get("violation_severity"))),
            auto_fix_available: audit
                .and_then(|a| a.get("auto_fix_available"))
                .and_then(Node::as_bool)
                .unwrap_or(false),
        };

        let implementation_field = |key: &str| implementation.and_then(|i| i.get(key));
        rule.check_method = text(implementation_field("check_method"));
        rule.auto_fix = implementation_field("auto_fix")
            .and_then(Node::as_bool)
            .unwrap_or(rule.audit.auto_fix_available);

        let severity = text(implementation_field("severity"))
            .or_else(|| rule.audit.violation_severity.clone())
            .or_else(|| text(doc.get("severity")));
        if let Some(severity) = severity {
            rule.severity =
                parse_severity(&severity).ok_or(RuleError::UnknownSeverity(severity))?;
        }

        rule.test_cases = doc
            .get("validation")
            .and_then(|v| v.get("test_cases"))
            .and_then(Node::as_sequence)
            .unwrap_or_default()
            .iter()
            .map(|case| TestCase {
                name: text(case.get("name")).unwrap_or_default(),
                description: text(case.get("description")).unwrap_or_default(),
                expected: text(case.get("expected")).unwrap_or_default(),
            })
            .collect();

        Ok(rule)
    }

    /// Build a rule from `# key: value` header lines and an expression body
    pub fn from_header(header: &[(String, String)], body: Node) -> Result<Self, RuleError> {
        let get = |key: &str| {
            header
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.trim())
                .filter(|v| !v.is_empty())
        };

        let id = get("id").ok_or(RuleError::MissingField("id"))?;
        if !is_valid_rule_id(id) {
            return Err(RuleError::InvalidId(id.to_string()));
        }
        let qualified = parse_qualified_id(id, RULE_ID_PREFIX);
        let name = get("name")
            .map(str::to_string)
            .or_else(|| qualified.as_ref().map(|q| q.name.replace('_', " ")))
            .unwrap_or_default();
        let category = get("category")
            .or(qualified.as_ref().map(|q| q.category))
            .unwrap_or_default();

        let mut rule = Rule::new(id, &name, RuleCategory::from(category));
        rule.description = get("description").unwrap_or_default().to_string();
        if let Some(scope) = get("scope") {
            rule.scope = scope.to_string();
        }
        if let Some(target) = get("target") {
            rule.target = target.to_string();
        }
        if let Some(severity) = get("severity") {
            rule.severity = parse_severity(severity)
                .ok_or_else(|| RuleError::UnknownSeverity(severity.to_string()))?;
        }
        if let Some(phases) = get("@phases") {
            let phases = crate::document::parse(phases)
                .map(|node| node.text_list())
                .unwrap_or_default();
            if !phases.is_empty() {
                rule.phases = phases;
            }
        }
        if let Some(globs) = get("applies_to") {
            let globs = globs.split(',').map(|g| g.trim().to_string()).collect();
            rule.set_applies_to(globs)?;
        }

        rule.expressions = match body {
            Node::Null => Vec::new(),
            Node::Sequence(items) => items,
            other => vec![other],
        };
        Ok(rule)
    }

    /// Set the applicability globs
    pub fn set_applies_to(&mut self, patterns: Vec<String>) -> Result<(), RuleError> {
        let patterns: Vec<String> = patterns.into_iter().filter(|p| !p.is_empty()).collect();
        self.matcher = if patterns.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &patterns {
                let glob = Glob::new(pattern).map_err(|source| RuleError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                builder.add(glob);
            }
            Some(
                builder
                    .build()
                    .map_err(RuleError::InvalidPatternSet)?,
            )
        };
        self.applies_to = patterns;
        Ok(())
    }

    pub fn with_applies_to(mut self, patterns: &[&str]) -> Result<Self, RuleError> {
        self.set_applies_to(patterns.iter().map(|p| p.to_string()).collect())?;
        Ok(self)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = target.to_string();
        self
    }

    pub fn with_expression(mut self, expression: Node) -> Self {
        self.expressions.push(expression);
        self
    }

    pub fn with_philosophy(mut self, philosophy: &str) -> Self {
        self.philosophies.push(philosophy.to_string());
        self
    }

    pub fn with_source(mut self, source: PathBuf) -> Self {
        self.source = Some(source);
        self
    }

    /// The `<name>` part of the id
    pub fn id_name(&self) -> &str {
        parse_qualified_id(&self.id, RULE_ID_PREFIX)
            .map(|q| q.name)
            .unwrap_or(&self.id)
    }

    /// Whether the rule runs once per validation rather than once per file
    pub fn is_project_scoped(&self) -> bool {
        matches!(
            self.scope.to_lowercase().as_str(),
            "project" | "repository" | "global" | "directory"
        )
    }

    /// Whether the expressions quantify over `$discovered_files` without
    /// reading the current file, so every file would get the same answer
    pub fn quantifies_over_discovered_files(&self) -> bool {
        let mut free = BTreeSet::new();
        for expr in &self.expressions {
            free_variables(expr, &mut Vec::new(), &mut free);
        }
        free.contains("discovered_files")
            && !free.contains("file")
            && !free.contains("file_content")
    }

    /// Whether a relative path falls under `applies_to`
    pub fn applies_to_path(&self, relative: &str) -> bool {
        self.matcher
            .as_ref()
            .map_or(true, |matcher| matcher.is_match(relative))
    }

    pub fn runs_in_phase(&self, phase: &str) -> bool {
        self.phases.iter().any(|p| p == phase)
    }

    pub fn references_philosophy(&self, philosophy: &str) -> bool {
        self.philosophies.iter().any(|p| p == philosophy)
    }
}

/// Binding keywords and the field evaluated outside the new scope
const BINDERS: &[(&str, &str)] = &[
    ("forall", "domain"),
    ("exists", "domain"),
    ("fixpoint", "initial"),
    ("mu", "initial"),
    ("nu", "initial"),
];

/// Collect `var` names not bound by an enclosing quantifier or fixpoint
fn free_variables<'a>(node: &'a Node, bound: &mut Vec<&'a str>, free: &mut BTreeSet<String>) {
    let entries = match node {
        Node::Sequence(items) => {
            for item in items {
                free_variables(item, bound, free);
            }
            return;
        }
        Node::Mapping(entries) => entries,
        _ => return,
    };

    if let Some(name) = node.get("var").and_then(Node::as_str) {
        let name = name.strip_prefix('$').unwrap_or(name);
        if !bound.contains(&name) {
            free.insert(name.to_string());
        }
        return;
    }
    if node.get("literal").is_some() {
        return;
    }

    let Some(&(keyword, outer)) = BINDERS.iter().find(|(k, _)| node.get(k).is_some()) else {
        for (_, value) in entries {
            free_variables(value, bound, free);
        }
        return;
    };

    let head = node.get(keyword).unwrap_or(&Node::Null);
    let (variable, fields) = match head {
        Node::Mapping(_) => (head.get("variable"), head),
        other => (Some(other), node),
    };
    if let Some(outer) = fields.get(outer) {
        free_variables(outer, bound, free);
    }

    let depth = bound.len();
    if let Some(variable) = variable.and_then(Node::as_str) {
        bound.push(variable.strip_prefix('$').unwrap_or(variable));
    }
    if outer == "initial" {
        bound.push("__iteration");
    }
    if let Node::Mapping(fields) = fields {
        for (key, value) in fields {
            if key != outer && key != "variable" {
                free_variables(value, bound, free);
            }
        }
    }
    bound.truncate(depth);
}
