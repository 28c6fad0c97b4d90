//! Violation types produced by rule execution

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Severity level for violations
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning - the rule failed but the project still builds on it
    #[default]
    Warning,
    /// Error - definite non-compliance, or a rule that could not be evaluated
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(()),
        }
    }
}

/// What produced a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The rule's condition did not hold
    #[default]
    RuleViolation,
    /// The rule's expression could not be evaluated
    EvaluationError,
    /// A file could not be read
    SystemError,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::RuleViolation => write!(f, "rule_violation"),
            ViolationKind::EvaluationError => write!(f, "evaluation_error"),
            ViolationKind::SystemError => write!(f, "system_error"),
        }
    }
}

/// A single reported instance of a rule failing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// `<rule_id>:violation:<file name>:<line>`
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub rule_category: String,
    /// First philosophy the rule references, if any
    pub philosophy_id: Option<String>,
    /// Path relative to the validation target
    pub file_path: String,
    /// 1-based line, 0 when the violation concerns the whole file
    pub line_number: usize,
    pub column_number: usize,
    pub message: String,
    pub severity: Severity,
    pub suggestion: Option<String>,
    pub auto_fix_available: bool,
    pub detected_at: DateTime<Local>,
    pub kind: ViolationKind,
}

impl Violation {
    /// Create a new rule violation against a file
    pub fn new(rule_id: &str, file_path: &str, message: &str, severity: Severity) -> Self {
        let mut violation = Self {
            id: String::new(),
            rule_id: rule_id.to_string(),
            rule_name: String::new(),
            rule_category: String::new(),
            philosophy_id: None,
            file_path: file_path.to_string(),
            line_number: 0,
            column_number: 0,
            message: message.to_string(),
            severity,
            suggestion: None,
            auto_fix_available: false,
            detected_at: Local::now(),
            kind: ViolationKind::RuleViolation,
        };
        violation.refresh_id();
        violation
    }

    fn refresh_id(&mut self) {
        let file_name = self
            .file_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.file_path);
        self.id = format!("{}:violation:{}:{}", self.rule_id, file_name, self.line_number);
    }

    pub fn with_rule_name(mut self, name: &str) -> Self {
        self.rule_name = name.to_string();
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.rule_category = category.to_string();
        self
    }

    pub fn with_philosophy(mut self, philosophy: Option<&str>) -> Self {
        self.philosophy_id = philosophy.map(str::to_string);
        self
    }

    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.line_number = line;
        self.column_number = column;
        self.refresh_id();
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestion = Some(suggestion.to_string());
        self
    }

    pub fn with_auto_fix(mut self, available: bool) -> Self {
        self.auto_fix_available = available;
        self
    }

    pub fn with_kind(mut self, kind: ViolationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("error".parse::<Severity>(), Ok(Severity::Error));
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("info".parse::<Severity>(), Ok(Severity::Info));
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("critical".parse::<Severity>(), Err(()));
    }

    #[test]
    fn test_violation_id() {
        let violation = Violation::new(
            "akao:rule::structure:one_class:v1",
            "src/widget.cpp",
            "Multiple classes found in single file",
            Severity::Error,
        )
        .with_location(12, 1);

        assert_eq!(
            violation.id,
            "akao:rule::structure:one_class:v1:violation:widget.cpp:12"
        );
        assert!(violation.is_error());
        assert_eq!(violation.kind, ViolationKind::RuleViolation);
    }

    #[test]
    fn test_violation_builder() {
        let violation = Violation::new("r", "a.cpp", "m", Severity::Warning)
            .with_rule_name("Rule")
            .with_category("testing")
            .with_philosophy(Some("akao:philosophy::testing:coverage:v1"))
            .with_suggestion("Add tests")
            .with_auto_fix(true)
            .with_kind(ViolationKind::EvaluationError);

        assert_eq!(violation.rule_name, "Rule");
        assert_eq!(violation.rule_category, "testing");
        assert!(violation.philosophy_id.is_some());
        assert_eq!(violation.suggestion.as_deref(), Some("Add tests"));
        assert!(violation.auto_fix_available);
        assert!(violation.is_warning());
        assert_eq!(violation.kind.to_string(), "evaluation_error");
    }
}
