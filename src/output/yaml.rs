//! YAML report formatter

use super::{OutputFormatter, ReportDocument, ReportViolation};
use crate::diagnostic::Violation;
use crate::orchestrator::ValidationResult;

/// YAML formatter, same layout as the JSON report
#[derive(Default)]
pub struct YamlFormatter;

impl YamlFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl OutputFormatter for YamlFormatter {
    fn format(&self, result: &ValidationResult) -> String {
        serde_yaml::to_string(&ReportDocument::from_result(result)).unwrap_or_default()
    }

    fn format_violation(&self, violation: &Violation) -> String {
        serde_yaml::to_string(&ReportViolation::from_violation(violation)).unwrap_or_default()
    }
}
