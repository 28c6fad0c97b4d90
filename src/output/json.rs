//! JSON output formatter

use super::{OutputFormatter, ReportDocument, ReportViolation};
use crate::diagnostic::Violation;
use crate::orchestrator::ValidationResult;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn render<T: serde::Serialize>(&self, value: &T) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, result: &ValidationResult) -> String {
        self.render(&ReportDocument::from_result(result))
    }

    fn format_violation(&self, violation: &Violation) -> String {
        self.render(&ReportViolation::from_violation(violation))
    }
}
