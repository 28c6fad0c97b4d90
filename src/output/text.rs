//! Human-readable text output formatter

use super::OutputFormatter;
use crate::diagnostic::{Severity, Violation};
use crate::orchestrator::ValidationResult;
use colored::*;
use std::collections::BTreeMap;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show suggestions under each violation
    pub show_suggestions: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_suggestions: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
            Severity::Info => s.blue(),
        }
    }

    fn format_location(&self, violation: &Violation) -> String {
        if violation.line_number == 0 {
            violation.file_path.clone()
        } else {
            format!(
                "{}:{}:{}",
                violation.file_path, violation.line_number, violation.column_number
            )
        }
    }

    fn paint(&self, text: String, color: Color) -> String {
        if self.colored {
            text.color(color).to_string()
        } else {
            text
        }
    }
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    format!("{} {}", count, if count == 1 { singular } else { plural })
}

impl OutputFormatter for TextFormatter {
    fn format(&self, result: &ValidationResult) -> String {
        let mut output = String::new();

        // Group violations by file, keeping file order stable
        let mut by_file: BTreeMap<&str, Vec<&Violation>> = BTreeMap::new();
        for violation in &result.violations {
            by_file.entry(&violation.file_path).or_default().push(violation);
        }

        for (file, violations) in &by_file {
            if self.colored {
                output.push_str(&format!("{}\n", file.underline()));
            } else {
                output.push_str(&format!("{}\n", file));
            }

            for violation in violations {
                output.push_str(&self.format_violation(violation));
            }
            output.push('\n');
        }

        if !result.load_errors.is_empty() {
            output.push_str(&self.paint(
                format!("{} could not be loaded:\n", plural(result.load_errors.len(), "rule file", "rule files")),
                Color::Yellow,
            ));
            for error in &result.load_errors {
                output.push_str(&format!("  {}\n", error));
            }
            output.push('\n');
        }

        if self.show_stats {
            output.push_str(&format!(
                "{} processed, {} executed",
                plural(result.files_analyzed, "file", "files"),
                plural(result.rules_executed, "rule", "rules")
            ));

            let mut counts = Vec::new();
            if result.error_count() > 0 {
                counts.push(self.paint(plural(result.error_count(), "error", "errors"), Color::Red));
            }
            if result.warning_count() > 0 {
                counts.push(self.paint(
                    plural(result.warning_count(), "warning", "warnings"),
                    Color::Yellow,
                ));
            }
            if result.info_count() > 0 {
                counts.push(self.paint(plural(result.info_count(), "info", "infos"), Color::Blue));
            }

            if !counts.is_empty() {
                output.push_str(&format!(": {}", counts.join(", ")));
            }
            output.push('\n');

            if result.is_valid() {
                output.push_str(&self.paint("Validation PASSED\n".to_string(), Color::Green));
            } else {
                output.push_str(&self.paint("Validation FAILED\n".to_string(), Color::Red));
            }

            output.push_str(&format!(
                "Finished in {:.2}s\n",
                result.duration.as_secs_f64()
            ));

            if let Some(log_path) = &result.log_path {
                output.push_str(&format!("Log written to {}\n", log_path.display()));
            }
        }

        output
    }

    fn format_violation(&self, violation: &Violation) -> String {
        let mut output = format!(
            "  {}: {}[{}]: {}\n",
            self.format_location(violation),
            self.severity_str(violation.severity),
            if self.colored {
                violation.rule_id.cyan().to_string()
            } else {
                violation.rule_id.clone()
            },
            violation.message
        );

        if self.show_suggestions {
            if let Some(suggestion) = &violation.suggestion {
                output.push_str(&format!(
                    "    {} {}\n",
                    if self.colored {
                        "=".blue().bold().to_string()
                    } else {
                        "=".to_string()
                    },
                    suggestion
                ));
            }
        }

        output
    }
}
