//! Markdown report formatter

use super::OutputFormatter;
use crate::diagnostic::{Severity, Violation};
use crate::orchestrator::ValidationResult;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Number of rules listed under "Most Common Violations"
const TOP_RULES: usize = 5;

/// Markdown formatter with summary, details and statistics sections
#[derive(Default)]
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self
    }
}

/// Count occurrences by key, most frequent first, ties by key
fn ranked<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

impl OutputFormatter for MarkdownFormatter {
    fn format(&self, result: &ValidationResult) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# Akao Validation Report\n");
        let _ = writeln!(
            out,
            "**Generated**: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "**Target**: {}", result.target_path.display());
        let _ = writeln!(out, "**Total Violations**: {}\n", result.violations.len());

        let _ = writeln!(out, "## Summary\n");
        if result.violations.is_empty() {
            let _ = writeln!(out, "No violations found. Project is compliant.");
            return out;
        }

        let _ = writeln!(out, "### Violations by Severity\n");
        for severity in [Severity::Error, Severity::Warning, Severity::Info] {
            let count = result
                .violations
                .iter()
                .filter(|v| v.severity == severity)
                .count();
            if count > 0 {
                let _ = writeln!(out, "- **{}**: {}", severity, count);
            }
        }
        out.push('\n');

        let _ = writeln!(out, "### Most Common Violations\n");
        for (rule_id, count) in ranked(result.violations.iter().map(|v| v.rule_id.as_str()))
            .into_iter()
            .take(TOP_RULES)
        {
            let _ = writeln!(out, "- `{}`: {}", rule_id, count);
        }
        out.push('\n');

        let _ = writeln!(out, "## Violation Details\n");
        for violation in &result.violations {
            out.push_str(&self.format_violation(violation));
        }

        let _ = writeln!(out, "## Statistics\n");
        let _ = writeln!(out, "### By Category\n");
        let _ = writeln!(out, "| Category | Violations |");
        let _ = writeln!(out, "|---|---|");
        for (category, count) in ranked(result.violations.iter().map(|v| {
            if v.rule_category.is_empty() {
                "uncategorized"
            } else {
                v.rule_category.as_str()
            }
        })) {
            let _ = writeln!(out, "| {} | {} |", category, count);
        }
        out.push('\n');

        let _ = writeln!(out, "### By File\n");
        let _ = writeln!(out, "| File | Violations |");
        let _ = writeln!(out, "|---|---|");
        for (file, count) in ranked(result.violations.iter().map(|v| v.file_path.as_str())) {
            let _ = writeln!(out, "| {} | {} |", file, count);
        }

        out
    }

    fn format_violation(&self, violation: &Violation) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "### {}\n", violation.rule_id);
        let _ = writeln!(out, "- **File**: `{}`", violation.file_path);
        let _ = writeln!(out, "- **Line**: {}", violation.line_number);
        let _ = writeln!(out, "- **Severity**: {}", violation.severity);
        let _ = writeln!(out, "- **Message**: {}", violation.message);
        if let Some(suggestion) = &violation.suggestion {
            let _ = writeln!(out, "- **Suggestion**: {}", suggestion);
        }
        out.push('\n');
        out
    }
}
