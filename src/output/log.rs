//! Plain-text validation log and its export under `.akao/logs`

use super::OutputFormatter;
use crate::diagnostic::Violation;
use crate::orchestrator::ValidationResult;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Log directory inside a validation target
pub const LOG_DIR: &str = ".akao/logs";

/// Formatter for the sectioned validation log
#[derive(Default)]
pub struct LogFormatter;

impl LogFormatter {
    pub fn new() -> Self {
        Self
    }
}

fn status(result: &ValidationResult) -> &'static str {
    if result.is_valid() {
        "PASSED"
    } else {
        "FAILED"
    }
}

impl OutputFormatter for LogFormatter {
    fn format(&self, result: &ValidationResult) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "=== AKAO VALIDATION LOG ===");
        let _ = writeln!(
            out,
            "Timestamp: {}",
            result.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "Target Path: {}", result.target_path.display());
        let _ = writeln!(out, "Validation Type: {}", result.validation_type);
        let _ = writeln!(out, "Status: {}", status(result));
        let _ = writeln!(out, "Duration: {}ms", result.duration.as_millis());
        let _ = writeln!(out, "Rules Executed: {}", result.rules_executed);
        let _ = writeln!(out, "Files Analyzed: {}", result.files_analyzed);
        let _ = writeln!(out, "Total Violations: {}", result.violations.len());
        out.push('\n');

        if !result.violations.is_empty() {
            let _ = writeln!(out, "=== VIOLATIONS ===");
            for violation in &result.violations {
                out.push_str(&self.format_violation(violation));
            }
            out.push('\n');
        }

        if !result.load_errors.is_empty() {
            let _ = writeln!(out, "=== LOAD ERRORS ===");
            for error in &result.load_errors {
                let _ = writeln!(out, "{}", error);
            }
            out.push('\n');
        }

        let _ = writeln!(out, "=== SUMMARY ===");
        let _ = writeln!(
            out,
            "Validation {} - {} violations ({} errors, {} warnings, {} info)",
            status(result),
            result.violations.len(),
            result.error_count(),
            result.warning_count(),
            result.info_count()
        );
        out
    }

    fn format_violation(&self, violation: &Violation) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Rule: {}", violation.rule_id);
        if violation.line_number > 0 {
            let _ = writeln!(out, "File: {}:{}", violation.file_path, violation.line_number);
        } else {
            let _ = writeln!(out, "File: {}", violation.file_path);
        }
        let _ = writeln!(out, "Message: {}", violation.message);
        let _ = writeln!(out, "Severity: {}", violation.severity);
        let _ = writeln!(out, "---");
        out
    }
}

/// Log file path for a run started at `result.started_at`
pub fn log_path(result: &ValidationResult, target: &Path) -> PathBuf {
    target.join(LOG_DIR).join(format!(
        "validation_{}.log",
        result.started_at.format("%Y%m%d_%H%M%S")
    ))
}

/// Write the validation log under the target's log directory
pub fn export(result: &ValidationResult, target: &Path) -> std::io::Result<PathBuf> {
    let path = log_path(result, target);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, LogFormatter::new().format(result))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::sample_result;
    use tempfile::TempDir;

    #[test]
    fn test_log_sections() {
        let log = LogFormatter::new().format(&sample_result());

        assert!(log.starts_with("=== AKAO VALIDATION LOG ===\n"));
        assert!(log.contains("Target Path: /work/project"));
        assert!(log.contains("Validation Type: compliance"));
        assert!(log.contains("Status: FAILED"));
        assert!(log.contains("Duration: 1250ms"));
        assert!(log.contains("Rules Executed: 2"));
        assert!(log.contains("Files Analyzed: 4"));
        assert!(log.contains("Total Violations: 3"));
        assert!(log.contains("=== VIOLATIONS ==="));
        assert!(log.contains("File: src/shapes.cpp:7\n"));
        assert_eq!(log.matches("---\n").count(), 3);
        assert!(log.contains("=== SUMMARY ===\nValidation FAILED - 3 violations (1 errors, 2 warnings, 0 info)"));
    }

    #[test]
    fn test_clean_log_has_no_violation_section() {
        let mut result = sample_result();
        result.violations.clear();
        let log = LogFormatter::new().format(&result);
        assert!(log.contains("Status: PASSED"));
        assert!(!log.contains("=== VIOLATIONS ==="));
        assert!(log.contains("Validation PASSED"));
    }

    #[test]
    fn test_export_path_uses_start_time() {
        let dir = TempDir::new().unwrap();
        let result = sample_result();
        let path = export(&result, dir.path()).unwrap();

        let expected = format!(
            "validation_{}.log",
            result.started_at.format("%Y%m%d_%H%M%S")
        );
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), expected);
        assert_eq!(path.parent().unwrap(), dir.path().join(".akao/logs"));
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("=== SUMMARY ==="));
    }
}
