//! Output formatters for validation results

mod json;
pub mod log;
mod markdown;
mod text;
mod yaml;

pub use json::JsonFormatter;
pub use self::log::LogFormatter;
pub use markdown::MarkdownFormatter;
pub use text::TextFormatter;
pub use yaml::YamlFormatter;

use crate::config::OutputFormat;
use crate::diagnostic::Violation;
use crate::orchestrator::ValidationResult;
use serde::Serialize;
use std::path::Path;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the entire validation result
    fn format(&self, result: &ValidationResult) -> String;

    /// Format a single violation
    fn format_violation(&self, violation: &Violation) -> String;
}

/// Formatter for an output format
pub fn formatter_for(format: OutputFormat, colored: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new();
            if colored {
                Box::new(formatter)
            } else {
                Box::new(formatter.without_color())
            }
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
        OutputFormat::Yaml => Box::new(YamlFormatter::new()),
        OutputFormat::Markdown => Box::new(MarkdownFormatter::new()),
        OutputFormat::Log => Box::new(LogFormatter::new()),
    }
}

/// Write a report file, choosing the format from the extension unless given
pub fn write_report(
    result: &ValidationResult,
    path: &Path,
    format: Option<OutputFormat>,
) -> std::io::Result<OutputFormat> {
    let format = format
        .or_else(|| OutputFormat::from_path(path))
        .unwrap_or(OutputFormat::Markdown);
    let content = formatter_for(format, false).format(result);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(format)
}

/// Report layout shared by the JSON and YAML exports
#[derive(Serialize)]
struct ReportDocument<'a> {
    report: Report<'a>,
}

#[derive(Serialize)]
struct Report<'a> {
    generated_at: String,
    target_path: String,
    validation_type: &'a str,
    is_valid: bool,
    total_violations: usize,
    files_analyzed: usize,
    rules_executed: usize,
    duration_ms: u128,
    summary: ReportSummary,
    violations: Vec<ReportViolation<'a>>,
}

#[derive(Serialize)]
struct ReportSummary {
    errors: usize,
    warnings: usize,
    info: usize,
}

#[derive(Serialize)]
struct ReportViolation<'a> {
    id: &'a str,
    rule_id: &'a str,
    rule_name: &'a str,
    file_path: &'a str,
    line_number: usize,
    column_number: usize,
    message: &'a str,
    severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    philosophy_id: Option<&'a str>,
    kind: String,
}

impl<'a> ReportViolation<'a> {
    fn from_violation(v: &'a Violation) -> Self {
        Self {
            id: &v.id,
            rule_id: &v.rule_id,
            rule_name: &v.rule_name,
            file_path: &v.file_path,
            line_number: v.line_number,
            column_number: v.column_number,
            message: &v.message,
            severity: v.severity.to_string(),
            suggestion: v.suggestion.as_deref(),
            philosophy_id: v.philosophy_id.as_deref(),
            kind: v.kind.to_string(),
        }
    }
}

impl<'a> ReportDocument<'a> {
    fn from_result(result: &'a ValidationResult) -> Self {
        Self {
            report: Report {
                generated_at: chrono::Local::now().to_rfc3339(),
                target_path: result.target_path.display().to_string(),
                validation_type: &result.validation_type,
                is_valid: result.is_valid(),
                total_violations: result.violations.len(),
                files_analyzed: result.files_analyzed,
                rules_executed: result.rules_executed,
                duration_ms: result.duration.as_millis(),
                summary: ReportSummary {
                    errors: result.error_count(),
                    warnings: result.warning_count(),
                    info: result.info_count(),
                },
                violations: result
                    .violations
                    .iter()
                    .map(ReportViolation::from_violation)
                    .collect(),
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_result;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_report_by_extension() {
        let dir = TempDir::new().unwrap();
        let result = sample_result();

        let format = write_report(&result, &dir.path().join("out/report.json"), None).unwrap();
        assert_eq!(format, OutputFormat::Json);
        let json = std::fs::read_to_string(dir.path().join("out/report.json")).unwrap();
        assert!(json.contains("\"total_violations\": 3"));

        let format = write_report(&result, &dir.path().join("report.yml"), None).unwrap();
        assert_eq!(format, OutputFormat::Yaml);

        let format = write_report(&result, &dir.path().join("report"), None).unwrap();
        assert_eq!(format, OutputFormat::Markdown);
    }

    #[test]
    fn test_explicit_format_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        let format = write_report(&sample_result(), &path, Some(OutputFormat::Json)).unwrap();
        assert_eq!(format, OutputFormat::Json);
        let content = std::fs::read_to_string(path).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&content).is_ok());
    }
}
