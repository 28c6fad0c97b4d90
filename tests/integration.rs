//! End-to-end validation of temporary project trees

use akao::config::{Config, OutputFormat};
use akao::orchestrator::{OrchestratorError, ValidationOrchestrator, SYSTEM_RULE_ID};
use akao::output;
use akao::{LoadError, RuleLoader, Severity, ViolationKind};
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

const NO_TODO_RULE: &str = r#"metadata:
  id: akao:rule::structure:no_todo:v1
  name: No TODO markers
  category: structure
  version: 1
philosophies:
  - akao:philosophy::structure:clarity:v1
rule_definition:
  scope: project
  target: source files
  pure_logic_expressions:
    - forall:
        variable: file
        domain:
          var: discovered_files
        condition:
          not:
            function: contains
            arguments:
              - var: file
              - "TODO"
implementation:
  check_method: logic
  severity: error
"#;

const ONE_CLASS_RULE: &str = r#"metadata:
  id: akao:rule::structure:class_separation:v1
  name: One class per file
  category: structure
rule_definition:
  scope: file
  target: source files
  applies_to:
    - "*.cpp"
    - "*.hpp"
implementation:
  severity: warning
"#;

const LEGACY_RULE: &str = "# id: akao:rule::documentation:has_readme:v1
# name: README present
# category: documentation
# scope: project
# severity: info
function: filesystem.file_exists
arguments:
  - README.md
";

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, ".akao/rules/enabled/structure/no_todo.yaml", NO_TODO_RULE);
    write(root, ".akao/rules/enabled/structure/one_class.yaml", ONE_CLASS_RULE);
    write(root, ".akao/rules/enabled/documentation/readme.a", LEGACY_RULE);
    write(
        root,
        ".akao/rules/disabled/testing/coverage.yaml",
        "metadata:\n  id: akao:rule::testing:coverage:v1\n  name: Coverage\n  category: testing\nrule_definition:\n  scope: project\n  target: tests\n",
    );
    write(root, ".gitignore", "build/\n*.tmp\n");
    write(root, "a.cpp", "class A {\n};\n");
    write(root, "b.cpp", "// TODO: split\nclass B {};\nclass C {};\n");
    write(root, "build/generated.cpp", "// TODO generated\n");
    write(root, "scratch.tmp", "TODO\n");
    dir
}

fn config() -> Config {
    Config::new()
}

#[test]
fn test_end_to_end_validation() {
    let dir = project();
    let result = ValidationOrchestrator::new(config())
        .validate(dir.path())
        .unwrap();

    assert_eq!(result.files_analyzed, 2);
    assert_eq!(result.rules_executed, 3);
    assert!(result.load_errors.is_empty());

    let todo: Vec<_> = result
        .violations
        .iter()
        .filter(|v| v.rule_id == "akao:rule::structure:no_todo:v1")
        .collect();
    assert_eq!(todo.len(), 1);
    assert_eq!(todo[0].file_path, "b.cpp");
    assert_eq!(todo[0].severity, Severity::Error);

    let classes: Vec<_> = result
        .violations
        .iter()
        .filter(|v| v.rule_id == "akao:rule::structure:class_separation:v1")
        .collect();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].file_path, "b.cpp");
    assert_eq!(classes[0].line_number, 3);

    let readme: Vec<_> = result
        .violations
        .iter()
        .filter(|v| v.rule_id == "akao:rule::documentation:has_readme:v1")
        .collect();
    assert_eq!(readme.len(), 1);
    assert_eq!(readme[0].file_path, ".");
    assert_eq!(readme[0].severity, Severity::Info);

    assert!(result.violations.iter().all(|v| v.kind == ViolationKind::RuleViolation));
    assert_eq!(result.exit_code(), 2);
}

#[test]
fn test_clean_project_passes() {
    let dir = project();
    write(dir.path(), "b.cpp", "class B {};\n");
    write(dir.path(), "README.md", "# Project\n");

    let result = ValidationOrchestrator::new(config())
        .validate(dir.path())
        .unwrap();
    assert!(result.is_valid(), "unexpected: {:?}", result.violations);
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.files_analyzed, 3);
}

#[test]
fn test_validation_log_written() {
    let dir = project();
    let result = ValidationOrchestrator::new(config())
        .validate(dir.path())
        .unwrap();

    let log_path = result.log_path.clone().unwrap();
    let name = log_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("validation_") && name.ends_with(".log"));
    assert_eq!(name.len(), "validation_YYYYMMDD_HHMMSS.log".len());

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.starts_with("=== AKAO VALIDATION LOG ==="));
    assert!(log.contains("=== VIOLATIONS ==="));
    assert!(log.contains("=== SUMMARY ==="));
    assert!(log.contains("Status: FAILED"));
    assert!(log.contains("Files Analyzed: 2"));
}

#[test]
fn test_logs_are_not_rescanned() {
    let dir = project();
    let first = ValidationOrchestrator::new(config())
        .validate(dir.path())
        .unwrap();
    let second = ValidationOrchestrator::new(config())
        .validate(dir.path())
        .unwrap();
    assert_eq!(first.files_analyzed, second.files_analyzed);
    assert_eq!(first.violations.len(), second.violations.len());
}

#[test]
fn test_config_file_disables_rules() {
    let dir = project();
    write(
        dir.path(),
        "akao.yaml",
        "rules:\n  disabled:\n    - akao:rule::structure:no_todo:v1\noutput:\n  export_log: false\n",
    );

    let config = Config::load_default(dir.path()).unwrap();
    let result = ValidationOrchestrator::new(config)
        .validate(dir.path())
        .unwrap();

    assert!(result
        .violations
        .iter()
        .all(|v| v.rule_id != "akao:rule::structure:no_todo:v1"));
    assert!(result.log_path.is_none());
    assert!(!dir.path().join(".akao/logs").exists());
    // akao.yaml is discovered like any other file
    assert_eq!(result.files_analyzed, 3);
}

#[test]
fn test_severity_override() {
    let dir = project();
    let mut config = config();
    config.rules.severity.insert(
        "akao:rule::structure:no_todo:v1".to_string(),
        Severity::Warning,
    );
    config.output.export_log = false;

    let result = ValidationOrchestrator::new(config)
        .validate(dir.path())
        .unwrap();
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.exit_code(), 1);
}

#[test]
fn test_parallel_matches_sequential() {
    let dir = project();
    for i in 0..12 {
        write(dir.path(), &format!("src/f{}.cpp", i), "class X {};\nclass Y {};\n");
    }

    let mut sequential = config();
    sequential.output.export_log = false;
    let mut parallel = sequential.clone();
    parallel.engine.parallel = true;
    parallel.engine.jobs = 4;

    let key = |v: &akao::Violation| (v.rule_id.clone(), v.file_path.clone(), v.line_number);
    let mut a: Vec<_> = ValidationOrchestrator::new(sequential)
        .validate(dir.path())
        .unwrap()
        .violations
        .iter()
        .map(key)
        .collect();
    let mut b: Vec<_> = ValidationOrchestrator::new(parallel)
        .validate(dir.path())
        .unwrap()
        .violations
        .iter()
        .map(key)
        .collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
    assert_eq!(a.len(), 15);
}

#[test]
fn test_report_exports() {
    let dir = project();
    let mut config = config();
    config.output.export_log = false;
    let result = ValidationOrchestrator::new(config)
        .validate(dir.path())
        .unwrap();

    let reports = TempDir::new().unwrap();
    for (name, format) in [
        ("report.md", OutputFormat::Markdown),
        ("report.yaml", OutputFormat::Yaml),
        ("report.json", OutputFormat::Json),
    ] {
        let path = reports.path().join(name);
        assert_eq!(output::write_report(&result, &path, None).unwrap(), format);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("akao:rule::structure:no_todo:v1"), "{}", name);
        assert!(content.contains("b.cpp"), "{}", name);
    }

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(reports.path().join("report.json")).unwrap())
            .unwrap();
    assert_eq!(json["report"]["total_violations"], result.violations.len());
}

#[test]
fn test_rule_listing() {
    let dir = project();
    let set = RuleLoader::new(&dir.path().join(".akao/rules"))
        .load_all()
        .unwrap();

    assert_eq!(set.len(), 4);
    assert_eq!(set.enabled().count(), 3);
    assert_eq!(set.categories(), vec!["documentation", "structure", "testing"]);
    assert_eq!(
        set.philosophies(),
        vec!["akao:philosophy::structure:clarity:v1"]
    );
}

#[test]
fn test_broken_rule_does_not_stop_validation() {
    let dir = project();
    write(
        dir.path(),
        ".akao/rules/enabled/broken.yaml",
        "metadata:\n  id: not-a-valid-id\n  name: Broken\n",
    );

    let result = ValidationOrchestrator::new(config())
        .validate(dir.path())
        .unwrap();
    assert_eq!(result.load_errors.len(), 1);
    assert_eq!(result.rules_executed, 3);
}

#[test]
fn test_missing_rules_directory() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.cpp", "");
    let result = ValidationOrchestrator::new(config()).validate(dir.path());
    assert!(matches!(
        result,
        Err(OrchestratorError::Load(LoadError::DirectoryNotFound(_)))
    ));
}

#[cfg(unix)]
fn system_paths(result: &akao::ValidationResult) -> Vec<&str> {
    let mut paths: Vec<&str> = result
        .violations
        .iter()
        .filter(|v| v.rule_id == SYSTEM_RULE_ID)
        .inspect(|v| {
            assert_eq!(v.kind, ViolationKind::SystemError);
            assert_eq!(v.severity, Severity::Warning);
        })
        .map(|v| v.file_path.as_str())
        .collect();
    paths.sort();
    paths
}

#[cfg(unix)]
#[test]
fn test_symlink_loops_are_reported() {
    use std::os::unix::fs::symlink;

    let dir = project();
    let root = dir.path();
    symlink("loop", root.join("loop")).unwrap();
    std::fs::create_dir_all(root.join("cyc")).unwrap();
    symlink(root.join("cyc"), root.join("cyc/back")).unwrap();

    let mut config = config();
    config.output.export_log = false;
    let result = ValidationOrchestrator::new(config)
        .validate(root)
        .unwrap();

    assert_eq!(system_paths(&result), vec!["cyc/back", "loop"]);
    assert_eq!(result.files_analyzed, 2);
    assert!(result
        .violations
        .iter()
        .any(|v| v.rule_id == "akao:rule::structure:no_todo:v1" && v.file_path == "b.cpp"));
}

#[cfg(unix)]
#[test]
fn test_dangling_links_are_reported() {
    use std::os::unix::fs::symlink;

    let dir = project();
    let root = dir.path();
    symlink(root.join("missing.cpp"), root.join("dangling.cpp")).unwrap();
    std::fs::create_dir_all(root.join("build")).unwrap();
    symlink(root.join("missing.cpp"), root.join("build/ignored.cpp")).unwrap();
    symlink(root.join("missing.cpp"), root.join("skipped.tmp")).unwrap();

    let mut config = config();
    config.output.export_log = false;
    let result = ValidationOrchestrator::new(config)
        .validate(root)
        .unwrap();

    assert_eq!(system_paths(&result), vec!["dangling.cpp"]);
    let violation = result
        .violations
        .iter()
        .find(|v| v.rule_id == SYSTEM_RULE_ID)
        .unwrap();
    assert!(violation.message.starts_with("Could not access path"));
    assert_eq!(result.files_analyzed, 2);
}

#[cfg(unix)]
#[test]
fn test_dangling_rule_link_is_load_error() {
    let dir = project();
    std::os::unix::fs::symlink(
        dir.path().join("nowhere.yaml"),
        dir.path().join(".akao/rules/enabled/linked.yaml"),
    )
    .unwrap();

    let mut config = config();
    config.output.export_log = false;
    let result = ValidationOrchestrator::new(config)
        .validate(dir.path())
        .unwrap();

    assert_eq!(result.load_errors.len(), 1);
    assert!(result.load_errors[0].starts_with("Could not access"));
    assert!(result.load_errors[0].contains("linked.yaml"));
    assert_eq!(result.rules_executed, 3);
}
