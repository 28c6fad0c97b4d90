//! Rule execution
//!
//! A rule is either handled by one of the native checks below, picked by its
//! category and name, or evaluated through the logic engine. Either way the
//! outcome is a list of [`Violation`]s; evaluation failures become
//! error-severity violations instead of aborting the run.

use crate::config::Config;
use crate::diagnostic::{Severity, Violation, ViolationKind};
use crate::logic::{functions, Context, EvalOutcome, Evaluator, Value};
use crate::rule::{Rule, RuleCategory};
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// File path used for violations that concern the whole project
pub const PROJECT_PATH: &str = ".";

/// What a rule runs against
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Validation target root
    pub target_path: PathBuf,

    /// Every discovered file, relative to the target
    pub discovered_files: Vec<String>,

    /// Current file (relative), for file-scoped rules
    pub file: Option<String>,

    /// Content of the current file
    pub file_content: Option<String>,

    /// In-memory contents that take precedence over disk
    pub overlay: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new(target_path: &Path) -> Self {
        Self {
            target_path: target_path.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_discovered_files(mut self, files: Vec<String>) -> Self {
        self.discovered_files = files;
        self
    }

    /// Set the current file and its content
    pub fn with_file(mut self, file: &str, content: &str) -> Self {
        self.file = Some(file.to_string());
        self.file_content = Some(content.to_string());
        self
    }

    /// Provide content for a path without touching disk
    pub fn with_overlay(mut self, file: &str, content: &str) -> Self {
        self.overlay.insert(file.to_string(), content.to_string());
        self
    }

    /// Same context pointed at another file
    pub fn for_file(&self, file: &str, content: &str) -> Self {
        let mut ctx = self.clone();
        ctx.file = Some(file.to_string());
        ctx.file_content = Some(content.to_string());
        ctx
    }

    /// Logic bindings for a rule
    fn bindings(&self, rule: &Rule) -> Context {
        let files: Vec<Value> = self
            .discovered_files
            .iter()
            .map(|f| Value::from(f.as_str()))
            .collect();

        let mut ctx = Context::new()
            .with("$target_path", self.target_path.display().to_string())
            .with("$discovered_files", files)
            .with("$rule_id", rule.id.as_str())
            .with("$rule_name", rule.name.as_str())
            .with("$category", rule.category.to_string());

        if let Some(file) = &self.file {
            let content = self.file_content.clone().unwrap_or_default();
            ctx.bind("$file", file.as_str());
            ctx.bind("$file_content", content.as_str());
            ctx.add_file(file.as_str(), content);
        }
        for (path, content) in &self.overlay {
            ctx.add_file(path.as_str(), content.as_str());
        }
        ctx
    }
}

/// Per-rule timing statistics
#[derive(Debug, Clone, Default)]
pub struct RuleTiming {
    /// Rule ID
    pub rule_id: String,
    /// Total time spent on this rule
    pub total_time: Duration,
    /// Number of times the rule was executed
    pub execution_count: usize,
    /// Number of violations it reported
    pub violation_count: usize,
}

impl RuleTiming {
    pub fn new(rule_id: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            ..Default::default()
        }
    }

    /// Average time per execution
    pub fn avg_time(&self) -> Duration {
        if self.execution_count > 0 {
            self.total_time / self.execution_count as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Violations and timings from running a batch of rules
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub violations: Vec<Violation>,

    /// Number of rule executions
    pub rules_executed: usize,

    pub duration: Duration,

    /// Per-rule timing statistics (rule_id -> timing)
    pub rule_timings: HashMap<String, RuleTiming>,
}

impl ExecutionResult {
    /// Merge another result into this one
    pub fn merge(&mut self, other: ExecutionResult) {
        self.violations.extend(other.violations);
        self.rules_executed += other.rules_executed;
        self.duration += other.duration;

        for (rule_id, timing) in other.rule_timings {
            let entry = self
                .rule_timings
                .entry(rule_id)
                .or_insert_with(|| RuleTiming::new(&timing.rule_id));
            entry.total_time += timing.total_time;
            entry.execution_count += timing.execution_count;
            entry.violation_count += timing.violation_count;
        }
    }

    /// Rule timings sorted by total time (descending)
    pub fn sorted_timings(&self) -> Vec<&RuleTiming> {
        let mut timings: Vec<_> = self.rule_timings.values().collect();
        timings.sort_by(|a, b| b.total_time.cmp(&a.total_time));
        timings
    }
}

/// How a batch of rules is run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    #[default]
    Sequential,
    /// Worker pool; 0 jobs = one per CPU
    Parallel { jobs: usize },
}

/// Checks implemented directly instead of through the logic engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCheck {
    ClassSeparation,
    FileOrganization,
    SinglePrimaryLanguage,
    SecurityBehavior,
    TestCoverage,
    BuildConfigurationModes,
    DocumentationGeneration,
}

impl NativeCheck {
    /// Native handler for a rule, if its category and name have one.
    ///
    /// Rules with `check_method: logic` always go to the logic engine.
    pub fn for_rule(rule: &Rule) -> Option<Self> {
        if rule.check_method.as_deref() == Some("logic") {
            return None;
        }

        match (&rule.category, rule.id_name()) {
            (RuleCategory::Structure, "class_separation") => Some(NativeCheck::ClassSeparation),
            (RuleCategory::Structure, "file_organization") => Some(NativeCheck::FileOrganization),
            (RuleCategory::Language, "single_primary_lang") => {
                Some(NativeCheck::SinglePrimaryLanguage)
            }
            (RuleCategory::Security, "behavior_definition") => Some(NativeCheck::SecurityBehavior),
            (RuleCategory::Testing, "coverage_enforcement") => Some(NativeCheck::TestCoverage),
            (RuleCategory::Build, "configuration_modes") => {
                Some(NativeCheck::BuildConfigurationModes)
            }
            (RuleCategory::Documentation, "auto_generation") => {
                Some(NativeCheck::DocumentationGeneration)
            }
            _ => None,
        }
    }

    /// Whether the check looks at the current file rather than the file list
    pub fn is_file_check(&self) -> bool {
        matches!(
            self,
            NativeCheck::ClassSeparation
                | NativeCheck::FileOrganization
                | NativeCheck::BuildConfigurationModes
        )
    }

    fn run(&self, ctx: &ExecutionContext) -> Vec<Finding> {
        let file = ctx.file.as_deref();
        let content = ctx.file_content.as_deref().unwrap_or("");

        match self {
            NativeCheck::ClassSeparation => {
                let Some(file) = file else { return Vec::new() };
                if functions::count_class_declarations(content) <= 1 {
                    return Vec::new();
                }
                let line = functions::class_declaration_lines(content).nth(1).unwrap_or(0);
                vec![Finding::new(
                    file,
                    "Multiple classes found in single file",
                    "Move additional classes to separate files",
                )
                .at_line(line)]
            }
            NativeCheck::FileOrganization => {
                let Some(file) = file else { return Vec::new() };
                if !is_header(file) || in_include_dir(file) {
                    return Vec::new();
                }
                vec![Finding::new(
                    file,
                    "Header file not in proper include directory",
                    "Move header files to an include/ or headers/ directory",
                )]
            }
            NativeCheck::SinglePrimaryLanguage => {
                let primary = primary_languages(&ctx.discovered_files);
                if primary.len() <= 1 {
                    return Vec::new();
                }
                vec![Finding::new(
                    PROJECT_PATH,
                    "Multiple primary languages detected",
                    &format!("Consolidate on a single primary language (found: {})", primary.join(", ")),
                )]
            }
            NativeCheck::SecurityBehavior => {
                let defined = ctx.discovered_files.iter().any(|f| {
                    let lower = f.to_lowercase();
                    lower.contains("security") || lower.contains("config")
                });
                if defined {
                    return Vec::new();
                }
                vec![Finding::new(
                    PROJECT_PATH,
                    "No explicit security configuration found",
                    "Add a security configuration file describing expected behavior",
                )]
            }
            NativeCheck::TestCoverage => {
                let has_sources = ctx.discovered_files.iter().any(|f| is_source(f));
                let has_tests = ctx
                    .discovered_files
                    .iter()
                    .any(|f| f.to_lowercase().contains("test"));
                if !has_sources || has_tests {
                    return Vec::new();
                }
                vec![Finding::new(
                    PROJECT_PATH,
                    "No test files found for source files",
                    "Add tests covering the source files",
                )]
            }
            NativeCheck::BuildConfigurationModes => {
                let Some(file) = file else { return Vec::new() };
                let lower = content.to_lowercase();
                let has_debug = lower.contains("debug");
                let has_release = lower.contains("release");
                if has_debug && has_release {
                    return Vec::new();
                }
                vec![Finding::new(
                    file,
                    "Missing build configuration modes",
                    "Define both debug and release build configurations",
                )]
            }
            NativeCheck::DocumentationGeneration => {
                let configured = ctx.discovered_files.iter().any(|f| {
                    let name = f.rsplit('/').next().unwrap_or(f).to_lowercase();
                    name == "doxyfile" || name == "mkdocs.yml" || name.contains("doxygen")
                });
                if configured {
                    return Vec::new();
                }
                vec![Finding::new(
                    PROJECT_PATH,
                    "No documentation generation setup found",
                    "Add a Doxyfile or another documentation generator configuration",
                )]
            }
        }
    }
}

/// A native check result before it becomes a violation
struct Finding {
    file: String,
    line: usize,
    message: String,
    suggestion: String,
}

impl Finding {
    fn new(file: &str, message: &str, suggestion: &str) -> Self {
        Self {
            file: file.to_string(),
            line: 0,
            message: message.to_string(),
            suggestion: suggestion.to_string(),
        }
    }

    fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

/// Runs rules against an execution context
pub struct RuleExecutor {
    evaluator: Evaluator,
    pool: Option<rayon::ThreadPool>,
    severity_overrides: HashMap<String, Severity>,
}

impl Default for RuleExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleExecutor {
    /// Sequential executor with the default evaluator
    pub fn new() -> Self {
        Self {
            evaluator: Evaluator::new(),
            pool: None,
            severity_overrides: HashMap::new(),
        }
    }

    /// Executor set up from configuration
    pub fn from_config(config: &Config) -> Self {
        let evaluator = Evaluator::new()
            .with_max_depth(config.logic.max_depth)
            .with_max_iterations(config.logic.max_iterations);
        let strategy = if config.engine.parallel {
            ExecutionStrategy::Parallel {
                jobs: config.engine.jobs,
            }
        } else {
            ExecutionStrategy::Sequential
        };

        Self::new()
            .with_evaluator(evaluator)
            .with_strategy(strategy)
            .with_severity_overrides(config.rules.severity.clone())
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.pool = match strategy {
            ExecutionStrategy::Sequential => None,
            ExecutionStrategy::Parallel { jobs } => {
                match rayon::ThreadPoolBuilder::new()
                    .num_threads(if jobs > 0 { jobs } else { num_cpus::get() })
                    .build()
                {
                    Ok(pool) => Some(pool),
                    Err(e) => {
                        warn!("Falling back to sequential execution: {}", e);
                        None
                    }
                }
            }
        };
        self
    }

    pub fn with_severity_overrides(mut self, overrides: HashMap<String, Severity>) -> Self {
        self.severity_overrides = overrides;
        self
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        match &self.pool {
            Some(pool) => ExecutionStrategy::Parallel {
                jobs: pool.current_num_threads(),
            },
            None => ExecutionStrategy::Sequential,
        }
    }

    /// Run one rule
    pub fn execute(&self, rule: &Rule, ctx: &ExecutionContext) -> Vec<Violation> {
        match NativeCheck::for_rule(rule) {
            Some(check) => {
                debug!("Rule {} handled natively ({:?})", rule.id, check);
                let severity = self.severity_for(rule);
                check
                    .run(ctx)
                    .into_iter()
                    .map(|finding| {
                        self.violation(rule, &finding.file, &finding.message, severity)
                            .with_location(finding.line, 0)
                            .with_suggestion(&finding.suggestion)
                    })
                    .collect()
            }
            None => {
                debug!("Rule {} evaluated through the logic engine", rule.id);
                self.execute_logic(rule, ctx)
            }
        }
    }

    /// Run a batch of rules, one task per rule in parallel mode.
    ///
    /// Sequential runs keep rule order; parallel runs only guarantee the same
    /// set of violations.
    pub fn execute_all(&self, rules: &[&Rule], ctx: &ExecutionContext) -> ExecutionResult {
        let start = Instant::now();

        let results: Vec<ExecutionResult> = match &self.pool {
            Some(pool) => pool.install(|| {
                rules
                    .par_iter()
                    .map(|rule| self.execute_timed(rule, ctx))
                    .collect()
            }),
            None => rules
                .iter()
                .map(|rule| self.execute_timed(rule, ctx))
                .collect(),
        };

        let mut combined = ExecutionResult::default();
        for result in results {
            combined.merge(result);
        }

        combined.duration = start.elapsed();
        combined
    }

    fn execute_timed(&self, rule: &Rule, ctx: &ExecutionContext) -> ExecutionResult {
        let start = Instant::now();
        let violations = self.execute(rule, ctx);
        let elapsed = start.elapsed();

        let mut timing = RuleTiming::new(&rule.id);
        timing.total_time = elapsed;
        timing.execution_count = 1;
        timing.violation_count = violations.len();

        ExecutionResult {
            violations,
            rules_executed: 1,
            duration: elapsed,
            rule_timings: HashMap::from([(rule.id.clone(), timing)]),
        }
    }

    fn execute_logic(&self, rule: &Rule, ctx: &ExecutionContext) -> Vec<Violation> {
        let file = ctx.file.as_deref().unwrap_or(PROJECT_PATH);
        let severity = self.severity_for(rule);
        let mut violations = Vec::new();

        for expr in &rule.expressions {
            let mut bindings = ctx.bindings(rule);
            match self.evaluator.evaluate(expr, &mut bindings) {
                Ok(Value::Boolean(true)) => {}
                Ok(Value::Boolean(false)) => violations.push(
                    self.violation(rule, file, &format!("Rule violation: {}", rule.name), severity)
                        .with_suggestion(&format!("Check rule compliance for: {}", rule.name)),
                ),
                Ok(other) => violations.push(self.error_violation(
                    rule,
                    file,
                    &format!(
                        "Rule execution error: expression produced {} instead of a boolean",
                        other.type_name()
                    ),
                )),
                Err(EvalOutcome::QuantifierFailures { variable, failing }) => {
                    debug!(
                        "Rule {}: {} values of {} failed",
                        rule.id,
                        failing.len(),
                        variable
                    );
                    for value in failing {
                        let path = value.to_string();
                        violations.push(
                            self.violation(
                                rule,
                                &path,
                                &format!("Rule violation: {}", rule.name),
                                severity,
                            )
                            .with_suggestion(&format!("Fix violation in: {}", path)),
                        );
                    }
                }
                Err(EvalOutcome::Error(e)) => {
                    warn!("Rule {} failed on {}: {}", rule.id, file, e);
                    violations.push(self.error_violation(
                        rule,
                        file,
                        &format!("Rule execution error: {}", e),
                    ));
                }
            }
        }

        violations
    }

    fn severity_for(&self, rule: &Rule) -> Severity {
        self.severity_overrides
            .get(&rule.id)
            .copied()
            .unwrap_or(rule.severity)
    }

    fn violation(&self, rule: &Rule, file: &str, message: &str, severity: Severity) -> Violation {
        Violation::new(&rule.id, file, message, severity)
            .with_rule_name(&rule.name)
            .with_category(rule.category.as_str())
            .with_philosophy(rule.philosophies.first().map(String::as_str))
            .with_auto_fix(rule.auto_fix)
    }

    fn error_violation(&self, rule: &Rule, file: &str, message: &str) -> Violation {
        self.violation(rule, file, message, Severity::Error)
            .with_kind(ViolationKind::EvaluationError)
            .with_auto_fix(false)
    }
}

fn extension(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.').map_or("", |(_, ext)| ext)
}

fn is_header(path: &str) -> bool {
    matches!(extension(path), "h" | "hpp")
}

fn in_include_dir(path: &str) -> bool {
    path.split('/')
        .rev()
        .skip(1)
        .any(|dir| dir == "include" || dir == "headers")
}

fn language_of(path: &str) -> Option<&'static str> {
    let language = match extension(path).to_lowercase().as_str() {
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        _ => return None,
    };
    Some(language)
}

fn is_source(path: &str) -> bool {
    language_of(path).is_some()
}

/// Languages with more than five files, sorted by name
fn primary_languages(files: &[String]) -> Vec<&'static str> {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for language in files.iter().filter_map(|f| language_of(f)) {
        *counts.entry(language).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 5)
        .map(|(language, _)| language)
        .collect()
}
