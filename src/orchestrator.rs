//! End-to-end validation of a target directory
//!
//! A run goes through these phases in order:
//!
//! 1. dotfile scan of the target root (non-recursive)
//! 2. ignore pattern build from `.gitignore`, `.akaoignore` and `files.exclude`
//! 3. recursive discovery, skipping dot-directories, ignored paths and binaries
//! 4. compliance: project-scoped rules once, then file-scoped rules per file in batches
//! 5. aggregation into one [`ValidationResult`]
//! 6. export of the validation log under `.akao/logs/`
//!
//! Finding violations never fails a run; only a missing target, a missing
//! rules directory or an I/O failure while exporting does.

use crate::config::Config;
use crate::diagnostic::{Severity, Violation, ViolationKind};
use crate::executor::{ExecutionContext, NativeCheck, RuleExecutor, RuleTiming, PROJECT_PATH};
use crate::loader::{LoadError, RuleLoader};
use crate::output;
use crate::patterns::IgnoreSet;
use crate::rule::{Rule, DEFAULT_PHASE};
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions never read during compliance
pub const BINARY_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "ico", "svg", "mp4", "avi", "mov", "mkv", "wmv", "mp3",
    "wav", "flac", "ogg", "zip", "tar", "gz", "rar", "7z", "exe", "dll", "so", "dylib", "pdf",
    "doc", "docx", "xls", "xlsx", "bin", "dat", "db", "sqlite",
];

/// Rule id used for violations about unreadable files and paths
pub const SYSTEM_RULE_ID: &str = "akao:system::io_error";

/// Unrecoverable validation failure
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Target path not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Validation pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationPhase {
    DotfileScan,
    PatternBuild,
    Discovery,
    Compliance,
    Aggregation,
    Export,
}

impl ValidationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationPhase::DotfileScan => "dotfile_scan",
            ValidationPhase::PatternBuild => "pattern_build",
            ValidationPhase::Discovery => "discovery",
            ValidationPhase::Compliance => "compliance",
            ValidationPhase::Aggregation => "aggregation",
            ValidationPhase::Export => "export",
        }
    }
}

impl fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress reported while a validation runs
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    PhaseStarted(ValidationPhase),
    /// A file finished compliance checking
    FileProcessed {
        file: &'a str,
        violations: &'a [Violation],
    },
    /// A batch of files finished
    BatchCompleted { batch: usize, files: usize },
}

/// Observer for [`ProgressEvent`]s
pub type ProgressObserver = Box<dyn Fn(&ProgressEvent<'_>) + Send + Sync>;

/// Outcome of a validation run
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub target_path: PathBuf,

    /// Label of the validation, e.g. `compliance`
    pub validation_type: String,

    /// Violations in file-then-rule order
    pub violations: Vec<Violation>,

    pub files_analyzed: usize,

    pub rules_executed: usize,

    pub duration: Duration,

    pub started_at: DateTime<Local>,

    /// Per-rule timing statistics (rule_id -> timing)
    pub rule_timings: HashMap<String, RuleTiming>,

    /// Rule files that failed to load
    pub load_errors: Vec<String>,

    /// Exported validation log, if one was written
    pub log_path: Option<PathBuf>,
}

impl ValidationResult {
    pub fn new(target_path: &Path, validation_type: &str) -> Self {
        Self {
            target_path: target_path.to_path_buf(),
            validation_type: validation_type.to_string(),
            violations: Vec::new(),
            files_analyzed: 0,
            rules_executed: 0,
            duration: Duration::ZERO,
            started_at: Local::now(),
            rule_timings: HashMap::new(),
            load_errors: Vec::new(),
            log_path: None,
        }
    }

    /// No violations at all
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    fn count(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.count(Severity::Info)
    }

    /// Get exit code (0 = clean, 1 = violations without errors, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        if self.error_count() > 0 {
            2
        } else if !self.violations.is_empty() {
            1
        } else {
            0
        }
    }

    /// Merge another phase's result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.violations.extend(other.violations);
        self.files_analyzed += other.files_analyzed;
        self.rules_executed += other.rules_executed;
        self.duration += other.duration;
        self.load_errors.extend(other.load_errors);

        for (rule_id, timing) in other.rule_timings {
            let entry = self
                .rule_timings
                .entry(rule_id)
                .or_insert_with(|| RuleTiming::new(&timing.rule_id));
            entry.total_time += timing.total_time;
            entry.execution_count += timing.execution_count;
            entry.violation_count += timing.violation_count;
        }

        if other.log_path.is_some() {
            self.log_path = other.log_path;
        }
    }
}

/// State carried through the phases of a single run
pub struct ValidationSession {
    pub phase: ValidationPhase,

    /// Dotfiles in the target root
    pub dotfiles: Vec<String>,

    pub ignore: IgnoreSet,

    /// Files to check, relative to the target, `/`-separated
    pub discovered: Vec<String>,

    /// Files skipped because of their extension
    pub skipped_binary: usize,

    pub result: ValidationResult,

    seen: HashSet<(String, String, usize, String)>,
}

impl ValidationSession {
    pub fn new(target: &Path, validation_type: &str) -> Self {
        Self {
            phase: ValidationPhase::DotfileScan,
            dotfiles: Vec::new(),
            ignore: IgnoreSet::new(),
            discovered: Vec::new(),
            skipped_binary: 0,
            result: ValidationResult::new(target, validation_type),
            seen: HashSet::new(),
        }
    }

    /// Record violations, dropping exact repeats
    ///
    /// Returns the violations that were new.
    pub fn record(&mut self, violations: Vec<Violation>) -> &[Violation] {
        let start = self.result.violations.len();
        for violation in violations {
            let key = (
                violation.rule_id.clone(),
                violation.file_path.clone(),
                violation.line_number,
                violation.message.clone(),
            );
            if self.seen.insert(key) {
                self.result.violations.push(violation);
            }
        }
        &self.result.violations[start..]
    }
}

/// Drives the validation pipeline for a target
pub struct ValidationOrchestrator {
    config: Config,
    executor: RuleExecutor,
    rules: Option<Vec<Rule>>,
    observer: Option<ProgressObserver>,
}

impl ValidationOrchestrator {
    pub fn new(config: Config) -> Self {
        let executor = RuleExecutor::from_config(&config);
        Self {
            config,
            executor,
            rules: None,
            observer: None,
        }
    }

    /// Use these rules instead of loading the rules directory
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate a target directory
    pub fn validate(&self, target: &Path) -> Result<ValidationResult, OrchestratorError> {
        if !target.is_dir() {
            return Err(OrchestratorError::TargetNotFound(target.to_path_buf()));
        }

        let start = Instant::now();
        let mut session = ValidationSession::new(target, ValidationPhase::Compliance.as_str());
        let rules = self.active_rules(target, &mut session)?;
        info!("Validating {} with {} rules", target.display(), rules.len());

        self.scan_dotfiles(target, &mut session)?;
        self.build_patterns(target, &mut session);
        self.discover(target, &mut session);
        self.check_compliance(target, &rules, &mut session);

        self.enter(&mut session, ValidationPhase::Aggregation);
        let mut result = session.result;
        result.files_analyzed = session.discovered.len();
        result.rules_executed = result.rule_timings.len();
        result.duration = start.elapsed();
        info!(
            "Validation of {} finished: {} violations in {} files",
            target.display(),
            result.violations.len(),
            result.files_analyzed
        );

        if self.config.output.export_log {
            self.notify(&ProgressEvent::PhaseStarted(ValidationPhase::Export));
            let path = output::log::export(&result, target)?;
            info!("Validation log written to {}", path.display());
            result.log_path = Some(path);
        }

        Ok(result)
    }

    fn enter(&self, session: &mut ValidationSession, phase: ValidationPhase) {
        info!("Entering phase {}", phase);
        session.phase = phase;
        self.notify(&ProgressEvent::PhaseStarted(phase));
    }

    fn notify(&self, event: &ProgressEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    /// Enabled compliance rules, loading them from disk unless preset
    fn active_rules(
        &self,
        target: &Path,
        session: &mut ValidationSession,
    ) -> Result<Vec<Rule>, OrchestratorError> {
        let rules = match &self.rules {
            Some(rules) => rules.clone(),
            None => {
                let loader = RuleLoader::with_config(&self.config.rules_dir(target), &self.config.rules);
                let set = loader.load_all()?;
                session.result.load_errors = set.errors().iter().map(|e| e.to_string()).collect();
                set.into_rules()
            }
        };

        Ok(rules
            .into_iter()
            .filter(|rule| rule.enabled && self.config.is_rule_enabled(&rule.id))
            .filter(|rule| rule.runs_in_phase(DEFAULT_PHASE))
            .collect())
    }

    /// Phase 1: dotfiles in the target root only
    fn scan_dotfiles(
        &self,
        target: &Path,
        session: &mut ValidationSession,
    ) -> Result<(), OrchestratorError> {
        self.enter(session, ValidationPhase::DotfileScan);

        for entry in std::fs::read_dir(target)?.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') && entry.path().is_file() {
                session.dotfiles.push(name);
            }
        }
        session.dotfiles.sort();
        debug!("Found dotfiles: {:?}", session.dotfiles);
        Ok(())
    }

    /// Phase 2: ignore files and configured excludes
    fn build_patterns(&self, target: &Path, session: &mut ValidationSession) {
        self.enter(session, ValidationPhase::PatternBuild);

        for name in &self.config.files.ignore_files {
            let path = target.join(name);
            let present = session.dotfiles.contains(name) || path.is_file();
            if !present {
                continue;
            }
            match IgnoreSet::load(&path) {
                Ok(set) => {
                    debug!("Loaded {} patterns from {}", set.len(), name);
                    session.ignore.extend(set);
                }
                Err(e) => warn!("Could not read {}: {}", path.display(), e),
            }
        }

        for pattern in &self.config.files.exclude {
            session.ignore.add(pattern);
        }
    }

    /// Phase 3: recursive discovery
    fn discover(&self, target: &Path, session: &mut ValidationSession) {
        self.enter(session, ValidationPhase::Discovery);

        let ignore = &session.ignore;
        let mut discovered = Vec::new();
        let mut skipped_binary = 0;

        let walker = WalkDir::new(target)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if name.starts_with('.') {
                    return false;
                }
                !ignore.is_ignored(&relative_path(target, entry.path()))
            });

        let mut inaccessible = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(target);
                    let relative = relative_path(target, path);
                    let relative = if relative.is_empty() {
                        PROJECT_PATH.to_string()
                    } else {
                        let hidden = path
                            .file_name()
                            .is_some_and(|name| name.to_string_lossy().starts_with('.'));
                        if hidden || ignore.is_ignored(&relative) {
                            continue;
                        }
                        relative
                    };
                    warn!("Could not access {}: {}", relative, e);
                    inaccessible.push(system_violation(
                        &relative,
                        &format!("Could not access path: {}", e),
                    ));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = relative_path(target, entry.path());
            if is_binary(&relative) {
                debug!("Skipping binary file {}", relative);
                skipped_binary += 1;
                continue;
            }
            discovered.push(relative);
        }

        info!(
            "Discovered {} files ({} binary skipped)",
            discovered.len(),
            skipped_binary
        );
        session.discovered = discovered;
        session.skipped_binary = skipped_binary;

        if !inaccessible.is_empty() {
            let recorded = session.record(inaccessible);
            self.notify(&ProgressEvent::FileProcessed {
                file: PROJECT_PATH,
                violations: recorded,
            });
        }
    }

    /// Phase 4: project-scoped rules once, then file-scoped rules per file
    fn check_compliance(&self, target: &Path, rules: &[Rule], session: &mut ValidationSession) {
        self.enter(session, ValidationPhase::Compliance);

        let (project_rules, file_rules): (Vec<&Rule>, Vec<&Rule>) =
            rules.iter().partition(|rule| runs_once(rule));
        let base = ExecutionContext::new(target).with_discovered_files(session.discovered.clone());

        if !project_rules.is_empty() {
            let result = self.executor.execute_all(&project_rules, &base);
            merge_timings(&mut session.result.rule_timings, result.rule_timings);
            let recorded = session.record(result.violations);
            self.notify(&ProgressEvent::FileProcessed {
                file: PROJECT_PATH,
                violations: recorded,
            });
        }

        if file_rules.is_empty() {
            return;
        }

        let batch_size = self.config.engine.batch_size.max(1);
        let files = session.discovered.clone();
        for (batch, chunk) in files.chunks(batch_size).enumerate() {
            for file in chunk {
                let violations = self.check_file(target, file, &file_rules, &base, session);
                if !violations.is_empty() {
                    info!("{}: {} violations", file, violations.len());
                }
                let recorded = session.record(violations);
                self.notify(&ProgressEvent::FileProcessed {
                    file,
                    violations: recorded,
                });
            }
            debug!("Finished batch {} ({} files)", batch + 1, chunk.len());
            self.notify(&ProgressEvent::BatchCompleted {
                batch: batch + 1,
                files: chunk.len(),
            });
        }
    }

    fn check_file(
        &self,
        target: &Path,
        file: &str,
        rules: &[&Rule],
        base: &ExecutionContext,
        session: &mut ValidationSession,
    ) -> Vec<Violation> {
        let applicable: Vec<&Rule> = rules
            .iter()
            .copied()
            .filter(|rule| rule.applies_to_path(file))
            .collect();
        if applicable.is_empty() {
            return Vec::new();
        }

        let content = match std::fs::read_to_string(target.join(file)) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read {}: {}", file, e);
                return vec![system_violation(file, &format!("Could not read file: {}", e))];
            }
        };

        let result = self
            .executor
            .execute_all(&applicable, &base.for_file(file, &content));
        merge_timings(&mut session.result.rule_timings, result.rule_timings);

        let mut violations = result.violations;
        sort_violations(&mut violations);
        violations
    }
}

/// Order by file, then line, then rule
fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(|a, b| {
        a.file_path
            .cmp(&b.file_path)
            .then_with(|| a.line_number.cmp(&b.line_number))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
}

fn system_violation(path: &str, message: &str) -> Violation {
    Violation::new(SYSTEM_RULE_ID, path, message, Severity::Warning)
        .with_rule_name("File access")
        .with_category("system")
        .with_kind(ViolationKind::SystemError)
}

/// Rules that give one answer per validation rather than one per file:
/// project-scoped rules, whole-project native checks, and logic rules that
/// only quantify over `$discovered_files`
fn runs_once(rule: &Rule) -> bool {
    if rule.is_project_scoped() {
        return true;
    }
    match NativeCheck::for_rule(rule) {
        Some(check) => !check.is_file_check(),
        None => rule.quantifies_over_discovered_files(),
    }
}

fn merge_timings(into: &mut HashMap<String, RuleTiming>, from: HashMap<String, RuleTiming>) {
    for (rule_id, timing) in from {
        let entry = into
            .entry(rule_id)
            .or_insert_with(|| RuleTiming::new(&timing.rule_id));
        entry.total_time += timing.total_time;
        entry.execution_count += timing.execution_count;
        entry.violation_count += timing.violation_count;
    }
}

fn relative_path(target: &Path, path: &Path) -> String {
    path.strip_prefix(target)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn is_binary(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}
