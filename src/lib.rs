//! Akao - rule-driven compliance engine
//!
//! Rules are YAML documents (or `.a` plain-text files) whose checks are
//! written in an embedded quantified logic language. A validation run walks
//! a target directory, evaluates every enabled rule against the files it
//! applies to and reports violations.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> ValidationOrchestrator -> RuleLoader -> Rule
//!                                   -> RuleExecutor -> Evaluator -> Value
//! ```
//!
//! The orchestrator discovers files, honours `.gitignore`/`.akaoignore`,
//! runs rules through the executor in batches and exports a validation log.
//!
//! # Writing a rule
//!
//! ```yaml
//! metadata:
//!   id: akao:rule::structure:no_todo:v1
//!   name: No TODO markers
//!   category: structure
//! rule_definition:
//!   scope: file
//!   pure_logic_expressions:
//!     - forall:
//!         variable: file
//!         domain:
//!           var: discovered_files
//!         condition:
//!           not:
//!             function: contains
//!             arguments:
//!               - var: file
//!               - TODO
//! implementation:
//!   severity: warning
//! ```

pub mod config;
pub mod diagnostic;
pub mod document;
pub mod executor;
pub mod legacy;
pub mod loader;
pub mod logic;
pub mod orchestrator;
pub mod output;
pub mod patterns;
pub mod rule;

// Re-export main types
pub use config::Config;
pub use diagnostic::{Severity, Violation, ViolationKind};
pub use document::{Node, ParseError};
pub use executor::{ExecutionContext, ExecutionResult, ExecutionStrategy, RuleExecutor};
pub use legacy::LegacyError;
pub use loader::{LoadError, RuleLoader, RuleSet};
pub use logic::{Context, EvalError, EvalOutcome, Evaluator, Value};
pub use orchestrator::{
    OrchestratorError, ProgressEvent, ValidationOrchestrator, ValidationPhase, ValidationResult,
};
pub use output::{
    JsonFormatter, LogFormatter, MarkdownFormatter, OutputFormatter, TextFormatter, YamlFormatter,
};
pub use patterns::IgnoreSet;
pub use rule::{Rule, RuleCategory, RuleError};
