//! Akao CLI - rule-driven compliance validation
//!
//! Validates a project directory against its `.akao/rules`, lists the loaded
//! rules, or evaluates a single logic expression.

use anyhow::{Context as _, Result};
use akao::config::{ColorMode, Config, OutputFormat};
use akao::document::{self, Node};
use akao::loader::RuleLoader;
use akao::logic::{Context, EvalOutcome, Evaluator, Value};
use akao::orchestrator::{ProgressEvent, ValidationOrchestrator};
use akao::output::{self, OutputFormatter};
use akao::rule::{Rule, RuleCategory};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Exit code for runs that could not complete
const EXIT_FAILURE: i32 = 3;

#[derive(Parser)]
#[command(
    name = "akao",
    version,
    about = "Rule-driven compliance validation",
    long_about = "Validates a project against rules written in the Akao logic language."
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project directory
    Validate {
        /// Project directory to validate
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format for the terminal
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Also write a report file (format from extension: .md, .yaml, .json)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Rules directory (default: <path>/.akao/rules)
        #[arg(long)]
        rules_dir: Option<PathBuf>,

        /// Run rules in parallel
        #[arg(long)]
        parallel: bool,

        /// Number of parallel jobs (0 = auto, implies --parallel)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Disable specific rules (comma-separated)
        #[arg(long, value_delimiter = ',')]
        disable: Option<Vec<String>>,

        /// Only enable specific rules (comma-separated)
        #[arg(long, value_delimiter = ',')]
        select: Option<Vec<String>>,

        /// Do not write the validation log
        #[arg(long)]
        no_log: bool,

        /// Exit with 0 even if violations are found
        #[arg(long)]
        exit_zero: bool,

        /// Show per-rule timing statistics
        #[arg(long)]
        timing: bool,
    },

    /// List rules
    Rules {
        /// Project directory whose rules are listed
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Rules directory (default: <path>/.akao/rules)
        #[arg(long)]
        rules_dir: Option<PathBuf>,

        /// Only show rules from this category
        #[arg(long)]
        category: Option<String>,

        /// Only show rules referencing this philosophy
        #[arg(long)]
        philosophy: Option<String>,

        /// Include disabled rules
        #[arg(long)]
        all: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a logic expression
    Eval {
        /// Expression file, or inline expression text
        expression: String,

        /// Bind a variable (name=value, value parsed as a scalar)
        #[arg(long = "var", value_parser = parse_binding)]
        vars: Vec<(String, String)>,

        /// Directory bound as $target_path
        #[arg(long)]
        target: Option<PathBuf>,

        /// Treat the expression as a Datalog clause
        #[arg(long)]
        legacy: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Yaml,
    Markdown,
    Log,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
            Format::Yaml => OutputFormat::Yaml,
            Format::Markdown => OutputFormat::Markdown,
            Format::Log => OutputFormat::Log,
        }
    }
}

fn parse_binding(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{}'", s)),
    }
}

fn load_config(cli: &Cli, target: &Path) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_default(target).context("Failed to load config")?,
    };
    Ok(config)
}

fn apply_color(cli: &Cli, config: &Config) {
    if cli.no_color {
        colored::control::set_override(false);
        return;
    }
    match config.output.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }
}

fn colors_enabled(cli: &Cli, config: &Config) -> bool {
    !cli.no_color && config.output.color != ColorMode::Never
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Commands::Validate {
            path,
            format,
            report,
            rules_dir,
            parallel,
            jobs,
            disable,
            select,
            no_log,
            exit_zero,
            timing,
        } => {
            let mut config = load_config(cli, path)?;
            config.merge_cli(
                format.map(OutputFormat::from),
                cli.verbose.then_some(true),
                *jobs,
                disable.clone(),
                select.clone(),
            );
            if *parallel {
                config.engine.parallel = true;
            }
            if let Some(dir) = rules_dir {
                config.rules.directory = Some(dir.clone());
            }
            if *no_log {
                config.output.export_log = false;
            }
            apply_color(cli, &config);

            handle_validate(cli, path, config, report.as_deref(), *exit_zero, *timing)
        }
        Commands::Rules {
            path,
            rules_dir,
            category,
            philosophy,
            all,
            json,
        } => {
            let mut config = load_config(cli, path)?;
            if let Some(dir) = rules_dir {
                config.rules.directory = Some(dir.clone());
            }
            apply_color(cli, &config);
            handle_rules(
                path,
                &config,
                category.as_deref(),
                philosophy.as_deref(),
                *all,
                *json,
            )
        }
        Commands::Eval {
            expression,
            vars,
            target,
            legacy,
        } => handle_eval(expression, vars, target.as_deref(), *legacy),
    }
}

fn handle_validate(
    cli: &Cli,
    path: &Path,
    config: Config,
    report: Option<&Path>,
    exit_zero: bool,
    timing: bool,
) -> Result<i32> {
    let format = config.output.format;
    let colored = colors_enabled(cli, &config);
    let verbose = config.output.verbose;

    let mut orchestrator = ValidationOrchestrator::new(config);
    if verbose {
        orchestrator = orchestrator.with_observer(Box::new(|event: &ProgressEvent<'_>| {
            if let ProgressEvent::FileProcessed { file, violations } = event {
                if !violations.is_empty() {
                    eprintln!("{} {} ({} violations)", "checked".dimmed(), file, violations.len());
                }
            }
        }));
    }

    let result = orchestrator
        .validate(path)
        .with_context(|| format!("Validation of {} failed", path.display()))?;

    let formatter = output::formatter_for(format, colored);
    print!("{}", formatter.format(&result));

    if let Some(report_path) = report {
        let written = output::write_report(&result, report_path, None)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
        eprintln!(
            "Report ({:?}) written to {}",
            written,
            report_path.display()
        );
    }

    if timing {
        let mut timings: Vec<_> = result.rule_timings.values().collect();
        timings.sort_by(|a, b| b.total_time.cmp(&a.total_time));
        eprintln!();
        eprintln!("{}", "Rule timing:".bold());
        for timing in timings {
            eprintln!(
                "  {:>10.3}ms  {:>5}x  {}",
                timing.total_time.as_secs_f64() * 1000.0,
                timing.execution_count,
                timing.rule_id
            );
        }
    }

    Ok(if exit_zero { 0 } else { result.exit_code() })
}

fn print_rule(rule: &Rule) {
    let severity = match rule.severity {
        akao::Severity::Error => "error".red(),
        akao::Severity::Warning => "warning".yellow(),
        akao::Severity::Info => "info".blue(),
    };
    let state = if rule.enabled { "" } else { " (disabled)" };
    println!(
        "    {} [{}] {}{}",
        rule.id.cyan(),
        severity,
        rule.name,
        state.dimmed()
    );
}

fn handle_rules(
    path: &Path,
    config: &Config,
    category: Option<&str>,
    philosophy: Option<&str>,
    all: bool,
    json: bool,
) -> Result<i32> {
    let loader = RuleLoader::with_config(&config.rules_dir(path), &config.rules);
    let set = loader.load_all()?;

    let category = category.map(RuleCategory::from);
    let rules: Vec<&Rule> = set
        .rules()
        .iter()
        .filter(|rule| all || rule.enabled)
        .filter(|rule| category.as_ref().map_or(true, |c| &rule.category == c))
        .filter(|rule| philosophy.map_or(true, |p| rule.references_philosophy(p)))
        .collect();

    if json {
        let listing: Vec<serde_json::Value> = rules
            .iter()
            .map(|rule| {
                serde_json::json!({
                    "id": rule.id,
                    "name": rule.name,
                    "category": rule.category.as_str(),
                    "severity": rule.severity.to_string(),
                    "enabled": rule.enabled,
                    "scope": rule.scope,
                    "philosophies": rule.philosophies,
                    "source": rule.source.as_ref().map(|p| p.display().to_string()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        println!("{}", "Available rules:".bold());
        println!();
        let mut categories: Vec<&RuleCategory> = rules.iter().map(|r| &r.category).collect();
        categories.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        categories.dedup();
        for cat in categories {
            let in_category: Vec<&&Rule> = rules.iter().filter(|r| &r.category == cat).collect();
            println!("  {} ({} rules):", cat.as_str().cyan(), in_category.len());
            for rule in in_category {
                print_rule(rule);
            }
            println!();
        }
        println!("{} rules", rules.len());
    }

    for error in set.errors() {
        eprintln!("{}: {}", "warning".yellow(), error);
    }

    Ok(0)
}

fn handle_eval(
    expression: &str,
    vars: &[(String, String)],
    target: Option<&Path>,
    legacy: bool,
) -> Result<i32> {
    let text = if Path::new(expression).is_file() {
        std::fs::read_to_string(expression)
            .with_context(|| format!("Failed to read {}", expression))?
    } else {
        expression.to_string()
    };

    let expr: Node = if legacy {
        akao::legacy::convert(&text).context("Invalid clause")?
    } else {
        document::parse(&text).context("Invalid expression")?
    };

    let mut ctx = Context::new();
    if let Some(dir) = target {
        ctx.bind("target_path", dir.display().to_string());
    }
    for (name, value) in vars {
        ctx.bind(name, Value::from(&document::parse_scalar(value)));
    }

    match Evaluator::new().evaluate(&expr, &mut ctx) {
        Ok(value) => {
            println!("{}", value);
            Ok(match value {
                Value::Boolean(false) => 1,
                _ => 0,
            })
        }
        Err(EvalOutcome::QuantifierFailures { variable, failing }) => {
            println!("false");
            for value in failing {
                println!("  {} = {}", variable, value);
            }
            Ok(1)
        }
        Err(EvalOutcome::Error(e)) => Err(e.into()),
    }
}
