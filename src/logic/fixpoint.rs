//! Fixpoint iteration
//!
//! `fixpoint`, `mu` and `nu` expressions repeatedly apply their body to the
//! previous value until two consecutive values are equal under the chosen
//! strategy. The iteration cap is the only bound on the work done.

use super::error::EvalError;
use super::value::Value;
use crate::document::Node;
use std::collections::VecDeque;
use std::fmt;

/// Default iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Default tolerance for the numeric strategy
pub const DEFAULT_TOLERANCE: f64 = 0.0001;

/// Number of states retained for divergence diagnostics
pub const TRACE_LIMIT: usize = 100;

/// Convergence test between consecutive values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Structural equality, numbers of different types are distinct
    Exact,
    /// Structural equality, numbers compared by value
    #[default]
    Standard,
    /// Numbers within the tolerance; other values as `Standard`
    Numeric,
}

impl Strategy {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "exact" => Some(Strategy::Exact),
            "standard" => Some(Strategy::Standard),
            "numeric" => Some(Strategy::Numeric),
            _ => None,
        }
    }

    /// Whether `a` and `b` count as the same state
    pub fn same(&self, a: &Value, b: &Value, tolerance: f64) -> bool {
        match self {
            Strategy::Exact => a == b,
            Strategy::Standard => a.loose_eq(b),
            Strategy::Numeric => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => (x - y).abs() <= tolerance,
                _ => a.loose_eq(b),
            },
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Exact => write!(f, "exact"),
            Strategy::Standard => write!(f, "standard"),
            Strategy::Numeric => write!(f, "numeric"),
        }
    }
}

/// Which operator introduced the fixpoint; decides the default seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixpointKind {
    /// `fixpoint`: seed is null
    Plain,
    /// `mu`: least fixpoint, seed is false
    Least,
    /// `nu`: greatest fixpoint, seed is true
    Greatest,
}

impl FixpointKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            FixpointKind::Plain => "fixpoint",
            FixpointKind::Least => "mu",
            FixpointKind::Greatest => "nu",
        }
    }

    pub fn default_seed(&self) -> Value {
        match self {
            FixpointKind::Plain => Value::Null,
            FixpointKind::Least => Value::Boolean(false),
            FixpointKind::Greatest => Value::Boolean(true),
        }
    }
}

/// A fixpoint expression pulled apart from its node
#[derive(Debug, Clone)]
pub struct FixpointSpec<'a> {
    pub kind: FixpointKind,
    pub variable: String,
    pub body: &'a Node,
    pub initial: Option<&'a Node>,
    pub strategy: Strategy,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl<'a> FixpointSpec<'a> {
    /// Read either the nested form (`mu: {variable, expression}`) or the flat
    /// form (`mu: x` with sibling keys)
    pub fn from_node(
        kind: FixpointKind,
        node: &'a Node,
        max_iterations: usize,
    ) -> Result<Self, EvalError> {
        let keyword = kind.keyword();
        let head = node.get(keyword).unwrap_or(&Node::Null);
        let (variable, fields) = match head {
            Node::Mapping(_) => (head.get("variable"), head),
            other => (Some(other), node),
        };

        let variable = variable
            .and_then(Node::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                EvalError::MalformedExpression(format!("{} requires a variable name", keyword))
            })?;

        let body = fields
            .get("expression")
            .or_else(|| fields.get("body"))
            .ok_or_else(|| {
                EvalError::MalformedExpression(format!("{} requires an expression", keyword))
            })?;

        let strategy = match fields.get("strategy") {
            Some(node) => {
                let name = node.as_str().unwrap_or_default();
                Strategy::parse(name).ok_or_else(|| {
                    EvalError::MalformedExpression(format!("unknown fixpoint strategy '{}'", name))
                })?
            }
            None => Strategy::default(),
        };

        let max_iterations = match fields.get("max_iterations") {
            Some(node) => match node.as_i64() {
                Some(n) if n > 0 => n as usize,
                _ => {
                    return Err(EvalError::MalformedExpression(
                        "max_iterations must be a positive integer".to_string(),
                    ))
                }
            },
            None => max_iterations,
        };

        let tolerance = fields
            .get("tolerance")
            .and_then(Node::as_f64)
            .unwrap_or(DEFAULT_TOLERANCE);

        Ok(Self {
            kind,
            variable: variable.to_string(),
            body,
            initial: fields.get("initial"),
            strategy,
            max_iterations,
            tolerance,
        })
    }
}

/// Successful fixpoint computation
#[derive(Debug, Clone, PartialEq)]
pub struct Convergence {
    pub value: Value,
    /// Number of applications that changed the value
    pub iterations: usize,
}

/// Apply `step` from `seed` until it stabilizes.
///
/// `step` receives the current value and the iteration index. A value that
/// differs from the current one but equals an earlier state is an
/// oscillation.
pub fn iterate<F>(
    strategy: Strategy,
    max_iterations: usize,
    tolerance: f64,
    seed: Value,
    mut step: F,
) -> Result<Convergence, EvalError>
where
    F: FnMut(&Value, usize) -> Result<Value, EvalError>,
{
    let mut history: VecDeque<Value> = VecDeque::new();
    let mut current = seed;

    for iteration in 0..max_iterations {
        let next = step(&current, iteration)?;

        if strategy.same(&current, &next, tolerance) {
            return Ok(Convergence {
                value: next,
                iterations: iteration,
            });
        }

        if history.iter().any(|seen| strategy.same(seen, &next, tolerance)) {
            history.push_back(current);
            history.push_back(next);
            return Err(divergence(strategy, iteration + 1, true, history));
        }

        history.push_back(std::mem::replace(&mut current, next));
        while history.len() >= TRACE_LIMIT {
            history.pop_front();
        }
    }

    history.push_back(current);
    Err(divergence(strategy, max_iterations, false, history))
}

fn divergence(
    strategy: Strategy,
    iterations: usize,
    oscillation: bool,
    mut history: VecDeque<Value>,
) -> EvalError {
    while history.len() > TRACE_LIMIT {
        history.pop_front();
    }
    EvalError::FixpointDivergence {
        iterations,
        strategy: strategy.to_string(),
        oscillation,
        trace: history.into(),
    }
}
