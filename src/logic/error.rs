//! Evaluation errors and quantifier outcomes

use super::value::Value;
use thiserror::Error;

/// A failure while evaluating an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    #[error("Type mismatch in {operation}: expected {expected}, found {found}")]
    TypeMismatch {
        operation: String,
        expected: String,
        found: String,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error(
        "Fixpoint {} after {iterations} iterations using strategy '{strategy}'. Last values: {}",
        divergence_label(.oscillation),
        render_trace(.trace)
    )]
    FixpointDivergence {
        iterations: usize,
        strategy: String,
        /// A previously seen value recurred
        oscillation: bool,
        /// Most recent states, oldest first, at most 100
        trace: Vec<Value>,
    },

    #[error("Invalid argument to {function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(String),

    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    #[error("Maximum evaluation depth of {0} exceeded")]
    DepthExceeded(usize),

    #[error("IO error reading {path}: {message}")]
    Io { path: String, message: String },
}

impl EvalError {
    pub fn type_mismatch(operation: &str, expected: &str, found: &Value) -> Self {
        EvalError::TypeMismatch {
            operation: operation.to_string(),
            expected: expected.to_string(),
            found: found.type_name().to_string(),
        }
    }

    pub fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        EvalError::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

/// Non-value result of a top-level evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalOutcome {
    /// A universal quantifier whose condition failed for some elements
    #[error(
        "Forall violation: {} values failed condition for variable {variable}",
        .failing.len()
    )]
    QuantifierFailures {
        variable: String,
        failing: Vec<Value>,
    },

    #[error(transparent)]
    Error(#[from] EvalError),
}

fn divergence_label(oscillation: &bool) -> &'static str {
    if *oscillation {
        "oscillates"
    } else {
        "did not converge"
    }
}

fn render_trace(trace: &[Value]) -> String {
    let shown: Vec<String> = trace.iter().rev().take(5).rev().map(Value::to_string).collect();
    shown.join(", ")
}
