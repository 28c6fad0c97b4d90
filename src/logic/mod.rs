//! Quantified logic language
//!
//! Expressions are document [`Node`](crate::document::Node) trees evaluated
//! by an [`Evaluator`] against a [`Context`] of variable bindings.

pub mod context;
pub mod error;
pub mod evaluator;
pub mod fixpoint;
pub mod functions;
pub mod godel;
pub mod value;

pub use context::Context;
pub use error::{EvalError, EvalOutcome};
pub use evaluator::{Evaluator, Operator};
pub use fixpoint::{Convergence, FixpointKind, Strategy};
pub use functions::FunctionRegistry;
pub use value::Value;
