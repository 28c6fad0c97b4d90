//! Expression evaluator
//!
//! Interprets a document [`Node`] as a logic expression. Every compound
//! expression is a mapping identified by one key:
//!
//! ```yaml
//! forall:
//!   variable: file
//!   domain: { var: discovered_files }
//!   condition:
//!     not:
//!       function: contains
//!       arguments: [{ var: file }, "TODO"]
//! ```
//!
//! Scalars evaluate to themselves and sequences to collections.

use super::context::Context;
use super::error::{EvalError, EvalOutcome};
use super::fixpoint::{self, Convergence, FixpointKind, FixpointSpec};
use super::functions::FunctionRegistry;
use super::value::Value;
use crate::document::Node;
use std::cmp::Ordering;

/// Default nesting limit for expression evaluation
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Built-in operators, usable as `operator: name` or as a single-key shorthand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
    Implies,
    Iff,
    Equals,
    NotEquals,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Negate,
}

impl Operator {
    /// Resolve an operator name or symbol
    pub fn parse(name: &str) -> Option<Self> {
        let op = match name {
            "and" | "&&" => Operator::And,
            "or" | "||" => Operator::Or,
            "not" | "!" => Operator::Not,
            "implies" | "=>" => Operator::Implies,
            "iff" | "<=>" => Operator::Iff,
            "equals" | "==" | "=" => Operator::Equals,
            "not_equals" | "!=" => Operator::NotEquals,
            "greater" | "greater_than" | ">" => Operator::Greater,
            "greater_equal" | ">=" => Operator::GreaterEqual,
            "less" | "less_than" | "<" => Operator::Less,
            "less_equal" | "<=" => Operator::LessEqual,
            "add" | "plus" | "+" => Operator::Add,
            "subtract" | "minus" | "-" => Operator::Subtract,
            "multiply" | "*" => Operator::Multiply,
            "divide" | "/" => Operator::Divide,
            "modulo" | "%" => Operator::Modulo,
            "power" | "**" => Operator::Power,
            "negate" => Operator::Negate,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
            Operator::Implies => "implies",
            Operator::Iff => "iff",
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Greater => "greater_than",
            Operator::GreaterEqual => "greater_equal",
            Operator::Less => "less_than",
            Operator::LessEqual => "less_equal",
            Operator::Add => "add",
            Operator::Subtract => "subtract",
            Operator::Multiply => "multiply",
            Operator::Divide => "divide",
            Operator::Modulo => "modulo",
            Operator::Power => "power",
            Operator::Negate => "negate",
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Operator::Not | Operator::Negate)
    }

    fn is_logical(&self) -> bool {
        matches!(
            self,
            Operator::And | Operator::Or | Operator::Implies | Operator::Iff
        )
    }
}

/// A `forall`/`exists` expression pulled apart from its node
struct Quantifier<'a> {
    keyword: &'static str,
    variable: &'a str,
    domain: &'a Node,
    condition: &'a Node,
}

impl<'a> Quantifier<'a> {
    fn from_node(keyword: &'static str, expr: &'a Node) -> Result<Self, EvalError> {
        let head = expr.get(keyword).unwrap_or(&Node::Null);
        let (variable, fields) = match head {
            Node::Mapping(_) => (head.get("variable"), head),
            other => (Some(other), expr),
        };

        let malformed = |what: &str| {
            EvalError::MalformedExpression(format!("{} requires {}", keyword, what))
        };

        Ok(Self {
            keyword,
            variable: variable
                .and_then(Node::as_str)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| malformed("a variable name"))?,
            domain: fields.get("domain").ok_or_else(|| malformed("a domain"))?,
            condition: fields.get("condition").ok_or_else(|| malformed("a condition"))?,
        })
    }
}

/// Logic expression evaluator.
///
/// Holds no mutable state: the same expression and context always produce
/// the same result.
pub struct Evaluator {
    functions: FunctionRegistry,
    max_depth: usize,
    max_iterations: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Evaluator with the built-in function library
    pub fn new() -> Self {
        Self::with_functions(FunctionRegistry::with_builtins())
    }

    pub fn with_functions(functions: FunctionRegistry) -> Self {
        Self {
            functions,
            max_depth: DEFAULT_MAX_DEPTH,
            max_iterations: fixpoint::DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Default iteration cap for fixpoints that do not set `max_iterations`
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    /// Evaluate a rule expression.
    ///
    /// A top-level `forall` checks every element of its domain and reports
    /// all failing elements as [`EvalOutcome::QuantifierFailures`]. Nested
    /// quantifiers simply produce booleans.
    pub fn evaluate(&self, expr: &Node, ctx: &mut Context) -> Result<Value, EvalOutcome> {
        if expr.get("forall").is_some() {
            let quantifier = Quantifier::from_node("forall", expr)?;
            let failing = self.failing_elements(&quantifier, ctx, 0)?;
            if failing.is_empty() {
                return Ok(Value::Boolean(true));
            }
            return Err(EvalOutcome::QuantifierFailures {
                variable: quantifier.variable.to_string(),
                failing,
            });
        }

        Ok(self.eval(expr, ctx, 0)?)
    }

    /// Evaluate any expression to a value
    pub fn evaluate_value(&self, expr: &Node, ctx: &mut Context) -> Result<Value, EvalError> {
        self.eval(expr, ctx, 0)
    }

    /// Evaluate a `fixpoint`/`mu`/`nu` expression, keeping the iteration count
    pub fn evaluate_fixpoint(&self, expr: &Node, ctx: &mut Context) -> Result<Convergence, EvalError> {
        let kind = fixpoint_kind(expr).ok_or_else(|| {
            EvalError::MalformedExpression("expected a fixpoint, mu or nu expression".to_string())
        })?;
        self.eval_fixpoint(kind, expr, ctx, 0)
    }

    fn eval(&self, expr: &Node, ctx: &mut Context, depth: usize) -> Result<Value, EvalError> {
        if depth > self.max_depth {
            return Err(EvalError::DepthExceeded(self.max_depth));
        }

        let entries = match expr {
            Node::Mapping(entries) => entries,
            Node::Sequence(items) => {
                return items
                    .iter()
                    .map(|item| self.eval(item, ctx, depth + 1))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Collection);
            }
            scalar => return Ok(Value::from(scalar)),
        };

        if let Some(literal) = expr.get("literal") {
            return Ok(Value::from(literal));
        }

        if let Some(name) = expr.get("var") {
            let name = name.as_str().ok_or_else(|| {
                EvalError::MalformedExpression("var requires a variable name".to_string())
            })?;
            return ctx
                .lookup(name)
                .cloned()
                .ok_or_else(|| EvalError::UnboundVariable(name.to_string()));
        }

        if let Some(op) = expr.get("operator") {
            let name = op.as_str().unwrap_or_default();
            let op = Operator::parse(name)
                .ok_or_else(|| EvalError::MalformedExpression(format!("unknown operator '{}'", name)))?;
            return self.eval_operator(op, expr, ctx, depth);
        }

        if let Some(name) = expr.get("function") {
            return self.eval_function(name, expr, ctx, depth);
        }

        if let Some(condition) = expr.get("if") {
            let condition = self.eval(condition, ctx, depth + 1)?;
            let branch = match condition {
                Value::Boolean(true) => expr.get("then").ok_or_else(|| {
                    EvalError::MalformedExpression("if requires a then branch".to_string())
                })?,
                Value::Boolean(false) => match expr.get("else") {
                    Some(branch) => branch,
                    None => return Ok(Value::Null),
                },
                other => return Err(EvalError::type_mismatch("if", "boolean", &other)),
            };
            return self.eval(branch, ctx, depth + 1);
        }

        for keyword in ["forall", "exists"] {
            if expr.get(keyword).is_some() {
                let quantifier = Quantifier::from_node(keyword, expr)?;
                return self.eval_quantifier(&quantifier, ctx, depth).map(Value::Boolean);
            }
        }

        if let Some(kind) = fixpoint_kind(expr) {
            return self.eval_fixpoint(kind, expr, ctx, depth).map(|c| c.value);
        }

        if let [(key, operands)] = entries.as_slice() {
            if let Some(op) = Operator::parse(key) {
                return self.eval_shorthand(op, operands, ctx, depth);
            }
        }

        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        Err(EvalError::MalformedExpression(format!(
            "unrecognized expression with keys [{}]",
            keys.join(", ")
        )))
    }

    fn eval_operator(
        &self,
        op: Operator,
        expr: &Node,
        ctx: &mut Context,
        depth: usize,
    ) -> Result<Value, EvalError> {
        let operand = |key: &str| {
            expr.get(key).ok_or_else(|| {
                EvalError::MalformedExpression(format!("operator {} requires '{}'", op.name(), key))
            })
        };

        if op.is_unary() {
            let operand = expr.get("operand").map_or_else(|| operand("left"), Ok)?;
            let value = self.eval(operand, ctx, depth + 1)?;
            return unary(op, &value);
        }

        let left = operand("left")?;
        let right = operand("right")?;
        self.eval_binary(op, left, right, ctx, depth)
    }

    /// `{and: [a, b, c]}`, `{not: a}`, `{add: [1, 2]}`
    fn eval_shorthand(
        &self,
        op: Operator,
        operands: &Node,
        ctx: &mut Context,
        depth: usize,
    ) -> Result<Value, EvalError> {
        if op.is_unary() {
            let value = self.eval(operands, ctx, depth + 1)?;
            return unary(op, &value);
        }

        let items = operands.as_sequence().unwrap_or_default();
        match (op, items) {
            (Operator::And | Operator::Or, items) if !items.is_empty() => {
                let stop_on = op == Operator::Or;
                for item in items {
                    let value = self.eval(item, ctx, depth + 1)?;
                    if expect_bool(op.name(), &value)? == stop_on {
                        return Ok(Value::Boolean(stop_on));
                    }
                }
                Ok(Value::Boolean(!stop_on))
            }
            (_, [left, right]) => self.eval_binary(op, left, right, ctx, depth),
            _ => Err(EvalError::MalformedExpression(format!(
                "{} expects a list of two operands",
                op.name()
            ))),
        }
    }

    fn eval_binary(
        &self,
        op: Operator,
        left: &Node,
        right: &Node,
        ctx: &mut Context,
        depth: usize,
    ) -> Result<Value, EvalError> {
        if op.is_logical() {
            let l = expect_bool(op.name(), &self.eval(left, ctx, depth + 1)?)?;
            let short_circuit = match op {
                Operator::And if !l => Some(false),
                Operator::Or if l => Some(true),
                Operator::Implies if !l => Some(true),
                _ => None,
            };
            if let Some(result) = short_circuit {
                return Ok(Value::Boolean(result));
            }

            let r = expect_bool(op.name(), &self.eval(right, ctx, depth + 1)?)?;
            let result = match op {
                Operator::Iff => l == r,
                _ => r,
            };
            return Ok(Value::Boolean(result));
        }

        let l = self.eval(left, ctx, depth + 1)?;
        let r = self.eval(right, ctx, depth + 1)?;
        apply_binary(op, &l, &r)
    }

    fn eval_function(
        &self,
        name: &Node,
        expr: &Node,
        ctx: &mut Context,
        depth: usize,
    ) -> Result<Value, EvalError> {
        let name = name.as_str().ok_or_else(|| {
            EvalError::MalformedExpression("function requires a name".to_string())
        })?;

        let args = match expr.get("arguments").or_else(|| expr.get("args")) {
            None => Vec::new(),
            Some(Node::Sequence(items)) => items
                .iter()
                .map(|item| self.eval(item, ctx, depth + 1))
                .collect::<Result<Vec<_>, _>>()?,
            Some(single) => vec![self.eval(single, ctx, depth + 1)?],
        };

        self.functions.call(name, &args, ctx)
    }

    fn eval_quantifier(
        &self,
        quantifier: &Quantifier<'_>,
        ctx: &mut Context,
        depth: usize,
    ) -> Result<bool, EvalError> {
        let universal = quantifier.keyword == "forall";
        for element in self.domain(quantifier, ctx, depth)? {
            if self.holds(quantifier, element, ctx, depth)? != universal {
                return Ok(!universal);
            }
        }
        Ok(universal)
    }

    fn failing_elements(
        &self,
        quantifier: &Quantifier<'_>,
        ctx: &mut Context,
        depth: usize,
    ) -> Result<Vec<Value>, EvalError> {
        let mut failing = Vec::new();
        for element in self.domain(quantifier, ctx, depth)? {
            if !self.holds(quantifier, element.clone(), ctx, depth)? {
                failing.push(element);
            }
        }
        Ok(failing)
    }

    fn domain(
        &self,
        quantifier: &Quantifier<'_>,
        ctx: &mut Context,
        depth: usize,
    ) -> Result<Vec<Value>, EvalError> {
        match self.eval(quantifier.domain, ctx, depth + 1)? {
            Value::Collection(items) => Ok(items),
            other => Err(EvalError::type_mismatch(
                &format!("{} domain", quantifier.keyword),
                "collection",
                &other,
            )),
        }
    }

    /// Evaluate the condition with the bound variable in a fresh scope
    fn holds(
        &self,
        quantifier: &Quantifier<'_>,
        element: Value,
        ctx: &mut Context,
        depth: usize,
    ) -> Result<bool, EvalError> {
        ctx.push_scope();
        ctx.bind(quantifier.variable, element);
        let result = self.eval(quantifier.condition, ctx, depth + 1);
        ctx.pop_scope();
        expect_bool(quantifier.keyword, &result?)
    }

    fn eval_fixpoint(
        &self,
        kind: FixpointKind,
        expr: &Node,
        ctx: &mut Context,
        depth: usize,
    ) -> Result<Convergence, EvalError> {
        let spec = FixpointSpec::from_node(kind, expr, self.max_iterations)?;
        let seed = match spec.initial {
            Some(initial) => self.eval(initial, ctx, depth + 1)?,
            None => kind.default_seed(),
        };

        fixpoint::iterate(
            spec.strategy,
            spec.max_iterations,
            spec.tolerance,
            seed,
            |current, iteration| {
                ctx.push_scope();
                ctx.bind(&spec.variable, current.clone());
                ctx.bind("__iteration", iteration as i64);
                let next = self.eval(spec.body, ctx, depth + 1);
                ctx.pop_scope();
                next
            },
        )
    }
}

fn fixpoint_kind(expr: &Node) -> Option<FixpointKind> {
    [FixpointKind::Plain, FixpointKind::Least, FixpointKind::Greatest]
        .into_iter()
        .find(|kind| expr.get(kind.keyword()).is_some())
}

fn expect_bool(operation: &str, value: &Value) -> Result<bool, EvalError> {
    value
        .as_bool()
        .ok_or_else(|| EvalError::type_mismatch(operation, "boolean", value))
}

fn unary(op: Operator, value: &Value) -> Result<Value, EvalError> {
    match (op, value) {
        (Operator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (Operator::Negate, Value::Integer(i)) => i
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| EvalError::ArithmeticOverflow(op.name().to_string())),
        (Operator::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (Operator::Not, other) => Err(EvalError::type_mismatch("not", "boolean", other)),
        (_, other) => Err(EvalError::type_mismatch(op.name(), "number", other)),
    }
}

/// Apply a non-logical binary operator to evaluated operands
pub fn apply_binary(op: Operator, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let ordering = |l: &Value, r: &Value| {
        l.partial_compare(r).ok_or_else(|| EvalError::TypeMismatch {
            operation: op.name().to_string(),
            expected: "two numbers or two strings".to_string(),
            found: format!("{} and {}", l.type_name(), r.type_name()),
        })
    };

    let result = match op {
        Operator::Equals => Value::Boolean(left.loose_eq(right)),
        Operator::NotEquals => Value::Boolean(!left.loose_eq(right)),
        Operator::Greater => Value::Boolean(ordering(left, right)? == Ordering::Greater),
        Operator::GreaterEqual => Value::Boolean(ordering(left, right)? != Ordering::Less),
        Operator::Less => Value::Boolean(ordering(left, right)? == Ordering::Less),
        Operator::LessEqual => Value::Boolean(ordering(left, right)? != Ordering::Greater),
        Operator::Add
        | Operator::Subtract
        | Operator::Multiply
        | Operator::Divide
        | Operator::Modulo
        | Operator::Power => arithmetic(op, left, right)?,
        _ => {
            return Err(EvalError::MalformedExpression(format!(
                "{} is not a value operator",
                op.name()
            )))
        }
    };
    Ok(result)
}

fn arithmetic(op: Operator, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let overflow = || EvalError::ArithmeticOverflow(op.name().to_string());

    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        let (a, b) = (*a, *b);
        return match op {
            Operator::Add => a.checked_add(b).map(Value::Integer).ok_or_else(overflow),
            Operator::Subtract => a.checked_sub(b).map(Value::Integer).ok_or_else(overflow),
            Operator::Multiply => a.checked_mul(b).map(Value::Integer).ok_or_else(overflow),
            Operator::Divide if b == 0 => Err(EvalError::DivisionByZero),
            Operator::Divide => Ok(Value::Float(a as f64 / b as f64)),
            Operator::Modulo if b == 0 => Err(EvalError::DivisionByZero),
            Operator::Modulo => a.checked_rem(b).map(Value::Integer).ok_or_else(overflow),
            _ => integer_power(a, b),
        };
    }

    let x = left
        .as_f64()
        .ok_or_else(|| EvalError::type_mismatch(op.name(), "number", left))?;
    let y = right
        .as_f64()
        .ok_or_else(|| EvalError::type_mismatch(op.name(), "number", right))?;

    let result = match op {
        Operator::Add => x + y,
        Operator::Subtract => x - y,
        Operator::Multiply => x * y,
        Operator::Divide | Operator::Modulo if y == 0.0 => return Err(EvalError::DivisionByZero),
        Operator::Divide => x / y,
        Operator::Modulo => x % y,
        _ if y < 0.0 => {
            return Err(EvalError::invalid_argument(
                "power",
                "exponent must be non-negative",
            ))
        }
        _ => x.powf(y),
    };
    Ok(Value::Float(result))
}

/// Integer exponentiation with a non-negative exponent
pub fn integer_power(base: i64, exponent: i64) -> Result<Value, EvalError> {
    if exponent < 0 {
        return Err(EvalError::invalid_argument(
            "power",
            "exponent must be non-negative",
        ));
    }
    u32::try_from(exponent)
        .ok()
        .and_then(|e| base.checked_pow(e))
        .map(Value::Integer)
        .ok_or_else(|| EvalError::ArithmeticOverflow("power".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document;
    use pretty_assertions::assert_eq;

    fn eval(text: &str, ctx: &mut Context) -> Result<Value, EvalError> {
        Evaluator::new().evaluate_value(&document::parse(text).unwrap(), ctx)
    }

    fn eval_empty(text: &str) -> Result<Value, EvalError> {
        eval(text, &mut Context::new())
    }

    #[test]
    fn test_literal_and_var() {
        let mut ctx = Context::new().with("x", 5);
        assert_eq!(eval("literal: 42\n", &mut ctx).unwrap(), Value::Integer(42));
        assert_eq!(eval("var: x\n", &mut ctx).unwrap(), Value::Integer(5));
        assert_eq!(eval("var: $x\n", &mut ctx).unwrap(), Value::Integer(5));
        assert_eq!(
            eval("var: missing\n", &mut ctx).unwrap_err(),
            EvalError::UnboundVariable("missing".to_string())
        );
    }

    #[test]
    fn test_bare_scalars_and_sequences() {
        assert_eq!(eval_empty("hello").unwrap(), Value::from("hello"));
        assert_eq!(
            eval_empty("- 1\n- var: y\n").unwrap_err(),
            EvalError::UnboundVariable("y".to_string())
        );
        assert_eq!(
            eval_empty("- 1\n- two\n").unwrap(),
            Value::Collection(vec![Value::Integer(1), Value::from("two")])
        );
    }

    #[test]
    fn test_arithmetic_operators() {
        assert_eq!(
            eval_empty("operator: add\nleft: 2\nright: 3\n").unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            eval_empty("operator: \"*\"\nleft: 2\nright: 1.5\n").unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            eval_empty("operator: divide\nleft: 7\nright: 2\n").unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(
            eval_empty("operator: \"%\"\nleft: 7\nright: 2\n").unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            eval_empty("operator: power\nleft: 2\nright: 10\n").unwrap(),
            Value::Integer(1024)
        );
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(
            eval_empty("operator: divide\nleft: 1\nright: 0\n").unwrap_err(),
            EvalError::DivisionByZero
        );
        assert_eq!(
            eval_empty("operator: modulo\nleft: 1\nright: 0\n").unwrap_err(),
            EvalError::DivisionByZero
        );
        assert!(matches!(
            eval_empty("operator: power\nleft: 2\nright: -1\n").unwrap_err(),
            EvalError::InvalidArgument { .. }
        ));
        assert!(matches!(
            eval_empty("operator: multiply\nleft: 9223372036854775807\nright: 2\n").unwrap_err(),
            EvalError::ArithmeticOverflow(_)
        ));
        assert!(matches!(
            eval_empty("operator: add\nleft: 1\nright: x\n").unwrap_err(),
            EvalError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            eval_empty("operator: greater_than\nleft: 3\nright: 2.5\n").unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            eval_empty("operator: \"<=\"\nleft: abc\nright: abd\n").unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            eval_empty("operator: equals\nleft: 1\nright: 1.0\n").unwrap(),
            Value::Boolean(true)
        );
        assert!(matches!(
            eval_empty("operator: less_than\nleft: 1\nright: abc\n").unwrap_err(),
            EvalError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_boolean_operators_are_strict() {
        assert_eq!(
            eval_empty("operator: and\nleft: true\nright: false\n").unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            eval_empty("operator: implies\nleft: false\nright: 1\n").unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            eval_empty("operator: not\noperand: false\n").unwrap(),
            Value::Boolean(true)
        );
        assert!(matches!(
            eval_empty("operator: or\nleft: 1\nright: true\n").unwrap_err(),
            EvalError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_shorthand_operators() {
        assert_eq!(eval_empty("and: [true, true, false]\n").unwrap(), Value::Boolean(false));
        assert_eq!(eval_empty("or: [false, true]\n").unwrap(), Value::Boolean(true));
        assert_eq!(eval_empty("not: false\n").unwrap(), Value::Boolean(true));
        assert_eq!(eval_empty("add: [1, 2]\n").unwrap(), Value::Integer(3));
        assert!(matches!(
            eval_empty("add: [1]\n").unwrap_err(),
            EvalError::MalformedExpression(_)
        ));
    }

    #[test]
    fn test_if_expression() {
        let text = "if:\n  operator: less_than\n  left: {var: x}\n  right: 10\nthen: small\nelse: large\n";
        assert_eq!(eval(text, &mut Context::new().with("x", 3)).unwrap(), Value::from("small"));
        assert_eq!(eval(text, &mut Context::new().with("x", 30)).unwrap(), Value::from("large"));
        assert!(matches!(
            eval_empty("if: 1\nthen: a\nelse: b\n").unwrap_err(),
            EvalError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            eval_empty("function: math.multiply\narguments: [6, 7]\n").unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            eval_empty("function: no.such\narguments: []\n").unwrap_err(),
            EvalError::UnknownFunction("no.such".to_string())
        );
    }

    #[test]
    fn test_empty_domain_quantifiers() {
        let mut ctx = Context::new().with("empty", Value::Collection(vec![]));
        let forall = "forall:\n  variable: v\n  domain: {var: empty}\n  condition: false\n";
        let exists = "exists:\n  variable: v\n  domain: {var: empty}\n  condition: true\n";
        assert_eq!(eval(forall, &mut ctx).unwrap(), Value::Boolean(true));
        assert_eq!(eval(exists, &mut ctx).unwrap(), Value::Boolean(false));

        let evaluator = Evaluator::new();
        let node = document::parse(forall).unwrap();
        assert_eq!(evaluator.evaluate(&node, &mut ctx), Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_quantifier_flat_form() {
        let text = "exists: n\ndomain: [1, 2, 3]\ncondition:\n  operator: equals\n  left: {var: n}\n  right: 2\n";
        assert_eq!(eval_empty(text).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_forall_reports_every_failing_element() {
        let text = "\
forall:
  variable: n
  domain: [1, 2, 3, 4]
  condition:
    operator: less_than
    left: {var: n}
    right: 3
";
        let node = document::parse(text).unwrap();
        let outcome = Evaluator::new().evaluate(&node, &mut Context::new()).unwrap_err();
        assert_eq!(
            outcome,
            EvalOutcome::QuantifierFailures {
                variable: "n".to_string(),
                failing: vec![Value::Integer(3), Value::Integer(4)],
            }
        );
    }

    #[test]
    fn test_nested_forall_is_boolean() {
        let text = "\
not:
  forall:
    variable: n
    domain: [1, 2]
    condition:
      operator: equals
      left: {var: n}
      right: 1
";
        let node = document::parse(text).unwrap();
        assert_eq!(
            Evaluator::new().evaluate(&node, &mut Context::new()),
            Ok(Value::Boolean(true))
        );
    }

    #[test]
    fn test_quantifier_scope_restored() {
        let mut ctx = Context::new().with("n", "outer");
        let text = "exists:\n  variable: n\n  domain: [1]\n  condition: true\n";
        eval(text, &mut ctx).unwrap();
        assert_eq!(ctx.lookup("n"), Some(&Value::from("outer")));
        assert_eq!(ctx.scope_depth(), 1);
    }

    #[test]
    fn test_quantifier_domain_must_be_collection() {
        assert!(matches!(
            eval_empty("forall:\n  variable: v\n  domain: 3\n  condition: true\n").unwrap_err(),
            EvalError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_fixpoint_counts_iterations() {
        let text = "\
fixpoint:
  variable: x
  initial: 0
  strategy: exact
  expression:
    if: {operator: less_than, left: {var: x}, right: 10}
    then: {operator: add, left: {var: x}, right: 1}
    else: {var: x}
";
        let node = document::parse(text).unwrap();
        let convergence = Evaluator::new()
            .evaluate_fixpoint(&node, &mut Context::new())
            .unwrap();
        assert_eq!(convergence.value, Value::Integer(10));
        assert_eq!(convergence.iterations, 10);
    }

    #[test]
    fn test_fixpoint_oscillation_is_divergence() {
        let text = "\
fixpoint:
  variable: x
  initial: 0
  strategy: exact
  expression: {operator: subtract, left: 1, right: {var: x}}
";
        match eval_empty(text).unwrap_err() {
            EvalError::FixpointDivergence { oscillation, .. } => assert!(oscillation),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_mu_and_nu_seeds() {
        assert_eq!(eval_empty("mu: x\nexpression: {var: x}\n").unwrap(), Value::Boolean(false));
        assert_eq!(eval_empty("nu: x\nexpression: {var: x}\n").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_fixpoint_binds_iteration() {
        let text = "\
fixpoint: x
initial: -1
max_iterations: 20
expression:
  if: {operator: less_than, left: {var: __iteration}, right: 5}
  then: {var: __iteration}
  else: {var: x}
";
        assert_eq!(eval_empty(text).unwrap(), Value::Integer(4));
    }

    #[test]
    fn test_depth_limit() {
        let evaluator = Evaluator::new().with_max_depth(3);
        let node = document::parse("not:\n  not:\n    not:\n      not: true\n").unwrap();
        assert_eq!(
            evaluator.evaluate_value(&node, &mut Context::new()),
            Err(EvalError::DepthExceeded(3))
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let text = "\
forall:
  variable: n
  domain: {var: items}
  condition: {operator: greater_than, left: {var: n}, right: 1}
";
        let node = document::parse(text).unwrap();
        let evaluator = Evaluator::new();
        let mut ctx = Context::new().with(
            "items",
            Value::Collection(vec![Value::Integer(1), Value::Integer(2)]),
        );
        let first = evaluator.evaluate(&node, &mut ctx);
        let second = evaluator.evaluate(&node, &mut ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unrecognized_expression() {
        assert!(matches!(
            eval_empty("foo: 1\nbar: 2\n").unwrap_err(),
            EvalError::MalformedExpression(_)
        ));
    }
}
