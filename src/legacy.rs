//! Datalog rule adapter
//!
//! Older rule files state their check as a Datalog clause instead of a logic
//! expression. Two clause shapes are understood:
//!
//! ```text
//! todo_violation(F) :- contains(F, "TODO").
//! header_compliant(F) :- has_extension(F, "hpp"), file_exists(F).
//! ```
//!
//! Both become an ordinary `forall` over `$discovered_files`: a `_violation`
//! clause must be false for every file, a `_compliant` clause true. The
//! result is a plain expression tree, so the evaluator never sees Datalog.

use crate::document::Node;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Collection every converted clause quantifies over
pub const DOMAIN_VARIABLE: &str = "$discovered_files";

/// Datalog predicate names and the functions they call
const PREDICATES: &[(&str, &str)] = &[
    ("contains", "contains"),
    ("file_contains", "filesystem.file_contains"),
    ("file_exists", "filesystem.file_exists"),
    ("is_directory", "filesystem.is_directory"),
    ("has_extension", "filesystem.has_extension"),
    ("extension", "filesystem.get_extension"),
    ("file_name", "filesystem.get_file_name"),
    ("starts_with", "string.starts_with"),
    ("ends_with", "string.ends_with"),
    ("matches", "string.matches"),
    ("class_count", "cpp.count_classes"),
    ("has_main", "cpp.has_main"),
    ("line_count", "cpp.get_line_count"),
];

/// `<name>_violation(F) :- body.` or `<name>_compliant(F) :- body.`
static CLAUSE_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^\s*(\w+)_(violation|compliant)\(([^)]+)\)\s*:-\s*(.+?)\.?\s*$")
});

/// `pred(args)`, optionally negated with `not` or `\+`
static ATOM_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(not\s+|\\\+\s*)?([A-Za-z_][\w.]*)\s*\((.*)\)$"));

/// Error converting a Datalog clause
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LegacyError {
    #[error("unsupported datalog rule '{0}'")]
    UnsupportedClause(String),

    #[error("datalog rule head must take a single variable, found '{0}'")]
    HeadArity(String),

    #[error("unsupported datalog atom '{0}'")]
    UnsupportedAtom(String),

    #[error("empty datalog argument")]
    EmptyArgument,

    #[error("datalog pattern: {0}")]
    Pattern(#[from] regex::Error),
}

fn pattern(
    lazy: &'static LazyLock<Result<Regex, regex::Error>>,
) -> Result<&'static Regex, LegacyError> {
    LazyLock::force(lazy)
        .as_ref()
        .map_err(|e| LegacyError::Pattern(e.clone()))
}

/// Convert one Datalog clause to a logic expression
pub fn convert(clause: &str) -> Result<Node, LegacyError> {
    let caps = pattern(&CLAUSE_PATTERN)?
        .captures(clause)
        .ok_or_else(|| LegacyError::UnsupportedClause(clause.trim().to_string()))?;

    let variable = caps[3].trim();
    if variable.contains(',') || !is_variable(variable) {
        return Err(LegacyError::HeadArity(variable.to_string()));
    }

    let atoms = split_top_level(&caps[4], ',')
        .iter()
        .map(|atom| convert_atom(atom.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    let body = conjunction(atoms);

    let condition = if &caps[2] == "violation" {
        Node::Mapping(vec![("not".to_string(), body)])
    } else {
        body
    };

    Ok(forall(variable, condition))
}

fn forall(variable: &str, condition: Node) -> Node {
    Node::Mapping(vec![(
        "forall".to_string(),
        Node::Mapping(vec![
            ("variable".to_string(), Node::String(variable.to_string())),
            ("domain".to_string(), var(DOMAIN_VARIABLE)),
            ("condition".to_string(), condition),
        ]),
    )])
}

fn conjunction(mut atoms: Vec<Node>) -> Node {
    if atoms.len() == 1 {
        atoms.remove(0)
    } else {
        Node::Mapping(vec![("and".to_string(), Node::Sequence(atoms))])
    }
}

fn convert_atom(atom: &str) -> Result<Node, LegacyError> {
    let caps = pattern(&ATOM_PATTERN)?
        .captures(atom)
        .ok_or_else(|| LegacyError::UnsupportedAtom(atom.to_string()))?;

    let predicate = &caps[2];
    let function = PREDICATES
        .iter()
        .find(|(name, _)| *name == predicate)
        .map_or(predicate, |(_, function)| *function);

    let arguments = split_top_level(&caps[3], ',')
        .iter()
        .map(|arg| convert_term(arg.trim()))
        .collect::<Result<Vec<_>, _>>()?;

    let call = Node::Mapping(vec![
        ("function".to_string(), Node::String(function.to_string())),
        ("arguments".to_string(), Node::Sequence(arguments)),
    ]);

    Ok(if caps.get(1).is_some() {
        Node::Mapping(vec![("not".to_string(), call)])
    } else {
        call
    })
}

/// Variables start with an uppercase letter; quoted text and numbers are literals
fn convert_term(term: &str) -> Result<Node, LegacyError> {
    if term.is_empty() {
        return Err(LegacyError::EmptyArgument);
    }
    if is_variable(term) {
        return Ok(var(term));
    }

    let quoted = term.len() >= 2
        && ((term.starts_with('"') && term.ends_with('"'))
            || (term.starts_with('\'') && term.ends_with('\'')));
    let literal = if quoted {
        Node::String(term[1..term.len() - 1].to_string())
    } else {
        crate::document::parse_scalar(term)
    };
    Ok(Node::Mapping(vec![("literal".to_string(), literal)]))
}

fn is_variable(term: &str) -> bool {
    term.starts_with(|c: char| c.is_ascii_uppercase())
        && term.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn var(name: &str) -> Node {
    Node::Mapping(vec![("var".to_string(), Node::String(name.to_string()))])
}

/// Split on `separator` outside of parentheses and quotes
fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, _) if c == separator && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{Context, EvalOutcome, Evaluator, Value};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_violation_clause_shape() {
        let node = convert("todo_violation(F) :- contains(F, 'TODO').").unwrap();
        let forall = node.get("forall").unwrap();
        assert_eq!(forall.get("variable"), Some(&Node::String("F".to_string())));
        assert_eq!(
            forall.get("domain").and_then(|d| d.get("var")),
            Some(&Node::String(DOMAIN_VARIABLE.to_string()))
        );
        let negated = forall.get("condition").and_then(|c| c.get("not")).unwrap();
        assert_eq!(
            negated.get("function"),
            Some(&Node::String("contains".to_string()))
        );
    }

    #[test]
    fn test_compliant_clause_conjunction() {
        let node =
            convert("header_compliant(F) :- has_extension(F, \"hpp\"), not file_exists(F).")
                .unwrap();
        let condition = node.get("forall").and_then(|f| f.get("condition")).unwrap();
        let atoms = condition.get("and").and_then(Node::as_sequence).unwrap();
        assert_eq!(atoms.len(), 2);
        assert_eq!(
            atoms[0].get("function"),
            Some(&Node::String("filesystem.has_extension".to_string()))
        );
        assert!(atoms[1].get("not").is_some());
    }

    #[test]
    fn test_converted_rule_evaluates() {
        let node = convert("todo_violation(F) :- contains(F, \"TODO\").").unwrap();
        let mut ctx = Context::new()
            .with(
                DOMAIN_VARIABLE,
                vec![Value::from("a.cpp"), Value::from("b.cpp")],
            )
            .with_file("a.cpp", "int main() {}")
            .with_file("b.cpp", "// TODO: remove");

        match Evaluator::new().evaluate(&node, &mut ctx) {
            Err(EvalOutcome::QuantifierFailures { failing, .. }) => {
                assert_eq!(failing, vec![Value::from("b.cpp")]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_shapes() {
        assert_eq!(
            convert("fact(a)."),
            Err(LegacyError::UnsupportedClause("fact(a).".to_string()))
        );
        assert_eq!(
            convert("x_violation(F, G) :- contains(F, G)."),
            Err(LegacyError::HeadArity("F, G".to_string()))
        );
        assert!(matches!(
            convert("x_violation(f) :- contains(f, 'a')."),
            Err(LegacyError::HeadArity(_))
        ));
        assert_eq!(
            convert("x_violation(F) :- ???"),
            Err(LegacyError::UnsupportedAtom("???".to_string()))
        );
        assert_eq!(
            convert("x_violation(F) :- contains(, F)."),
            Err(LegacyError::EmptyArgument)
        );
    }

    #[test]
    fn test_patterns_compile_once() {
        let first = pattern(&CLAUSE_PATTERN).unwrap();
        let second = pattern(&CLAUSE_PATTERN).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(pattern(&ATOM_PATTERN).is_ok());
    }

    #[test]
    fn test_split_respects_quotes_and_parens() {
        assert_eq!(
            split_top_level("a(F, 'x,y'), b(G)", ','),
            vec!["a(F, 'x,y')", " b(G)"]
        );
    }
}
