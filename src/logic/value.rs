//! Runtime values produced by the logic evaluator

use crate::document::Node;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Collection(Vec<Value>),
    /// Fields keyed by name. Keys are kept sorted, so display and
    /// serialization list them alphabetically rather than in source order.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Name of the value type, used in type mismatch messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Collection(_) => "collection",
            Value::Object(_) => "object",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of integers and floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Value]> {
        match self {
            Value::Collection(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Equality that compares integers and floats by numeric value.
    ///
    /// Collections and objects are compared element-wise with the same rule.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Collection(a), Value::Collection(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.loose_eq(vb))
            }
            _ => self == other,
        }
    }

    /// Ordering for numbers and strings; `None` for anything else
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Collection(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        match node {
            Node::Null => Value::Null,
            Node::Boolean(b) => Value::Boolean(*b),
            Node::Integer(i) => Value::Integer(*i),
            Node::Float(f) => Value::Float(*f),
            Node::String(s) => Value::String(s.clone()),
            Node::Sequence(items) => Value::Collection(items.iter().map(Value::from).collect()),
            Node::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Collection(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document;

    #[test]
    fn test_loose_equality_across_numeric_types() {
        assert!(Value::Integer(2).loose_eq(&Value::Float(2.0)));
        assert!(!Value::Integer(2).loose_eq(&Value::Float(2.5)));
        assert_ne!(Value::Integer(2), Value::Float(2.0));
        assert!(Value::from(vec![Value::Integer(1)]).loose_eq(&Value::from(vec![Value::Float(1.0)])));
    }

    #[test]
    fn test_compare_numbers_and_strings() {
        assert_eq!(Value::Integer(1).partial_compare(&Value::Float(1.5)), Some(Ordering::Less));
        assert_eq!(Value::from("b").partial_compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("1").partial_compare(&Value::Integer(1)), None);
    }

    #[test]
    fn test_from_node() {
        let node = document::parse("a: 1\nb: [x, true]\n").unwrap();
        let value = Value::from(&node);
        let fields = value.as_object().unwrap();
        assert_eq!(fields["a"], Value::Integer(1));
        assert_eq!(
            fields["b"],
            Value::Collection(vec![Value::from("x"), Value::Boolean(true)])
        );
    }

    #[test]
    fn test_display() {
        let value = Value::Collection(vec![Value::from("a.cpp"), Value::Integer(3), Value::Null]);
        assert_eq!(value.to_string(), "[a.cpp, 3, null]");
    }

    #[test]
    fn test_object_keys_sorted() {
        let node = document::parse("zeta: 1\nalpha: two\nmid: [x]\n").unwrap();
        let value = Value::from(&node);
        assert_eq!(value.to_string(), "{alpha: two, mid: [x], zeta: 1}");
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"alpha":"two","mid":["x"],"zeta":1}"#
        );
    }

    #[test]
    fn test_serialize_untagged() {
        let value = Value::Collection(vec![Value::from("x"), Value::Integer(1), Value::Null]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"["x",1,null]"#);
    }
}
