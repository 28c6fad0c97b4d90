//! Function registry and built-in library
//!
//! Functions are looked up by fully qualified name (`math.add`,
//! `filesystem.read_file`, ...) and receive already evaluated arguments plus
//! read access to the context. Filesystem functions resolve relative paths
//! against `$target_path` and prefer the context's in-memory file contents.

use super::context::Context;
use super::error::EvalError;
use super::evaluator::{apply_binary, integer_power, Operator};
use super::godel;
use super::value::Value;
use crate::patterns::{IgnorePattern, IgnoreSet};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

/// Largest collection `test.mock_collection` will build
pub const MOCK_COLLECTION_LIMIT: i64 = 10_000;

/// Signature of a callable function
pub type Function = dyn Fn(&[Value], &Context) -> Result<Value, EvalError> + Send + Sync;

/// Named functions available to expressions
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<Function>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

impl FunctionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the full built-in library
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_math(&mut registry);
        register_peano(&mut registry);
        register_string(&mut registry);
        register_collection(&mut registry);
        register_filesystem(&mut registry);
        register_cpp(&mut registry);
        register_object(&mut registry);
        register_gitignore(&mut registry);
        register_godel(&mut registry);
        register_test(&mut registry);
        registry
    }

    /// Register or replace a function
    pub fn register<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[Value], &Context) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn call(&self, name: &str, args: &[Value], ctx: &Context) -> Result<Value, EvalError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        function(args, ctx)
    }
}

// Argument helpers

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<(), EvalError> {
    if args.len() != count {
        return Err(EvalError::invalid_argument(
            name,
            format!("expected {} argument(s), got {}", count, args.len()),
        ));
    }
    Ok(())
}

fn arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a Value, EvalError> {
    args.get(index).ok_or_else(|| {
        EvalError::invalid_argument(name, format!("missing argument {}", index + 1))
    })
}

fn str_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a str, EvalError> {
    let value = arg(name, args, index)?;
    value
        .as_str()
        .ok_or_else(|| EvalError::type_mismatch(name, "string", value))
}

fn int_arg(name: &str, args: &[Value], index: usize) -> Result<i64, EvalError> {
    let value = arg(name, args, index)?;
    value
        .as_i64()
        .ok_or_else(|| EvalError::type_mismatch(name, "integer", value))
}

fn collection_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a [Value], EvalError> {
    let value = arg(name, args, index)?;
    value
        .as_collection()
        .ok_or_else(|| EvalError::type_mismatch(name, "collection", value))
}

fn binary(name: &'static str, op: Operator) -> impl Fn(&[Value], &Context) -> Result<Value, EvalError> {
    move |args: &[Value], _: &Context| {
        expect_args(name, args, 2)?;
        apply_binary(op, &args[0], &args[1])
    }
}

fn register_math(registry: &mut FunctionRegistry) {
    registry.register("math.add", binary("math.add", Operator::Add));
    registry.register("math.subtract", binary("math.subtract", Operator::Subtract));
    registry.register("math.multiply", binary("math.multiply", Operator::Multiply));
    registry.register("math.modulo", binary("math.modulo", Operator::Modulo));

    // Integer division when both sides are integers
    registry.register("math.divide", |args, _| {
        expect_args("math.divide", args, 2)?;
        match (&args[0], &args[1]) {
            (Value::Integer(_), Value::Integer(0)) => Err(EvalError::DivisionByZero),
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_div(*b)
                .map(Value::Integer)
                .ok_or_else(|| EvalError::ArithmeticOverflow("math.divide".to_string())),
            (a, b) => apply_binary(Operator::Divide, a, b),
        }
    });

    registry.register("math.power", |args, _| {
        expect_args("math.power", args, 2)?;
        match (&args[0], &args[1]) {
            (Value::Integer(base), Value::Integer(exp)) => integer_power(*base, *exp),
            (a, b) => apply_binary(Operator::Power, a, b),
        }
    });

    registry.register("math.abs", |args, _| {
        expect_args("math.abs", args, 1)?;
        match &args[0] {
            Value::Integer(i) => i
                .checked_abs()
                .map(Value::Integer)
                .ok_or_else(|| EvalError::ArithmeticOverflow("math.abs".to_string())),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(EvalError::type_mismatch("math.abs", "number", other)),
        }
    });

    registry.register("math.min", |args, _| extremum("math.min", args, std::cmp::Ordering::Less));
    registry.register("math.max", |args, _| extremum("math.max", args, std::cmp::Ordering::Greater));
}

/// Smallest or largest of the arguments, or of a single collection argument
fn extremum(name: &str, args: &[Value], keep: std::cmp::Ordering) -> Result<Value, EvalError> {
    let items = match args {
        [Value::Collection(items)] => items.as_slice(),
        _ => args,
    };

    let mut best: Option<&Value> = None;
    for item in items {
        if !item.is_numeric() {
            return Err(EvalError::type_mismatch(name, "number", item));
        }
        best = match best {
            Some(current) if item.partial_compare(current) != Some(keep) => Some(current),
            _ => Some(item),
        };
    }
    best.cloned()
        .ok_or_else(|| EvalError::invalid_argument(name, "expected at least one number"))
}

fn register_peano(registry: &mut FunctionRegistry) {
    registry.register("peano.successor", |args, _| {
        expect_args("peano.successor", args, 1)?;
        let n = int_arg("peano.successor", args, 0)?;
        n.checked_add(1)
            .map(Value::Integer)
            .ok_or_else(|| EvalError::ArithmeticOverflow("peano.successor".to_string()))
    });

    // The predecessor of zero is zero
    registry.register("peano.predecessor", |args, _| {
        expect_args("peano.predecessor", args, 1)?;
        let n = int_arg("peano.predecessor", args, 0)?;
        Ok(Value::Integer(if n > 0 { n - 1 } else { 0 }))
    });

    registry.register("peano.is_zero", |args, _| {
        expect_args("peano.is_zero", args, 1)?;
        Ok(Value::Boolean(int_arg("peano.is_zero", args, 0)? == 0))
    });
}

fn register_string(registry: &mut FunctionRegistry) {
    registry.register("string.length", |args, _| {
        expect_args("string.length", args, 1)?;
        let s = str_arg("string.length", args, 0)?;
        Ok(Value::Integer(s.chars().count() as i64))
    });

    registry.register("string.concat", |args, _| {
        Ok(Value::String(args.iter().map(Value::to_string).collect()))
    });

    registry.register("string.contains", |args, _| {
        expect_args("string.contains", args, 2)?;
        let haystack = str_arg("string.contains", args, 0)?;
        let needle = str_arg("string.contains", args, 1)?;
        Ok(Value::Boolean(haystack.contains(needle)))
    });

    registry.register("string.starts_with", |args, _| {
        expect_args("string.starts_with", args, 2)?;
        let s = str_arg("string.starts_with", args, 0)?;
        Ok(Value::Boolean(s.starts_with(str_arg("string.starts_with", args, 1)?)))
    });

    registry.register("string.ends_with", |args, _| {
        expect_args("string.ends_with", args, 2)?;
        let s = str_arg("string.ends_with", args, 0)?;
        Ok(Value::Boolean(s.ends_with(str_arg("string.ends_with", args, 1)?)))
    });

    registry.register("string.to_lower", |args, _| {
        expect_args("string.to_lower", args, 1)?;
        Ok(Value::String(str_arg("string.to_lower", args, 0)?.to_lowercase()))
    });

    registry.register("string.to_upper", |args, _| {
        expect_args("string.to_upper", args, 1)?;
        Ok(Value::String(str_arg("string.to_upper", args, 0)?.to_uppercase()))
    });

    // Lowercase, with underscores turned into dashes
    registry.register("string.normalize", |args, _| {
        expect_args("string.normalize", args, 1)?;
        let s = str_arg("string.normalize", args, 0)?;
        Ok(Value::String(s.to_lowercase().replace('_', "-")))
    });

    registry.register("string.matches", |args, _| {
        expect_args("string.matches", args, 2)?;
        let s = str_arg("string.matches", args, 0)?;
        let pattern = str_arg("string.matches", args, 1)?;
        let regex = Regex::new(pattern)
            .map_err(|e| EvalError::invalid_argument("string.matches", e.to_string()))?;
        Ok(Value::Boolean(regex.is_match(s)))
    });

    // Membership for collections, file content for known files, substring otherwise
    registry.register("contains", |args, ctx| {
        expect_args("contains", args, 2)?;
        match (&args[0], &args[1]) {
            (Value::Collection(items), needle) => {
                Ok(Value::Boolean(items.iter().any(|item| item.loose_eq(needle))))
            }
            (Value::String(subject), Value::String(needle)) => {
                let content = ctx.file_content(subject).map(str::to_string).or_else(|| {
                    let path = ctx.resolve_path(subject);
                    path.is_file()
                        .then(|| std::fs::read_to_string(&path).ok())
                        .flatten()
                });
                let text = content.as_deref().unwrap_or(subject);
                Ok(Value::Boolean(text.contains(needle.as_str())))
            }
            (subject, _) => Err(EvalError::type_mismatch("contains", "string or collection", subject)),
        }
    });
}

fn register_collection(registry: &mut FunctionRegistry) {
    registry.register("collection.count", |args, _| {
        expect_args("collection.count", args, 1)?;
        Ok(Value::Integer(collection_arg("collection.count", args, 0)?.len() as i64))
    });

    registry.register("collection.contains", |args, _| {
        expect_args("collection.contains", args, 2)?;
        let items = collection_arg("collection.contains", args, 0)?;
        Ok(Value::Boolean(items.iter().any(|item| item.loose_eq(&args[1]))))
    });

    registry.register("collection.is_empty", |args, _| {
        expect_args("collection.is_empty", args, 1)?;
        Ok(Value::Boolean(collection_arg("collection.is_empty", args, 0)?.is_empty()))
    });

    registry.register("collection.first", |args, _| {
        expect_args("collection.first", args, 1)?;
        let items = collection_arg("collection.first", args, 0)?;
        Ok(items.first().cloned().unwrap_or_default())
    });

    registry.register("collection.last", |args, _| {
        expect_args("collection.last", args, 1)?;
        let items = collection_arg("collection.last", args, 0)?;
        Ok(items.last().cloned().unwrap_or_default())
    });
}

/// File content from the context overlay or disk
fn read_file(path: &str, ctx: &Context) -> Result<String, EvalError> {
    if let Some(content) = ctx.file_content(path) {
        return Ok(content.to_string());
    }
    let resolved = ctx.resolve_path(path);
    std::fs::read_to_string(&resolved).map_err(|e| EvalError::Io {
        path: resolved.display().to_string(),
        message: e.to_string(),
    })
}

fn register_filesystem(registry: &mut FunctionRegistry) {
    registry.register("filesystem.read_file", |args, ctx| {
        expect_args("filesystem.read_file", args, 1)?;
        let path = str_arg("filesystem.read_file", args, 0)?;
        read_file(path, ctx).map(Value::String)
    });

    registry.register("filesystem.file_contains", |args, ctx| {
        expect_args("filesystem.file_contains", args, 2)?;
        let path = str_arg("filesystem.file_contains", args, 0)?;
        let needle = str_arg("filesystem.file_contains", args, 1)?;
        let content = read_file(path, ctx)?;
        Ok(Value::Boolean(content.contains(needle)))
    });

    registry.register("filesystem.file_exists", |args, ctx| {
        expect_args("filesystem.file_exists", args, 1)?;
        let path = str_arg("filesystem.file_exists", args, 0)?;
        let exists = ctx.file_content(path).is_some() || ctx.resolve_path(path).is_file();
        Ok(Value::Boolean(exists))
    });

    registry.register("filesystem.is_directory", |args, ctx| {
        expect_args("filesystem.is_directory", args, 1)?;
        let path = str_arg("filesystem.is_directory", args, 0)?;
        Ok(Value::Boolean(ctx.resolve_path(path).is_dir()))
    });

    registry.register("filesystem.get_file_name", |args, _| {
        expect_args("filesystem.get_file_name", args, 1)?;
        let path = str_arg("filesystem.get_file_name", args, 0)?;
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Value::String(name))
    });

    // Extension without the leading dot, empty when absent
    registry.register("filesystem.get_extension", |args, _| {
        expect_args("filesystem.get_extension", args, 1)?;
        let path = str_arg("filesystem.get_extension", args, 0)?;
        let ext = Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Value::String(ext))
    });

    registry.register("filesystem.has_extension", |args, _| {
        expect_args("filesystem.has_extension", args, 2)?;
        let path = str_arg("filesystem.has_extension", args, 0)?;
        let wanted = str_arg("filesystem.has_extension", args, 1)?;
        let wanted = wanted.strip_prefix('.').unwrap_or(wanted);
        let matches = Path::new(path)
            .extension()
            .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(wanted));
        Ok(Value::Boolean(matches))
    });

    // Files under a directory, relative to `$target_path` when possible
    registry.register("filesystem.get_files", |args, ctx| {
        expect_args("filesystem.get_files", args, 1)?;
        let dir = ctx.resolve_path(str_arg("filesystem.get_files", args, 0)?);
        let root = ctx.target_path();

        let mut files: Vec<String> = WalkDir::new(&dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let path = e.path();
                root.as_deref()
                    .and_then(|r| path.strip_prefix(r).ok())
                    .unwrap_or(path)
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        Ok(Value::Collection(files.into_iter().map(Value::String).collect()))
    });
}

fn register_cpp(registry: &mut FunctionRegistry) {
    // Class and struct definitions, forward declarations excluded
    registry.register("cpp.count_classes", |args, _| {
        expect_args("cpp.count_classes", args, 1)?;
        let content = str_arg("cpp.count_classes", args, 0)?;
        Ok(Value::Integer(count_class_declarations(content) as i64))
    });

    registry.register("cpp.has_main", |args, _| {
        expect_args("cpp.has_main", args, 1)?;
        let content = str_arg("cpp.has_main", args, 0)?;
        let has_main = content
            .lines()
            .any(|line| line.contains("int main(") || line.contains("int main ("));
        Ok(Value::Boolean(has_main))
    });

    registry.register("cpp.get_line_count", |args, _| {
        expect_args("cpp.get_line_count", args, 1)?;
        let content = str_arg("cpp.get_line_count", args, 0)?;
        Ok(Value::Integer(content.lines().count() as i64))
    });
}

/// Lines that open a class or struct definition
pub fn count_class_declarations(content: &str) -> usize {
    class_declaration_lines(content).count()
}

/// 1-based numbers of lines opening a class or struct; forward declarations are skipped
pub fn class_declaration_lines(content: &str) -> impl Iterator<Item = usize> + '_ {
    content.lines().enumerate().filter_map(|(i, line)| {
        let line = line.trim();
        let opens = line.starts_with("class ") || line.starts_with("struct ");
        let forward = line.ends_with(';') && !line.contains('{');
        (opens && !forward).then_some(i + 1)
    })
}

fn register_object(registry: &mut FunctionRegistry) {
    let has_field = |args: &[Value], _: &Context| {
        expect_args("object.has_field", args, 2)?;
        let field = str_arg("object.has_field", args, 1)?;
        match &args[0] {
            Value::Object(fields) => Ok(Value::Boolean(fields.contains_key(field))),
            other => Err(EvalError::type_mismatch("object.has_field", "object", other)),
        }
    };
    let get_field = |args: &[Value], _: &Context| {
        expect_args("object.get_field", args, 2)?;
        let field = str_arg("object.get_field", args, 1)?;
        match &args[0] {
            Value::Object(fields) => Ok(fields.get(field).cloned().unwrap_or_default()),
            other => Err(EvalError::type_mismatch("object.get_field", "object", other)),
        }
    };

    registry.register("object.has_field", has_field);
    registry.register("has_field", has_field);
    registry.register("object.get_field", get_field);
    registry.register("get_field", get_field);
}

fn register_gitignore(registry: &mut FunctionRegistry) {
    registry.register("gitignore.match_pattern", |args, _| {
        expect_args("gitignore.match_pattern", args, 2)?;
        let path = str_arg("gitignore.match_pattern", args, 0)?;
        let pattern = str_arg("gitignore.match_pattern", args, 1)?;
        let matched = IgnorePattern::parse(pattern).is_some_and(|p| p.matches(path));
        Ok(Value::Boolean(matched))
    });

    registry.register("gitignore.parse_patterns", |args, _| {
        expect_args("gitignore.parse_patterns", args, 1)?;
        let text = str_arg("gitignore.parse_patterns", args, 0)?;
        let patterns = IgnoreSet::parse(text)
            .patterns()
            .iter()
            .map(|p| Value::String(p.to_string()))
            .collect();
        Ok(Value::Collection(patterns))
    });
}

fn register_godel(registry: &mut FunctionRegistry) {
    registry.register("godel.symbol_code", |args, _| {
        expect_args("godel.symbol_code", args, 1)?;
        let symbol = str_arg("godel.symbol_code", args, 0)?;
        godel::symbol_code(symbol)
            .map(|code| Value::Integer(code as i64))
            .ok_or_else(|| {
                EvalError::invalid_argument("godel.symbol_code", format!("unknown symbol '{}'", symbol))
            })
    });

    registry.register("godel.encode_formula", |args, _| {
        expect_args("godel.encode_formula", args, 1)?;
        let formula = str_arg("godel.encode_formula", args, 0)?;
        godel::encode_formula(formula)
            .map(Value::String)
            .map_err(|message| EvalError::invalid_argument("godel.encode_formula", message))
    });

    registry.register("godel.encode_sequence", |args, _| {
        expect_args("godel.encode_sequence", args, 1)?;
        let codes = collection_arg("godel.encode_sequence", args, 0)?
            .iter()
            .map(|v| match v {
                Value::Integer(i) if *i >= 0 => Ok(*i as u64),
                other => Err(EvalError::type_mismatch(
                    "godel.encode_sequence",
                    "non-negative integer",
                    other,
                )),
            })
            .collect::<Result<Vec<u64>, _>>()?;
        godel::encode_sequence(&codes)
            .map(Value::String)
            .map_err(|message| EvalError::invalid_argument("godel.encode_sequence", message))
    });
}

fn register_test(registry: &mut FunctionRegistry) {
    // `numbers` gives 1..=n, `strings` gives item1..itemN
    registry.register("test.mock_collection", |args, _| {
        expect_args("test.mock_collection", args, 2)?;
        let kind = str_arg("test.mock_collection", args, 0)?;
        let count = int_arg("test.mock_collection", args, 1)?.max(0);
        if count > MOCK_COLLECTION_LIMIT {
            return Err(EvalError::invalid_argument(
                "test.mock_collection",
                format!(
                    "count {} exceeds the limit of {}",
                    count, MOCK_COLLECTION_LIMIT
                ),
            ));
        }
        let items = match kind {
            "numbers" => (1..=count).map(Value::Integer).collect(),
            "strings" => (1..=count).map(|i| Value::String(format!("item{}", i))).collect(),
            other => {
                return Err(EvalError::invalid_argument(
                    "test.mock_collection",
                    format!("unknown mock collection type '{}'", other),
                ))
            }
        };
        Ok(Value::Collection(items))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        FunctionRegistry::with_builtins().call(name, &args, &Context::new())
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            call("nope", vec![]),
            Err(EvalError::UnknownFunction("nope".to_string()))
        );
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = FunctionRegistry::new();
        registry.register("custom.answer", |_, _| Ok(Value::Integer(42)));
        assert!(registry.contains("custom.answer"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.call("custom.answer", &[], &Context::new()),
            Ok(Value::Integer(42))
        );
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(call("math.add", vec![2.into(), 3.into()]), Ok(Value::Integer(5)));
        assert_eq!(call("math.divide", vec![7.into(), 2.into()]), Ok(Value::Integer(3)));
        assert_eq!(call("math.divide", vec![7.into(), 0.into()]), Err(EvalError::DivisionByZero));
        assert_eq!(call("math.power", vec![3.into(), 4.into()]), Ok(Value::Integer(81)));
        assert_eq!(call("math.abs", vec![(-4).into()]), Ok(Value::Integer(4)));
        assert_eq!(
            call("math.max", vec![1.into(), 7.5.into(), 3.into()]),
            Ok(Value::Float(7.5))
        );
        assert_eq!(
            call("math.min", vec![Value::Collection(vec![4.into(), 2.into()])]),
            Ok(Value::Integer(2))
        );
        assert!(call("math.add", vec![1.into()]).is_err());
    }

    #[test]
    fn test_peano_functions() {
        assert_eq!(call("peano.successor", vec![4.into()]), Ok(Value::Integer(5)));
        assert_eq!(call("peano.predecessor", vec![0.into()]), Ok(Value::Integer(0)));
        assert_eq!(call("peano.is_zero", vec![0.into()]), Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call("string.length", vec!["héllo".into()]), Ok(Value::Integer(5)));
        assert_eq!(
            call("string.concat", vec!["a".into(), 1.into(), "b".into()]),
            Ok(Value::from("a1b"))
        );
        assert_eq!(
            call("string.normalize", vec!["Snake_Case".into()]),
            Ok(Value::from("snake-case"))
        );
        assert_eq!(
            call("string.matches", vec!["v12".into(), "^v\\d+$".into()]),
            Ok(Value::Boolean(true))
        );
        assert!(matches!(
            call("string.matches", vec!["x".into(), "(".into()]),
            Err(EvalError::InvalidArgument { .. })
        ));
        assert!(matches!(
            call("string.length", vec![1.into()]),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_generic_contains() {
        let ctx = Context::new().with_file("b.cpp", "// TODO: fix");
        let registry = FunctionRegistry::with_builtins();

        let in_file = registry.call("contains", &["b.cpp".into(), "TODO".into()], &ctx);
        assert_eq!(in_file, Ok(Value::Boolean(true)));

        let substring = registry.call("contains", &["a TODO note".into(), "TODO".into()], &ctx);
        assert_eq!(substring, Ok(Value::Boolean(true)));

        let member = registry.call(
            "contains",
            &[Value::Collection(vec![1.into(), 2.into()]), Value::Float(2.0)],
            &ctx,
        );
        assert_eq!(member, Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_collection_functions() {
        let items = Value::Collection(vec!["a".into(), "b".into()]);
        assert_eq!(call("collection.count", vec![items.clone()]), Ok(Value::Integer(2)));
        assert_eq!(call("collection.first", vec![items.clone()]), Ok(Value::from("a")));
        assert_eq!(call("collection.last", vec![items.clone()]), Ok(Value::from("b")));
        assert_eq!(
            call("collection.contains", vec![items, "b".into()]),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            call("collection.first", vec![Value::Collection(vec![])]),
            Ok(Value::Null)
        );
    }

    #[test]
    fn test_filesystem_functions() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.cpp"), "int main() {}\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme\n").unwrap();

        let ctx = Context::new().with("$target_path", dir.path().to_string_lossy().as_ref());
        let registry = FunctionRegistry::with_builtins();
        let call = |name: &str, args: &[Value]| registry.call(name, args, &ctx);

        assert_eq!(
            call("filesystem.read_file", &["src/main.cpp".into()]),
            Ok(Value::from("int main() {}\n"))
        );
        assert_eq!(call("filesystem.file_exists", &["README.md".into()]), Ok(Value::Boolean(true)));
        assert_eq!(call("filesystem.file_exists", &["nope.md".into()]), Ok(Value::Boolean(false)));
        assert_eq!(call("filesystem.is_directory", &["src".into()]), Ok(Value::Boolean(true)));
        assert_eq!(
            call("filesystem.get_files", &[".".into()]),
            Ok(Value::Collection(vec!["README.md".into(), "src/main.cpp".into()]))
        );
        assert!(matches!(
            call("filesystem.read_file", &["missing.txt".into()]),
            Err(EvalError::Io { .. })
        ));
    }

    #[test]
    fn test_path_functions() {
        assert_eq!(
            call("filesystem.get_file_name", vec!["a/b/c.hpp".into()]),
            Ok(Value::from("c.hpp"))
        );
        assert_eq!(
            call("filesystem.get_extension", vec!["a/b/c.hpp".into()]),
            Ok(Value::from("hpp"))
        );
        assert_eq!(
            call("filesystem.has_extension", vec!["c.HPP".into(), ".hpp".into()]),
            Ok(Value::Boolean(true))
        );
    }

    #[test]
    fn test_cpp_functions() {
        let source = "class A;\nclass B {\n};\nstruct C {};\nint main() {}\n";
        assert_eq!(call("cpp.count_classes", vec![source.into()]), Ok(Value::Integer(2)));
        assert_eq!(call("cpp.has_main", vec![source.into()]), Ok(Value::Boolean(true)));
        assert_eq!(call("cpp.get_line_count", vec![source.into()]), Ok(Value::Integer(6)));
    }

    #[test]
    fn test_object_functions() {
        let object = Value::Object([("name".to_string(), Value::from("x"))].into_iter().collect());
        assert_eq!(
            call("has_field", vec![object.clone(), "name".into()]),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            call("object.get_field", vec![object.clone(), "name".into()]),
            Ok(Value::from("x"))
        );
        assert_eq!(call("get_field", vec![object, "other".into()]), Ok(Value::Null));
    }

    #[test]
    fn test_gitignore_functions() {
        assert_eq!(
            call("gitignore.match_pattern", vec!["build/a.o".into(), "build/".into()]),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            call("gitignore.parse_patterns", vec!["# c\n*.log\n\nout/\n".into()]),
            Ok(Value::Collection(vec!["*.log".into(), "out/".into()]))
        );
    }

    #[test]
    fn test_godel_functions() {
        assert_eq!(call("godel.symbol_code", vec!["forall".into()]), Ok(Value::Integer(13)));
        assert_eq!(
            call("godel.encode_sequence", vec![Value::Collection(vec![1.into(), 2.into()])]),
            Ok(Value::from("18"))
        );
        assert!(matches!(
            call("godel.symbol_code", vec!["???".into()]),
            Err(EvalError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_mock_collection() {
        assert_eq!(
            call("test.mock_collection", vec!["numbers".into(), 3.into()]),
            Ok(Value::Collection(vec![1.into(), 2.into(), 3.into()]))
        );
        assert_eq!(
            call("test.mock_collection", vec!["strings".into(), 2.into()]),
            Ok(Value::Collection(vec!["item1".into(), "item2".into()]))
        );
        assert!(call("test.mock_collection", vec!["other".into(), 1.into()]).is_err());
    }

    #[test]
    fn test_mock_collection_limit() {
        match call(
            "test.mock_collection",
            vec!["numbers".into(), MOCK_COLLECTION_LIMIT.into()],
        ) {
            Ok(Value::Collection(items)) => assert_eq!(items.len(), 10_000),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            call(
                "test.mock_collection",
                vec!["numbers".into(), (MOCK_COLLECTION_LIMIT + 1).into()],
            ),
            Err(EvalError::InvalidArgument { .. })
        ));
        assert!(matches!(
            call("test.mock_collection", vec!["strings".into(), i64::MAX.into()]),
            Err(EvalError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_builtin_names_sorted() {
        let registry = FunctionRegistry::with_builtins();
        let names = registry.names();
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(names.contains(&"godel.encode_formula"));
    }
}
