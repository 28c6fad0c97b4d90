//! Variable bindings for expression evaluation

use super::value::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Evaluation environment.
///
/// Bindings live in a stack of scopes. Quantifiers and fixpoints push a scope
/// for their bound variable and pop it on exit, so sibling scopes never see
/// each other's bindings. Names are stored without a leading `$`, so `file`
/// and `$file` refer to the same binding.
#[derive(Debug, Clone)]
pub struct Context {
    scopes: Vec<HashMap<String, Value>>,

    /// In-memory file contents consulted before the filesystem
    files: HashMap<PathBuf, String>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            files: HashMap::new(),
        }
    }

    /// Builder form of [`Context::bind`]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.bind(name, value);
        self
    }

    /// Bind a variable in the innermost scope
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(normalize(name).to_string(), value.into());
        }
    }

    /// Find the innermost binding for a name
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let name = normalize(name);
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Drop the innermost scope. The global scope is never removed.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Number of active scopes, including the global one
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Register file content that `filesystem.*` functions see instead of disk
    pub fn add_file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.add_file(path, content);
        self
    }

    /// Content registered for a path, matched as given or resolved against `$target_path`
    pub fn file_content(&self, path: &str) -> Option<&str> {
        self.files
            .get(Path::new(path))
            .or_else(|| self.files.get(&self.resolve_path(path)))
            .map(String::as_str)
    }

    /// The `$target_path` binding, if any
    pub fn target_path(&self) -> Option<PathBuf> {
        self.lookup("target_path")
            .and_then(Value::as_str)
            .map(PathBuf::from)
    }

    /// Resolve a relative path against `$target_path`
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        match self.target_path() {
            Some(root) if candidate.is_relative() => root.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }
}

fn normalize(name: &str) -> &str {
    name.strip_prefix('$').unwrap_or(name)
}
