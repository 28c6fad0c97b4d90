//! Document model for rule files, configuration and logic expressions
//!
//! A small indentation-based tree format: scalars, `- item` sequences and
//! `key: value` mappings, with a handful of conveniences (flow collections,
//! block scalars, `- key: value` items). Anchors, aliases and tags are not
//! supported.
//!
//! Parsing is recursive descent over a [`Cursor`] that only ever moves
//! forward: callers inspect the next structural line with
//! [`Cursor::peek_line`] and consume it with [`Cursor::commit_line`]. A
//! dedented line is simply left unconsumed for the enclosing block.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A parsed document node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Items in source order
    Sequence(Vec<Node>),
    /// Entries in source order, keys unique
    Mapping(Vec<(String, Node)>),
}

/// Structural error with the position of the offending line
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at line {line}, column {column}: `{context}`")]
pub struct ParseError {
    /// What went wrong
    pub message: String,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// The offending source text
    pub context: String,
}

impl ParseError {
    fn at(message: impl Into<String>, line: &Line<'_>) -> Self {
        Self::at_column(message, line, line.indent + 1)
    }

    fn at_column(message: impl Into<String>, line: &Line<'_>, column: usize) -> Self {
        let mut context: String = line.raw.trim().chars().take(60).collect();
        if line.raw.trim().chars().count() > 60 {
            context.push_str("...");
        }
        Self {
            message: message.into(),
            line: line.number,
            column,
            context,
        }
    }
}

/// Error reading a document from disk
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// One source line as seen by the parser
#[derive(Debug, Clone, Copy)]
pub struct Line<'a> {
    /// Index into the raw line list
    index: usize,
    /// Line number (1-based)
    pub number: usize,
    /// Indentation width (tabs count as 4)
    pub indent: usize,
    /// Content with indentation and trailing comment removed
    pub content: &'a str,
    /// Original line text
    pub raw: &'a str,
}

/// Forward-only line cursor
pub struct Cursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    /// Next structural line, skipping blank and comment lines
    pub fn peek_line(&self) -> Option<Line<'a>> {
        (self.pos..self.lines.len()).find_map(|index| {
            let line = self.line_at(index);
            (!line.content.is_empty()).then_some(line)
        })
    }

    /// Consume the line returned by the last [`Cursor::peek_line`]
    pub fn commit_line(&mut self) {
        if let Some(line) = self.peek_line() {
            self.pos = line.index + 1;
        }
    }

    /// True once every structural line has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.peek_line().is_none()
    }

    /// Consume the raw lines of a block scalar indented deeper than `parent_indent`
    fn take_block(&mut self, parent_indent: usize) -> Vec<&'a str> {
        let mut block = Vec::new();
        let mut block_indent = None;

        while self.pos < self.lines.len() {
            let raw = self.lines[self.pos];
            if raw.trim().is_empty() {
                block.push("");
                self.pos += 1;
                continue;
            }

            let indent = indent_width(raw);
            if indent <= parent_indent {
                break;
            }
            let strip = *block_indent.get_or_insert(indent);
            block.push(strip_columns(raw, strip.min(indent)));
            self.pos += 1;
        }

        while block.last().is_some_and(|l| l.is_empty()) {
            block.pop();
        }
        block
    }

    fn line_at(&self, index: usize) -> Line<'a> {
        let raw = self.lines[index];
        let trimmed = raw.trim();
        let content = if trimmed.starts_with('#') {
            ""
        } else {
            strip_comment(trimmed).trim_end()
        };
        Line {
            index,
            number: index + 1,
            indent: indent_width(raw),
            content,
            raw,
        }
    }
}

/// Parse document text into a node tree
pub fn parse(text: &str) -> Result<Node, ParseError> {
    let mut cursor = Cursor::new(text);

    if let Some(line) = cursor.peek_line() {
        if line.content == "---" {
            cursor.commit_line();
        }
    }

    let Some(first) = cursor.peek_line() else {
        return Ok(Node::Null);
    };

    let root = if is_item(first.content) {
        parse_sequence(&mut cursor, first.indent)?
    } else if split_key_value(first.content).is_some() {
        parse_mapping(&mut cursor, first.indent)?
    } else {
        cursor.commit_line();
        parse_inline(first.content, &first)?
    };

    match cursor.peek_line() {
        Some(line) if line.content == "---" || line.content == "..." => Ok(root),
        Some(line) => Err(ParseError::at("unexpected content after document root", &line)),
        None => Ok(root),
    }
}

/// Read and parse a document file
pub fn parse_file(path: &Path) -> Result<Node, DocumentError> {
    let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(&text)?)
}

/// Classify a single scalar.
///
/// Order matters: integer, float, boolean, null, then string with one pair of
/// matching surrounding quotes removed.
pub fn parse_scalar(text: &str) -> Node {
    let text = text.trim();

    if is_integer(text) {
        if let Ok(value) = text.parse::<i64>() {
            return Node::Integer(value);
        }
    }
    if is_integer(text) || is_float(text) {
        if let Ok(value) = text.parse::<f64>() {
            return Node::Float(value);
        }
    }

    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" => return Node::Boolean(true),
        "false" | "no" => return Node::Boolean(false),
        "null" | "~" | "" => return Node::Null,
        _ => {}
    }

    Node::String(unquote(text))
}

fn parse_mapping(cursor: &mut Cursor<'_>, indent: usize) -> Result<Node, ParseError> {
    let mut entries = Vec::new();
    parse_mapping_entries(cursor, indent, &mut entries)?;
    Ok(Node::Mapping(entries))
}

fn parse_mapping_entries(
    cursor: &mut Cursor<'_>,
    indent: usize,
    entries: &mut Vec<(String, Node)>,
) -> Result<(), ParseError> {
    while let Some(line) = cursor.peek_line() {
        if line.indent < indent || line.content == "---" || line.content == "..." {
            break;
        }
        if line.indent > indent {
            return Err(ParseError::at("inconsistent indentation", &line));
        }
        if is_item(line.content) {
            return Err(ParseError::at("unexpected sequence item inside mapping", &line));
        }

        let Some((key, rest)) = split_key_value(line.content) else {
            return Err(ParseError::at("expected `key: value`", &line));
        };
        cursor.commit_line();

        if entries.iter().any(|(existing, _)| existing == &key) {
            return Err(ParseError::at(format!("duplicate key `{}`", key), &line));
        }

        let value = parse_value(cursor, rest, indent, &line, true)?;
        entries.push((key, value));
    }
    Ok(())
}

fn parse_sequence(cursor: &mut Cursor<'_>, indent: usize) -> Result<Node, ParseError> {
    let mut items = Vec::new();

    while let Some(line) = cursor.peek_line() {
        if line.indent < indent || !is_item(line.content) {
            break;
        }
        if line.indent > indent {
            return Err(ParseError::at("inconsistent indentation", &line));
        }
        cursor.commit_line();

        let body = line.content[1..].trim_start();
        let offset = line.content.len() - body.len();

        let item = match split_key_value(body) {
            Some((key, rest)) if !body.starts_with('[') && !body.starts_with('{') => {
                let item_indent = line.indent + offset;
                let first = parse_value(cursor, rest, item_indent, &line, true)?;
                let mut entries = vec![(key, first)];
                parse_mapping_entries(cursor, item_indent, &mut entries)?;
                Node::Mapping(entries)
            }
            _ => parse_value(cursor, body, indent, &line, false)?,
        };
        items.push(item);
    }

    Ok(Node::Sequence(items))
}

/// Parse the value part of a `key:` or `- ` line.
///
/// `compact` allows a sequence at the same indentation as its owning key.
fn parse_value(
    cursor: &mut Cursor<'_>,
    rest: &str,
    owner_indent: usize,
    line: &Line<'_>,
    compact: bool,
) -> Result<Node, ParseError> {
    let rest = rest.trim();

    if rest.is_empty() {
        return match cursor.peek_line() {
            Some(next) if next.indent > owner_indent => {
                if is_item(next.content) {
                    parse_sequence(cursor, next.indent)
                } else {
                    parse_mapping(cursor, next.indent)
                }
            }
            Some(next) if compact && next.indent == owner_indent && is_item(next.content) => {
                parse_sequence(cursor, next.indent)
            }
            _ => Ok(Node::String(String::new())),
        };
    }

    if let Some(style) = rest.strip_prefix('|') {
        let block = cursor.take_block(owner_indent);
        return Ok(Node::String(join_block(&block, false, style == "-")));
    }
    if let Some(style) = rest.strip_prefix('>') {
        let block = cursor.take_block(owner_indent);
        return Ok(Node::String(join_block(&block, true, style == "-")));
    }

    parse_inline(rest, line)
}

/// Parse an inline value: flow collection, quoted string or plain scalar
fn parse_inline(text: &str, line: &Line<'_>) -> Result<Node, ParseError> {
    if text.starts_with('[') || text.starts_with('{') {
        let mut flow = FlowParser::new(text, line);
        let node = flow.value()?;
        flow.skip_whitespace();
        if !flow.at_end() {
            return Err(flow.error("trailing characters after flow collection"));
        }
        return Ok(node);
    }

    if let Some(quote) = text.chars().next().filter(|c| *c == '"' || *c == '\'') {
        if text.len() < 2 || !text.ends_with(quote) || ends_with_escape(text) {
            return Err(ParseError::at("unterminated quoted string", line));
        }
    }

    Ok(parse_scalar(text))
}

/// Recursive parser for `[a, b]` and `{k: v}` collections on one line
struct FlowParser<'a, 'l> {
    chars: Vec<char>,
    pos: usize,
    line: &'l Line<'a>,
}

impl<'a, 'l> FlowParser<'a, 'l> {
    fn new(text: &str, line: &'l Line<'a>) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line,
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::at_column(message, self.line, self.line.indent + self.pos + 1)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Node, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('[') => self.sequence(),
            Some('{') => self.mapping(),
            Some(q @ ('"' | '\'')) => {
                let text = self.quoted(q)?;
                Ok(Node::String(text))
            }
            Some(_) => {
                let start = self.pos;
                while self.peek().is_some_and(|c| !matches!(c, ',' | ']' | '}')) {
                    self.pos += 1;
                }
                let text: String = self.chars[start..self.pos].iter().collect();
                Ok(parse_scalar(&text))
            }
            None => Err(self.error("unexpected end of flow collection")),
        }
    }

    fn sequence(&mut self) -> Result<Node, ParseError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(']') => {
                    self.pos += 1;
                    return Ok(Node::Sequence(items));
                }
                Some(_) => {
                    items.push(self.value()?);
                    self.skip_whitespace();
                    match self.peek() {
                        Some(',') => self.pos += 1,
                        Some(']') => {}
                        _ => return Err(self.error("expected `,` or `]`")),
                    }
                }
                None => return Err(self.error("unterminated flow sequence")),
            }
        }
    }

    fn mapping(&mut self) -> Result<Node, ParseError> {
        self.pos += 1;
        let mut entries: Vec<(String, Node)> = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(Node::Mapping(entries));
                }
                Some(_) => {
                    let key = self.key()?;
                    if entries.iter().any(|(existing, _)| existing == &key) {
                        return Err(self.error(&format!("duplicate key `{}`", key)));
                    }
                    let value = self.value()?;
                    entries.push((key, value));
                    self.skip_whitespace();
                    match self.peek() {
                        Some(',') => self.pos += 1,
                        Some('}') => {}
                        _ => return Err(self.error("expected `,` or `}`")),
                    }
                }
                None => return Err(self.error("unterminated flow mapping")),
            }
        }
    }

    fn key(&mut self) -> Result<String, ParseError> {
        let key = match self.peek() {
            Some(q @ ('"' | '\'')) => self.quoted(q)?,
            _ => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ':' && c != ',' && c != '}') {
                    self.pos += 1;
                }
                self.chars[start..self.pos].iter().collect::<String>().trim().to_string()
            }
        };
        self.skip_whitespace();
        if self.peek() != Some(':') {
            return Err(self.error("expected `:` after key"));
        }
        self.pos += 1;
        Ok(key)
    }

    fn quoted(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut escaped = false;
        while let Some(c) = self.peek() {
            self.pos += 1;
            if escaped {
                escaped = false;
            } else if c == '\\' && quote == '"' {
                escaped = true;
            } else if c == quote {
                let raw: String = self.chars[start..self.pos].iter().collect();
                return Ok(unquote(&raw));
            }
        }
        Err(self.error("unterminated quoted string"))
    }
}

fn is_item(content: &str) -> bool {
    content == "-" || content.starts_with("- ")
}

/// Split `key: rest` at the first `:` followed by whitespace or end of line,
/// ignoring colons inside quotes
fn split_key_value(content: &str) -> Option<(String, &str)> {
    let bytes = content.as_bytes();
    let mut quote: Option<u8> = None;

    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if (b == b'"' || b == b'\'') && i == 0 => quote = Some(b),
            None if b == b':' => {
                let next = bytes.get(i + 1);
                if next.is_none() || next == Some(&b' ') || next == Some(&b'\t') {
                    let key = content[..i].trim();
                    if key.is_empty() || key.starts_with('[') || key.starts_with('{') {
                        return None;
                    }
                    return Some((unquote(key), &content[i + 1..]));
                }
            }
            None => {}
        }
    }
    None
}

/// Remove a trailing ` # comment` that is not inside quotes
fn strip_comment(text: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev = ' ';
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => {
                if (c == '"' || c == '\'') && matches!(prev, ' ' | ':' | '[' | '{' | ',' | '-') {
                    quote = Some(c);
                } else if c == '#' && prev.is_whitespace() {
                    return &text[..i];
                }
            }
        }
        prev = c;
    }
    text
}

fn indent_width(raw: &str) -> usize {
    raw.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn strip_columns(raw: &str, columns: usize) -> &str {
    let mut width = 0;
    for (i, c) in raw.char_indices() {
        if width >= columns || (c != ' ' && c != '\t') {
            return &raw[i..];
        }
        width += if c == '\t' { 4 } else { 1 };
    }
    ""
}

fn join_block(lines: &[&str], folded: bool, strip: bool) -> String {
    let mut text = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            let separator = if !folded || line.is_empty() || lines[i - 1].is_empty() {
                '\n'
            } else {
                ' '
            };
            text.push(separator);
        }
        text.push_str(line);
    }
    if !strip && !text.is_empty() {
        text.push('\n');
    }
    text
}

fn ends_with_escape(text: &str) -> bool {
    let body = &text[..text.len() - 1];
    text.starts_with('"') && body.len() > 1 && body.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn unquote(text: &str) -> String {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 && bytes[0] == bytes[bytes.len() - 1] {
        let inner = &text[1..text.len() - 1];
        match bytes[0] {
            b'"' => return unescape(inner),
            b'\'' => return inner.replace("''", "'"),
            _ => {}
        }
    }
    text.to_string()
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_float(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };

    let mut dots = 0;
    let mut digits = 0;
    for b in mantissa.bytes() {
        match b {
            b'.' => dots += 1,
            b'0'..=b'9' => digits += 1,
            _ => return false,
        }
    }
    if digits == 0 || dots > 1 || (dots == 0 && exponent.is_none()) {
        return false;
    }

    match exponent {
        Some(exp) => is_integer(exp),
        None => true,
    }
}

impl Node {
    /// Name of the node type
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Boolean(_) => "boolean",
            Node::Integer(_) => "integer",
            Node::Float(_) => "float",
            Node::String(_) => "string",
            Node::Sequence(_) => "sequence",
            Node::Mapping(_) => "mapping",
        }
    }

    /// Look up a mapping entry
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Integer(i) => Some(*i as f64),
            Node::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[(String, Node)]> {
        match self {
            Node::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// Scalar rendered as text (`None` for collections and null)
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Node::Boolean(b) => Some(b.to_string()),
            Node::Integer(i) => Some(i.to_string()),
            Node::Float(f) => Some(f.to_string()),
            Node::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Scalars of a sequence as text; a lone scalar becomes a one-item list
    pub fn text_list(&self) -> Vec<String> {
        match self {
            Node::Sequence(items) => items.iter().filter_map(Node::scalar_text).collect(),
            other => other.scalar_text().into_iter().collect(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Null => write!(f, "null"),
            Node::Boolean(b) => write!(f, "{}", b),
            Node::Integer(i) => write!(f, "{}", i),
            Node::Float(x) => write!(f, "{}", x),
            Node::String(s) => write!(f, "{:?}", s),
            Node::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Node::Mapping(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
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

impl From<&Node> for serde_json::Value {
    fn from(node: &Node) -> Self {
        match node {
            Node::Null => serde_json::Value::Null,
            Node::Boolean(b) => serde_json::Value::Bool(*b),
            Node::Integer(i) => serde_json::Value::from(*i),
            Node::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Node::String(s) => serde_json::Value::String(s.clone()),
            Node::Sequence(items) => items.iter().map(serde_json::Value::from).collect(),
            Node::Mapping(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(text: &str) -> Node {
        Node::String(text.to_string())
    }

    #[test]
    fn test_scalar_classification() {
        assert_eq!(parse_scalar("123"), Node::Integer(123));
        assert_eq!(parse_scalar("-42"), Node::Integer(-42));
        assert_eq!(parse_scalar("12.5"), Node::Float(12.5));
        assert_eq!(parse_scalar("1e3"), Node::Float(1000.0));
        assert_eq!(parse_scalar("2.5E-1"), Node::Float(0.25));
        assert_eq!(parse_scalar("~"), Node::Null);
        assert_eq!(parse_scalar(""), Node::Null);
        assert_eq!(parse_scalar("NULL"), Node::Null);
        assert_eq!(parse_scalar("Yes"), Node::Boolean(true));
        assert_eq!(parse_scalar("FALSE"), Node::Boolean(false));
        assert_eq!(parse_scalar("no"), Node::Boolean(false));
        assert_eq!(parse_scalar("0123abc"), s("0123abc"));
        assert_eq!(parse_scalar("1.2.3"), s("1.2.3"));
        assert_eq!(parse_scalar("\"quoted\""), s("quoted"));
        assert_eq!(parse_scalar("'it''s'"), s("it's"));
        assert_eq!(parse_scalar("\"123\""), s("123"));
    }

    #[test]
    fn test_mapping_with_sequence_round_trip() {
        let doc = parse("a: 1\nb:\n  - 1\n  - 2\n  - 3\n").unwrap();

        let entries = doc.as_mapping().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[1].0, "b");
        assert_eq!(entries[0].1, Node::Integer(1));
        assert_eq!(
            entries[1].1,
            Node::Sequence(vec![Node::Integer(1), Node::Integer(2), Node::Integer(3)])
        );
    }

    #[test]
    fn test_flow_collections() {
        let doc = parse("b: [1, 2, 3]\nc: {x: \"a, b\", y: [true, ~]}\n").unwrap();
        assert_eq!(
            doc.get("b"),
            Some(&Node::Sequence(vec![
                Node::Integer(1),
                Node::Integer(2),
                Node::Integer(3)
            ]))
        );
        let c = doc.get("c").unwrap();
        assert_eq!(c.get("x"), Some(&s("a, b")));
        assert_eq!(
            c.get("y"),
            Some(&Node::Sequence(vec![Node::Boolean(true), Node::Null]))
        );
    }

    #[test]
    fn test_dedent_starts_new_key() {
        let text = "first:\n    nested: 1\n    deeper:\n      x: y\nsecond: 2\n";
        let doc = parse(text).unwrap();

        let entries = doc.as_mapping().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], ("second".to_string(), Node::Integer(2)));

        let first = doc.get("first").unwrap();
        assert!(first.get("second").is_none());
        assert_eq!(first.get("deeper").and_then(|d| d.get("x")), Some(&s("y")));
    }

    #[test]
    fn test_empty_value_without_block_is_empty_string() {
        let doc = parse("name:\nother: x\n").unwrap();
        assert_eq!(doc.get("name"), Some(&s("")));
        assert_eq!(doc.get("other"), Some(&s("x")));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let text = "# header\n\nkey: value # trailing\n\n  # indented comment\nurl: \"a # b\"\n";
        let doc = parse(text).unwrap();
        assert_eq!(doc.get("key"), Some(&s("value")));
        assert_eq!(doc.get("url"), Some(&s("a # b")));
    }

    #[test]
    fn test_document_marker_and_top_level_sequence() {
        let doc = parse("---\n# list\n- a\n- b\n").unwrap();
        assert_eq!(doc, Node::Sequence(vec![s("a"), s("b")]));
    }

    #[test]
    fn test_sequence_of_mappings() {
        let text = "\
test_cases:
  - name: passes
    expected: pass
  - name: fails
    description: has a TODO
    expected: fail
";
        let doc = parse(text).unwrap();
        let cases = doc.get("test_cases").and_then(Node::as_sequence).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].get("name"), Some(&s("passes")));
        assert_eq!(cases[1].get("description"), Some(&s("has a TODO")));
        assert_eq!(cases[1].get("expected"), Some(&s("fail")));
    }

    #[test]
    fn test_nested_expression_under_sequence_item() {
        let text = "\
exprs:
  - forall:
      variable: f
      domain:
        var: files
  - literal: true
";
        let doc = parse(text).unwrap();
        let exprs = doc.get("exprs").and_then(Node::as_sequence).unwrap();
        let forall = exprs[0].get("forall").unwrap();
        assert_eq!(forall.get("variable"), Some(&s("f")));
        assert_eq!(forall.get("domain").and_then(|d| d.get("var")), Some(&s("files")));
        assert_eq!(exprs[1].get("literal"), Some(&Node::Boolean(true)));
    }

    #[test]
    fn test_compact_sequence_under_key() {
        let doc = parse("tags:\n- a\n- b\nnext: 1\n").unwrap();
        assert_eq!(doc.get("tags"), Some(&Node::Sequence(vec![s("a"), s("b")])));
        assert_eq!(doc.get("next"), Some(&Node::Integer(1)));
    }

    #[test]
    fn test_block_scalars() {
        let text = "literal: |\n  line one\n  line two\nfolded: >-\n  joined\n  words\nend: 1\n";
        let doc = parse(text).unwrap();
        assert_eq!(doc.get("literal"), Some(&s("line one\nline two\n")));
        assert_eq!(doc.get("folded"), Some(&s("joined words")));
        assert_eq!(doc.get("end"), Some(&Node::Integer(1)));
    }

    #[test]
    fn test_tabs_count_as_four_spaces() {
        let doc = parse("outer:\n\tinner: 1\n").unwrap();
        assert_eq!(doc.get("outer").and_then(|o| o.get("inner")), Some(&Node::Integer(1)));
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        let err = parse("ok: 1\nbad: \"open\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unterminated"));
        assert!(err.context.contains("bad"));
    }

    #[test]
    fn test_inconsistent_indentation_is_error() {
        let err = parse("a: 1\n    b: 2\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 5);
        assert!(err.message.contains("indentation"));
    }

    #[test]
    fn test_ambiguous_dedent_is_error() {
        let err = parse("a:\n    x: 1\n  b: 2\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_duplicate_key_is_error() {
        let err = parse("a: 1\na: 2\n").unwrap_err();
        assert!(err.message.contains("duplicate key"));
    }

    #[test]
    fn test_unterminated_flow_sequence_is_error() {
        assert!(parse("a: [1, 2\n").is_err());
    }

    #[test]
    fn test_colon_inside_value() {
        let doc = parse("id: akao:rule::structure:one_class:v1\nurl: http://example.com\n").unwrap();
        assert_eq!(doc.get("id"), Some(&s("akao:rule::structure:one_class:v1")));
        assert_eq!(doc.get("url"), Some(&s("http://example.com")));
    }

    #[test]
    fn test_empty_document_is_null() {
        assert_eq!(parse("").unwrap(), Node::Null);
        assert_eq!(parse("# only a comment\n").unwrap(), Node::Null);
    }

    #[test]
    fn test_cursor_peek_does_not_consume() {
        let mut cursor = Cursor::new("\n# c\na: 1\nb: 2\n");
        let first = cursor.peek_line().unwrap();
        assert_eq!(first.number, 3);
        assert_eq!(cursor.peek_line().unwrap().content, "a: 1");
        cursor.commit_line();
        assert_eq!(cursor.peek_line().unwrap().content, "b: 2");
        cursor.commit_line();
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.yaml");
        std::fs::write(&path, "x: 1\n").unwrap();
        assert_eq!(parse_file(&path).unwrap().get("x"), Some(&Node::Integer(1)));

        let missing = parse_file(&dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(DocumentError::Io { .. })));
    }

    #[test]
    fn test_json_conversion() {
        let doc = parse("a: 1\nb: [x, 2.5]\n").unwrap();
        let json = serde_json::Value::from(&doc);
        assert_eq!(json, serde_json::json!({"a": 1, "b": ["x", 2.5]}));
    }
}
