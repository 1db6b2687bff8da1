//! Wildcard matching for tool names and tool-call arguments.
//!
//! Two glob dialects are supported:
//!
//! - **Tool names**: `*` is the only wildcard and matches any run of
//!   characters. Every other character, regex metacharacters included, is
//!   literal, so `test[abc]` only matches the string `test[abc]`.
//! - **Arguments**: `*` and `**` match any run of characters, `?` matches
//!   exactly one character, and `**/` also matches zero directories.
//!
//! Patterns are translated to anchored expressions for the `regex` crate,
//! whose finite-automaton engine cannot backtrack catastrophically.
//! Over-long patterns never match.
//!
//! A tool pattern of the form `Bash(subpattern)` matches a shell tool call
//! whose `command` argument matches `subpattern`.

use regex::{Regex, RegexBuilder};
use serde_json::Value;

/// Arguments of a tool call, keyed by parameter name.
pub type Arguments = serde_json::Map<String, Value>;

/// Patterns longer than this never match.
pub const MAX_PATTERN_LEN: usize = 1024;

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Tools whose `Name(subpattern)` form matches against the command text.
const SHELL_TOOL_NAMES: &[&str] = &["Bash"];

/// Argument inspected by the `Name(subpattern)` form.
const COMMAND_ARGUMENT: &str = "command";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    ToolName,
    Argument,
}

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Exact(String),
    Regex(Regex),
    Never,
}

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    matcher: Matcher,
}

impl GlobPattern {
    /// Compile a pattern in the tool-name dialect (`*` only).
    pub fn tool(pattern: &str) -> Self {
        Self::compile(pattern, Dialect::ToolName)
    }

    /// Compile a pattern in the argument dialect (`*`, `**`, `?`).
    pub fn argument(pattern: &str) -> Self {
        Self::compile(pattern, Dialect::Argument)
    }

    fn compile(pattern: &str, dialect: Dialect) -> Self {
        let matcher = if pattern.len() > MAX_PATTERN_LEN {
            log::warn!(
                "Ignoring pattern of {} bytes (limit {})",
                pattern.len(),
                MAX_PATTERN_LEN
            );
            Matcher::Never
        } else if pattern == "*" || (dialect == Dialect::Argument && pattern == "**") {
            Matcher::Any
        } else if !has_wildcard(pattern, dialect) {
            Matcher::Exact(pattern.to_string())
        } else {
            let expr = translate(pattern, dialect);
            match RegexBuilder::new(&expr)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
            {
                Ok(re) => Matcher::Regex(re),
                Err(err) => {
                    log::warn!("Failed to compile pattern {:?}: {}", pattern, err);
                    Matcher::Never
                }
            }
        };

        Self {
            source: pattern.to_string(),
            matcher,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Exact(expected) => expected == text,
            Matcher::Regex(re) => re.is_match(text),
            Matcher::Never => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn has_wildcard(pattern: &str, dialect: Dialect) -> bool {
    match dialect {
        Dialect::ToolName => pattern.contains('*'),
        Dialect::Argument => pattern.contains(['*', '?']),
    }
}

/// Translate a glob into an anchored regular expression.
fn translate(pattern: &str, dialect: Dialect) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut expr = String::with_capacity(pattern.len() * 2 + 8);
    expr.push_str("(?s)^");

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match (c, dialect) {
            ('*', Dialect::Argument) if chars.get(i + 1) == Some(&'*') => {
                // Collapse runs of stars; `**/` may also match nothing.
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
                if chars.get(i + 1) == Some(&'/') {
                    expr.push_str("(?:.*/)?");
                    i += 1;
                } else {
                    expr.push_str(".*");
                }
            }
            ('*', _) => expr.push_str(".*"),
            ('?', Dialect::Argument) => expr.push('.'),
            _ => {
                let mut buf = [0u8; 4];
                expr.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
        i += 1;
    }

    expr.push('$');
    expr
}

// ============================================================================
// TOOL PATTERNS
// ============================================================================

/// A compiled `toolPattern` from a policy.
#[derive(Debug, Clone)]
pub enum ToolPattern {
    /// Matches the tool name.
    Name(GlobPattern),
    /// `Tool(subpattern)`: matches the tool name exactly and its command text.
    Command { tool: String, command: GlobPattern },
}

impl ToolPattern {
    pub fn new(pattern: &str) -> Self {
        match split_command_pattern(pattern) {
            Some((tool, sub)) => ToolPattern::Command {
                tool: tool.to_string(),
                command: GlobPattern::tool(sub),
            },
            None => ToolPattern::Name(GlobPattern::tool(pattern)),
        }
    }

    pub fn matches(&self, name: &str, args: Option<&Arguments>) -> bool {
        match self {
            ToolPattern::Name(glob) => glob.is_match(name),
            ToolPattern::Command { tool, command } => {
                if name != tool {
                    return false;
                }
                match args.and_then(|a| a.get(COMMAND_ARGUMENT)) {
                    Some(value) => command.is_match(&value_to_text(value)),
                    None => false,
                }
            }
        }
    }
}

/// Split `Bash(ls*)` into `("Bash", "ls*")`.
///
/// Only shell tools have a command form; `test(abc)` stays a literal name.
fn split_command_pattern(pattern: &str) -> Option<(&str, &str)> {
    let open = pattern.find('(')?;
    let tool = &pattern[..open];
    if !SHELL_TOOL_NAMES.contains(&tool) || !pattern.ends_with(')') {
        return None;
    }
    let sub = &pattern[open + 1..pattern.len() - 1];
    if sub.is_empty() {
        return None;
    }
    Some((tool, sub))
}

/// Check whether a tool call's name (and, for `Bash(...)` patterns, its
/// command argument) matches a policy's tool pattern.
pub fn matches_tool_pattern(name: &str, pattern: &str, args: Option<&Arguments>) -> bool {
    ToolPattern::new(pattern).matches(name, args)
}

// ============================================================================
// ARGUMENT PATTERNS
// ============================================================================

/// Render an argument value as text for glob matching.
///
/// `null` becomes the empty string, arrays join their elements with commas,
/// and objects render as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Identity comparison for non-string values.
///
/// Scalars compare by value. Objects and arrays only match when they are
/// the very same value, never when they are merely equal.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            std::ptr::eq(a, b)
        }
        _ => false,
    }
}

fn value_matches(value: &Value, pattern: &Value, glob: Option<&GlobPattern>) -> bool {
    match pattern {
        Value::String(expected) => match glob {
            Some(glob) => glob.is_match(&value_to_text(value)),
            None => matches!(value, Value::String(actual) if actual == expected),
        },
        _ => !value.is_string() && same_value(value, pattern),
    }
}

fn glob_for(pattern: &Value) -> Option<GlobPattern> {
    match pattern {
        Value::String(p) if has_wildcard(p, Dialect::Argument) => Some(GlobPattern::argument(p)),
        _ => None,
    }
}

/// One compiled `argumentMatches` entry.
#[derive(Debug, Clone)]
pub struct ArgumentMatcher {
    key: String,
    pattern: Value,
    glob: Option<GlobPattern>,
}

impl ArgumentMatcher {
    pub fn new(key: &str, pattern: &Value) -> Self {
        Self {
            key: key.to_string(),
            glob: glob_for(pattern),
            pattern: pattern.clone(),
        }
    }

    pub fn matches(&self, args: &Arguments) -> bool {
        match args.get(&self.key) {
            Some(value) => value_matches(value, &self.pattern, self.glob.as_ref()),
            None => false,
        }
    }
}

/// Check a tool call's arguments against a policy's `argumentMatches`.
///
/// Every key in `patterns` must be present in `args` and match. A pattern
/// string without wildcards must equal the value exactly; a wildcard pattern
/// is matched against the value rendered by [`value_to_text`]. Non-string
/// patterns compare against non-string values by identity.
pub fn matches_arguments(args: &Arguments, patterns: Option<&Arguments>) -> bool {
    let Some(patterns) = patterns else {
        return true;
    };

    patterns.iter().all(|(key, pattern)| match args.get(key) {
        Some(value) => value_matches(value, pattern, glob_for(pattern).as_ref()),
        None => false,
    })
}
