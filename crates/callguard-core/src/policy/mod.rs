//! Tool permission policies.
//!
//! A policy pairs a tool pattern (and optionally argument patterns) with a
//! permission. Policies are ordered and the first match wins; a call that
//! matches nothing resolves to `Ask`.
//!
//! [`PolicySet`] compiles every pattern once and is immutable afterwards, so
//! one set can be shared by any number of threads evaluating calls.

mod agent;
mod file;
mod modes;

pub use agent::{
    agent_file_policies, AgentScope, AgentTool, AgentTools, McpServer, ALL_BUILT_IN_KEYWORD,
};
pub use file::{load_policy_file, save_policy_file, PolicyFile, PolicyFileError};
pub use modes::{
    default_policies, effective_policies, mode_policies, resolve_policies, ParseModeError,
    PermissionMode, PolicyOverrides, PolicySources,
};

use crate::pattern::{
    matches_arguments, matches_tool_pattern, ArgumentMatcher, Arguments, ToolPattern,
};
use crate::tier::Permission;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One permission rule.
///
/// On the wire the tool pattern is the `tool` key:
///
/// ```json
/// {"tool": "Bash(git*)", "permission": "ask", "argumentMatches": {"cwd": "/repo/**"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(rename = "tool")]
    pub tool_pattern: String,
    pub permission: Permission,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_matches: Option<Arguments>,
}

impl Policy {
    pub fn new(tool_pattern: impl Into<String>, permission: Permission) -> Self {
        Self {
            tool_pattern: tool_pattern.into(),
            permission,
            argument_matches: None,
        }
    }

    pub fn allow(tool_pattern: impl Into<String>) -> Self {
        Self::new(tool_pattern, Permission::Allow)
    }

    pub fn ask(tool_pattern: impl Into<String>) -> Self {
        Self::new(tool_pattern, Permission::Ask)
    }

    pub fn exclude(tool_pattern: impl Into<String>) -> Self {
        Self::new(tool_pattern, Permission::Exclude)
    }

    /// Require argument `key` to match `pattern`.
    pub fn with_argument(mut self, key: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.argument_matches
            .get_or_insert_with(Arguments::new)
            .insert(key.into(), pattern.into());
        self
    }

    /// Whether this policy applies to `call`.
    pub fn matches(&self, call: &ToolCall) -> bool {
        matches_tool_pattern(&call.name, &self.tool_pattern, Some(&call.arguments))
            && matches_arguments(&call.arguments, self.argument_matches.as_ref())
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Arguments::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// The `command` argument, if it is a string.
    pub fn command(&self) -> Option<&str> {
        self.arguments.get("command").and_then(Value::as_str)
    }
}

/// Outcome of static policy resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution<'a> {
    pub permission: Permission,
    pub matched_policy: Option<&'a Policy>,
}

impl Resolution<'_> {
    fn unmatched() -> Self {
        Resolution {
            permission: Permission::Ask,
            matched_policy: None,
        }
    }
}

/// Resolve `call` against `policies` without precompiling them.
///
/// The first policy whose tool pattern and argument patterns both match
/// decides; if none does the result is `Ask`.
pub fn check_tool_permission<'a>(call: &ToolCall, policies: &'a [Policy]) -> Resolution<'a> {
    policies
        .iter()
        .find(|policy| policy.matches(call))
        .map(|policy| Resolution {
            permission: policy.permission,
            matched_policy: Some(policy),
        })
        .unwrap_or_else(Resolution::unmatched)
}

#[derive(Debug, Clone)]
struct CompiledPolicy {
    policy: Policy,
    tool: ToolPattern,
    arguments: Vec<ArgumentMatcher>,
}

impl CompiledPolicy {
    fn new(policy: Policy) -> Self {
        let arguments = policy
            .argument_matches
            .iter()
            .flatten()
            .map(|(key, pattern)| ArgumentMatcher::new(key, pattern))
            .collect();
        Self {
            tool: ToolPattern::new(&policy.tool_pattern),
            arguments,
            policy,
        }
    }

    fn matches(&self, call: &ToolCall) -> bool {
        self.tool.matches(&call.name, Some(&call.arguments))
            && self.arguments.iter().all(|m| m.matches(&call.arguments))
    }
}

/// An ordered, precompiled list of policies.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    entries: Vec<CompiledPolicy>,
}

impl PolicySet {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self {
            entries: policies.into_iter().map(CompiledPolicy::new).collect(),
        }
    }

    /// Resolve `call`: first matching policy wins, otherwise `Ask`.
    pub fn resolve(&self, call: &ToolCall) -> Resolution<'_> {
        match self.entries.iter().find(|entry| entry.matches(call)) {
            Some(entry) => {
                log::debug!(
                    "Tool '{}' matched policy '{}' ({})",
                    call.name,
                    entry.policy.tool_pattern,
                    entry.policy.permission
                );
                Resolution {
                    permission: entry.policy.permission,
                    matched_policy: Some(&entry.policy),
                }
            }
            None => {
                log::debug!("No policy matched tool '{}', defaulting to ask", call.name);
                Resolution::unmatched()
            }
        }
    }

    pub fn policies(&self) -> impl Iterator<Item = &Policy> {
        self.entries.iter().map(|entry| &entry.policy)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<Policy>> for PolicySet {
    fn from(policies: Vec<Policy>) -> Self {
        Self::new(policies)
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<I: IntoIterator<Item = Policy>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Drop the tools that are excluded outright, keeping order.
///
/// Each name is resolved with no arguments, so argument-specific and
/// `Bash(...)` exclusions do not hide a tool.
pub fn filter_excluded_tools<I, S>(names: I, policies: &PolicySet) -> Vec<S>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter(|name| {
            let call = ToolCall::new(name.as_ref());
            policies.resolve(&call).permission != Permission::Exclude
        })
        .collect()
}
