//! Permission modes and where policies come from.
//!
//! In normal mode the effective policy list is assembled from several
//! sources, most specific first:
//!
//! 1. command-line overrides (`exclude`, then `ask`, then `allow`)
//! 2. the user's policy file
//! 3. built-in defaults
//!
//! Plan and auto mode replace all of that with a fixed list, and an active
//! agent file replaces everything with its own tool scope.

use super::agent::AgentScope;
use super::{Policy, PolicySet};
use crate::tier::Permission;
use crate::tools::{READ_ONLY_TOOLS, SHELL_TOOL, WRITE_TOOLS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMode {
    /// User configuration decides.
    #[default]
    Normal,
    /// Read-only planning: file modifications are excluded.
    Plan,
    /// Everything is allowed; only the command classifier can still exclude.
    Auto,
}

impl PermissionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionMode::Normal => "normal",
            PermissionMode::Plan => "plan",
            PermissionMode::Auto => "auto",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown permission mode '{0}' (expected normal, plan or auto)")]
pub struct ParseModeError(pub String);

impl FromStr for PermissionMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(PermissionMode::Normal),
            "plan" => Ok(PermissionMode::Plan),
            "auto" => Ok(PermissionMode::Auto),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Tools plan mode allows besides the read-only ones.
const PLAN_ALLOWED_TOOLS: &[&str] = &[
    SHELL_TOOL, "Read", "Search", "List", "Fetch", "Diff", "Checklist", "Status", "Glob",
    "Grep",
];

/// The fixed policy list of a mode, or `None` for normal mode.
pub fn mode_policies(mode: PermissionMode) -> Option<Vec<Policy>> {
    match mode {
        PermissionMode::Normal => None,
        PermissionMode::Plan => {
            let mut policies: Vec<Policy> =
                WRITE_TOOLS.iter().map(|t| Policy::exclude(*t)).collect();
            policies.extend(PLAN_ALLOWED_TOOLS.iter().map(|t| Policy::allow(*t)));
            policies.push(Policy::allow("*"));
            Some(policies)
        }
        PermissionMode::Auto => Some(vec![Policy::allow("*")]),
    }
}

/// Tool names given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOverrides {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub ask: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl PolicyOverrides {
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.ask.is_empty() && self.exclude.is_empty()
    }

    /// Most restrictive first, so `--exclude X --allow X` excludes.
    pub fn policies(&self) -> Vec<Policy> {
        let excluded = self.exclude.iter().map(|t| Policy::exclude(t.as_str()));
        let asked = self.ask.iter().map(|t| Policy::ask(t.as_str()));
        let allowed = self.allow.iter().map(|t| Policy::allow(t.as_str()));
        excluded.chain(asked).chain(allowed).collect()
    }
}

/// Everything normal mode builds its policy list from.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySources {
    pub overrides: PolicyOverrides,
    /// Policies from the user's policy file, in file order.
    pub personal: Vec<Policy>,
    pub include_defaults: bool,
    /// No one is there to answer an `ask`.
    pub headless: bool,
    /// The active agent file, if any. Takes precedence over modes.
    pub agent: Option<AgentScope>,
}

impl Default for PolicySources {
    fn default() -> Self {
        Self {
            overrides: PolicyOverrides::default(),
            personal: Vec::new(),
            include_defaults: true,
            headless: false,
            agent: None,
        }
    }
}

/// Built-in fallback policies.
///
/// Read-only tools are allowed, file writes and the shell ask, and anything
/// else asks. Headless sessions exclude unknown tools instead, since an
/// `ask` could never be answered.
pub fn default_policies(headless: bool) -> Vec<Policy> {
    let mut policies: Vec<Policy> = READ_ONLY_TOOLS.iter().map(|t| Policy::allow(*t)).collect();
    policies.extend(
        ["Write", "Edit", "MultiEdit", SHELL_TOOL]
            .iter()
            .map(|t| Policy::ask(*t)),
    );
    let fallback = if headless {
        Permission::Exclude
    } else {
        Permission::Ask
    };
    policies.push(Policy::new("*", fallback));
    policies
}

/// Concatenate the normal-mode sources in precedence order.
pub fn resolve_policies(sources: &PolicySources) -> Vec<Policy> {
    let mut policies = sources.overrides.policies();
    policies.extend(sources.personal.iter().cloned());
    if sources.include_defaults {
        policies.extend(default_policies(sources.headless));
    }
    policies
}

/// The compiled policy list for `mode`.
pub fn effective_policies(mode: PermissionMode, sources: &PolicySources) -> PolicySet {
    if let Some(agent) = &sources.agent {
        let policies = agent.policies();
        log::debug!("Using {} agent file policies, ignoring {} mode", policies.len(), mode);
        return PolicySet::new(policies);
    }

    let policies = match mode_policies(mode) {
        Some(policies) => {
            if !sources.overrides.is_empty() || !sources.personal.is_empty() {
                log::debug!("Ignoring user policies in {} mode", mode);
            }
            policies
        }
        None => resolve_policies(sources),
    };
    log::debug!("Using {} policies in {} mode", policies.len(), mode);
    PolicySet::new(policies)
}
