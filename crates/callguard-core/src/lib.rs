//! # callguard-core
//!
//! Tool-call authorization for coding agents.
//!
//! Decides whether a tool call requested by a model may run without asking,
//! needs the user's confirmation, or is refused. This crate performs no
//! execution and no prompting; it only decides.
//!
//! ## Key Concepts
//!
//! - **Policy**: a user rule mapping a tool pattern (e.g. `Bash(git*)`) to a
//!   [`Permission`]. Ordered; the first match wins.
//! - **Tier**: the command classifier's verdict. A shell command is
//!   tokenized and every simple command in it is rated; the most
//!   restrictive rating wins.
//! - **Authorization**: the reconciliation of both. An `exclude` policy is
//!   final, a `Disabled` tier excludes, and otherwise the policy stands.
//!
//! ```
//! use callguard_core::{authorize, Permission, Policy, PolicySet, ToolCall, ToolRegistry};
//!
//! let policies = PolicySet::new(vec![Policy::allow("Bash")]);
//! let registry = ToolRegistry::builtin();
//!
//! let call = ToolCall::new("Bash").with_argument("command", "git status");
//! assert_eq!(authorize(&call, &policies, &registry).permission, Permission::Allow);
//!
//! let call = ToolCall::new("Bash").with_argument("command", "sudo rm -rf /");
//! assert_eq!(authorize(&call, &policies, &registry).permission, Permission::Exclude);
//! ```

pub mod approval;
pub mod authorize;
pub mod pattern;
pub mod policy;
pub mod shell;
pub mod tier;
pub mod tools;

// Re-export commonly used types
pub use approval::{assess, classify, Assessment, Evidence, RiskReason};
pub use authorize::{authorize, reconcile, Authorization, Authorizer};
pub use pattern::{matches_arguments, matches_tool_pattern, Arguments};
pub use policy::{
    agent_file_policies, check_tool_permission, effective_policies, filter_excluded_tools,
    AgentScope, AgentTools, McpServer, PermissionMode, Policy, PolicySet, PolicySources,
    Resolution, ToolCall,
};
pub use tier::{most_restrictive, Permission, Tier};
pub use tools::{ClassifierError, DynamicClassifier, ToolKind, ToolRegistry};
