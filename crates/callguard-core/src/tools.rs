//! Per-tool dynamic classifiers.
//!
//! Most tools are judged by policy alone. Shell tools also run their command
//! through [`approval::classify`](crate::approval::classify), and embedders
//! can plug in their own classifier for other tools.

use crate::approval;
use crate::pattern::Arguments;
use crate::tier::Tier;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors a dynamic classifier can report instead of a tier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("Missing argument '{0}'")]
    MissingArgument(String),

    #[error("Classifier failed: {0}")]
    Failed(String),
}

/// Classifies one call of a tool given the tier its policy implies.
pub trait DynamicClassifier: Send + Sync {
    fn classify(&self, base: Tier, arguments: &Arguments) -> Result<Tier, ClassifierError>;
}

impl<F> DynamicClassifier for F
where
    F: Fn(Tier, &Arguments) -> Result<Tier, ClassifierError> + Send + Sync,
{
    fn classify(&self, base: Tier, arguments: &Arguments) -> Result<Tier, ClassifierError> {
        self(base, arguments)
    }
}

/// How a tool's calls are classified beyond its static policy.
#[derive(Clone)]
pub enum ToolKind {
    /// Static policy only.
    Plain,
    /// Runs the string argument `argument` as a shell command.
    Shell { argument: String },
    Custom(Arc<dyn DynamicClassifier>),
}

impl fmt::Debug for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolKind::Plain => f.write_str("Plain"),
            ToolKind::Shell { argument } => {
                f.debug_struct("Shell").field("argument", argument).finish()
            }
            ToolKind::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl ToolKind {
    pub fn shell() -> Self {
        ToolKind::Shell {
            argument: "command".to_string(),
        }
    }

    pub fn custom<C>(classifier: C) -> Self
    where
        C: DynamicClassifier + 'static,
    {
        ToolKind::Custom(Arc::new(classifier))
    }

    pub fn has_classifier(&self) -> bool {
        !matches!(self, ToolKind::Plain)
    }

    /// Run the dynamic classifier, if any.
    ///
    /// Returns `None` for plain tools. A shell tool whose command argument
    /// is missing or not a string classifies an empty command, which leaves
    /// `base` unchanged.
    pub fn classify(
        &self,
        base: Tier,
        arguments: &Arguments,
    ) -> Option<Result<Tier, ClassifierError>> {
        match self {
            ToolKind::Plain => None,
            ToolKind::Shell { argument } => {
                let command = match arguments.get(argument) {
                    Some(Value::String(command)) => command.as_str(),
                    _ => "",
                };
                Some(Ok(approval::classify(base, command)))
            }
            ToolKind::Custom(classifier) => Some(classifier.classify(base, arguments)),
        }
    }
}

/// Tool names that read without side effects.
pub const READ_ONLY_TOOLS: &[&str] = &[
    "Read", "List", "Search", "Glob", "Grep", "Diff", "Fetch", "Checklist", "Status",
];

/// Tool names that modify files.
pub const WRITE_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];

/// Name of the built-in shell tool.
pub const SHELL_TOOL: &str = "Bash";

/// Every built-in tool name.
pub fn builtin_tool_names() -> impl Iterator<Item = &'static str> {
    std::iter::once(SHELL_TOOL)
        .chain(READ_ONLY_TOOLS.iter().copied())
        .chain(WRITE_TOOLS.iter().copied())
}

/// Maps tool names to how their calls are classified.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolKind>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in tools: `Bash` as a shell tool and the file tools as
    /// plain tools.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SHELL_TOOL, ToolKind::shell());
        for name in builtin_tool_names().filter(|name| *name != SHELL_TOOL) {
            registry.register(name, ToolKind::Plain);
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, kind: ToolKind) -> &mut Self {
        self.tools.insert(name.into(), kind);
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, kind: ToolKind) -> Self {
        self.register(name, kind);
        self
    }

    /// Unknown tools are plain.
    pub fn kind(&self, name: &str) -> &ToolKind {
        static PLAIN: ToolKind = ToolKind::Plain;
        self.tools.get(name).unwrap_or(&PLAIN)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn plain_tools_have_no_classifier() {
        let registry = ToolRegistry::builtin();
        assert!(!registry.kind("Read").has_classifier());
        assert!(registry
            .kind("Read")
            .classify(Tier::AllowedWithoutPermission, &Arguments::new())
            .is_none());
    }

    #[test]
    fn builtin_names_cover_the_registry() {
        let registry = ToolRegistry::builtin();
        for name in builtin_tool_names() {
            assert!(registry.contains(name), "{name}");
        }
        assert_eq!(
            builtin_tool_names().count(),
            1 + READ_ONLY_TOOLS.len() + WRITE_TOOLS.len()
        );
    }

    #[test]
    fn unknown_tools_are_plain() {
        let registry = ToolRegistry::builtin();
        assert!(!registry.contains("mcp_server_tool"));
        assert!(matches!(registry.kind("mcp_server_tool"), ToolKind::Plain));
    }

    #[test]
    fn shell_tool_classifies_its_command() {
        let kind = ToolRegistry::builtin().kind("Bash").clone();
        let result = kind.classify(
            Tier::AllowedWithoutPermission,
            &args(json!({"command": "sudo rm -rf /"})),
        );
        assert_eq!(result, Some(Ok(Tier::Disabled)));
    }

    #[test]
    fn shell_tool_without_command_keeps_base() {
        let kind = ToolKind::shell();
        for arguments in [json!({}), json!({"command": 42}), json!({"command": null})] {
            assert_eq!(
                kind.classify(Tier::AskPermission, &args(arguments)),
                Some(Ok(Tier::AskPermission))
            );
        }
    }

    #[test]
    fn shell_tool_with_custom_argument() {
        let kind = ToolKind::Shell {
            argument: "script".to_string(),
        };
        assert_eq!(
            kind.classify(
                Tier::AllowedWithoutPermission,
                &args(json!({"script": "curl x"}))
            ),
            Some(Ok(Tier::AskPermission))
        );
    }

    #[test]
    fn closures_are_classifiers() {
        let kind = ToolKind::custom(
            |base: Tier, arguments: &Arguments| -> Result<Tier, ClassifierError> {
                if arguments.contains_key("danger") {
                    Ok(Tier::Disabled)
                } else {
                    Ok(base)
                }
            },
        );
        assert!(kind.has_classifier());
        assert_eq!(
            kind.classify(Tier::AskPermission, &args(json!({"danger": true}))),
            Some(Ok(Tier::Disabled))
        );
    }

    #[test]
    fn custom_classifier_errors_pass_through() {
        let kind = ToolKind::custom(|_: Tier, _: &Arguments| -> Result<Tier, ClassifierError> {
            Err(ClassifierError::MissingArgument("url".into()))
        });
        assert_eq!(
            kind.classify(Tier::AskPermission, &Arguments::new()),
            Some(Err(ClassifierError::MissingArgument("url".into())))
        );
    }

    #[test]
    fn debug_output() {
        assert_eq!(format!("{:?}", ToolKind::Plain), "Plain");
        assert_eq!(
            format!("{:?}", ToolKind::shell()),
            "Shell { argument: \"command\" }"
        );
        let passthrough =
            |base: Tier, _: &Arguments| -> Result<Tier, ClassifierError> { Ok(base) };
        let registry = ToolRegistry::new().with("x", ToolKind::custom(passthrough));
        assert_eq!(format!("{:?}", registry.kind("x")), "Custom(..)");
    }
}
