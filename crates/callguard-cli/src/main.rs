//! callguard - evaluate tool calls and shell commands from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Would the agent be allowed to run this?
//! callguard check --tool Bash --args '{"command": "git push"}' --policy policies.json
//!
//! # Rate a command on its own, as words or as one command line
//! callguard classify -- rm -rf /
//! callguard classify 'ls && sudo id'
//!
//! # Which of these tools may be advertised to the model?
//! callguard filter --policy policies.json Read Write Bash
//! ```
//!
//! The exit code mirrors the decision: 0 allow, 1 ask, 2 exclude, 3 error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use callguard_core::policy::{
    effective_policies, load_policy_file, AgentScope, AgentTools, PermissionMode,
    PolicyFileError, PolicyOverrides, PolicySet, PolicySources,
};
use callguard_core::{assess, authorize, Arguments, Permission, Tier, ToolCall, ToolRegistry};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "callguard")]
#[command(version)]
#[command(about = "Authorize agent tool calls against permission policies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authorize one tool call and print the decision
    Check(CheckArgs),

    /// Classify a shell command
    Classify {
        /// Tier the command starts from
        #[arg(long, default_value_t = Permission::Allow)]
        base: Permission,

        /// The command: one command line, or separate words to quote and join
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },

    /// Print the tool names that are not excluded
    Filter {
        /// Policy file to resolve against
        #[arg(long)]
        policy: PathBuf,

        names: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Tool name
    #[arg(long)]
    tool: String,

    /// Tool arguments as a JSON object
    #[arg(long, value_name = "JSON")]
    args: Option<String>,

    /// Personal policy file
    #[arg(long, value_name = "FILE")]
    policy: Option<PathBuf>,

    #[arg(long, default_value_t = PermissionMode::Normal)]
    mode: PermissionMode,

    /// Allow a tool (can be repeated)
    #[arg(long, value_name = "TOOL")]
    allow: Vec<String>,

    /// Ask before running a tool (can be repeated)
    #[arg(long, value_name = "TOOL")]
    ask: Vec<String>,

    /// Exclude a tool (can be repeated)
    #[arg(long, value_name = "TOOL")]
    exclude: Vec<String>,

    /// No one can answer prompts; unknown tools are excluded
    #[arg(long)]
    headless: bool,

    /// Skip the built-in default policies
    #[arg(long)]
    no_defaults: bool,

    /// Scope tools like an agent file's `tools` key; replaces all other policies
    #[arg(long, value_name = "TOOLS")]
    agent_tools: Option<String>,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("Invalid --args JSON: {0}")]
    InvalidArguments(serde_json::Error),

    #[error("--args must be a JSON object")]
    ArgumentsNotObject,

    #[error(transparent)]
    PolicyFile(#[from] PolicyFileError),

    #[error("Could not quote command: {0}")]
    Quote(String),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

const EXIT_ERROR: u8 = 3;

fn exit_code(permission: Permission) -> u8 {
    match permission {
        Permission::Allow => 0,
        Permission::Ask => 1,
        Permission::Exclude => 2,
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(command: Commands) -> Result<u8, CliError> {
    match command {
        Commands::Check(args) => cmd_check(args),
        Commands::Classify { base, words } => cmd_classify(base, &words),
        Commands::Filter { policy, names } => cmd_filter(policy, names),
    }
}

fn cmd_check(args: CheckArgs) -> Result<u8, CliError> {
    let arguments = match args.args.as_deref() {
        Some(json) => parse_arguments(json)?,
        None => Arguments::new(),
    };
    let personal = match &args.policy {
        Some(path) => load_policy_file(path)?.policies,
        None => Vec::new(),
    };

    let sources = PolicySources {
        overrides: PolicyOverrides {
            allow: args.allow,
            ask: args.ask,
            exclude: args.exclude,
        },
        personal,
        include_defaults: !args.no_defaults,
        headless: args.headless,
        agent: args
            .agent_tools
            .as_deref()
            .map(|tools| AgentScope::new(Some(AgentTools::parse(tools)), Vec::new())),
    };
    let policies = effective_policies(args.mode, &sources);
    let call = ToolCall::new(args.tool).with_arguments(arguments);

    let authorization = authorize(&call, &policies, &ToolRegistry::builtin());
    println!("{}", serde_json::to_string_pretty(&authorization)?);
    Ok(exit_code(authorization.permission))
}

/// A single word is already a command line; several words are quoted and
/// joined so each stays one word.
fn command_line(words: &[String]) -> Result<String, CliError> {
    match words {
        [command] => Ok(command.clone()),
        _ => shlex::try_join(words.iter().map(String::as_str))
            .map_err(|e| CliError::Quote(e.to_string())),
    }
}

fn cmd_classify(base: Permission, words: &[String]) -> Result<u8, CliError> {
    let command = command_line(words)?;
    log::debug!("Classifying: {}", command);

    let assessment = assess(Tier::from(base), &command);
    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(exit_code(Permission::from(assessment.tier)))
}

fn filtered_names(policy: &Path, names: Vec<String>) -> Result<Vec<String>, CliError> {
    let file = load_policy_file(policy)?;
    let policies = PolicySet::new(file.policies);
    Ok(callguard_core::filter_excluded_tools(names, &policies))
}

fn cmd_filter(policy: PathBuf, names: Vec<String>) -> Result<u8, CliError> {
    for name in filtered_names(&policy, names)? {
        println!("{}", name);
    }
    Ok(0)
}

fn parse_arguments(json: &str) -> Result<Arguments, CliError> {
    match serde_json::from_str(json).map_err(CliError::InvalidArguments)? {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::ArgumentsNotObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callguard_core::policy::{save_policy_file, PolicyFile};
    use callguard_core::Policy;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn exit_codes_follow_permission() {
        assert_eq!(exit_code(Permission::Allow), 0);
        assert_eq!(exit_code(Permission::Ask), 1);
        assert_eq!(exit_code(Permission::Exclude), 2);
    }

    #[test]
    fn classify_takes_words_after_separator() {
        match parse(&["callguard", "classify", "--base", "ask", "--", "rm", "-rf", "/"]) {
            Commands::Classify { base, words } => {
                assert_eq!(base, Permission::Ask);
                assert_eq!(words, vec!["rm", "-rf", "/"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn classify_exit_codes() {
        let words = |s: &str| s.split(' ').map(String::from).collect::<Vec<_>>();
        assert_eq!(cmd_classify(Permission::Allow, &words("ls -la")).unwrap(), 0);
        assert_eq!(cmd_classify(Permission::Allow, &words("curl https://x")).unwrap(), 1);
        assert_eq!(cmd_classify(Permission::Allow, &words("rm -rf /")).unwrap(), 2);
    }

    #[test]
    fn single_word_is_a_command_line() {
        let line = |s: &str| vec![s.to_string()];
        assert_eq!(command_line(&line("ls && sudo id")).unwrap(), "ls && sudo id");
        assert_eq!(cmd_classify(Permission::Allow, &line("ls && sudo id")).unwrap(), 2);
        assert_eq!(cmd_classify(Permission::Allow, &line("ls -la | grep x")).unwrap(), 0);

        let words = vec!["echo".to_string(), "a b".to_string()];
        assert_eq!(command_line(&words).unwrap(), "echo 'a b'");
    }

    #[test]
    fn check_with_agent_tools() {
        let Commands::Check(args) = parse(&[
            "callguard",
            "check",
            "--tool",
            "Write",
            "--mode",
            "auto",
            "--agent-tools",
            "bash, read",
        ]) else {
            panic!("expected check");
        };
        assert_eq!(args.agent_tools.as_deref(), Some("bash, read"));
        assert_eq!(cmd_check(args).unwrap(), 2);
    }

    #[test]
    fn check_parses_repeated_overrides() {
        let command = parse(&[
            "callguard", "check", "--tool", "Bash", "--allow", "Bash", "--exclude", "Write",
            "--exclude", "Edit", "--mode", "plan", "--headless",
        ]);
        let Commands::Check(args) = command else {
            panic!("expected check");
        };
        assert_eq!(args.allow, vec!["Bash"]);
        assert_eq!(args.exclude, vec!["Write", "Edit"]);
        assert_eq!(args.mode, PermissionMode::Plan);
        assert!(args.headless);
        assert!(!args.no_defaults);
    }

    #[test]
    fn rejects_unknown_mode() {
        let args = ["callguard", "check", "--tool", "x", "--mode", "yolo"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn check_uses_policy_file_and_classifier() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policies.json");
        let file = PolicyFile {
            policies: vec![Policy::allow("Bash")],
        };
        save_policy_file(&path, &file).unwrap();

        let check = |command: &str| {
            let Commands::Check(args) = parse(&[
                "callguard",
                "check",
                "--tool",
                "Bash",
                "--args",
                &format!(r#"{{"command": "{command}"}}"#),
                "--policy",
                path.to_str().unwrap(),
            ]) else {
                panic!("expected check");
            };
            cmd_check(args).unwrap()
        };
        assert_eq!(check("git status"), 0);
        assert_eq!(check("curl https://x"), 0);
        assert_eq!(check("sudo rm -rf /"), 2);
    }

    #[test]
    fn arguments_must_be_an_object() {
        assert!(parse_arguments(r#"{"path": "/a.ts"}"#).is_ok());
        assert!(matches!(
            parse_arguments("[1, 2]"),
            Err(CliError::ArgumentsNotObject)
        ));
        assert!(matches!(
            parse_arguments("{not json"),
            Err(CliError::InvalidArguments(_))
        ));
    }

    #[test]
    fn filter_reads_policy_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policies.json");
        std::fs::write(&path, r#"{"policies": [{"tool": "Write", "permission": "exclude"}]}"#)
            .unwrap();
        let names = vec!["Read".to_string(), "Write".to_string()];
        assert_eq!(filtered_names(&path, names.clone()).unwrap(), vec!["Read"]);
        assert_eq!(cmd_filter(path, names).unwrap(), 0);
    }
}
