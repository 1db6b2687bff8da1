//! Risk rules for a single simple command.
//!
//! A simple command is one run of words between control operators. Rules
//! are checked in priority order: critical, then high risk, then known
//! safe. Anything else is unrecognized and needs permission.

use super::commands::*;
use crate::tier::Tier;
use regex::Regex;
use std::sync::LazyLock;

/// `name() {`, `function name {` and `function name()` at line start.
static FUNCTION_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\w+\s*\(\)\s*\{|function\s+\w+\s*(?:\{|\(\)))").unwrap()
});

/// Outcome of checking one simple command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CommandRisk {
    Critical,
    HighRisk,
    /// The command word itself is a parameter expansion.
    VariableCommand,
    Unrecognized,
    Safe,
}

impl CommandRisk {
    pub(super) fn tier(self) -> Tier {
        match self {
            CommandRisk::Critical => Tier::Disabled,
            CommandRisk::Safe => Tier::AllowedWithoutPermission,
            _ => Tier::AskPermission,
        }
    }

    fn severity(self) -> u8 {
        match self {
            CommandRisk::Safe => 0,
            CommandRisk::Unrecognized => 1,
            CommandRisk::VariableCommand => 2,
            CommandRisk::HighRisk => 3,
            CommandRisk::Critical => 4,
        }
    }

    fn most_severe(self, other: CommandRisk) -> CommandRisk {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

/// Classify one simple command. `line` is the source line it came from.
///
/// Leading `NAME=value` assignments are skipped, the command word is looked
/// up by its basename (`/usr/bin/sudo` is `sudo`), and wrappers such as
/// `env` or `xargs` are rated by the command they run.
pub(super) fn check_command(words: &[String], line: &str) -> CommandRisk {
    let assignments = words.iter().take_while(|w| is_assignment(w)).count();
    if assignments > 0 && assignments < words.len() {
        let (prefix, command) = words.split_at(assignments);
        let own = if prefix.iter().any(|w| sets_sensitive_variable(w)) {
            CommandRisk::HighRisk
        } else {
            CommandRisk::Safe
        };
        return own.most_severe(check_command(command, line));
    }

    let Some((first, args)) = words.split_first() else {
        return CommandRisk::Safe;
    };
    let path = first.to_lowercase();
    let base = command_name(&path);

    if is_critical(base, args) {
        CommandRisk::Critical
    } else if path.starts_with('$') || base.starts_with('$') {
        CommandRisk::VariableCommand
    } else if let Some(inner) = wrapped_command(base, args) {
        let own = if is_high_risk(base, args, line) {
            CommandRisk::HighRisk
        } else {
            CommandRisk::Safe
        };
        own.most_severe(check_command(&inner, line))
    } else if is_direct_script(&path) || is_high_risk(base, args, line) {
        CommandRisk::HighRisk
    } else if is_safe(base, args) {
        CommandRisk::Safe
    } else {
        CommandRisk::Unrecognized
    }
}

/// The name a command word runs: its basename, lowercased by the caller,
/// without a Windows `.exe` suffix.
fn command_name(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.strip_suffix(".exe").unwrap_or(name)
}

/// The name of the program a simple command finally executes, looking
/// through assignments and wrappers.
pub(super) fn executed_name(words: &[String]) -> Option<String> {
    let start = words.iter().position(|w| !is_assignment(w))?;
    let (first, args) = words[start..].split_first()?;
    let path = first.to_lowercase();
    let base = command_name(&path);
    match wrapped_command(base, args) {
        Some(inner) => executed_name(&inner),
        None => Some(base.to_string()),
    }
}

/// `NAME=value` as a command prefix.
fn is_assignment(word: &str) -> bool {
    word.split_once('=').is_some_and(|(name, _)| {
        let mut chars = name.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

fn sets_sensitive_variable(assignment: &str) -> bool {
    assignment
        .split_once('=')
        .is_some_and(|(name, _)| SENSITIVE_VARIABLES.contains(&name))
}

fn is_direct_script(path: &str) -> bool {
    path.starts_with("./") || path.starts_with("../")
}

/// The command line a wrapper such as `env`, `nohup` or `xargs` runs, if
/// it runs one. `command -v` only looks a name up.
fn wrapped_command(base: &str, args: &[String]) -> Option<Vec<String>> {
    let value_flags: &[&str] = match base {
        "env" => &["-u", "--unset", "-C", "--chdir"],
        "nice" => &["-n", "--adjustment"],
        "time" => &["-f", "--format", "-o", "--output"],
        "timeout" => &["-s", "--signal", "-k", "--kill-after"],
        "ionice" => &["-c", "--class", "-n", "--classdata"],
        "xargs" => &[
            "-a", "-d", "-E", "-I", "-L", "-n", "-P", "-s", "--arg-file", "--delimiter",
            "--max-args", "--max-procs",
        ],
        _ if COMMAND_WRAPPERS.contains(&base) => &[],
        _ => return None,
    };

    let mut words: Vec<String> = Vec::new();
    let mut i = 0;
    while let Some(arg) = args.get(i) {
        if arg == "--" {
            i += 1;
            break;
        }
        if !arg.starts_with('-') || arg.len() == 1 {
            break;
        }
        match arg.as_str() {
            "-v" | "-V" if base == "command" => return None,
            // `env -S 'cmd args'` splits its value into the command line.
            "-S" | "--split-string" if base == "env" => {
                if let Some(value) = args.get(i + 1) {
                    words.extend(value.split_whitespace().map(String::from));
                }
                i += 2;
            }
            flag if value_flags.contains(&flag) => i += 2,
            _ => i += 1,
        }
    }

    let mut rest = args.get(i..).unwrap_or_default();
    if base == "timeout" && words.is_empty() {
        // The duration comes first.
        rest = rest.get(1..).unwrap_or_default();
    }
    words.extend(rest.iter().cloned());
    (!words.is_empty()).then_some(words)
}

fn any_arg(args: &[String], pred: impl Fn(&str) -> bool) -> bool {
    args.iter().any(|a| pred(a))
}

fn has_arg(args: &[String], value: &str) -> bool {
    args.iter().any(|a| a == value)
}

// ============================================================================
// CRITICAL
// ============================================================================

fn is_short_flag(word: &str) -> bool {
    word.starts_with('-') && !word.starts_with("--") && word.len() > 1
}

/// Recursive and forced deletion flags, even split or merged (`-r -f`,
/// `-Rf`, `-fr`, `--recursive --force`).
fn has_recursive_force(words: &[&str]) -> bool {
    let recursive = words
        .iter()
        .any(|w| (is_short_flag(w) && w.contains(['r', 'R'])) || *w == "--recursive");
    let force = words
        .iter()
        .any(|w| (is_short_flag(w) && w.contains('f')) || *w == "--force");
    recursive && force
}

fn is_system_path(word: &str) -> bool {
    let normalized = if word.len() > 1 {
        word.trim_end_matches('/')
    } else {
        word
    };
    let normalized = if normalized.is_empty() { "/" } else { normalized };

    SYSTEM_PATHS.contains(normalized)
        || SYSTEM_PATH_PREFIXES.iter().any(|p| word.starts_with(p))
}

fn is_critical(base: &str, args: &[String]) -> bool {
    if base.starts_with("mkfs") || CRITICAL_COMMANDS.contains(base) {
        return true;
    }

    // Flags and path anywhere on the line, so a deletion hidden behind a
    // variable command word is still caught.
    let words: Vec<&str> = std::iter::once(base)
        .chain(args.iter().map(String::as_str))
        .collect();
    if has_recursive_force(&words) && words.iter().any(|w| is_system_path(w)) {
        return true;
    }

    match base {
        "rm" => any_arg(args, |a| CRITICAL_RM_TARGETS.iter().any(|t| a.contains(t))),
        "del" => {
            let lowered: Vec<String> = args.iter().map(|a| a.to_lowercase()).collect();
            (has_arg(&lowered, "/s") && has_arg(&lowered, "/q"))
                || any_arg(&lowered, |a| a.contains("c:\\") || a.contains("c:/"))
        }
        "dd" => any_arg(args, |a| a.contains("of=/dev/")),
        "chmod" => any_arg(args, |a| DANGEROUS_CHMOD_MODES.contains(a)),
        "chown" => any_arg(args, |a| a.contains("root")),
        "icacls" => any_arg(args, |a| {
            let a = a.to_lowercase();
            EVERYONE_GRANTS.iter().any(|g| a.contains(g))
        }),
        _ => false,
    }
}

// ============================================================================
// HIGH RISK
// ============================================================================

fn is_high_risk(base: &str, args: &[String], line: &str) -> bool {
    if HIGH_RISK_COMMANDS.contains(base) {
        return true;
    }

    if PACKAGE_MANAGERS.contains(base)
        && args
            .first()
            .is_some_and(|a| INSTALL_SUBCOMMANDS.contains(&a.as_str()))
    {
        return true;
    }

    if INTERPRETERS.contains(base) {
        let info_only = args.len() == 1 && matches!(args[0].as_str(), "--help" | "--version");
        if !args.is_empty() && !info_only {
            return true;
        }
    }

    if SCRIPT_EXTENSIONS.iter().any(|ext| base.ends_with(ext)) {
        return true;
    }

    if ENVIRONMENT_SETTERS.contains(&base)
        && any_arg(args, |a| SENSITIVE_VARIABLES.iter().any(|v| a.contains(v)))
    {
        return true;
    }

    if FUNCTION_DEFINITION.is_match(line) {
        return true;
    }

    match base {
        "mv" | "cp" | "copy" => any_arg(args, |a| {
            let a = a.to_lowercase();
            SENSITIVE_LOCATIONS.iter().any(|loc| a.contains(loc))
        }),
        "history" => has_arg(args, "-c"),
        "unset" => any_arg(args, |a| a.contains("HIST")),
        "defaults" => any_arg(args, |a| a.contains("/Library/")),
        _ if ARCHIVE_EXTRACTORS.contains(&base) => {
            extracts_to_absolute_path(args, &["-C", "-d", "-o"])
        }
        _ => false,
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.to_lowercase().starts_with("c:\\")
}

/// `-C /dir`, `-d /dir` or the joined `-C/dir` forms.
fn extracts_to_absolute_path(args: &[String], flags: &[&str]) -> bool {
    args.iter().enumerate().any(|(i, arg)| {
        if flags.contains(&arg.as_str()) {
            return args.get(i + 1).is_some_and(|next| is_absolute(next));
        }
        flags
            .iter()
            .any(|flag| arg.strip_prefix(flag).is_some_and(|rest| rest.starts_with('/')))
    })
}

// ============================================================================
// SAFE
// ============================================================================

fn is_safe(base: &str, args: &[String]) -> bool {
    if READ_ONLY_COMMANDS.contains(base) {
        return true;
    }

    match base {
        "grep" => !has_arg(args, "--exec"),
        "find" => !any_arg(args, |a| FIND_ACTION_FLAGS.contains(&a)),
        "git" => is_safe_git(args),
        "tar" => is_tar_create(args) && !extracts_to_absolute_path(args, &["-C"]),
        "zip" => !any_arg(args, |a| a.starts_with("-d/")),
        _ if SCRIPT_RUNNERS.contains(&base) => is_safe_script_run(args),
        _ if BUILD_TOOLS.contains(&base) => any_arg(args, |a| BUILD_TARGETS.contains(&a)),
        _ => false,
    }
}

/// Read-only git invocations.
///
/// Only flags that cannot change behavior may precede the subcommand;
/// `git -c core.pager=... log` is not read-only.
fn is_safe_git(args: &[String]) -> bool {
    let mut rest = args
        .iter()
        .map(String::as_str)
        .skip_while(|a| HARMLESS_GIT_FLAGS.contains(a));

    let Some(subcommand) = rest.next() else {
        return false;
    };
    if !SAFE_GIT_SUBCOMMANDS.contains(subcommand) {
        return false;
    }

    let rest: Vec<&str> = rest.collect();
    if rest.iter().any(|a| a.starts_with("--output")) {
        return false;
    }

    match subcommand {
        "branch" => !rest.iter().any(|a| BRANCH_MUTATING_FLAGS.contains(a)),
        "remote" => match rest.first() {
            None => true,
            Some(&("show" | "get-url")) => true,
            Some(_) => rest.iter().all(|a| matches!(*a, "-v" | "--verbose")),
        },
        _ => true,
    }
}

/// `npm test`, `yarn build`, `pnpm run lint` and friends, unless they name
/// an install lifecycle script.
fn is_safe_script_run(args: &[String]) -> bool {
    let is_lifecycle = |script: &String| LIFECYCLE_SCRIPTS.contains(&script.as_str());

    match args.first().map(String::as_str) {
        Some("test" | "build" | "start") => !args.get(1).is_some_and(is_lifecycle),
        Some("run") => args.get(1).is_some_and(|script| !is_lifecycle(script)),
        _ => false,
    }
}

/// Archive creation: `tar -czf`, `tar cf`, `tar --create`.
fn is_tar_create(args: &[String]) -> bool {
    if has_arg(args, "--create") {
        return true;
    }
    let Some(first) = args.first() else {
        return false;
    };
    if first.starts_with("--") {
        return false;
    }
    let cluster = first.trim_start_matches('-');
    cluster.chars().all(|c| c.is_ascii_alphabetic())
        && cluster.contains('c')
        && !cluster.contains('x')
}
