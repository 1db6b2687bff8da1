//! Text-level checks that the token stream cannot see: command and process
//! substitution, and encoded payloads.

use regex::Regex;
use std::sync::LazyLock;

static BACKTICKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());

static PROCESS_SUBSTITUTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[<>]\(").unwrap());

static BASE64_DECODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"base64\s+(?:-d|--decode)").unwrap());

/// Hex (`\x41`), unicode (`\u0041`) and octal (`\101`) escapes.
static ESCAPE_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:[xX][0-9a-fA-F]{2}|[uU][0-9a-fA-F]{4}|[0-7]{3})").unwrap()
});

/// Any escape `echo -e` or `printf` would interpret.
static INTERPRETED_ESCAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\[xnu0-7]").unwrap());

static ECHO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\becho\b").unwrap());
static XXD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bxxd\b").unwrap());
static OD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bod\b").unwrap());

/// Whether the text contains backticks, `$(...)`, `<(...)` or `>(...)`.
pub(super) fn has_command_substitution(command: &str) -> bool {
    command.contains('`') || command.contains("$(") || PROCESS_SUBSTITUTION.is_match(command)
}

/// The outermost substituted commands in `command`.
///
/// Parentheses are balanced so `$(a $(b) c)` yields `a $(b) c`; nested
/// substitutions are found when the inner text is classified in turn. An
/// unbalanced opener takes the rest of the text.
pub(super) fn extract_substituted_commands(command: &str) -> Vec<String> {
    let mut commands: Vec<String> = BACKTICKS
        .captures_iter(command)
        .map(|caps| caps[1].to_string())
        .collect();

    let chars: Vec<char> = command.chars().collect();
    let mut i = 0;
    while i + 1 < chars.len() {
        if !(matches!(chars[i], '$' | '<' | '>') && chars[i + 1] == '(') {
            i += 1;
            continue;
        }

        let start = i + 2;
        let mut end = start;
        let mut depth = 1;
        while end < chars.len() {
            match chars[end] {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            end += 1;
        }

        let inner: String = chars[start..end].iter().collect();
        if !inner.trim().is_empty() {
            commands.push(inner);
        }
        i = end + 1;
    }

    commands
}

/// Encoded or escaped payloads that hide what will actually run.
pub(super) fn has_obfuscation(command: &str) -> bool {
    if BASE64_DECODE.is_match(command) || ESCAPE_SEQUENCE.is_match(command) {
        return true;
    }

    let interprets_escapes = INTERPRETED_ESCAPE.is_match(command);
    if interprets_escapes && ECHO.is_match(command) && command.contains("-e") {
        return true;
    }
    if interprets_escapes && command.contains("printf") {
        return true;
    }

    (XXD.is_match(command) && command.contains("-r"))
        || (OD.is_match(command) && (command.contains("-x") || command.contains("-o")))
}
