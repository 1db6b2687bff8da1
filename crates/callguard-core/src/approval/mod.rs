//! Command risk classification.
//!
//! Decides how much scrutiny a shell command needs before it runs:
//! - Each line is tokenized and split into simple commands on operators
//! - Every simple command is checked against critical, high-risk and safe
//!   rules (see [`rules`])
//! - Pipes into interpreters, command substitution, unexpanded variables
//!   and encoded payloads force at least `AskPermission`
//!
//! The result is never less restrictive than the base tier passed in, and
//! a `Disabled` finding anywhere wins for the whole command.

mod commands;
mod rules;
mod substitution;

use crate::shell::{tokenize, Token};
use crate::tier::Tier;
use regex::Regex;
use rules::CommandRisk;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Nesting limit for command substitution.
pub const MAX_SUBSTITUTION_DEPTH: usize = 16;

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n|\n|\r").unwrap());

/// `$NAME` or `${...}`.
static VARIABLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[\w{]").unwrap());

/// Why a command was escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskReason {
    Critical,
    HighRisk,
    Unrecognized,
    PipeToInterpreter,
    Substitution,
    Obfuscation,
    VariableExpansion,
    Unparseable,
    DepthLimit,
}

impl RiskReason {
    pub fn description(self) -> &'static str {
        match self {
            RiskReason::Critical => "critical command",
            RiskReason::HighRisk => "high-risk command",
            RiskReason::Unrecognized => "unrecognized command",
            RiskReason::PipeToInterpreter => "output piped into an interpreter or network tool",
            RiskReason::Substitution => "command substitution",
            RiskReason::Obfuscation => "encoded or escaped payload",
            RiskReason::VariableExpansion => "depends on unexpanded variables",
            RiskReason::Unparseable => "could not be parsed",
            RiskReason::DepthLimit => "substitution nested too deeply",
        }
    }
}

impl fmt::Display for RiskReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// The command text responsible for a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub reason: RiskReason,
    pub command: String,
}

/// A classification with the evidence behind the most restrictive finding.
///
/// `evidence` is `None` when nothing raised the tier above what the caller
/// passed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub tier: Tier,
    pub evidence: Option<Evidence>,
}

impl Assessment {
    fn unchanged(base: Tier) -> Self {
        Self {
            tier: base,
            evidence: None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.tier.is_disabled()
    }

    /// Raise the tier to at least `tier`. Evidence is only replaced by a
    /// strictly more restrictive finding.
    fn escalate(&mut self, tier: Tier, reason: RiskReason, command: impl Into<String>) {
        let fills_gap = tier == self.tier
            && self.evidence.is_none()
            && tier != Tier::AllowedWithoutPermission;
        if tier > self.tier || fills_gap {
            self.tier = tier;
            self.evidence = Some(Evidence {
                reason,
                command: command.into(),
            });
        }
    }

    fn merge(&mut self, other: Assessment) {
        match other.evidence {
            Some(evidence) => self.escalate(other.tier, evidence.reason, evidence.command),
            None => self.tier = self.tier.max(other.tier),
        }
    }
}

/// Classify `command` starting from `base`, keeping the evidence.
pub fn assess(base: Tier, command: &str) -> Assessment {
    assess_at_depth(base, command, 0)
}

/// Classify `command` starting from `base`.
///
/// `Disabled` stays `Disabled` without looking at the command, and an empty
/// command leaves `base` unchanged.
pub fn classify(base: Tier, command: &str) -> Tier {
    assess(base, command).tier
}

fn assess_at_depth(base: Tier, command: &str, depth: usize) -> Assessment {
    let mut result = Assessment::unchanged(base);
    let command = command.trim();
    if base.is_disabled() || command.is_empty() {
        return result;
    }

    if depth >= MAX_SUBSTITUTION_DEPTH {
        log::warn!(
            "Command substitution nested deeper than {}, requiring permission",
            MAX_SUBSTITUTION_DEPTH
        );
        result.escalate(Tier::AskPermission, RiskReason::DepthLimit, command);
        return result;
    }

    // Newlines separate commands like `;` does.
    for line in LINE_BREAK.split(command) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        result.merge(assess_line(base, line, depth));
        if result.is_disabled() {
            break;
        }
    }

    result
}

fn assess_line(base: Tier, line: &str, depth: usize) -> Assessment {
    let mut result = match tokenize(line) {
        Ok(tokens) => assess_tokens(base, &tokens, line),
        Err(err) => {
            log::warn!("Failed to tokenize command line {:?}: {}", line, err);
            let mut result = Assessment::unchanged(base);
            result.escalate(Tier::AskPermission, RiskReason::Unparseable, line);

            // Still look at the words so a critical command behind a stray
            // quote is caught.
            let words: Vec<Token> = line
                .split_whitespace()
                .map(|w| Token::Word(w.to_string()))
                .collect();
            result.merge(evaluate_tokens(base, &words, line));
            result
        }
    };

    if !result.is_disabled() {
        assess_text(&mut result, base, line, depth);
    }
    result
}

/// Checks on the raw line: substitutions are classified recursively and
/// encoded payloads flagged. Runs once per line, however many times the
/// token stream is walked.
fn assess_text(result: &mut Assessment, base: Tier, line: &str, depth: usize) {
    if substitution::has_command_substitution(line) {
        for inner in substitution::extract_substituted_commands(line) {
            result.merge(assess_at_depth(base, &inner, depth + 1));
            if result.is_disabled() {
                return;
            }
        }
        result.escalate(Tier::AskPermission, RiskReason::Substitution, line);
    }

    if substitution::has_obfuscation(line) {
        result.escalate(Tier::AskPermission, RiskReason::Obfuscation, line);
    }
}

fn is_empty_word(token: &Token) -> bool {
    matches!(token, Token::Word(w) if w.is_empty())
}

/// Handle variable-expansion ambiguity, then evaluate.
///
/// Expansions tokenize to empty words. Unless those are explained by
/// literal `""`/`''`, or whenever `$NAME`/`${` appears, the line is
/// evaluated both with and without the empty words and can be no better
/// than `AskPermission`.
fn assess_tokens(base: Tier, tokens: &[Token], line: &str) -> Assessment {
    let has_empty_word = tokens.iter().any(is_empty_word);
    let empty_quotes = line.contains("\"\"") || line.contains("''");
    let ambiguous = (has_empty_word && !empty_quotes) || VARIABLE.is_match(line);

    let mut result = evaluate_tokens(base, tokens, line);
    if !ambiguous || result.is_disabled() {
        return result;
    }

    if has_empty_word {
        let without_empty: Vec<Token> = tokens
            .iter()
            .filter(|t| !is_empty_word(t))
            .cloned()
            .collect();
        if !without_empty.is_empty() {
            result.merge(evaluate_tokens(base, &without_empty, line));
        }
    }

    result.escalate(Tier::AskPermission, RiskReason::VariableExpansion, line);
    result
}

fn render(words: &[String]) -> String {
    shlex::try_join(words.iter().map(String::as_str)).unwrap_or_else(|_| words.join(" "))
}

fn check_words(result: &mut Assessment, words: &[String], line: &str) {
    if words.is_empty() {
        return;
    }
    let risk = rules::check_command(words, line);
    let reason = match risk {
        CommandRisk::Safe => return,
        CommandRisk::Critical => RiskReason::Critical,
        CommandRisk::HighRisk => RiskReason::HighRisk,
        CommandRisk::VariableCommand => RiskReason::VariableExpansion,
        CommandRisk::Unrecognized => RiskReason::Unrecognized,
    };
    result.escalate(risk.tier(), reason, render(words));
}

/// The simple command a pipe feeds, if it is an interpreter or network tool.
fn pipe_sink(rest: &[Token]) -> Option<Vec<String>> {
    let words: Vec<String> = rest
        .iter()
        .skip_while(|t| matches!(t, Token::Operator(_)))
        .take_while(|t| !matches!(t, Token::Operator(_)))
        .filter_map(|t| t.as_word().map(str::to_string))
        .collect();

    let name = rules::executed_name(&words)?;
    commands::PIPE_SINKS.contains(name.as_str()).then_some(words)
}

fn evaluate_tokens(base: Tier, tokens: &[Token], line: &str) -> Assessment {
    let mut result = Assessment::unchanged(base);
    let mut words: Vec<String> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Comment(_) => {}
            Token::Word(w) | Token::Glob(w) => words.push(w.clone()),
            Token::Operator(op) => {
                check_words(&mut result, &words, line);
                words.clear();
                if result.is_disabled() {
                    return result;
                }

                if op.is_pipe() {
                    if let Some(sink) = pipe_sink(&tokens[i + 1..]) {
                        result.escalate(
                            Tier::AskPermission,
                            RiskReason::PipeToInterpreter,
                            render(&sink),
                        );
                    }
                }
            }
        }
    }

    check_words(&mut result, &words, line);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOW: Tier = Tier::AllowedWithoutPermission;
    const ASK: Tier = Tier::AskPermission;
    const DISABLED: Tier = Tier::Disabled;

    // ============================================
    // Base tier handling
    // ============================================

    mod base_tier {
        use super::*;

        #[test]
        fn disabled_base_is_absolute() {
            assert_eq!(classify(DISABLED, "ls -la"), DISABLED);
            assert_eq!(classify(DISABLED, ""), DISABLED);
        }

        #[test]
        fn empty_command_keeps_base() {
            assert_eq!(classify(ALLOW, ""), ALLOW);
            assert_eq!(classify(ASK, "   \n  "), ASK);
        }

        #[test]
        fn never_less_restrictive_than_base() {
            for cmd in ["ls", "echo hi", "git status", "frobnicate", "rm -rf /"] {
                assert!(classify(ASK, cmd) >= ASK, "{cmd}");
            }
        }

        #[test]
        fn safe_commands_keep_base() {
            assert_eq!(classify(ALLOW, "ls -la"), ALLOW);
            assert_eq!(classify(ASK, "ls -la"), ASK);
        }

        #[test]
        fn deterministic() {
            let cmd = "cat x | grep y && curl z";
            assert_eq!(assess(ALLOW, cmd), assess(ALLOW, cmd));
        }
    }

    // ============================================
    // Operators and pipes
    // ============================================

    mod chains {
        use super::*;

        #[test]
        fn most_restrictive_part_wins() {
            assert_eq!(classify(ALLOW, "ls && pwd"), ALLOW);
            assert_eq!(classify(ALLOW, "ls && curl x"), ASK);
            assert_eq!(classify(ALLOW, "ls; sudo reboot"), DISABLED);
            assert_eq!(classify(ALLOW, "ls || rm -rf /"), DISABLED);
        }

        #[test]
        fn pipe_into_interpreter() {
            let result = assess(ALLOW, "cat script.txt | sh");
            assert_eq!(result.tier, ASK);
            assert_eq!(
                result.evidence.map(|e| e.reason),
                Some(RiskReason::PipeToInterpreter)
            );
        }

        #[test]
        fn pipe_sink_uses_basename() {
            assert_eq!(classify(ALLOW, "echo x | /bin/bash"), ASK);
            assert_eq!(classify(ALLOW, "ls | PYTHON"), ASK);
        }

        #[test]
        fn pipe_between_safe_commands() {
            assert_eq!(classify(ALLOW, "ls | grep foo | wc -l"), ALLOW);
        }

        #[test]
        fn comments_are_ignored() {
            assert_eq!(classify(ALLOW, "ls # rm -rf /"), ALLOW);
        }
    }

    // ============================================
    // Multi-line commands
    // ============================================

    mod lines {
        use super::*;

        #[test]
        fn newline_separates_commands() {
            assert_eq!(classify(ALLOW, "echo hi\nrm -rf /"), DISABLED);
            assert_eq!(classify(ALLOW, "ls\r\nsudo ls"), DISABLED);
            assert_eq!(classify(ALLOW, "ls\rcurl x"), ASK);
        }

        #[test]
        fn blank_lines_are_skipped() {
            assert_eq!(classify(ALLOW, "ls\n\n\npwd\n"), ALLOW);
        }
    }

    // ============================================
    // Substitution
    // ============================================

    mod substitution {
        use super::*;

        #[test]
        fn substitution_requires_permission() {
            let result = assess(ALLOW, "echo $(cat /etc/passwd)");
            assert_eq!(result.tier, ASK);
            assert_eq!(
                result.evidence.map(|e| e.reason),
                Some(RiskReason::Substitution)
            );
            assert_eq!(classify(ALLOW, "echo `whoami`"), ASK);
            assert_eq!(classify(ALLOW, "diff <(ls a) <(ls b)"), ASK);
        }

        #[test]
        fn critical_inside_substitution() {
            assert_eq!(classify(ALLOW, "echo $(sudo cat /etc/shadow)"), DISABLED);
            assert_eq!(classify(ALLOW, "echo `sudo id`"), DISABLED);
        }

        #[test]
        fn nested_substitution() {
            assert_eq!(classify(ALLOW, "echo $(echo $(rm -rf /))"), DISABLED);
        }

        #[test]
        fn deep_nesting_is_bounded() {
            let depth = MAX_SUBSTITUTION_DEPTH * 4;
            let cmd = format!("{}ls{}", "echo $(".repeat(depth), ")".repeat(depth));
            let result = assess(ALLOW, &cmd);
            assert_eq!(result.tier, ASK);
        }

        #[test]
        fn nested_variables_take_linear_time() {
            // Each level is ambiguous and evaluated twice; substitutions
            // must still be classified only once per level.
            let depth = MAX_SUBSTITUTION_DEPTH + 2;
            let padding = "a".repeat(400);
            let cmd = format!(
                "{}ls{}",
                format!("echo $X {padding} $(").repeat(depth),
                ")".repeat(depth)
            );

            let start = std::time::Instant::now();
            let result = assess(ALLOW, &cmd);
            assert_eq!(result.tier, ASK);
            assert!(
                start.elapsed() < std::time::Duration::from_secs(2),
                "took {:?}",
                start.elapsed()
            );
        }

        #[test]
        fn substitution_checked_once_for_ambiguous_lines() {
            assert_eq!(classify(ALLOW, "echo $X $(rm -rf /)"), DISABLED);
            assert_eq!(classify(ALLOW, "$CMD $(sudo id)"), DISABLED);
            let result = assess(ALLOW, "echo $(ls) $'\\x41'");
            assert_eq!(result.tier, ASK);
        }

        #[test]
        fn depth_limit_reason() {
            let result = assess_at_depth(ALLOW, "ls", MAX_SUBSTITUTION_DEPTH);
            assert_eq!(result.tier, ASK);
            assert_eq!(
                result.evidence.map(|e| e.reason),
                Some(RiskReason::DepthLimit)
            );
        }
    }

    // ============================================
    // Variables
    // ============================================

    mod variables {
        use super::*;

        #[test]
        fn variable_command_words() {
            assert_eq!(classify(ALLOW, "$CMD test"), ASK);
            assert_eq!(classify(ALLOW, "${CMD} test"), ASK);
            assert_eq!(classify(ALLOW, "$A$B$C"), ASK);
        }

        #[test]
        fn variable_arguments() {
            assert_eq!(classify(ALLOW, "echo \"$VAR\" test"), ASK);
            assert_eq!(classify(ALLOW, "$SHELL -c 'rm -rf /'"), ASK);
        }

        #[test]
        fn hidden_deletion_is_still_critical() {
            assert_eq!(classify(ALLOW, "${RM} -rf /"), DISABLED);
            assert_eq!(classify(ALLOW, "$SUDO_CMD rm -rf /"), DISABLED);
        }

        #[test]
        fn literal_empty_quotes_are_not_variables() {
            assert_eq!(classify(ALLOW, "echo '' test"), ALLOW);
            assert_eq!(classify(ALLOW, "echo \"\" test"), ALLOW);
        }

        #[test]
        fn reason_is_recorded() {
            let result = assess(ALLOW, "echo $HOME");
            assert_eq!(result.tier, ASK);
            assert_eq!(
                result.evidence.map(|e| e.reason),
                Some(RiskReason::VariableExpansion)
            );
        }
    }

    // ============================================
    // Obfuscation and parse failures
    // ============================================

    mod obfuscation {
        use super::*;

        #[test]
        fn encoded_payloads() {
            assert_eq!(classify(ALLOW, "echo $'\\x72\\x6d' $'\\x2d\\x72\\x66'"), ASK);
            assert_eq!(classify(ALLOW, "echo $'\\x72\\x6d' -rf /"), DISABLED);
            assert_eq!(classify(ALLOW, "echo -e '\\x41'"), ASK);
        }

        #[test]
        fn base64_into_shell() {
            assert_eq!(classify(ALLOW, "echo cm0gLXJmIC8= | base64 -d | sh"), ASK);
        }
    }

    mod unparseable {
        use super::*;

        #[test]
        fn unterminated_quote_requires_permission() {
            let result = assess(ALLOW, "echo 'unterminated");
            assert_eq!(result.tier, ASK);
            assert_eq!(
                result.evidence.map(|e| e.reason),
                Some(RiskReason::Unparseable)
            );
        }

        #[test]
        fn critical_command_behind_stray_quote() {
            assert_eq!(classify(ALLOW, "rm -rf / 'oops"), DISABLED);
            assert_eq!(classify(ALLOW, "sudo ls \""), DISABLED);
        }
    }

    mod evidence {
        use super::*;

        #[test]
        fn records_the_offending_command() {
            let result = assess(ALLOW, "ls && rm -rf '/'");
            assert_eq!(result.tier, DISABLED);
            let evidence = result.evidence.unwrap();
            assert_eq!(evidence.reason, RiskReason::Critical);
            assert_eq!(evidence.command, "rm -rf /");
        }

        #[test]
        fn quotes_words_with_spaces() {
            let result = assess(ALLOW, "frobnicate 'two words'");
            assert_eq!(result.evidence.unwrap().command, "frobnicate 'two words'");
        }

        #[test]
        fn no_evidence_when_nothing_escalates() {
            assert_eq!(assess(ALLOW, "git status").evidence, None);
        }

        #[test]
        fn evidence_for_ask_base() {
            let result = assess(ASK, "curl https://example.com");
            assert_eq!(result.tier, ASK);
            assert_eq!(result.evidence.unwrap().reason, RiskReason::HighRisk);
        }

        #[test]
        fn serializes_camel_case() {
            let result = assess(ALLOW, "curl x");
            let json = serde_json::to_value(&result).unwrap();
            assert_eq!(json["tier"], "askPermission");
            assert_eq!(json["evidence"]["reason"], "highRisk");
        }
    }
}
