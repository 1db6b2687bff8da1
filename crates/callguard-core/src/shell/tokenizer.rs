use std::fmt;
use thiserror::Error;

/// A shell control or redirection operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `;;`
    CaseEnd,
    /// `|&`
    PipeAll,
    /// `<(`
    ProcessSubstitution,
    /// `<<<`
    HereString,
    /// `>>`
    Append,
    /// `>&`
    DuplicateOutput,
    /// `<&`
    DuplicateInput,
    /// `&`
    Background,
    /// `;`
    Semicolon,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `|`
    Pipe,
    /// `<`
    RedirectIn,
    /// `>`
    RedirectOut,
}

/// Operators in match order: longer spellings first.
const OPERATORS: &[(&str, Operator)] = &[
    ("<<<", Operator::HereString),
    ("||", Operator::Or),
    ("&&", Operator::And),
    (";;", Operator::CaseEnd),
    ("|&", Operator::PipeAll),
    ("<(", Operator::ProcessSubstitution),
    (">>", Operator::Append),
    (">&", Operator::DuplicateOutput),
    ("<&", Operator::DuplicateInput),
    ("&", Operator::Background),
    (";", Operator::Semicolon),
    ("(", Operator::OpenParen),
    (")", Operator::CloseParen),
    ("|", Operator::Pipe),
    ("<", Operator::RedirectIn),
    (">", Operator::RedirectOut),
];

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::CaseEnd => ";;",
            Operator::PipeAll => "|&",
            Operator::ProcessSubstitution => "<(",
            Operator::HereString => "<<<",
            Operator::Append => ">>",
            Operator::DuplicateOutput => ">&",
            Operator::DuplicateInput => "<&",
            Operator::Background => "&",
            Operator::Semicolon => ";",
            Operator::OpenParen => "(",
            Operator::CloseParen => ")",
            Operator::Pipe => "|",
            Operator::RedirectIn => "<",
            Operator::RedirectOut => ">",
        }
    }

    /// `|` and `|&` feed the next command's stdin.
    pub fn is_pipe(self) -> bool {
        matches!(self, Operator::Pipe | Operator::PipeAll)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One token of a shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word with quotes removed and expansions replaced by nothing.
    Word(String),
    Operator(Operator),
    /// A word containing an unquoted `*` or `?`, kept as written.
    Glob(String),
    /// Text after an unquoted `#` that starts a word.
    Comment(String),
}

impl Token {
    /// The word text of `Word` and `Glob` tokens.
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::Glob(w) => Some(w),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("Unterminated single quote at offset {0}")]
    UnterminatedSingleQuote(usize),

    #[error("Unterminated double quote at offset {0}")]
    UnterminatedDoubleQuote(usize),

    #[error("Backslash at end of input")]
    DanglingEscape,

    #[error("Unterminated parameter expansion at offset {0}")]
    UnterminatedExpansion(usize),
}

/// Accumulates the characters of the word being read.
#[derive(Default)]
struct WordBuffer {
    text: String,
    /// A quote or expansion was seen, so an empty word is still a word.
    started: bool,
    glob: bool,
}

impl WordBuffer {
    fn is_empty(&self) -> bool {
        self.text.is_empty() && !self.started
    }

    fn flush(&mut self, tokens: &mut Vec<Token>) {
        if self.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        tokens.push(if self.glob {
            Token::Glob(text)
        } else {
            Token::Word(text)
        });
        self.started = false;
        self.glob = false;
    }
}

fn operator_at(chars: &[char], i: usize) -> Option<(Operator, usize)> {
    OPERATORS.iter().find_map(|(spelling, op)| {
        let len = spelling.chars().count();
        let candidate = chars.get(i..i + len)?;
        spelling
            .chars()
            .eq(candidate.iter().copied())
            .then_some((*op, len))
    })
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_special_parameter(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '@' | '*' | '#' | '?' | '$' | '!' | '-')
}

/// Skip a parameter expansion starting at the `$` at `i`.
///
/// Returns the index just past the expansion, or `None` if the `$` does not
/// start one and is a literal dollar sign.
fn skip_expansion(chars: &[char], i: usize) -> Result<Option<usize>, TokenizeError> {
    match chars.get(i + 1) {
        Some('{') => {
            let close = chars[i + 2..]
                .iter()
                .position(|&c| c == '}')
                .ok_or(TokenizeError::UnterminatedExpansion(i))?;
            Ok(Some(i + 2 + close + 1))
        }
        Some(&c) if is_name_start(c) => {
            let mut end = i + 2;
            while end < chars.len() && is_name_char(chars[end]) {
                end += 1;
            }
            Ok(Some(end))
        }
        Some(&c) if is_special_parameter(c) => Ok(Some(i + 2)),
        _ => Ok(None),
    }
}

/// Tokenize one line of shell.
///
/// Quotes are removed, backslash escapes are resolved and parameter
/// expansions (`$VAR`, `${...}`, `$1`, `$?`) become empty strings. A word
/// consisting only of an expansion therefore yields `Word("")`. `$(` is not
/// expanded: the `$` stays in the word and `(` becomes an operator.
pub fn tokenize(line: &str) -> Result<Vec<Token>, TokenizeError> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut word = WordBuffer::default();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            word.flush(&mut tokens);
            i += 1;
            continue;
        }

        if let Some((op, len)) = operator_at(&chars, i) {
            word.flush(&mut tokens);
            tokens.push(Token::Operator(op));
            i += len;
            continue;
        }

        match c {
            '#' if word.is_empty() => {
                let comment: String = chars[i + 1..].iter().collect();
                tokens.push(Token::Comment(comment));
                i = chars.len();
            }
            '\'' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&c| c == '\'')
                    .ok_or(TokenizeError::UnterminatedSingleQuote(i))?;
                word.text.extend(&chars[i + 1..i + 1 + close]);
                word.started = true;
                i += close + 2;
            }
            '"' => {
                i = read_double_quoted(&chars, i, &mut word)?;
            }
            '\\' => {
                let escaped = chars.get(i + 1).ok_or(TokenizeError::DanglingEscape)?;
                word.text.push(*escaped);
                i += 2;
            }
            '$' if chars.get(i + 1) == Some(&'\'') => {
                // ANSI-C quoting: content is kept as written.
                let start = i + 2;
                let close = chars[start..]
                    .iter()
                    .position(|&c| c == '\'')
                    .ok_or(TokenizeError::UnterminatedSingleQuote(i))?;
                word.text.extend(&chars[start..start + close]);
                word.started = true;
                i = start + close + 1;
            }
            '$' => match skip_expansion(&chars, i)? {
                Some(end) => {
                    word.started = true;
                    i = end;
                }
                None => {
                    word.text.push('$');
                    i += 1;
                }
            },
            '*' | '?' => {
                word.text.push(c);
                word.glob = true;
                i += 1;
            }
            _ => {
                word.text.push(c);
                i += 1;
            }
        }
    }

    word.flush(&mut tokens);
    Ok(tokens)
}

/// Read a double-quoted section starting at the opening quote at `open`.
/// Returns the index just past the closing quote.
fn read_double_quoted(
    chars: &[char],
    open: usize,
    word: &mut WordBuffer,
) -> Result<usize, TokenizeError> {
    word.started = true;
    let mut i = open + 1;

    while i < chars.len() {
        match chars[i] {
            '"' => return Ok(i + 1),
            '\\' => match chars.get(i + 1) {
                Some(&next @ ('"' | '\\' | '$' | '`')) => {
                    word.text.push(next);
                    i += 2;
                }
                Some(_) => {
                    word.text.push('\\');
                    i += 1;
                }
                None => break,
            },
            '$' => match skip_expansion(chars, i)? {
                Some(end) => i = end,
                None => {
                    word.text.push('$');
                    i += 1;
                }
            },
            c => {
                word.text.push(c);
                i += 1;
            }
        }
    }

    Err(TokenizeError::UnterminatedDoubleQuote(open))
}
