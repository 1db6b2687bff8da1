//! Shell command tokenization.
//!
//! Splits a single line of shell into words, control operators, glob
//! words and comments. Nothing is executed or expanded beyond removing
//! quotes; parameter expansions are replaced with the empty string so the
//! classifier can tell when a command depends on the environment.

mod tokenizer;

pub use tokenizer::{tokenize, Operator, Token, TokenizeError};
