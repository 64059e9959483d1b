//! Line classification and tokenization.
//!
//! The language has no quoting: a token is simply a maximal run of
//! non-whitespace characters.

use thiserror::Error;

/// What a raw input line turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Empty or whitespace only.
    Blank,
    /// First non-whitespace character is `#`.
    Comment,
    /// Anything else; worth tokenizing.
    Command,
}

/// Errors that can occur while splitting a line into tokens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexingError {
    /// The line is longer than the configured maximum.
    #[error("input exceeds {limit} characters")]
    LineTooLong { limit: usize },
    /// The line holds more tokens than the configured maximum.
    #[error("too many arguments (limit is {limit})")]
    TooManyArguments { limit: usize },
}

/// Classify a line before any further processing.
pub fn classify(line: &str) -> LineKind {
    match line.trim_start().chars().next() {
        None => LineKind::Blank,
        Some('#') => LineKind::Comment,
        Some(_) => LineKind::Command,
    }
}

/// Limits enforced while tokenizing.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_line_len: usize,
    pub max_args: usize,
}

/// Split a line into whitespace-delimited tokens.
///
/// Runs of whitespace never produce empty tokens. Lines over the length or
/// argument limits are rejected as a whole.
pub fn split_into_tokens(line: &str, limits: Limits) -> Result<Vec<String>, LexingError> {
    if line.chars().count() > limits.max_line_len {
        return Err(LexingError::LineTooLong {
            limit: limits.max_line_len,
        });
    }

    let tokens: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
    if tokens.len() > limits.max_args {
        return Err(LexingError::TooManyArguments {
            limit: limits.max_args,
        });
    }
    Ok(tokens)
}
