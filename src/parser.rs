use std::path::PathBuf;
use thiserror::Error;

const BACKGROUND_MARKER: &str = "&";
const OUTPUT_MARKER: &str = ">";
const INPUT_MARKER: &str = "<";

/// A fully planned external command.
///
/// `args[0]` is always the program itself, ready to be handed to `execvp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
    pub input_redirect: Option<PathBuf>,
    pub output_redirect: Option<PathBuf>,
    pub background: bool,
}

/// Errors that can occur while planning a command from its tokens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    /// No tokens at all.
    #[error("empty command")]
    Empty,
    /// Only markers and file names were given.
    #[error("missing command before redirection or background marker")]
    MissingProgram,
}

/// Build a [`Command`] from expanded tokens.
///
/// A trailing `&` is always consumed, but only marks the command as a
/// background job when `foreground_only` is off. After that the
/// second-to-last token is checked twice for `>` and `<`; each direction is
/// honoured once and a duplicate marker stays in the argument list.
pub fn construct_command(
    mut tokens: Vec<String>,
    foreground_only: bool,
) -> Result<Command, ParsingError> {
    if tokens.is_empty() {
        return Err(ParsingError::Empty);
    }

    let mut background = false;
    if tokens.last().map(String::as_str) == Some(BACKGROUND_MARKER) {
        tokens.pop();
        background = !foreground_only;
    }

    let mut input_redirect = None;
    let mut output_redirect = None;
    for _ in 0..2 {
        let Some(marker_at) = tokens.len().checked_sub(2) else {
            break;
        };
        let slot = match tokens[marker_at].as_str() {
            OUTPUT_MARKER if output_redirect.is_none() => &mut output_redirect,
            INPUT_MARKER if input_redirect.is_none() => &mut input_redirect,
            _ => continue,
        };
        let target = tokens.pop().map(PathBuf::from);
        tokens.pop();
        *slot = target;
    }

    let program = tokens.first().cloned().ok_or(ParsingError::MissingProgram)?;
    Ok(Command {
        program,
        args: tokens,
        input_redirect,
        output_redirect,
        background,
    })
}
