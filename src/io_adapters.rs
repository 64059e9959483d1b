use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::BufRead;
use thiserror::Error;

/// Errors a [`LineSource`] can report instead of a line.
#[derive(Debug, Error)]
pub enum InputError {
    /// The operator pressed the interrupt key at the prompt.
    #[error("interrupted")]
    Interrupted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Readline(ReadlineError),
}

impl From<ReadlineError> for InputError {
    fn from(err: ReadlineError) -> Self {
        match err {
            ReadlineError::Interrupted => InputError::Interrupted,
            ReadlineError::Io(io) => InputError::Io(io),
            other => InputError::Readline(other),
        }
    }
}

/// Where command lines come from.
///
/// `Ok(None)` means end of input; the interpreter stops.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, InputError>;
}

/// Interactive source backed by `rustyline`, with in-memory history.
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    pub fn new() -> Result<Self, InputError> {
        Ok(Self {
            editor: DefaultEditor::new().map_err(InputError::from)?,
        })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, InputError> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Non-interactive source reading one line per call from any `BufRead`.
///
/// The prompt is not echoed.
pub struct ReaderSource<R> {
    reader: R,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>, InputError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

#[cfg(test)]
pub(crate) use mem_writer::MemWriter;
