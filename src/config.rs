/// Limits and presentation settings for an [`Interpreter`](crate::Interpreter).
///
/// The defaults match the classic teaching shell: 2048-character lines,
/// 512 arguments and at most 100 concurrently tracked background jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of background jobs tracked at the same time.
    pub max_jobs: usize,
    /// Longest accepted input line, in characters.
    pub max_line_len: usize,
    /// Largest number of tokens accepted on one line.
    pub max_args: usize,
    /// Prompt shown before every line.
    pub prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_jobs: 100,
            max_line_len: 2048,
            max_args: 512,
            prompt: ": ".to_string(),
        }
    }
}
