use regex::{NoExpand, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

static PID_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$").expect("marker pattern is valid"));

/// Rewrites `$$` to the interpreter's process id.
///
/// Matches are non-overlapping and scanned left to right, so `$$$` becomes
/// `<pid>$` and the substituted digits are never looked at again.
#[derive(Debug, Clone)]
pub struct Expander {
    pid: String,
}

impl Expander {
    pub fn new(pid: u32) -> Self {
        Self {
            pid: pid.to_string(),
        }
    }

    /// Expander bound to the current process.
    pub fn for_current_process() -> Self {
        Self::new(std::process::id())
    }

    pub fn expand<'t>(&self, token: &'t str) -> Cow<'t, str> {
        PID_MARKER.replace_all(token, NoExpand(&self.pid))
    }

    pub fn expand_all(&self, tokens: Vec<String>) -> Vec<String> {
        tokens
            .into_iter()
            .map(|token| match self.expand(&token) {
                Cow::Borrowed(_) => token,
                Cow::Owned(expanded) => expanded,
            })
            .collect()
    }
}
