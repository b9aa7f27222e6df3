//! Commit message synthesis.
//!
//! Two tiers: ask the configured text generator for a one-line message,
//! and fall back to a deterministic count summary whenever that fails.
//! Generator failures are logged and absorbed here; they never reach the
//! commit cycle.

pub mod fallback;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::GeneratorError;
use crate::git::status::ClassifiedChange;
use crate::llm::TextGenerator;

pub use fallback::{DEFAULT_MESSAGE, fallback_message};
pub use prompt::build_prompt;

/// Default ceiling for the generated subject line.
pub const DEFAULT_MAX_LENGTH: usize = 72;

/// Default bound on a single generator round-trip.
pub const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(30);

const ELLIPSIS: &str = "...";

/// Produces a bounded-length commit message for a batch of changes.
#[derive(Clone)]
pub struct CommitMessageGenerator {
    generator: Option<Arc<dyn TextGenerator>>,
    max_length: usize,
    timeout: Duration,
}

impl CommitMessageGenerator {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self {
            generator,
            max_length: DEFAULT_MAX_LENGTH,
            timeout: DEFAULT_GENERATOR_TIMEOUT,
        }
    }

    /// A generator that always uses the deterministic summary.
    pub fn fallback_only() -> Self {
        Self::new(None)
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Generate a message for `changes`.
    ///
    /// Never fails: an empty batch yields [`DEFAULT_MESSAGE`], and any
    /// generator problem yields [`fallback_message`].
    pub async fn generate(&self, changes: &[ClassifiedChange]) -> String {
        if changes.is_empty() {
            return DEFAULT_MESSAGE.to_string();
        }

        match self.try_generate(changes).await {
            Ok(message) => message,
            Err(e) => {
                warn!("Could not generate commit message, using summary: {}", e);
                fallback_message(changes)
            }
        }
    }

    async fn try_generate(&self, changes: &[ClassifiedChange]) -> Result<String, GeneratorError> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            GeneratorError::Unavailable("no text generator configured".to_string())
        })?;

        let prompt = build_prompt(changes, self.max_length);
        debug!("Commit prompt length: {} chars", prompt.len());

        let raw = timeout(self.timeout, generator.generate(&prompt))
            .await
            .map_err(|_| GeneratorError::Timeout(self.timeout.as_secs()))??;

        let cleaned = clean_response(&raw, self.max_length);
        if cleaned.is_empty() {
            return Err(GeneratorError::Empty);
        }

        Ok(cleaned)
    }
}

impl std::fmt::Debug for CommitMessageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitMessageGenerator")
            .field("generator", &self.generator.is_some())
            .field("max_length", &self.max_length)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Reduce raw generator output to a single clean subject line.
///
/// Keeps the first non-blank line, strips one surrounding pair of
/// matching quotes or backticks, then drops any remaining `"` and
/// backtick characters. Apostrophes inside the text are kept. Output
/// longer than `max_length` characters is cut and ends in `...`.
pub fn clean_response(raw: &str, max_length: usize) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");

    let unquoted = strip_matching_quotes(line);

    let cleaned: String = unquoted
        .chars()
        .filter(|c| *c != '"' && *c != '`')
        .collect();
    let cleaned = cleaned.trim();

    truncate(cleaned, max_length)
}

fn strip_matching_quotes(s: &str) -> &str {
    for quote in ['"', '\'', '`'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn truncate(s: &str, max_length: usize) -> String {
    if s.chars().count() <= max_length {
        return s.to_string();
    }
    // Too short for the ellipsis.
    if max_length < ELLIPSIS.len() {
        return s.chars().take(max_length).collect();
    }

    let keep = max_length - ELLIPSIS.len();
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Make a message safe to hand to the commit machinery.
///
/// Messages are passed as plain arguments, never through a shell, so only
/// characters git itself chokes on are removed: NUL and other control
/// characters except newline and tab.
pub fn sanitize_commit_message(message: &str) -> String {
    message
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}
