//! Path exclusion by glob patterns.
//!
//! Patterns are compiled once into anchored regexes. A pattern that fails
//! to compile is logged and treated as never matching, so one bad entry in
//! the configuration cannot stop an otherwise valid batch.

pub mod glob;

use regex_lite::Regex;
use tracing::warn;

use crate::error::PatternError;

pub use glob::compile_pattern;

/// A compiled set of exclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct ExclusionMatcher {
    compiled: Vec<Regex>,
    errors: Vec<PatternError>,
}

impl ExclusionMatcher {
    /// Compile `patterns`, absorbing (and logging) malformed ones.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut compiled = Vec::with_capacity(patterns.len());
        let mut errors = Vec::new();

        for pattern in patterns {
            match compile_pattern(pattern.as_ref()) {
                Ok(re) => compiled.push(re),
                Err(e) => {
                    warn!("Ignoring exclude pattern: {}", e);
                    errors.push(e);
                }
            }
        }

        Self { compiled, errors }
    }

    /// Whether `relative_path` matches any valid pattern.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        let normalized = normalize(relative_path);
        self.compiled.iter().any(|re| re.is_match(&normalized))
    }

    /// Patterns that failed to compile.
    pub fn errors(&self) -> &[PatternError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// One-shot form of [`ExclusionMatcher::is_excluded`].
pub fn should_exclude<S: AsRef<str>>(relative_path: &str, patterns: &[S]) -> bool {
    ExclusionMatcher::new(patterns).is_excluded(relative_path)
}

/// Use `/` separators and drop a leading `./`.
fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    match path.strip_prefix("./") {
        Some(rest) => rest.to_string(),
        None => path,
    }
}
