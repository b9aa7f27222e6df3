//! External text-generation backends.
//!
//! The commit message generator only needs "prompt in, text out". Each
//! provider makes exactly one attempt; timeouts and fallback are the
//! caller's business.

pub mod claude;
pub mod codex;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;

pub use claude::ClaudeCli;
pub use codex::CodexCli;

/// A backend that turns a prompt into free-form text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

/// Supported text-generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Claude,
    Codex,
    /// Never call out; always use the deterministic summary.
    None,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Codex => "codex",
            Provider::None => "none",
        }
    }

    /// Build the generator for this provider, if any.
    pub fn generator(&self) -> Option<Arc<dyn TextGenerator>> {
        match self {
            Provider::Claude => Some(Arc::new(ClaudeCli)),
            Provider::Codex => Some(Arc::new(CodexCli)),
            Provider::None => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(Provider::Claude),
            "codex" => Ok(Provider::Codex),
            "none" | "off" => Ok(Provider::None),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}
