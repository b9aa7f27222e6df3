//! Configuration: defaults, then `.autogit.json`, then environment.
//!
//! CLI flags are applied on top by the binary.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::exclude::glob::compile_pattern;
use crate::llm::Provider;
use crate::message::DEFAULT_MAX_LENGTH;

/// Config file looked up at the repository root.
pub const CONFIG_FILE: &str = ".autogit.json";

const ENV_DELAY_MS: &str = "AUTOGIT_DELAY_MS";
const ENV_EXCLUDE: &str = "AUTOGIT_EXCLUDE";
const ENV_INCLUDE_UNTRACKED: &str = "AUTOGIT_INCLUDE_UNTRACKED";
const ENV_MAX_MESSAGE_LENGTH: &str = "AUTOGIT_MAX_MESSAGE_LENGTH";
const ENV_PROVIDER: &str = "AUTOGIT_PROVIDER";
const ENV_GENERATOR_TIMEOUT: &str = "AUTOGIT_GENERATOR_TIMEOUT";
const ENV_NO_PUSH: &str = "AUTOGIT_NO_PUSH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub enabled: bool,
    pub delay_ms: u64,
    pub exclude_patterns: Vec<String>,
    pub include_untracked: bool,
    pub max_commit_message_length: usize,
    pub push: bool,
    pub remote: String,
    /// Poll `git status` at this interval in addition to watching files.
    pub poll_interval_ms: Option<u64>,
    pub generator: GeneratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 3000,
            exclude_patterns: Vec::new(),
            include_untracked: true,
            max_commit_message_length: DEFAULT_MAX_LENGTH,
            push: true,
            remote: "origin".to_string(),
            poll_interval_ms: None,
            generator: GeneratorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneratorConfig {
    pub provider: Provider,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator.timeout_secs)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }

    /// Apply `AUTOGIT_*` environment overrides in place.
    ///
    /// Invalid values are logged and leave the current value untouched.
    pub fn apply_env(&mut self) {
        if let Some(v) = parse_env::<u64>(ENV_DELAY_MS) {
            self.delay_ms = v;
        }
        if let Some(v) = env_trimmed(ENV_EXCLUDE) {
            self.exclude_patterns = v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = env_bool(ENV_INCLUDE_UNTRACKED) {
            self.include_untracked = v;
        }
        if let Some(v) = parse_env::<usize>(ENV_MAX_MESSAGE_LENGTH) {
            self.max_commit_message_length = v;
        }
        if let Some(v) = parse_env::<Provider>(ENV_PROVIDER) {
            self.generator.provider = v;
        }
        if let Some(v) = parse_env::<u64>(ENV_GENERATOR_TIMEOUT) {
            self.generator.timeout_secs = v;
        }
        if let Some(true) = env_bool(ENV_NO_PUSH) {
            self.push = false;
        }
    }
}

/// A loaded configuration and anything worth telling the user about it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub warnings: Vec<AdvisoryWarning>,
}

/// Load configuration for the repository rooted at `root`.
///
/// A missing config file is not an error; an unreadable or malformed one
/// is.
pub fn load(root: &Path) -> Result<LoadedConfig, ConfigError> {
    let mut config = read_file(root)?.unwrap_or_default();
    config.apply_env();
    let warnings = validate(&config);
    Ok(LoadedConfig { config, warnings })
}

fn read_file(root: &Path) -> Result<Option<Config>, ConfigError> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFailed {
        path: path.clone(),
        source,
    })?;
    let config =
        serde_json::from_str(&raw).map_err(|source| ConfigError::ParseFailed { path, source })?;
    Ok(Some(config))
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    let raw = env_trimmed(name)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Invalid {} value '{}', ignoring", name, raw);
            None
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    let raw = env_trimmed(name)?;
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("Invalid {} value '{}', ignoring", name, raw);
            None
        }
    }
}

/// A non-fatal configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryWarning {
    /// Machine-readable warning code.
    pub code: &'static str,
    pub message: String,
    /// Config key the warning is about.
    pub path: &'static str,
}

impl fmt::Display for AdvisoryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.path, self.message)
    }
}

/// Collect advisory warnings. Never fails.
pub fn validate(config: &Config) -> Vec<AdvisoryWarning> {
    let mut warnings = Vec::new();

    if config.delay_ms == 0 {
        warnings.push(AdvisoryWarning {
            code: "config.delay.zero",
            message: "every change triggers its own commit".to_string(),
            path: "delayMs",
        });
    }

    if config.max_commit_message_length < 4 {
        warnings.push(AdvisoryWarning {
            code: "config.message.too_short",
            message: format!(
                "{} leaves no room for text before the ellipsis",
                config.max_commit_message_length
            ),
            path: "maxCommitMessageLength",
        });
    }

    let mut seen = HashSet::new();
    for pattern in &config.exclude_patterns {
        if !seen.insert(pattern.as_str()) {
            warnings.push(AdvisoryWarning {
                code: "config.exclude.duplicate",
                message: format!("'{}' is listed more than once", pattern),
                path: "excludePatterns",
            });
        }
        if let Err(e) = compile_pattern(pattern) {
            warnings.push(AdvisoryWarning {
                code: "config.exclude.invalid",
                message: format!("{} (it will never match)", e),
                path: "excludePatterns",
            });
        }
    }

    if config.poll_interval_ms == Some(0) {
        warnings.push(AdvisoryWarning {
            code: "config.poll.zero",
            message: "polling disabled".to_string(),
            path: "pollIntervalMs",
        });
    }

    warnings
}
