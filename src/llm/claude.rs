//! Claude Code CLI as a text generator.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::GeneratorError;

use super::TextGenerator;

const TOOL: &str = "claude";

/// Runs `claude -p <prompt> --output-format json` once per request.
#[derive(Debug, Clone, Default)]
pub struct ClaudeCli;

#[async_trait]
impl TextGenerator for ClaudeCli {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        if which::which(TOOL).is_err() {
            return Err(GeneratorError::Unavailable(
                "Claude Code CLI not found in PATH".to_string(),
            ));
        }

        let output = Command::new(TOOL)
            .arg("-p")
            .arg(prompt)
            .arg("--output-format")
            .arg("json")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| GeneratorError::SpawnFailed { tool: TOOL, source })?;

        if !output.status.success() {
            return Err(GeneratorError::NonZeroExit {
                tool: TOOL,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        parse_response(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Claude CLI JSON envelope when using --output-format json
#[derive(Deserialize)]
struct ClaudeCliResponse {
    result: String,
    #[serde(default)]
    is_error: bool,
}

/// Unwrap the CLI envelope, falling back to the raw text.
fn parse_response(response: &str) -> Result<String, GeneratorError> {
    match serde_json::from_str::<ClaudeCliResponse>(response) {
        Ok(envelope) if envelope.is_error => Err(GeneratorError::ExecutionFailed(envelope.result)),
        Ok(envelope) => Ok(envelope.result),
        Err(_) => Ok(response.to_string()),
    }
}
