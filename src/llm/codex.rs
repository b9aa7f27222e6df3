//! Codex CLI as a text generator.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::GeneratorError;

use super::TextGenerator;

const TOOL: &str = "codex";

/// Runs `codex exec <prompt>` once per request and returns its stdout.
#[derive(Debug, Clone, Default)]
pub struct CodexCli;

#[async_trait]
impl TextGenerator for CodexCli {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        if which::which(TOOL).is_err() {
            return Err(GeneratorError::Unavailable(
                "Codex CLI not found in PATH".to_string(),
            ));
        }

        let output = Command::new(TOOL)
            .arg("exec")
            .arg(prompt)
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

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
