//! Prompt construction for commit message generation.

use crate::git::status::ClassifiedChange;

/// Build the prompt asking for a one-line commit message.
pub fn build_prompt(changes: &[ClassifiedChange], max_length: usize) -> String {
    let files_section = changes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Generate a concise commit message for the following changes:
{files_section}

The commit message should:
- Be a single line
- Follow conventional commit format if applicable (feat:, fix:, docs:, etc.)
- Use the imperative present tense ("add", not "added")
- Be under {max_length} characters
- Describe what was changed, not how

Example formats:
- "feat: add user authentication system"
- "fix: resolve login validation bug"
- "docs: update API documentation"
- "refactor: simplify user service logic"

Respond with ONLY the commit message."#
    )
}
