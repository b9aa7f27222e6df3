//! Deterministic commit summary used when no generator answers.

use crate::git::status::{ChangeKind, ClassifiedChange};

/// Message used when there is nothing more specific to say.
pub const DEFAULT_MESSAGE: &str = "Auto-commit: Update files";

/// Summarize changes by count, e.g. `Auto-commit: 2 added, 1 modified files`.
///
/// Untracked files count as added. Renames, copies, and other changes
/// only affect the plural suffix, which follows the total number of
/// changes.
pub fn fallback_message(changes: &[ClassifiedChange]) -> String {
    let count = |pred: fn(ChangeKind) -> bool| changes.iter().filter(|c| pred(c.kind)).count();

    let added = count(|k| matches!(k, ChangeKind::Added | ChangeKind::Untracked));
    let modified = count(|k| k == ChangeKind::Modified);
    let deleted = count(|k| k == ChangeKind::Deleted);

    let parts: Vec<String> = [(added, "added"), (modified, "modified"), (deleted, "deleted")]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();

    if parts.is_empty() {
        return DEFAULT_MESSAGE.to_string();
    }

    let suffix = if changes.len() == 1 { "" } else { "s" };
    format!("Auto-commit: {} file{}", parts.join(", "), suffix)
}
