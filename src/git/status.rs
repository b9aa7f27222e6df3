//! Repository status entries and their classification into change kinds.

use std::fmt;

use git2::{Status, StatusEntry};
use serde::{Deserialize, Serialize};

/// Raw porcelain-style status for one path.
///
/// `index_state` and `worktree_state` follow `git status --porcelain`:
/// `' '` unchanged, `M` modified, `A` added, `D` deleted, `R` renamed,
/// `C` copied, `T` type change, `U` unmerged, `?` untracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStatusEntry {
    pub path: String,
    pub index_state: char,
    pub worktree_state: char,
}

impl RepoStatusEntry {
    pub fn new(path: impl Into<String>, code: &str) -> Self {
        let mut chars = code.chars();
        Self {
            path: path.into(),
            index_state: chars.next().unwrap_or(' '),
            worktree_state: chars.next().unwrap_or(' '),
        }
    }

    /// Build an entry from a git2 status entry.
    ///
    /// Returns `None` for ignored or otherwise uninteresting entries.
    pub fn from_git2(entry: &StatusEntry<'_>) -> Option<Self> {
        let status = entry.status();
        if status.is_empty() || status.contains(Status::IGNORED) {
            return None;
        }

        let (index_state, worktree_state) = status_code(status);
        if index_state == ' ' && worktree_state == ' ' {
            return None;
        }

        // Renames report the destination path.
        let renamed_to = entry
            .head_to_index()
            .filter(|_| status.contains(Status::INDEX_RENAMED))
            .and_then(|d| d.new_file().path().map(|p| p.to_string_lossy().to_string()));

        let path = renamed_to.or_else(|| entry.path().map(str::to_string))?;

        Some(Self {
            path,
            index_state,
            worktree_state,
        })
    }

    /// The two-character status code, e.g. `"M "` or `"??"`.
    pub fn code(&self) -> String {
        let mut code = String::with_capacity(2);
        code.push(self.index_state);
        code.push(self.worktree_state);
        code
    }

    pub fn is_untracked(&self) -> bool {
        self.index_state == '?' || self.worktree_state == '?'
    }

    /// Whether the file is gone from the working tree and must be removed
    /// from the index rather than added.
    pub fn is_removal(&self) -> bool {
        self.worktree_state == 'D' || (self.index_state == 'D' && self.worktree_state == ' ')
    }

    pub fn classify(&self) -> ClassifiedChange {
        ClassifiedChange {
            path: self.path.clone(),
            kind: classify(self.index_state, self.worktree_state),
        }
    }
}

/// Map git2 status flags onto porcelain index/worktree characters.
fn status_code(status: Status) -> (char, char) {
    if status.contains(Status::CONFLICTED) {
        return ('U', 'U');
    }
    if status.contains(Status::WT_NEW) && !status.intersects(index_flags()) {
        return ('?', '?');
    }

    let index = if status.contains(Status::INDEX_NEW) {
        'A'
    } else if status.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(Status::INDEX_DELETED) {
        'D'
    } else if status.contains(Status::INDEX_RENAMED) {
        'R'
    } else if status.contains(Status::INDEX_TYPECHANGE) {
        'T'
    } else {
        ' '
    };

    let worktree = if status.contains(Status::WT_MODIFIED) {
        'M'
    } else if status.contains(Status::WT_DELETED) {
        'D'
    } else if status.contains(Status::WT_RENAMED) {
        'R'
    } else if status.contains(Status::WT_TYPECHANGE) {
        'T'
    } else {
        ' '
    };

    (index, worktree)
}

fn index_flags() -> Status {
    Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE
}

/// Semantic kind of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    Untracked,
    Changed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "Added",
            ChangeKind::Modified => "Modified",
            ChangeKind::Deleted => "Deleted",
            ChangeKind::Renamed => "Renamed",
            ChangeKind::Copied => "Copied",
            ChangeKind::Untracked => "Untracked",
            ChangeKind::Changed => "Changed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed tie-break order when one code carries several flags.
///
/// This is a policy, not something git defines: `MD` (modified in the
/// index, deleted in the worktree) classifies as `Modified`, `AD` as
/// `Added`, and so on down the list.
const PRECEDENCE: [(char, ChangeKind); 6] = [
    ('A', ChangeKind::Added),
    ('M', ChangeKind::Modified),
    ('D', ChangeKind::Deleted),
    ('R', ChangeKind::Renamed),
    ('C', ChangeKind::Copied),
    ('?', ChangeKind::Untracked),
];

/// Classify a two-character status code.
///
/// Either column may carry the flag. Codes matching nothing in
/// [`PRECEDENCE`] (type changes, unmerged entries) are `Changed`.
pub fn classify(index_state: char, worktree_state: char) -> ChangeKind {
    PRECEDENCE
        .iter()
        .find(|(flag, _)| index_state == *flag || worktree_state == *flag)
        .map(|(_, kind)| *kind)
        .unwrap_or(ChangeKind::Changed)
}

/// Classify a code given as a string such as `"MD"`.
pub fn classify_code(code: &str) -> ChangeKind {
    let mut chars = code.chars();
    classify(chars.next().unwrap_or(' '), chars.next().unwrap_or(' '))
}

/// A path with its semantic change kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedChange {
    pub path: String,
    pub kind: ChangeKind,
}

impl fmt::Display for ClassifiedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.path)
    }
}
