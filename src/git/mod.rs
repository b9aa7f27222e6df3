//! Repository access: status classification, the backend trait, and the
//! commit cycle built on top of them.

pub mod backend;
pub mod controller;
#[cfg(test)]
pub(crate) mod fake;
pub mod status;

pub use backend::{GitBackend, VcsBackend};
pub use controller::{CommitOutcome, CycleOptions, RepositoryController, classify_push_error};
pub use status::{ChangeKind, ClassifiedChange, RepoStatusEntry, classify};
