//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use git2::{Oid, Repository, Signature};

use autogit::error::GeneratorError;
use autogit::git::{CycleOptions, GitBackend, RepositoryController, VcsBackend};
use autogit::llm::TextGenerator;
use autogit::{CommitMessageGenerator, ExclusionMatcher};

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory, with a
    /// committer identity configured.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        {
            let mut config = repo.config().expect("Failed to open repo config");
            config.set_str("user.name", "Test User").expect("Failed to set user.name");
            config
                .set_str("user.email", "test@example.com")
                .expect("Failed to set user.email");
        }
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&path, content).expect("Failed to write test file");
    }

    /// Add one path to the index without committing, as a user would with
    /// `git add`.
    pub fn stage(&self, relative: &str) {
        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new(relative)).expect("Failed to add path");
        index.write().expect("Failed to write index");
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.dir.path().join(relative)).expect("Failed to remove test file");
    }

    /// Stage every file in the working tree and commit it. Returns the commit OID.
    pub fn commit_all(&self, message: &str) -> Oid {
        let sig = Signature::now("Test User", "test@example.com").expect("Failed to create signature");

        let mut index = self.repo.index().expect("Failed to get index");
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .expect("Failed to add files");
        index.update_all(["*"].iter(), None).expect("Failed to update index");
        index.write().expect("Failed to write index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Number of commits reachable from HEAD (0 on an unborn branch).
    pub fn commit_count(&self) -> usize {
        let mut walk = self.repo.revwalk().expect("Failed to create revwalk");
        if walk.push_head().is_err() {
            return 0;
        }
        walk.count()
    }

    /// Message of the HEAD commit.
    pub fn head_message(&self) -> String {
        let head = self.repo.head().expect("No HEAD");
        let commit = head.peel_to_commit().expect("HEAD is not a commit");
        commit.message().unwrap_or_default().to_string()
    }

    /// Short name of the branch HEAD points to.
    pub fn branch(&self) -> String {
        let head = self.repo.head().expect("No HEAD");
        head.shorthand().expect("HEAD has no name").to_string()
    }

    /// Paths recorded in the HEAD tree.
    pub fn head_files(&self) -> Vec<String> {
        let head = self.repo.head().expect("No HEAD");
        let tree = head.peel_to_tree().expect("HEAD has no tree");
        let mut files = Vec::new();
        tree.walk(git2::TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                files.push(format!("{}{}", dir, entry.name().unwrap_or_default()));
            }
            git2::TreeWalkResult::Ok
        })
        .expect("Failed to walk tree");
        files.sort();
        files
    }

    /// Create a bare repository and register it as remote `origin`.
    pub fn add_bare_remote(&self) -> BareRemote {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        Repository::init_bare(dir.path()).expect("Failed to init bare repo");
        let url = dir.path().to_string_lossy().to_string();
        self.repo.remote("origin", &url).expect("Failed to add remote");
        BareRemote { dir }
    }

    pub fn backend(&self) -> Arc<dyn VcsBackend> {
        Arc::new(GitBackend::new(self.dir.path()))
    }

    /// Controller using the count summary for messages.
    pub fn controller(&self, options: CycleOptions) -> RepositoryController {
        RepositoryController::new(self.backend(), CommitMessageGenerator::fallback_only(), options)
    }

    pub fn controller_with(
        &self,
        generator: Arc<dyn TextGenerator>,
        options: CycleOptions,
    ) -> RepositoryController {
        RepositoryController::new(
            self.backend(),
            CommitMessageGenerator::new(Some(generator)),
            options,
        )
    }
}

/// A bare repository acting as a push target.
pub struct BareRemote {
    pub dir: tempfile::TempDir,
}

impl BareRemote {
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Commit count on `branch` in the remote, 0 if the branch is missing.
    pub fn commit_count(&self, branch: &str) -> usize {
        let repo = Repository::open_bare(self.dir.path()).expect("Failed to open bare repo");
        let Ok(reference) = repo.find_reference(&format!("refs/heads/{branch}")) else {
            return 0;
        };
        let Some(oid) = reference.target() else {
            return 0;
        };
        let mut walk = repo.revwalk().expect("Failed to create revwalk");
        walk.push(oid).expect("Failed to push oid");
        walk.count()
    }
}

/// Options for cycles that never push.
pub fn local_options(exclude: &[&str]) -> CycleOptions {
    CycleOptions {
        push: false,
        exclude: ExclusionMatcher::new(exclude),
        ..CycleOptions::default()
    }
}

/// Generator returning a fixed reply.
pub struct FixedGenerator(pub String);

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GeneratorError> {
        Ok(self.0.clone())
    }
}

/// Generator that always fails.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GeneratorError> {
        Err(GeneratorError::Unavailable("offline".to_string()))
    }
}
