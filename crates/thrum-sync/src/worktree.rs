//! Bootstraps and maintains the dedicated sparse-checkout worktree backing
//! the `a-sync` orphan branch.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::{Result, SyncError};
use crate::git::{GitOptions, GitOutput, GitRunner};

/// The git hash of the empty tree, stable across every git repository —
/// it is what an orphan branch's first synthetic commit points at before
/// anything has ever been written to it.
const EMPTY_TREE_HASH: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Where, relative to the main repository root, the sync worktree lives.
const WORKTREE_RELATIVE_PATH: &str = ".thrum/sync-worktree";

/// Sparse-checkout patterns the worktree is restricted to: the shared
/// lifecycle/thread shard, the per-agent message shards, and the pre-sharding
/// monolithic log kept around so older replicas mid-migration still sync.
const SPARSE_CHECKOUT_PATTERNS: &[&str] = &["/events.jsonl", "/messages/", "/messages.jsonl"];

/// The worktree marker file git itself maintains inside the checkout — its
/// presence (and being a plain file, not a directory) is the cheapest signal
/// that this directory is still a valid linked worktree.
const WORKTREE_MARKER: &str = ".git";

pub struct SyncWorktree {
    pub repo_root: PathBuf,
    pub worktree_path: PathBuf,
    pub branch: String,
    pub git_timeout_ms: u64,
}

impl SyncWorktree {
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>, branch: impl Into<String>, git_timeout_ms: u64) -> Self {
        let repo_root = repo_root.into();
        let worktree_path = repo_root.join(WORKTREE_RELATIVE_PATH);
        Self {
            repo_root,
            worktree_path,
            branch: branch.into(),
            git_timeout_ms,
        }
    }

    fn opts(&self, dir: &Path, cancel: &CancellationToken) -> GitOptions {
        GitOptions {
            working_directory: dir.to_path_buf(),
            timeout_ms: self.git_timeout_ms,
            cancellation: cancel.clone(),
        }
    }

    fn require_ok(command: &str, output: GitOutput) -> Result<GitOutput> {
        if output.timed_out {
            return Err(SyncError::GitTimedOut {
                command: command.to_string(),
                timeout_ms: 0,
            });
        }
        if output.cancelled {
            return Err(SyncError::GitCancelled {
                command: command.to_string(),
            });
        }
        if output.exit_code != 0 {
            return Err(SyncError::GitFailed {
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Idempotently ensure the `a-sync` orphan branch and its sparse
    /// worktree exist.
    ///
    /// Branch creation is idempotent because it checks for the ref first:
    /// running bootstrap twice (two daemons racing on startup, or a daemon
    /// restart) never creates a second synthetic root commit.
    pub async fn ensure_bootstrapped(
        &self,
        git: &dyn GitRunner,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let branch_ref = format!("refs/heads/{}", self.branch);
        let check = git
            .run(
                &["show-ref", "--verify", "--quiet", &branch_ref],
                &self.opts(&self.repo_root, cancel),
            )
            .await;

        if !check.success() {
            info!(branch = %self.branch, "bootstrapping sync branch");
            let commit_output = Self::require_ok(
                "commit-tree",
                git.run(
                    &[
                        "commit-tree",
                        EMPTY_TREE_HASH,
                        "-m",
                        "thrum: initialize sync branch",
                    ],
                    &self.opts(&self.repo_root, cancel),
                )
                .await,
            )?;
            let commit_hash = commit_output.stdout.trim().to_string();

            // update-ref with old-value 0{40} makes this an atomic
            // create-only write: if another process won the race and
            // created the branch first, this fails harmlessly and we just
            // re-check below.
            let _ = git
                .run(
                    &[
                        "update-ref",
                        &branch_ref,
                        &commit_hash,
                        "0000000000000000000000000000000000000000",
                    ],
                    &self.opts(&self.repo_root, cancel),
                )
                .await;
        }

        if self.worktree_path.exists() && !self.is_healthy(git, cancel).await {
            self.tear_down(git, cancel).await;
        }

        if !self.worktree_path.exists() {
            self.provision(git, cancel).await?;
        }

        Ok(())
    }

    async fn provision(&self, git: &dyn GitRunner, cancel: &CancellationToken) -> Result<()> {
        std::fs::create_dir_all(self.worktree_path.parent().unwrap_or(&self.repo_root)).map_err(|source| SyncError::Io {
            path: self.worktree_path.display().to_string(),
            source,
        })?;
        Self::require_ok(
            "worktree add",
            git.run(
                &[
                    "worktree",
                    "add",
                    "--no-checkout",
                    self.worktree_path.to_str().unwrap_or_default(),
                    &self.branch,
                ],
                &self.opts(&self.repo_root, cancel),
            )
            .await,
        )?;
        Self::require_ok(
            "sparse-checkout init",
            git.run(
                &["sparse-checkout", "init", "--no-cone"],
                &self.opts(&self.worktree_path, cancel),
            )
            .await,
        )?;
        let mut set_args = vec!["sparse-checkout", "set"];
        set_args.extend(SPARSE_CHECKOUT_PATTERNS.iter().copied());
        Self::require_ok("sparse-checkout set", git.run(&set_args, &self.opts(&self.worktree_path, cancel)).await)?;
        Self::require_ok(
            "checkout",
            git.run(&["checkout", &self.branch], &self.opts(&self.worktree_path, cancel))
                .await,
        )?;

        // Sparse-checkout setup on a linked worktree can flip
        // core.sparseCheckout on in the *main* repository's config too; undo
        // that so the primary working tree keeps seeing every file.
        let _ = git
            .run(
                &["config", "core.sparseCheckout", "false"],
                &self.opts(&self.repo_root, cancel),
            )
            .await;

        Ok(())
    }

    /// Four-point check before trusting an existing worktree: the marker
    /// file is a plain file, the worktree is still registered with the main
    /// repository, HEAD is on the replication branch, and sparse-checkout
    /// still restricts to the required patterns. Any failure means the
    /// worktree is rebuilt from scratch rather than repaired in place.
    async fn is_healthy(&self, git: &dyn GitRunner, cancel: &CancellationToken) -> bool {
        let marker = self.worktree_path.join(WORKTREE_MARKER);
        if !marker.is_file() {
            return false;
        }

        let list = git.run(&["worktree", "list", "--porcelain"], &self.opts(&self.repo_root, cancel)).await;
        if !list.success() || !list.stdout.contains(&self.worktree_path.display().to_string()) {
            return false;
        }

        let head = git.run(&["rev-parse", "--abbrev-ref", "HEAD"], &self.opts(&self.worktree_path, cancel)).await;
        if !head.success() || head.stdout.trim() != self.branch {
            return false;
        }

        let sparse = git.run(&["sparse-checkout", "list"], &self.opts(&self.worktree_path, cancel)).await;
        if !sparse.success() {
            return false;
        }
        SPARSE_CHECKOUT_PATTERNS.iter().all(|pattern| sparse.stdout.lines().any(|line| line.trim() == *pattern))
    }

    /// Unregister and remove a worktree that failed its health check. Best
    /// effort throughout: if `git worktree remove` itself fails (the
    /// registry entry is already gone, say) the directory is still wiped so
    /// the caller's `!exists()` check provisions a fresh one.
    async fn tear_down(&self, git: &dyn GitRunner, cancel: &CancellationToken) {
        let _ = git
            .run(
                &["worktree", "remove", "--force", self.worktree_path.to_str().unwrap_or_default()],
                &self.opts(&self.repo_root, cancel),
            )
            .await;
        let _ = std::fs::remove_dir_all(&self.worktree_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::FakeGitRunner;

    #[tokio::test]
    async fn bootstrap_creates_branch_and_worktree_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let wt = SyncWorktree::new(dir.path(), "a-sync", 5000);
        let git = FakeGitRunner::new();
        git.push_failure(1, "not found"); // show-ref: branch missing
        git.push_success("abc123\n"); // commit-tree
        git.push_success(""); // update-ref
        git.push_success(""); // worktree add
        git.push_success(""); // sparse-checkout init
        git.push_success(""); // sparse-checkout set
        git.push_success(""); // checkout

        std::fs::create_dir_all(&wt.worktree_path).unwrap();
        std::fs::remove_dir(&wt.worktree_path).unwrap();

        wt.ensure_bootstrapped(&git, &CancellationToken::new())
            .await
            .unwrap();

        let calls = git.calls();
        assert_eq!(calls[0][0], "show-ref");
        assert_eq!(calls[1][0], "commit-tree");
    }

    #[tokio::test]
    async fn bootstrap_is_a_noop_when_branch_and_worktree_are_already_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let wt = SyncWorktree::new(dir.path(), "a-sync", 5000);
        std::fs::create_dir_all(&wt.worktree_path).unwrap();
        std::fs::write(wt.worktree_path.join(".git"), "gitdir: somewhere\n").unwrap();
        let git = FakeGitRunner::new();
        git.push_success(""); // show-ref succeeds: branch exists
        git.push_success(wt.worktree_path.display().to_string()); // worktree list --porcelain
        git.push_success("a-sync\n"); // rev-parse --abbrev-ref HEAD
        git.push_success("/events.jsonl\n/messages/\n/messages.jsonl\n"); // sparse-checkout list

        wt.ensure_bootstrapped(&git, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(git.calls().len(), 4, "a healthy worktree should only be checked, never rebuilt");
    }

    #[tokio::test]
    async fn an_unhealthy_worktree_is_torn_down_and_reprovisioned() {
        let dir = tempfile::tempdir().unwrap();
        let wt = SyncWorktree::new(dir.path(), "a-sync", 5000);
        std::fs::create_dir_all(&wt.worktree_path).unwrap();
        // No `.git` marker file: the first health check already fails here.
        let git = FakeGitRunner::new();
        git.push_success(""); // show-ref succeeds: branch exists
        git.push_success(""); // worktree remove --force
        git.push_success(""); // worktree add
        git.push_success(""); // sparse-checkout init
        git.push_success(""); // sparse-checkout set
        git.push_success(""); // checkout
        git.push_success(""); // config core.sparseCheckout false

        wt.ensure_bootstrapped(&git, &CancellationToken::new())
            .await
            .unwrap();

        let calls = git.calls();
        assert_eq!(calls[1][0], "worktree");
        assert_eq!(calls[1][1], "remove");
        let add_call = calls.iter().find(|c| c[0] == "worktree" && c[1] == "add");
        assert!(add_call.is_some(), "a failed health check must lead to re-provisioning");
    }

    #[tokio::test]
    async fn sparse_checkout_is_restricted_to_the_required_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let wt = SyncWorktree::new(dir.path(), "a-sync", 5000);
        let git = FakeGitRunner::new();
        git.push_failure(1, "not found"); // show-ref: branch missing
        git.push_success("abc123\n"); // commit-tree
        git.push_success(""); // update-ref
        git.push_success(""); // worktree add
        git.push_success(""); // sparse-checkout init
        git.push_success(""); // sparse-checkout set
        git.push_success(""); // checkout
        git.push_success(""); // config core.sparseCheckout false

        std::fs::create_dir_all(&wt.worktree_path).unwrap();
        std::fs::remove_dir(&wt.worktree_path).unwrap();

        wt.ensure_bootstrapped(&git, &CancellationToken::new())
            .await
            .unwrap();

        let set_call = git.calls().into_iter().find(|c| c[0] == "sparse-checkout" && c[1] == "set").unwrap();
        assert_eq!(set_call[2..], SPARSE_CHECKOUT_PATTERNS.iter().map(ToString::to_string).collect::<Vec<_>>()[..]);
    }
}
