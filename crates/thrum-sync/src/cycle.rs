//! One full sync cycle: fetch, merge, project, notify, commit, push.
//!
//! An exclusive, retryable unit of work against shared state: acquire a
//! lock, do the work, retry the tail end on contention.

use std::fs::OpenOptions;
use std::path::PathBuf;

use rustix::fs::{FlockOperation, flock};
use rustix::io::Errno;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use thrum_core::retry::RetryConfig;
use thrum_events::{ConnectionPool, ThrumEvent, projector};

use crate::errors::{Result, SyncError};
use crate::git::{GitOptions, GitRunner};
use crate::merge::MergeEngine;
use crate::worktree::SyncWorktree;

/// Receives the events a sync cycle pulled in from a remote clone, so
/// `thrum-messaging` can dispatch them to subscribers without the sync
/// engine knowing anything about subscriptions.
pub trait SyncEventSink: Send + Sync {
    fn notify(&self, events: &[ThrumEvent]);
}

/// A sink that does nothing, for callers that only care about projection.
pub struct NoopSink;

impl SyncEventSink for NoopSink {
    fn notify(&self, _events: &[ThrumEvent]) {}
}

#[derive(Debug, Default, Clone)]
pub struct CycleReport {
    pub fetched: bool,
    pub events_merged_in: usize,
    pub pushed: bool,
    pub push_attempts: u32,
    /// Set when the cycle lock was already held by another instance and this
    /// cycle did no work at all.
    pub skipped: bool,
}

pub struct SyncCycle<'a> {
    git: &'a dyn GitRunner,
    worktree: SyncWorktree,
    pool: ConnectionPool,
    remote: String,
    push_retries: u32,
    git_timeout_ms: u64,
}

impl<'a> SyncCycle<'a> {
    #[must_use]
    pub fn new(
        git: &'a dyn GitRunner,
        worktree: SyncWorktree,
        pool: ConnectionPool,
        remote: impl Into<String>,
        push_retries: u32,
        git_timeout_ms: u64,
    ) -> Self {
        Self {
            git,
            worktree,
            pool,
            remote: remote.into(),
            push_retries,
            git_timeout_ms,
        }
    }

    fn opts(&self, cancel: &CancellationToken) -> GitOptions {
        GitOptions {
            working_directory: self.worktree.worktree_path.clone(),
            timeout_ms: self.git_timeout_ms,
            cancellation: cancel.clone(),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.worktree.repo_root.join(".thrum-sync.lock")
    }

    /// Run one fetch → merge → project → notify → commit → push cycle.
    ///
    /// Network failures on fetch are logged and swallowed: a cycle that
    /// can't reach the remote still commits and serves purely-local state,
    /// and simply tries to push (which will itself fail harmlessly if
    /// offline) rather than aborting outright.
    ///
    /// The cycle lock is acquired non-blocking: if another instance already
    /// holds it, this cycle is skipped outright rather than queued behind
    /// it, since the next timer tick will simply try again.
    #[instrument(skip(self, sink, cancel))]
    pub async fn run_once(&self, sink: &dyn SyncEventSink, cancel: &CancellationToken) -> Result<CycleReport> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path())
            .map_err(SyncError::Lock)?;

        if let Err(e) = flock(&lock_file, FlockOperation::NonBlockingLockExclusive) {
            if e == Errno::WOULDBLOCK || e == Errno::AGAIN {
                warn!("sync cycle lock already held, skipping this cycle");
                return Ok(CycleReport { skipped: true, ..CycleReport::default() });
            }
            return Err(SyncError::Lock(std::io::Error::from(e)));
        }

        let result = self.run_locked(sink, cancel).await;

        let _ = flock(&lock_file, FlockOperation::Unlock);
        result
    }

    async fn run_locked(&self, sink: &dyn SyncEventSink, cancel: &CancellationToken) -> Result<CycleReport> {
        self.worktree.ensure_bootstrapped(self.git, cancel).await?;

        let mut report = CycleReport::default();

        let fetch_output = self
            .git
            .run(
                &["fetch", &self.remote, &self.worktree.branch],
                &self.opts(cancel),
            )
            .await;
        if fetch_output.success() {
            report.fetched = true;
        } else {
            warn!(stderr = %fetch_output.stderr, "sync fetch failed, continuing with local state only");
        }

        if report.fetched {
            let remote_ref = format!("{}/{}", self.remote, self.worktree.branch);
            let merge_engine = MergeEngine::new(self.git, &self.worktree.worktree_path, self.git_timeout_ms);
            let merge_report = merge_engine.merge_from_ref(&remote_ref, cancel).await?;
            report.events_merged_in = merge_report.new_events.len();

            if !merge_report.new_events.is_empty() {
                let conn = self.pool.get().map_err(thrum_events::EventsError::Pool)?;
                for event in &merge_report.new_events {
                    projector::apply_event(&conn, event)?;
                }
                sink.notify(&merge_report.new_events);
            }
        }

        self.commit_local_changes(cancel).await?;
        report.push_attempts = self.push_with_retries(cancel).await?;
        report.pushed = report.push_attempts > 0;

        Ok(report)
    }

    async fn commit_local_changes(&self, cancel: &CancellationToken) -> Result<()> {
        let status = self.git.run(&["status", "--porcelain"], &self.opts(cancel)).await;
        if !status.success() {
            return Err(SyncError::GitFailed {
                command: "status".to_string(),
                exit_code: status.exit_code,
                stderr: status.stderr,
            });
        }
        if status.stdout.trim().is_empty() {
            return Ok(());
        }

        let add = self.git.run(&["add", "-A"], &self.opts(cancel)).await;
        if !add.success() {
            return Err(SyncError::GitFailed {
                command: "add".to_string(),
                exit_code: add.exit_code,
                stderr: add.stderr,
            });
        }

        let commit = self
            .git
            .run(&["commit", "-m", "thrum: sync"], &self.opts(cancel))
            .await;
        if !commit.success() {
            return Err(SyncError::GitFailed {
                command: "commit".to_string(),
                exit_code: commit.exit_code,
                stderr: commit.stderr,
            });
        }
        info!("committed merged sync state");
        Ok(())
    }

    /// Push, and on a non-fast-forward rejection, fetch + merge again and
    /// retry — the remote moved under us, so the commit needs rebuilding
    /// on top of what's there now.
    async fn push_with_retries(&self, cancel: &CancellationToken) -> Result<u32> {
        let retry = RetryConfig::new(self.push_retries, std::time::Duration::from_millis(200), std::time::Duration::from_secs(5));

        for attempt in 1..=self.push_retries.max(1) {
            let push = self
                .git
                .run(&["push", &self.remote, &self.worktree.branch], &self.opts(cancel))
                .await;
            if push.success() {
                return Ok(attempt);
            }
            if attempt == self.push_retries.max(1) {
                break;
            }
            warn!(attempt, stderr = %push.stderr, "push rejected, retrying after re-merge");
            tokio::time::sleep(retry.delay_for(attempt)).await;

            let remote_ref = format!("{}/{}", self.remote, self.worktree.branch);
            let _ = self.git.run(&["fetch", &self.remote, &self.worktree.branch], &self.opts(cancel)).await;
            let merge_engine = MergeEngine::new(self.git, &self.worktree.worktree_path, self.git_timeout_ms);
            let _ = merge_engine.merge_from_ref(&remote_ref, cancel).await?;
            self.commit_local_changes(cancel).await?;
        }

        Err(SyncError::PushRejected {
            attempts: self.push_retries.max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::FakeGitRunner;
    use thrum_events::sqlite::pool::open_in_memory_pool;

    fn worktree(dir: &std::path::Path) -> SyncWorktree {
        let wt = SyncWorktree::new(dir, "a-sync", 5000);
        std::fs::create_dir_all(&wt.worktree_path).unwrap();
        wt
    }

    #[tokio::test]
    async fn run_once_with_no_remote_changes_still_pushes() {
        let dir = tempfile::tempdir().unwrap();
        let wt = worktree(dir.path());
        let pool = open_in_memory_pool();
        let git = FakeGitRunner::new();
        git.push_success(""); // show-ref (branch exists check)
        git.push_success(""); // fetch
        git.push_success("events.jsonl\n"); // ls-tree on merge
        git.push_failure(128, "missing"); // show of remote shard (none new)
        git.push_success(""); // status --porcelain: clean
        git.push_success(""); // push

        let cycle = SyncCycle::new(&git, wt, pool, "origin", 3, 5000);
        let report = cycle.run_once(&NoopSink, &CancellationToken::new()).await.unwrap();
        assert!(report.pushed);
        assert_eq!(report.events_merged_in, 0);
    }

    #[tokio::test]
    async fn run_once_retries_push_after_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let wt = worktree(dir.path());
        let pool = open_in_memory_pool();
        let git = FakeGitRunner::new();
        git.push_success(""); // show-ref
        git.push_success(""); // fetch
        git.push_success("events.jsonl\n"); // ls-tree
        git.push_failure(128, "missing"); // show remote shard
        git.push_success(""); // status: clean
        git.push_failure(1, "non-fast-forward"); // push attempt 1 fails
        git.push_success(""); // fetch before retry
        git.push_success("events.jsonl\n"); // ls-tree during retry merge
        git.push_failure(128, "missing"); // show remote shard during retry merge
        git.push_success(""); // status: clean during retry commit check
        git.push_success(""); // push attempt 2 succeeds

        let cycle = SyncCycle::new(&git, wt, pool, "origin", 3, 5000);
        let report = cycle.run_once(&NoopSink, &CancellationToken::new()).await.unwrap();
        assert!(report.pushed);
        assert_eq!(report.push_attempts, 2);
    }

    #[tokio::test]
    async fn run_once_skips_when_another_instance_holds_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let wt = worktree(dir.path());
        let pool = open_in_memory_pool();
        let git = FakeGitRunner::new();

        let cycle = SyncCycle::new(&git, wt, pool, "origin", 3, 5000);
        let holder = OpenOptions::new().create(true).write(true).open(cycle.lock_path()).unwrap();
        flock(&holder, FlockOperation::LockExclusive).unwrap();

        let report = cycle.run_once(&NoopSink, &CancellationToken::new()).await.unwrap();
        assert!(report.skipped);
        assert!(git.calls().is_empty(), "a skipped cycle must not touch git at all");
    }
}
