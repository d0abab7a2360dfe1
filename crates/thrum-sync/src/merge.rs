//! Union-merge of JSONL event shards between the local worktree and a
//! fetched remote ref.
//!
//! Every shard is a set keyed by event id: merging never drops an event
//! either side already has, and the merged file is always re-sorted by
//! `(timestamp, id)` so the projector can replay it in a single linear
//! pass.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use thrum_events::ThrumEvent;

use crate::errors::{Result, SyncError};
use crate::git::{GitOptions, GitRunner};

#[derive(Debug, Default, Clone)]
pub struct MergeReport {
    pub shards_merged: usize,
    pub events_added_from_remote: usize,
    /// Events that were present in the remote shard but not the local one,
    /// in the order a caller should feed them to the projector.
    pub new_events: Vec<ThrumEvent>,
}

pub struct MergeEngine<'a> {
    git: &'a dyn GitRunner,
    worktree: PathBuf,
    git_timeout_ms: u64,
}

impl<'a> MergeEngine<'a> {
    #[must_use]
    pub fn new(git: &'a dyn GitRunner, worktree: impl Into<PathBuf>, git_timeout_ms: u64) -> Self {
        Self {
            git,
            worktree: worktree.into(),
            git_timeout_ms,
        }
    }

    fn opts(&self, cancel: &CancellationToken) -> GitOptions {
        GitOptions {
            working_directory: self.worktree.clone(),
            timeout_ms: self.git_timeout_ms,
            cancellation: cancel.clone(),
        }
    }

    /// Merge every shard that exists locally or on `remote_ref`, writing
    /// the union back into the worktree in place.
    #[instrument(skip(self, cancel))]
    pub async fn merge_from_ref(&self, remote_ref: &str, cancel: &CancellationToken) -> Result<MergeReport> {
        let mut shard_paths = self.local_shard_paths()?;
        for remote_path in self.remote_shard_paths(remote_ref, cancel).await? {
            if !shard_paths.contains(&remote_path) {
                shard_paths.push(remote_path);
            }
        }

        let mut report = MergeReport::default();
        for relative in shard_paths {
            let local_path = self.worktree.join(&relative);
            let local_events = read_jsonl(&local_path)?;
            let local_ids: std::collections::HashSet<String> =
                local_events.iter().map(|e| e.base().id.as_str().to_string()).collect();
            let remote_events = self.read_remote_shard(remote_ref, &relative, cancel).await?;

            let new_from_remote: Vec<ThrumEvent> = remote_events
                .iter()
                .filter(|e| !local_ids.contains(e.base().id.as_str()))
                .cloned()
                .collect();

            let before = local_events.len();
            let merged = union_sorted(local_events, remote_events);
            let added = merged.len().saturating_sub(before);

            if added > 0 || !local_path.exists() {
                write_jsonl_atomic(&local_path, &merged)?;
            }
            report.shards_merged += 1;
            report.events_added_from_remote += added;
            report.new_events.extend(new_from_remote);
        }

        report
            .new_events
            .sort_by(|a, b| (a.base().timestamp, a.base().id.as_str()).cmp(&(b.base().timestamp, b.base().id.as_str())));

        Ok(report)
    }

    fn local_shard_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        if self.worktree.join(thrum_core::constants::EVENTS_SHARD).exists() {
            paths.push(PathBuf::from(thrum_core::constants::EVENTS_SHARD));
        }
        let messages_dir = self.worktree.join(thrum_core::constants::MESSAGES_DIR);
        if messages_dir.exists() {
            for entry in std::fs::read_dir(&messages_dir).map_err(|source| SyncError::Io {
                path: messages_dir.display().to_string(),
                source,
            })? {
                let entry = entry.map_err(|source| SyncError::Io {
                    path: messages_dir.display().to_string(),
                    source,
                })?;
                if entry.path().extension().is_some_and(|ext| ext == "jsonl") {
                    paths.push(PathBuf::from(thrum_core::constants::MESSAGES_DIR).join(entry.file_name()));
                }
            }
        }
        Ok(paths)
    }

    async fn remote_shard_paths(&self, remote_ref: &str, cancel: &CancellationToken) -> Result<Vec<PathBuf>> {
        let output = self
            .git
            .run(&["ls-tree", "-r", "--name-only", remote_ref], &self.opts(cancel))
            .await;
        if !output.success() {
            // Remote ref doesn't exist yet, or hasn't been fetched — the
            // first sync cycle of a fresh clone has nothing to merge from.
            return Ok(Vec::new());
        }
        Ok(output
            .stdout
            .lines()
            .filter(|line| line.ends_with(".jsonl"))
            .map(PathBuf::from)
            .collect())
    }

    async fn read_remote_shard(
        &self,
        remote_ref: &str,
        relative: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<ThrumEvent>> {
        let spec = format!("{}:{}", remote_ref, relative.display());
        let output = self.git.run(&["show", &spec], &self.opts(cancel)).await;
        if !output.success() {
            return Ok(Vec::new());
        }
        Ok(parse_jsonl(&output.stdout))
    }
}

fn read_jsonl(path: &Path) -> Result<Vec<ThrumEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).map_err(|source| SyncError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_jsonl(&content))
}

fn parse_jsonl(content: &str) -> Vec<ThrumEvent> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<ThrumEvent>(line) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(error = %err, "skipping unparsable event during merge");
                None
            }
        })
        .collect()
}

/// Union two event lists by id, then sort by `(timestamp, id)` — the order
/// the projector's rebuild path also replays in.
fn union_sorted(local: Vec<ThrumEvent>, remote: Vec<ThrumEvent>) -> Vec<ThrumEvent> {
    let mut by_id: BTreeMap<String, ThrumEvent> = BTreeMap::new();
    for event in local.into_iter().chain(remote) {
        by_id.entry(event.base().id.as_str().to_string()).or_insert(event);
    }
    let mut events: Vec<ThrumEvent> = by_id.into_values().collect();
    events.sort_by(|a, b| {
        (a.base().timestamp, a.base().id.as_str()).cmp(&(b.base().timestamp, b.base().id.as_str()))
    });
    events
}

/// Write the merged shard to a temp file in the same directory, fsync it,
/// then rename over the target — a concurrent reader never observes a
/// partially written shard.
fn write_jsonl_atomic(path: &Path, events: &[ThrumEvent]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SyncError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let tmp_path = path.with_extension("jsonl.tmp");
    let mut tmp = std::fs::File::create(&tmp_path).map_err(|source| SyncError::Io {
        path: tmp_path.display().to_string(),
        source,
    })?;
    for event in events {
        let line = serde_json::to_string(event)?;
        writeln!(tmp, "{line}").map_err(|source| SyncError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
    }
    tmp.sync_all().map_err(|source| SyncError::Io {
        path: tmp_path.display().to_string(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| SyncError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}
