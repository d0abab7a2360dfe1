//! RPC dependency-injection context shared by every handler.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thrum_events::{ConnectionPool, EventLog};
use thrum_messaging::Dispatcher;

use crate::rpc::lock::ProjectionLock;

/// A point-in-time view of the replication cycle, returned by `sync.status`.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub running: bool,
    pub last_cycle_at: Option<String>,
    pub last_result: Option<String>,
}

/// Seam between the RPC layer and the background sync loop. `thrum-server`
/// only needs to ask "what happened last" and "go now" — the loop itself,
/// its git plumbing, and its cancellation token live in the daemon that
/// wires this trait to a real [`thrum_sync::SyncCycle`].
#[async_trait]
pub trait SyncHandle: Send + Sync {
    async fn status(&self) -> SyncStatus;
    async fn force(&self);
}

/// A [`SyncHandle`] that never ran and cannot be triggered — used where no
/// sync loop is wired up (tests, or a server started without a repo).
pub struct NoopSyncHandle;

#[async_trait]
impl SyncHandle for NoopSyncHandle {
    async fn status(&self) -> SyncStatus {
        SyncStatus {
            running: false,
            last_cycle_at: None,
            last_result: None,
        }
    }

    async fn force(&self) {}
}

/// Shared context passed to every RPC handler.
pub struct RpcContext {
    pub pool: ConnectionPool,
    pub log: Arc<EventLog>,
    pub dispatcher: Arc<Dispatcher>,
    pub sync: Arc<dyn SyncHandle>,
    pub started_at: String,
    /// Directory holding per-agent saved context and preamble files.
    pub context_dir: PathBuf,
    /// Reader–writer discipline over the projection database, held for the
    /// duration of each dispatched call.
    pub projection_lock: ProjectionLock,
}

impl RpcContext {
    #[must_use]
    pub fn new(
        pool: ConnectionPool,
        log: Arc<EventLog>,
        dispatcher: Arc<Dispatcher>,
        sync: Arc<dyn SyncHandle>,
        started_at: String,
        context_dir: PathBuf,
    ) -> Self {
        Self {
            pool,
            log,
            dispatcher,
            sync,
            started_at,
            context_dir,
            projection_lock: ProjectionLock::new(),
        }
    }
}
