//! Reader–writer discipline layered over the projection database: read-only
//! methods take a shared lock, mutating methods take an exclusive one.
//! `rusqlite` transactions still give per-operation atomicity — this lock
//! exists purely to serialize concurrent RPC handlers against each other at
//! the process level, the same way the event log serializes appends with an
//! advisory file lock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::rpc::errors::RpcError;

/// How long a handler waits for the lock before giving up and reporting
/// contention back to the caller, rather than queuing indefinitely.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ProjectionLock(Arc<RwLock<()>>);

/// Held for the lifetime of one RPC call; dropping it releases the lock.
pub enum ProjectionGuard {
    Read(OwnedRwLockReadGuard<()>),
    Write(OwnedRwLockWriteGuard<()>),
}

impl ProjectionLock {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(())))
    }

    pub async fn read(&self) -> Result<ProjectionGuard, RpcError> {
        tokio::time::timeout(DEFAULT_ACQUIRE_TIMEOUT, Arc::clone(&self.0).read_owned())
            .await
            .map(ProjectionGuard::Read)
            .map_err(|_| RpcError::Transient {
                message: "projection lock already held by a writer".into(),
            })
    }

    pub async fn write(&self) -> Result<ProjectionGuard, RpcError> {
        tokio::time::timeout(DEFAULT_ACQUIRE_TIMEOUT, Arc::clone(&self.0).write_owned())
            .await
            .map(ProjectionGuard::Write)
            .map_err(|_| RpcError::Transient {
                message: "projection lock already held".into(),
            })
    }
}

impl Default for ProjectionLock {
    fn default() -> Self {
        Self::new()
    }
}
