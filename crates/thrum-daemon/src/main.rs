//! `thrum-daemon`
//!
//! Process entry point: loads settings, bootstraps the sync worktree and
//! projection database, starts the background sync loop, and serves the
//! JSON-RPC surface over a Unix domain socket and a WebSocket upgrade route.

#![deny(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use rustix::fs::{FlockOperation, flock};
use tokio::net::TcpListener;
use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use thrum_core::logging::{self, LogFormat};
use thrum_events::sqlite::open_pool;
use thrum_events::{ConnectionPool, EventLog, ThrumEvent};
use thrum_messaging::{Dispatcher, Notification};
use thrum_server::rpc::{RpcContext, SyncHandle, SyncStatus};
use thrum_settings::ThrumSettings;
use thrum_sync::git::TokioGitRunner;
use thrum_sync::{SyncCycle, SyncEventSink, SyncWorktree};

/// Thrum daemon: the long-running process a repository's agents talk to.
#[derive(Parser, Debug)]
#[command(name = "thrum-daemon", about = "Git-backed messaging daemon for AI agents")]
struct Cli {
    /// Repository root. The event log, projection database, sync worktree,
    /// and settings file all live under `<repo>/.thrum/`.
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// WebSocket bind port (overrides `.thrum/settings.json`).
    #[arg(long)]
    ws_port: Option<u16>,

    /// Metrics/health bind port (overrides `.thrum/settings.json`).
    #[arg(long)]
    health_port: Option<u16>,

    /// Unix domain socket path (overrides `.thrum/settings.json`).
    #[arg(long)]
    socket_path: Option<PathBuf>,
}

fn thrum_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(".thrum")
}

/// Acquire an exclusive, non-blocking lock on `<dir>/daemon.lock` so two
/// daemons never run against the same repository's projection database at
/// once. The returned `File` must be kept alive for the process lifetime —
/// dropping it releases the lock.
fn acquire_singleton_lock(dir: &Path) -> Result<File> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join("daemon.lock");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    flock(&file, FlockOperation::NonBlockingLockExclusive)
        .with_context(|| format!("another thrum-daemon already holds {}", path.display()))?;
    Ok(file)
}

/// Bridges `thrum-sync`'s cycle-status reporting to the RPC layer's
/// `sync.status`/`sync.force` handlers.
struct DaemonSyncHandle {
    status: Arc<RwLock<SyncStatus>>,
    notify: Arc<Notify>,
}

#[async_trait]
impl SyncHandle for DaemonSyncHandle {
    async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    async fn force(&self) {
        self.notify.notify_one();
    }
}

/// Dispatches message events a sync cycle pulled in from a remote clone to
/// whichever connected agents are subscribed, so a message another clone
/// posted shows up over this process's live connections without waiting for
/// the next RPC call.
struct DispatchSink {
    dispatcher: Arc<Dispatcher>,
    pool: ConnectionPool,
}

impl SyncEventSink for DispatchSink {
    fn notify(&self, events: &[ThrumEvent]) {
        let message_creates: Vec<ThrumEvent> = events
            .iter()
            .filter(|e| matches!(e, ThrumEvent::MessageCreate { .. }))
            .cloned()
            .collect();
        if message_creates.is_empty() {
            return;
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let pool = self.pool.clone();
        drop(tokio::spawn(async move {
            let conn = match pool.get() {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to get a connection to dispatch synced messages");
                    return;
                }
            };
            for event in &message_creates {
                let ThrumEvent::MessageCreate {
                    base,
                    message_id,
                    thread_id,
                    author,
                    body,
                    reply_to,
                    ..
                } = event
                else {
                    continue;
                };
                let payload: Arc<str> = serde_json::to_string(&serde_json::json!({
                    "method": "notification.message",
                    "params": {
                        "id": message_id.as_str(),
                        "threadId": thread_id.as_str(),
                        "author": author.as_str(),
                        "body": body,
                        "replyTo": reply_to.as_ref().map(thrum_core::ids::MessageId::as_str),
                        "createdAt": base.timestamp.to_rfc3339(),
                    },
                }))
                .unwrap_or_default()
                .into();

                match Notification::for_message(&conn, message_id.as_str(), payload) {
                    Ok(notification) => {
                        if let Err(e) = dispatcher.dispatch(&conn, &notification).await {
                            warn!(error = %e, "failed to dispatch synced message");
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to load audience for synced message"),
                }
            }
        }));
    }
}

/// One iteration per interval (or on-demand via `sync.force`) until
/// cancelled: bootstrap the worktree, run the cycle, and publish the
/// outcome to `status`.
#[allow(clippy::too_many_arguments)]
async fn run_sync_loop(
    repo_root: PathBuf,
    branch: String,
    git_timeout_ms: u64,
    remote: String,
    push_retries: u32,
    interval: Duration,
    pool: ConnectionPool,
    sink: Arc<dyn SyncEventSink>,
    status: Arc<RwLock<SyncStatus>>,
    notify: Arc<Notify>,
    cancel: CancellationToken,
) {
    {
        let mut guard = status.write().await;
        guard.running = true;
    }

    loop {
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = notify.notified() => {}
            () = cancel.cancelled() => break,
        }
        if cancel.is_cancelled() {
            break;
        }

        let started = Instant::now();
        let worktree = SyncWorktree::new(repo_root.clone(), branch.clone(), git_timeout_ms);
        let git = TokioGitRunner;
        let cycle = SyncCycle::new(&git, worktree, pool.clone(), remote.clone(), push_retries, git_timeout_ms);
        let result = cycle.run_once(&*sink, &cancel).await;

        let outcome = match &result {
            Ok(report) if report.skipped => "skipped",
            Ok(_) => "ok",
            Err(_) => "error",
        };
        metrics::counter!(thrum_server::metrics::SYNC_CYCLES_TOTAL, "result" => outcome).increment(1);
        metrics::histogram!(thrum_server::metrics::SYNC_CYCLE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        {
            let mut guard = status.write().await;
            guard.last_cycle_at = Some(chrono::Utc::now().to_rfc3339());
            guard.last_result = Some(match &result {
                Ok(report) if report.skipped => "skipped: lock held by another instance".to_string(),
                Ok(report) => format!(
                    "fetched={} merged={} pushed={} attempts={}",
                    report.fetched, report.events_merged_in, report.pushed, report.push_attempts
                ),
                Err(e) => format!("error: {e}"),
            });
        }

        if let Err(e) = result {
            warn!(error = %e, "sync cycle failed");
        }
    }

    let mut guard = status.write().await;
    guard.running = false;
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    logging::init(LogFormat::Pretty);

    let repo_root = args.repo.canonicalize().unwrap_or_else(|_| args.repo.clone());
    let dir = thrum_dir(&repo_root);

    let _lock = acquire_singleton_lock(&dir).context(
        "failed to acquire the daemon singleton lock — is another thrum-daemon already running against this repository?",
    )?;

    let settings_path = dir.join("settings.json");
    let settings = thrum_settings::load_settings_from_path(&settings_path).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load settings, using defaults");
        ThrumSettings::default()
    });
    thrum_settings::init_settings(settings.clone());

    info!(repo = %repo_root.display(), "starting thrum-daemon");

    let cancel = CancellationToken::new();

    let worktree = SyncWorktree::new(repo_root.clone(), settings.sync.branch.clone(), settings.sync.git_timeout_ms);
    {
        let git = TokioGitRunner;
        worktree
            .ensure_bootstrapped(&git, &cancel)
            .await
            .context("failed to bootstrap the sync worktree")?;
    }

    let event_log = Arc::new(EventLog::new(worktree.worktree_path.clone()));

    let projection_path = dir.join(thrum_core::constants::PROJECTION_DB_FILE);
    let pool = open_pool(&projection_path).context("failed to open the projection database")?;

    {
        let conn = pool.get().context("failed to get a connection to bootstrap the everyone group")?;
        thrum_messaging::GroupService::ensure_everyone(&conn, &chrono::Utc::now().to_rfc3339())
            .context("failed to bootstrap the everyone group")?;
    }

    let dispatcher = Arc::new(Dispatcher::new(u64::from(settings.messaging.max_consecutive_drops)));

    let sync_status = Arc::new(RwLock::new(SyncStatus {
        running: false,
        last_cycle_at: None,
        last_result: None,
    }));
    let sync_notify = Arc::new(Notify::new());
    let sync_handle: Arc<dyn SyncHandle> = Arc::new(DaemonSyncHandle {
        status: Arc::clone(&sync_status),
        notify: Arc::clone(&sync_notify),
    });

    let rpc_context = Arc::new(RpcContext::new(
        pool.clone(),
        Arc::clone(&event_log),
        Arc::clone(&dispatcher),
        sync_handle,
        chrono::Utc::now().to_rfc3339(),
        dir.join("context"),
    ));
    let registry = Arc::new(thrum_server::rpc::build_registry());

    let sink: Arc<dyn SyncEventSink> = Arc::new(DispatchSink {
        dispatcher: Arc::clone(&dispatcher),
        pool: pool.clone(),
    });
    let sync_task = tokio::spawn(run_sync_loop(
        repo_root.clone(),
        settings.sync.branch.clone(),
        settings.sync.git_timeout_ms,
        settings.sync.remote.clone(),
        settings.sync.push_retries,
        Duration::from_secs(settings.sync.interval_secs),
        pool.clone(),
        sink,
        Arc::clone(&sync_status),
        Arc::clone(&sync_notify),
        cancel.clone(),
    ));

    let prometheus = thrum_server::metrics::install_recorder();
    let router = thrum_server::build_router(Arc::clone(&registry), Arc::clone(&rpc_context), prometheus);

    let ws_port = args.ws_port.unwrap_or(settings.server.ws_port);
    let health_port = args.health_port.unwrap_or(settings.server.health_port);

    let ws_listener = TcpListener::bind(("0.0.0.0", ws_port)).await.context("failed to bind the websocket port")?;
    let ws_addr = ws_listener.local_addr()?;
    let health_listener = TcpListener::bind(("0.0.0.0", health_port))
        .await
        .context("failed to bind the health/metrics port")?;
    let health_addr = health_listener.local_addr()?;

    let ws_router = router.clone();
    let ws_cancel = cancel.clone();
    let ws_task = tokio::spawn(async move {
        let _ = axum::serve(ws_listener, ws_router)
            .with_graceful_shutdown(async move {
                ws_cancel.cancelled().await;
            })
            .await;
    });

    let health_cancel = cancel.clone();
    let health_task = tokio::spawn(async move {
        let _ = axum::serve(health_listener, router)
            .with_graceful_shutdown(async move {
                health_cancel.cancelled().await;
            })
            .await;
    });

    let socket_path = args
        .socket_path
        .or_else(|| settings.server.socket_path.clone().map(PathBuf::from))
        .unwrap_or_else(|| dir.join("thrum.sock"));
    let unix_registry = Arc::clone(&registry);
    let unix_ctx = Arc::clone(&rpc_context);
    let unix_path = socket_path.clone();
    let unix_task = tokio::spawn(async move {
        if let Err(e) = thrum_server::transport::serve_unix_socket(&unix_path, unix_registry, unix_ctx).await {
            warn!(error = %e, "unix socket transport exited");
        }
    });

    info!(ws = %ws_addr, health = %health_addr, socket = %socket_path.display(), "thrum-daemon ready");

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutdown signal received");
    cancel.cancel();

    let _ = ws_task.await;
    let _ = health_task.await;
    unix_task.abort();
    let _ = sync_task.await;

    info!("thrum-daemon shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_default_repo_is_cwd() {
        let cli = Cli::parse_from(["thrum-daemon"]);
        assert_eq!(cli.repo, PathBuf::from("."));
    }

    #[test]
    fn cli_custom_ws_port() {
        let cli = Cli::parse_from(["thrum-daemon", "--ws-port", "9999"]);
        assert_eq!(cli.ws_port, Some(9999));
    }

    #[test]
    fn cli_ports_default_to_none() {
        let cli = Cli::parse_from(["thrum-daemon"]);
        assert_eq!(cli.ws_port, None);
        assert_eq!(cli.health_port, None);
    }

    #[test]
    fn thrum_dir_is_dotthrum_under_repo_root() {
        let root = PathBuf::from("/tmp/some-repo");
        assert_eq!(thrum_dir(&root), PathBuf::from("/tmp/some-repo/.thrum"));
    }

    #[test]
    fn second_lock_attempt_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_dir = dir.path().join(".thrum");
        let _first = acquire_singleton_lock(&lock_dir).unwrap();
        assert!(acquire_singleton_lock(&lock_dir).is_err());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_dir = dir.path().join(".thrum");
        {
            let _first = acquire_singleton_lock(&lock_dir).unwrap();
        }
        assert!(acquire_singleton_lock(&lock_dir).is_ok());
    }
}
