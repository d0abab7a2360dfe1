//! Real `git` subprocess execution via `tokio::process::Command`.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use super::{GitOptions, GitOutput, GitRunner};

/// Shells out to the system `git` binary.
pub struct TokioGitRunner;

#[async_trait]
impl GitRunner for TokioGitRunner {
    async fn run(&self, args: &[&str], opts: &GitOptions) -> GitOutput {
        let mut cmd = tokio::process::Command::new("git");
        cmd.args(args)
            .current_dir(&opts.working_directory)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        debug!(?args, working_dir = %opts.working_directory.display(), "spawning git");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(?args, error = %err, "failed to spawn git");
                return GitOutput {
                    stderr: format!("failed to spawn git: {err}"),
                    exit_code: -1,
                    ..Default::default()
                };
            }
        };

        let timeout = std::time::Duration::from_millis(opts.timeout_ms);
        let cancel = opts.cancellation.clone();

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        tokio::select! {
            status = child.wait() => {
                let stdout_bytes = stdout_handle.await.unwrap_or_default();
                let stderr_bytes = stderr_handle.await.unwrap_or_default();
                let exit_code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
                debug!(?args, exit_code, "git completed");
                GitOutput {
                    stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                    exit_code,
                    timed_out: false,
                    cancelled: false,
                }
            }
            () = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                stdout_handle.abort();
                stderr_handle.abort();
                warn!(?args, timeout_ms = opts.timeout_ms, "git timed out");
                GitOutput {
                    stderr: "git timed out".into(),
                    exit_code: -1,
                    timed_out: true,
                    cancelled: false,
                    ..Default::default()
                }
            }
            () = cancel.cancelled() => {
                let _ = child.kill().await;
                stdout_handle.abort();
                stderr_handle.abort();
                debug!(?args, "git cancelled");
                GitOutput {
                    stderr: "git cancelled".into(),
                    exit_code: -1,
                    timed_out: false,
                    cancelled: true,
                    ..Default::default()
                }
            }
        }
    }
}
