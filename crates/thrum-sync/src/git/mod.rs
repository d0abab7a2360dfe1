//! Subprocess wrapper for `git` invocations.

mod fake;
mod real;

pub use fake::FakeGitRunner;
pub use real::TokioGitRunner;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Options for a single `git` invocation.
pub struct GitOptions {
    pub working_directory: std::path::PathBuf,
    pub timeout_ms: u64,
    pub cancellation: CancellationToken,
}

/// Captured result of a `git` invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub cancelled: bool,
}

impl GitOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out && !self.cancelled
    }
}

/// Runs a `git` subcommand in a working directory with a timeout and
/// cancellation, and reports what happened.
///
/// The real implementation shells out to the system `git`. Tests that only
/// need to exercise the merge/retry logic around git, not git itself, use
/// [`FakeGitRunner`].
#[async_trait]
pub trait GitRunner: Send + Sync {
    async fn run(&self, args: &[&str], opts: &GitOptions) -> GitOutput;
}
