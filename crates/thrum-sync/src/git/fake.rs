//! Scripted `git` runner for tests that exercise sync-cycle logic without
//! a real git binary or network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GitOptions, GitOutput, GitRunner};

/// A runner that replays a queue of canned responses, one per call,
/// regardless of what was asked for. Tests push the exact sequence of
/// outcomes (fetch ok, merge conflict-free, push rejected once then ok)
/// they want to drive the sync cycle through.
#[derive(Default)]
pub struct FakeGitRunner {
    responses: Mutex<VecDeque<GitOutput>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeGitRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_success(&self, stdout: impl Into<String>) {
        self.responses.lock().unwrap().push_back(GitOutput {
            stdout: stdout.into(),
            exit_code: 0,
            ..Default::default()
        });
    }

    pub fn push_failure(&self, exit_code: i32, stderr: impl Into<String>) {
        self.responses.lock().unwrap().push_back(GitOutput {
            stderr: stderr.into(),
            exit_code,
            ..Default::default()
        });
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitRunner for FakeGitRunner {
    async fn run(&self, args: &[&str], _opts: &GitOptions) -> GitOutput {
        self.calls
            .lock()
            .unwrap()
            .push(args.iter().map(ToString::to_string).collect());
        self.responses.lock().unwrap().pop_front().unwrap_or(GitOutput {
            exit_code: 0,
            ..Default::default()
        })
    }
}
