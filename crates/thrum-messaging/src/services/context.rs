//! Per-agent saved context and preamble notes.
//!
//! Unlike the rest of the domain layer this isn't projected from the event
//! log at all — it's plain per-agent files under a runtime directory, one
//! file per agent per kind. The only guarantee worth making is file-level
//! atomicity: a reader never observes a half-written save.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::errors::{MessagingError, Result};

const CONTEXT_EXT: &str = "context";
const PREAMBLE_EXT: &str = "preamble";

pub struct ContextService;

impl ContextService {
    /// Overwrite an agent's saved context with `content`.
    pub fn save(context_dir: &Path, agent_id: &str, content: &[u8]) -> Result<()> {
        write_atomic(&path_for(context_dir, agent_id, CONTEXT_EXT), content)
    }

    pub fn show(context_dir: &Path, agent_id: &str) -> Result<Vec<u8>> {
        read(&path_for(context_dir, agent_id, CONTEXT_EXT), agent_id)
    }

    pub fn clear(context_dir: &Path, agent_id: &str) -> Result<()> {
        remove(&path_for(context_dir, agent_id, CONTEXT_EXT))
    }

    /// Overwrite an agent's preamble notes with `content`.
    pub fn save_preamble(context_dir: &Path, agent_id: &str, content: &[u8]) -> Result<()> {
        write_atomic(&path_for(context_dir, agent_id, PREAMBLE_EXT), content)
    }

    pub fn show_preamble(context_dir: &Path, agent_id: &str) -> Result<Vec<u8>> {
        read(&path_for(context_dir, agent_id, PREAMBLE_EXT), agent_id)
    }
}

fn path_for(context_dir: &Path, agent_id: &str, ext: &str) -> PathBuf {
    context_dir.join(format!("{agent_id}.{ext}"))
}

fn read(path: &Path, agent_id: &str) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            MessagingError::NoSavedContext(agent_id.to_string())
        } else {
            MessagingError::ContextIo { path: path.display().to_string(), source }
        }
    })
}

fn remove(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(MessagingError::ContextIo { path: path.display().to_string(), source }),
    }
}

/// Write to a temp file beside `path`, fsync it, then rename over the
/// target so a concurrent reader never sees a partial write.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|source| MessagingError::ContextIo { path: parent.display().to_string(), source })?;

    let tmp_path = path.with_extension(format!("{}.tmp", path.extension().and_then(|e| e.to_str()).unwrap_or("tmp")));
    let mut file = std::fs::File::create(&tmp_path)
        .map_err(|source| MessagingError::ContextIo { path: tmp_path.display().to_string(), source })?;
    file.write_all(content).map_err(|source| MessagingError::ContextIo { path: tmp_path.display().to_string(), source })?;
    file.sync_all().map_err(|source| MessagingError::ContextIo { path: tmp_path.display().to_string(), source })?;
    drop(file);

    std::fs::rename(&tmp_path, path).map_err(|source| MessagingError::ContextIo { path: path.display().to_string(), source })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_show_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        ContextService::save(dir.path(), "claude-1", b"hello world").unwrap();
        assert_eq!(ContextService::show(dir.path(), "claude-1").unwrap(), b"hello world");
    }

    #[test]
    fn showing_unsaved_context_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContextService::show(dir.path(), "claude-1").unwrap_err();
        assert!(matches!(err, MessagingError::NoSavedContext(_)));
    }

    #[test]
    fn save_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        ContextService::save(dir.path(), "claude-1", b"v1").unwrap();
        ContextService::save(dir.path(), "claude-1", b"v2").unwrap();
        assert_eq!(ContextService::show(dir.path(), "claude-1").unwrap(), b"v2");
    }

    #[test]
    fn clear_removes_saved_context() {
        let dir = tempfile::tempdir().unwrap();
        ContextService::save(dir.path(), "claude-1", b"v1").unwrap();
        ContextService::clear(dir.path(), "claude-1").unwrap();
        assert!(matches!(ContextService::show(dir.path(), "claude-1").unwrap_err(), MessagingError::NoSavedContext(_)));
    }

    #[test]
    fn clearing_an_unsaved_context_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        ContextService::clear(dir.path(), "claude-1").unwrap();
    }

    #[test]
    fn context_and_preamble_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        ContextService::save(dir.path(), "claude-1", b"context").unwrap();
        ContextService::save_preamble(dir.path(), "claude-1", b"preamble").unwrap();
        assert_eq!(ContextService::show(dir.path(), "claude-1").unwrap(), b"context");
        assert_eq!(ContextService::show_preamble(dir.path(), "claude-1").unwrap(), b"preamble");
    }
}
