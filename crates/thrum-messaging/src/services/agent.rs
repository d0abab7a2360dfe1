//! Agent lifecycle: register, start/end session, update status and work
//! context.
//!
//! Every mutation here is event-sourced — the service builds a
//! [`ThrumEvent`], appends it to the log, and applies it to the
//! projection in the same call so a caller reading right back sees its
//! own write.

use rusqlite::Connection;

use thrum_core::ids::{AgentId, SessionId};
use thrum_events::log::event::{BaseEvent, WorkContextEntry};
use thrum_events::log::ids;
use thrum_events::sqlite::repositories::agent::AgentListFilter;
use thrum_events::sqlite::repositories::AgentRepo;
use thrum_events::sqlite::row_types::{AgentRow, SessionRow};
use thrum_events::{EventLog, ThrumEvent, projector};

use crate::errors::{MessagingError, Result};

pub struct AgentService;

impl AgentService {
    pub fn register(
        conn: &Connection,
        log: &EventLog,
        agent_id: &AgentId,
        kind: String,
        role: String,
        module: String,
        display_name: Option<String>,
    ) -> Result<AgentRow> {
        let event = ThrumEvent::AgentRegister {
            base: BaseEvent::new(ids::generate()),
            agent_id: agent_id.clone(),
            kind,
            role,
            module,
            display_name,
        };
        log.append(&event)?;
        projector::apply_event(conn, &event)?;
        AgentRepo::get_by_id(conn, agent_id.as_str())?.ok_or_else(|| MessagingError::UnknownAgent(agent_id.to_string()))
    }

    /// Remove an agent's identity and session history.
    pub fn delete(conn: &Connection, agent_id: &AgentId) -> Result<()> {
        if !AgentRepo::delete(conn, agent_id.as_str())? {
            return Err(MessagingError::UnknownAgent(agent_id.to_string()));
        }
        Ok(())
    }

    pub fn list(conn: &Connection, filter: &AgentListFilter<'_>) -> Result<Vec<AgentRow>> {
        Ok(AgentRepo::list(conn, filter)?)
    }

    pub fn start_session(
        conn: &Connection,
        log: &EventLog,
        agent_id: &AgentId,
        session_id: &SessionId,
        label: Option<String>,
    ) -> Result<SessionRow> {
        let event = ThrumEvent::AgentSessionStart {
            base: BaseEvent::new(ids::generate()),
            agent_id: agent_id.clone(),
            session_id: session_id.clone(),
            label,
        };
        log.append(&event)?;
        projector::apply_event(conn, &event)?;
        AgentRepo::get_session(conn, session_id.as_str())?
            .ok_or_else(|| MessagingError::UnknownSession(session_id.to_string()))
    }

    pub fn end_session(conn: &Connection, log: &EventLog, agent_id: &AgentId, session_id: &SessionId) -> Result<()> {
        let event = ThrumEvent::AgentSessionEnd {
            base: BaseEvent::new(ids::generate()),
            agent_id: agent_id.clone(),
            session_id: session_id.clone(),
        };
        log.append(&event)?;
        projector::apply_event(conn, &event)?;
        Ok(())
    }

    pub fn list_sessions(conn: &Connection, agent_id: Option<&AgentId>) -> Result<Vec<SessionRow>> {
        Ok(AgentRepo::list_sessions(conn, agent_id.map(AgentId::as_str))?)
    }

    pub fn update(
        conn: &Connection,
        log: &EventLog,
        agent_id: &AgentId,
        status: Option<String>,
        work_contexts: Vec<WorkContextEntry>,
    ) -> Result<AgentRow> {
        let event = ThrumEvent::AgentUpdate {
            base: BaseEvent::new(ids::generate()),
            agent_id: agent_id.clone(),
            status,
            work_contexts,
        };
        log.append(&event)?;
        projector::apply_event(conn, &event)?;
        AgentRepo::get_by_id(conn, agent_id.as_str())?.ok_or_else(|| MessagingError::UnknownAgent(agent_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_events::sqlite::pool::open_in_memory_pool;

    fn agent(name: &str) -> AgentId {
        AgentId::new(name).unwrap()
    }

    #[test]
    fn register_then_update_round_trips_through_log_and_projection() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let pool = open_in_memory_pool();
        let conn = pool.get().unwrap();

        let agent_id = agent("claude-1");
        AgentService::register(&conn, &log, &agent_id, "automation".into(), "engineer".into(), "core".into(), Some("Claude".into()))
            .unwrap();
        let updated = AgentService::update(&conn, &log, &agent_id, Some("busy".into()), vec![]).unwrap();
        assert_eq!(updated.status.as_deref(), Some("busy"));

        assert_eq!(log.read_shard(&thrum_events::ShardPath::Shared).unwrap().len(), 2);
    }

    #[test]
    fn session_lifecycle_through_service() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let pool = open_in_memory_pool();
        let conn = pool.get().unwrap();

        let agent_id = agent("claude-1");
        AgentService::register(&conn, &log, &agent_id, "automation".into(), "engineer".into(), "core".into(), None).unwrap();
        let session_id = thrum_core::ids::SessionId::from_raw("ses_1");
        let started = AgentService::start_session(&conn, &log, &agent_id, &session_id, None).unwrap();
        assert!(started.ended_at.is_none());

        AgentService::end_session(&conn, &log, &agent_id, &session_id).unwrap();
        let ended = AgentRepo::get_session(&conn, "ses_1").unwrap().unwrap();
        assert!(ended.ended_at.is_some());
    }

    #[test]
    fn update_merges_a_work_context_for_the_current_session() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let pool = open_in_memory_pool();
        let conn = pool.get().unwrap();

        let agent_id = agent("claude-1");
        AgentService::register(&conn, &log, &agent_id, "automation".into(), "engineer".into(), "core".into(), None).unwrap();
        let session_id = thrum_core::ids::SessionId::from_raw("ses_1");
        AgentService::start_session(&conn, &log, &agent_id, &session_id, None).unwrap();

        AgentService::update(
            &conn,
            &log,
            &agent_id,
            None,
            vec![WorkContextEntry {
                session_id: session_id.clone(),
                branch: Some("main".into()),
                git_updated_at: Some("2026-01-01T00:00:00Z".into()),
                ..Default::default()
            }],
        )
        .unwrap();

        let found = thrum_events::sqlite::repositories::WorkContextRepo::get(&conn, "ses_1", "claude-1")
            .unwrap()
            .unwrap();
        assert_eq!(found.branch.as_deref(), Some("main"));
    }

    #[test]
    fn delete_removes_an_unregistered_agent() {
        let pool = open_in_memory_pool();
        let conn = pool.get().unwrap();
        let err = AgentService::delete(&conn, &agent("ghost")).unwrap_err();
        assert!(matches!(err, MessagingError::UnknownAgent(_)));
    }
}
