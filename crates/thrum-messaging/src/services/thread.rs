//! Thread creation.

use rusqlite::Connection;

use thrum_core::ids::{AgentId, ThreadId};
use thrum_events::log::event::BaseEvent;
use thrum_events::log::ids;
use thrum_events::sqlite::repositories::ThreadRepo;
use thrum_events::sqlite::row_types::ThreadRow;
use thrum_events::{EventLog, ThrumEvent, projector};

use crate::errors::{MessagingError, Result};

pub struct ThreadService;

impl ThreadService {
    pub fn create(
        conn: &Connection,
        log: &EventLog,
        thread_id: &ThreadId,
        created_by: &AgentId,
        title: Option<String>,
    ) -> Result<ThreadRow> {
        let event = ThrumEvent::ThreadCreate {
            base: BaseEvent::new(ids::generate()),
            thread_id: thread_id.clone(),
            created_by: created_by.clone(),
            title,
        };
        log.append(&event)?;
        projector::apply_event(conn, &event)?;
        ThreadRepo::get_by_id(conn, thread_id.as_str())?
            .ok_or_else(|| MessagingError::UnknownThread(thread_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_core::ids::AgentId;
    use thrum_events::sqlite::pool::open_in_memory_pool;

    #[test]
    fn create_thread_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        let pool = open_in_memory_pool();
        let conn = pool.get().unwrap();

        let thread_id = ThreadId::from_raw("thr_1");
        let created = ThreadService::create(
            &conn,
            &log,
            &thread_id,
            &AgentId::new("claude-1").unwrap(),
            Some("planning".into()),
        )
        .unwrap();
        assert_eq!(created.title.as_deref(), Some("planning"));
    }
}
