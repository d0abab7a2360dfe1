//! Subscription management: scope, mention, or "all" — never more than one
//! kind per (agent, target) pair.
//!
//! Subscriptions are not event-sourced (see `thrum-events`'s crate docs):
//! they are local-repository state the app layer writes to directly, so
//! disjointness has to be enforced here with a check before the insert
//! rather than at the database layer. Every subscription is owned by the
//! session that created it; only that session may remove it.

use rusqlite::Connection;

use thrum_core::ids::AgentId;
use thrum_events::sqlite::repositories::SubscriptionRepo;
use thrum_events::sqlite::row_types::SubscriptionRow;

use crate::errors::{MessagingError, Result};

pub struct SubscriptionService;

impl SubscriptionService {
    pub fn subscribe_scope(
        conn: &Connection,
        id: &str,
        session_id: &str,
        agent_id: &AgentId,
        scope_type: &str,
        scope_value: &str,
        at: &str,
    ) -> Result<SubscriptionRow> {
        Self::reject_duplicate(
            conn,
            agent_id,
            |row| row.scope_type.as_deref() == Some(scope_type) && row.scope_value.as_deref() == Some(scope_value),
            "scope",
        )?;
        Ok(SubscriptionRepo::create_scope(conn, id, session_id, agent_id.as_str(), scope_type, scope_value, at)?)
    }

    pub fn subscribe_mention(
        conn: &Connection,
        id: &str,
        session_id: &str,
        agent_id: &AgentId,
        mention_role: &str,
        at: &str,
    ) -> Result<SubscriptionRow> {
        Self::reject_duplicate(conn, agent_id, |row| row.mention_role.as_deref() == Some(mention_role), "mention")?;
        Ok(SubscriptionRepo::create_mention(conn, id, session_id, agent_id.as_str(), mention_role, at)?)
    }

    pub fn subscribe_all(conn: &Connection, id: &str, session_id: &str, agent_id: &AgentId, at: &str) -> Result<SubscriptionRow> {
        Self::reject_duplicate(conn, agent_id, |row| row.match_all, "all")?;
        Ok(SubscriptionRepo::create_all(conn, id, session_id, agent_id.as_str(), at)?)
    }

    /// Remove a subscription. Fails unless `session_id` is the session that
    /// created it.
    pub fn unsubscribe(conn: &Connection, id: &str, session_id: &str) -> Result<()> {
        if SubscriptionRepo::delete_owned_by_session(conn, id, session_id)? {
            Ok(())
        } else {
            Err(MessagingError::NotSubscriptionOwner(id.to_string()))
        }
    }

    pub fn list_for_agent(conn: &Connection, agent_id: &AgentId) -> Result<Vec<SubscriptionRow>> {
        Ok(SubscriptionRepo::list_for_agent(conn, agent_id.as_str())?)
    }

    fn reject_duplicate(
        conn: &Connection,
        agent_id: &AgentId,
        matches: impl Fn(&SubscriptionRow) -> bool,
        kind: &'static str,
    ) -> Result<()> {
        let existing = SubscriptionRepo::list_for_agent(conn, agent_id.as_str())?;
        if existing.iter().any(matches) {
            return Err(MessagingError::DuplicateSubscription {
                agent: agent_id.to_string(),
                kind,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_events::sqlite::migrations::run_migrations;
    use thrum_events::sqlite::repositories::AgentRepo;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        AgentRepo::upsert_registered(&conn, "claude-1", "automation", "engineer", "core", None, "2026-01-01T00:00:00Z").unwrap();
        AgentRepo::start_session(&conn, "ses_1", "claude-1", None, "2026-01-01T00:00:00Z").unwrap();
        AgentRepo::start_session(&conn, "ses_2", "claude-1", None, "2026-01-01T00:00:00Z").unwrap();
        conn
    }

    fn agent(name: &str) -> AgentId {
        AgentId::new(name).unwrap()
    }

    #[test]
    fn subscribing_twice_to_the_same_scope_is_rejected() {
        let conn = setup();
        let a = agent("claude-1");
        SubscriptionService::subscribe_scope(&conn, "sub_1", "ses_1", &a, "module", "team-a", "2026-01-01T00:00:00Z").unwrap();
        let err =
            SubscriptionService::subscribe_scope(&conn, "sub_2", "ses_1", &a, "module", "team-a", "2026-01-01T00:00:01Z").unwrap_err();
        assert!(matches!(err, MessagingError::DuplicateSubscription { .. }));
    }

    #[test]
    fn different_scopes_and_kinds_coexist() {
        let conn = setup();
        let a = agent("claude-1");
        SubscriptionService::subscribe_scope(&conn, "sub_1", "ses_1", &a, "module", "team-a", "2026-01-01T00:00:00Z").unwrap();
        SubscriptionService::subscribe_scope(&conn, "sub_2", "ses_1", &a, "module", "team-b", "2026-01-01T00:00:00Z").unwrap();
        SubscriptionService::subscribe_mention(&conn, "sub_3", "ses_1", &a, "engineer", "2026-01-01T00:00:00Z").unwrap();
        assert_eq!(SubscriptionService::list_for_agent(&conn, &a).unwrap().len(), 3);
    }

    #[test]
    fn unsubscribe_removes_it() {
        let conn = setup();
        let a = agent("claude-1");
        SubscriptionService::subscribe_all(&conn, "sub_1", "ses_1", &a, "2026-01-01T00:00:00Z").unwrap();
        SubscriptionService::unsubscribe(&conn, "sub_1", "ses_1").unwrap();
        assert!(SubscriptionService::list_for_agent(&conn, &a).unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_from_a_different_session_is_rejected() {
        let conn = setup();
        let a = agent("claude-1");
        SubscriptionService::subscribe_all(&conn, "sub_1", "ses_1", &a, "2026-01-01T00:00:00Z").unwrap();
        let err = SubscriptionService::unsubscribe(&conn, "sub_1", "ses_2").unwrap_err();
        assert!(matches!(err, MessagingError::NotSubscriptionOwner(_)));
        assert_eq!(SubscriptionService::list_for_agent(&conn, &a).unwrap().len(), 1);
    }
}
