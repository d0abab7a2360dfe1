//! Connection registry and message fan-out.
//!
//! Grounded on the same shape as a broadcast manager: a registry of live
//! connections keyed by connection id, bounded per-connection channels,
//! and a drop budget past which a connection is torn down rather than
//! left to buffer indefinitely. Recipients for a given message are
//! resolved against the `subscriptions` table — scope match, mention
//! match, or a blanket "all" subscription.

mod subscriber;

pub use subscriber::Subscriber;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rusqlite::Connection;
use tokio::sync::RwLock;

use thrum_events::sqlite::repositories::{AgentRepo, MessageRepo, SubscriptionRepo};
use thrum_events::sqlite::row_types::SubscriptionRow;

use crate::errors::Result;

/// A message's identity plus the audience fields dispatch needs — kept
/// separate from `MessageRow` so callers that already have scopes and
/// refs in hand (fresh off `MessageService::create`) don't need a round
/// trip through the database to dispatch.
#[derive(Clone, Debug)]
pub struct Notification {
    pub message_id: String,
    pub scopes: Vec<(String, String)>,
    pub mentions: Vec<String>,
    pub payload: Arc<str>,
}

impl Notification {
    /// Load the scopes and mentions for an already-persisted message and
    /// pair them with a pre-serialized payload.
    pub fn for_message(conn: &Connection, message_id: &str, payload: Arc<str>) -> Result<Self> {
        Ok(Self {
            message_id: message_id.to_string(),
            scopes: MessageRepo::get_scopes(conn, message_id)?
                .into_iter()
                .map(|s| (s.scope_type, s.scope_value))
                .collect(),
            mentions: MessageRepo::get_mentions(conn, message_id)?,
            payload,
        })
    }
}

/// Tracks every live connection and fans messages out to the ones whose
/// subscriptions match. A connection that accumulates `max_consecutive_drops`
/// drops without a single successful send in between is evicted on the next
/// dispatch pass.
pub struct Dispatcher {
    connections: RwLock<HashMap<String, Arc<Subscriber>>>,
    active: AtomicUsize,
    max_drops: u64,
}

impl Dispatcher {
    #[must_use]
    pub fn new(max_drops: u64) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active: AtomicUsize::new(0),
            max_drops,
        }
    }

    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub async fn register(&self, subscriber: Arc<Subscriber>) {
        let mut conns = self.connections.write().await;
        if conns.insert(subscriber.id.clone(), subscriber).is_none() {
            self.active.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn remove(&self, connection_id: &str) {
        let mut conns = self.connections.write().await;
        if conns.remove(connection_id).is_some() {
            self.active.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Resolve and notify every connection whose agent is subscribed to
    /// this notification, evicting any connection that has crossed the
    /// drop budget.
    pub async fn dispatch(&self, conn: &Connection, notification: &Notification) -> Result<usize> {
        let recipients = resolve_recipients(conn, &notification.scopes, &notification.mentions)?;
        if recipients.is_empty() {
            return Ok(0);
        }

        let mut delivered = 0;
        let mut to_evict = Vec::new();
        {
            let conns = self.connections.read().await;
            for subscriber in conns.values() {
                let Some(agent_id) = subscriber.agent_id.as_deref() else {
                    continue;
                };
                if !recipients.contains(agent_id) {
                    continue;
                }
                if subscriber.send(Arc::clone(&notification.payload)) {
                    delivered += 1;
                } else {
                    metrics::counter!("thrum_dispatch_drops_total").increment(1);
                    if subscriber.drop_count() >= self.max_drops {
                        to_evict.push(subscriber.id.clone());
                    }
                }
            }
        }

        for id in to_evict {
            tracing::warn!(connection_id = %id, "evicting subscriber after exceeding drop budget");
            self.remove(&id).await;
        }

        Ok(delivered)
    }
}

/// Which agents should see a message with the given scopes and mention
/// refs, per the subscriptions currently on file. Loads every
/// subscription, the role of its owning agent, and applies the matching
/// rule below to each.
fn resolve_recipients(
    conn: &Connection,
    scopes: &[(String, String)],
    mentions: &[String],
) -> Result<std::collections::HashSet<String>> {
    let mut recipients = std::collections::HashSet::new();
    for sub in SubscriptionRepo::list_all(conn)? {
        let agent_role = AgentRepo::get_by_id(conn, &sub.agent_id)?.map(|a| a.role);
        if matches(&sub, agent_role.as_deref(), scopes, mentions) {
            recipients.insert(sub.agent_id);
        }
    }
    Ok(recipients)
}

/// The first matching rule, per the dispatch algorithm: `all` beats
/// `scope` beats `mention`. A mention ref matches when its value equals
/// the subscription's own `mention_role`, the subscribing agent's
/// current role, or the subscribing agent's id — so an agent is always
/// reachable by its own name or role even without subscribing to either
/// explicitly.
fn matches(sub: &SubscriptionRow, agent_role: Option<&str>, scopes: &[(String, String)], mentions: &[String]) -> bool {
    if sub.match_all {
        return true;
    }
    if let (Some(scope_type), Some(scope_value)) = (&sub.scope_type, &sub.scope_value) {
        if scopes.iter().any(|(t, v)| t == scope_type && v == scope_value) {
            return true;
        }
    }
    if let Some(mention_role) = &sub.mention_role {
        let agent_matches = |value: &str| {
            value == mention_role.as_str() || Some(value) == agent_role || value == sub.agent_id.as_str()
        };
        if mentions.iter().any(|m| agent_matches(m)) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_core::ids::AgentId;
    use thrum_events::sqlite::migrations::run_migrations;
    use thrum_events::sqlite::repositories::AgentRepo;

    use crate::services::SubscriptionService;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        AgentRepo::upsert_registered(&conn, "claude-1", "automation", "engineer", "core", None, "2026-01-01T00:00:00Z").unwrap();
        AgentRepo::upsert_registered(&conn, "claude-2", "automation", "reviewer", "core", None, "2026-01-01T00:00:00Z").unwrap();
        AgentRepo::start_session(&conn, "ses_1", "claude-1", None, "2026-01-01T00:00:00Z").unwrap();
        AgentRepo::start_session(&conn, "ses_2", "claude-2", None, "2026-01-01T00:00:00Z").unwrap();
        conn
    }

    fn agent(name: &str) -> AgentId {
        AgentId::new(name).unwrap()
    }

    #[tokio::test]
    async fn delivers_to_scope_subscribers_and_skips_others() {
        let conn = setup();
        SubscriptionService::subscribe_scope(&conn, "sub_1", "ses_2", &agent("claude-2"), "module", "team-a", "2026-01-01T00:00:00Z")
            .unwrap();

        let dispatcher = Dispatcher::new(100);
        let (sub1, mut rx1) = Subscriber::new("c1", Some("claude-1".into()), 8);
        let (sub2, mut rx2) = Subscriber::new("c2", Some("claude-2".into()), 8);
        dispatcher.register(Arc::new(sub1)).await;
        dispatcher.register(Arc::new(sub2)).await;

        let notification = Notification {
            message_id: "msg_1".into(),
            scopes: vec![("module".into(), "team-a".into())],
            mentions: vec![],
            payload: Arc::from("{}"),
        };
        let delivered = dispatcher.dispatch(&conn, &notification).await.unwrap();
        assert_eq!(delivered, 1);
        assert!(rx2.try_recv().is_ok());
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn all_subscription_receives_every_message() {
        let conn = setup();
        SubscriptionService::subscribe_all(&conn, "sub_1", "ses_1", &agent("claude-1"), "2026-01-01T00:00:00Z").unwrap();

        let dispatcher = Dispatcher::new(100);
        let (sub, mut rx) = Subscriber::new("c1", Some("claude-1".into()), 8);
        dispatcher.register(Arc::new(sub)).await;

        let notification = Notification {
            message_id: "msg_1".into(),
            scopes: vec![("module".into(), "something-unrelated".into())],
            mentions: vec![],
            payload: Arc::from("{}"),
        };
        dispatcher.dispatch(&conn, &notification).await.unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn mention_matches_subscribers_own_role_without_an_explicit_subscription() {
        let conn = setup();
        SubscriptionService::subscribe_mention(&conn, "sub_1", "ses_2", &agent("claude-2"), "reviewer", "2026-01-01T00:00:00Z")
            .unwrap();

        let dispatcher = Dispatcher::new(100);
        let (sub, mut rx) = Subscriber::new("c1", Some("claude-2".into()), 8);
        dispatcher.register(Arc::new(sub)).await;

        let notification = Notification {
            message_id: "msg_1".into(),
            scopes: vec![],
            mentions: vec!["reviewer".into()],
            payload: Arc::from("{}"),
        };
        dispatcher.dispatch(&conn, &notification).await.unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn mention_of_an_agents_own_id_matches_its_any_mention_subscription() {
        let conn = setup();
        SubscriptionService::subscribe_mention(&conn, "sub_1", "ses_1", &agent("claude-1"), "engineer", "2026-01-01T00:00:00Z")
            .unwrap();

        let dispatcher = Dispatcher::new(100);
        let (sub, mut rx) = Subscriber::new("c1", Some("claude-1".into()), 8);
        dispatcher.register(Arc::new(sub)).await;

        let notification = Notification {
            message_id: "msg_1".into(),
            scopes: vec![],
            mentions: vec!["claude-1".into()],
            payload: Arc::from("{}"),
        };
        dispatcher.dispatch(&conn, &notification).await.unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn eviction_after_exceeding_drop_budget() {
        let conn = setup();
        SubscriptionService::subscribe_all(&conn, "sub_1", "ses_1", &agent("claude-1"), "2026-01-01T00:00:00Z").unwrap();

        let dispatcher = Dispatcher::new(1);
        let (sub, _rx) = Subscriber::new("c1", Some("claude-1".into()), 1);
        // Fill the channel so every subsequent send drops without a receiver draining it.
        assert!(sub.send(Arc::from("warm")));
        dispatcher.register(Arc::new(sub)).await;
        assert_eq!(dispatcher.active_connections(), 1);

        let notification = Notification {
            message_id: "msg_1".into(),
            scopes: vec![],
            mentions: vec![],
            payload: Arc::from("{}"),
        };
        dispatcher.dispatch(&conn, &notification).await.unwrap();
        assert_eq!(dispatcher.active_connections(), 0, "should be evicted after one drop past budget 1");
    }
}
