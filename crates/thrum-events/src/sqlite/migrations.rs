//! Schema for the projection database.
//!
//! The projection is a pure function of the event log: it can always be
//! dropped and rebuilt by replaying every shard from scratch, so there is
//! no migration *history* to track, only the current schema. A single
//! `run_migrations` call is idempotent (`CREATE TABLE IF NOT EXISTS`).

use rusqlite::Connection;

use crate::errors::Result;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS agents (
            id              TEXT PRIMARY KEY,
            kind            TEXT NOT NULL,
            role            TEXT NOT NULL,
            module          TEXT NOT NULL,
            display_name    TEXT,
            status          TEXT,
            registered_at   TEXT NOT NULL,
            last_seen_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_agents_role ON agents(role);
        CREATE INDEX IF NOT EXISTS idx_agents_module ON agents(module);

        CREATE TABLE IF NOT EXISTS sessions (
            id              TEXT PRIMARY KEY,
            agent_id        TEXT NOT NULL REFERENCES agents(id),
            label           TEXT,
            started_at      TEXT NOT NULL,
            ended_at        TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_agent ON sessions(agent_id);

        CREATE TABLE IF NOT EXISTS threads (
            id              TEXT PRIMARY KEY,
            created_by      TEXT NOT NULL REFERENCES agents(id),
            title           TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id                  TEXT PRIMARY KEY,
            thread_id           TEXT REFERENCES threads(id),
            session_id          TEXT NOT NULL REFERENCES sessions(id),
            author              TEXT NOT NULL REFERENCES agents(id),
            authored_by         TEXT REFERENCES agents(id),
            body_format         TEXT NOT NULL,
            body_content        TEXT NOT NULL,
            body_structured     TEXT,
            disclosed           INTEGER NOT NULL DEFAULT 1,
            reply_to            TEXT REFERENCES messages(id),
            created_at          TEXT NOT NULL,
            deleted_at          TEXT,
            deleted_by          TEXT REFERENCES agents(id)
        );
        CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id);
        CREATE INDEX IF NOT EXISTS idx_messages_author ON messages(author);
        CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);

        CREATE TABLE IF NOT EXISTS message_scopes (
            message_id      TEXT NOT NULL REFERENCES messages(id),
            scope_type      TEXT NOT NULL,
            scope_value     TEXT NOT NULL,
            PRIMARY KEY (message_id, scope_type, scope_value)
        );

        CREATE TABLE IF NOT EXISTS message_refs (
            message_id      TEXT NOT NULL REFERENCES messages(id),
            ref_type        TEXT NOT NULL,
            ref_value       TEXT NOT NULL,
            PRIMARY KEY (message_id, ref_type, ref_value)
        );

        CREATE TABLE IF NOT EXISTS message_edits (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id      TEXT NOT NULL REFERENCES messages(id),
            session_id      TEXT NOT NULL REFERENCES sessions(id),
            editor          TEXT NOT NULL REFERENCES agents(id),
            previous_body   TEXT NOT NULL,
            edited_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_message_edits_message ON message_edits(message_id);

        CREATE TABLE IF NOT EXISTS message_reads (
            message_id      TEXT NOT NULL REFERENCES messages(id),
            agent_id        TEXT NOT NULL REFERENCES agents(id),
            session_id      TEXT NOT NULL REFERENCES sessions(id),
            read_at         TEXT NOT NULL,
            PRIMARY KEY (message_id, agent_id)
        );

        CREATE TABLE IF NOT EXISTS subscriptions (
            id              TEXT PRIMARY KEY,
            session_id      TEXT NOT NULL REFERENCES sessions(id),
            agent_id        TEXT NOT NULL REFERENCES agents(id),
            scope_type      TEXT,
            scope_value     TEXT,
            mention_role    TEXT,
            match_all       INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_session ON subscriptions(session_id);
        CREATE INDEX IF NOT EXISTS idx_subscriptions_agent ON subscriptions(agent_id);

        CREATE TABLE IF NOT EXISTS groups (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL UNIQUE,
            created_by      TEXT NOT NULL REFERENCES agents(id),
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS group_members (
            group_id        TEXT NOT NULL REFERENCES groups(id),
            member_type     TEXT NOT NULL,
            member_id       TEXT NOT NULL,
            added_at        TEXT NOT NULL,
            PRIMARY KEY (group_id, member_type, member_id)
        );

        CREATE TABLE IF NOT EXISTS agent_work_contexts (
            session_id          TEXT NOT NULL REFERENCES sessions(id),
            agent_id            TEXT NOT NULL REFERENCES agents(id),
            branch              TEXT,
            worktree_path       TEXT,
            unmerged_commits    TEXT,
            uncommitted_files   TEXT,
            changed_files       TEXT,
            git_updated_at      TEXT,
            current_task        TEXT,
            task_updated_at     TEXT,
            intent              TEXT,
            intent_updated_at   TEXT,
            PRIMARY KEY (session_id, agent_id)
        );
        CREATE INDEX IF NOT EXISTS idx_work_contexts_agent ON agent_work_contexts(agent_id);

        CREATE TABLE IF NOT EXISTS projector_state (
            shard           TEXT PRIMARY KEY,
            last_event_id   TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}
