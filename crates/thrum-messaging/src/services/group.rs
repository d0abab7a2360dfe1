//! Group management. Groups, like subscriptions, are local repository
//! state rather than event-sourced.
//!
//! `everyone` is the one exception: it is bootstrapped once per repository
//! and its membership is never stored — it is resolved at read time against
//! every registered agent, so an agent that registers after `everyone` was
//! created is still a member without anyone adding it.

use rusqlite::Connection;

use thrum_core::ids::AgentId;
use thrum_events::sqlite::repositories::group::{MEMBER_TYPE_AGENT, MEMBER_TYPE_ROLE};
use thrum_events::sqlite::repositories::{AgentRepo, GroupRepo};
use thrum_events::sqlite::row_types::GroupRow;

use crate::errors::{MessagingError, Result};

/// Name of the system group implicitly containing every registered agent.
pub const EVERYONE: &str = "everyone";

/// Either shape a group member can take: a specific agent id, or a role
/// name whose current holders are resolved at read time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupMember {
    Agent(AgentId),
    Role(String),
}

impl GroupMember {
    fn type_and_id(&self) -> (&'static str, &str) {
        match self {
            Self::Agent(id) => (MEMBER_TYPE_AGENT, id.as_str()),
            Self::Role(role) => (MEMBER_TYPE_ROLE, role.as_str()),
        }
    }
}

pub struct GroupService;

impl GroupService {
    /// Create the `everyone` group if it doesn't already exist. Idempotent —
    /// safe to call on every daemon start.
    pub fn ensure_everyone(conn: &Connection, at: &str) -> Result<()> {
        if GroupRepo::get_by_name(conn, EVERYONE)?.is_some() {
            return Ok(());
        }
        GroupRepo::create(conn, &thrum_events::log::ids::generate().to_string(), EVERYONE, "thrum", at)?;
        Ok(())
    }

    pub fn create(conn: &Connection, id: &str, name: &str, created_by: &AgentId, at: &str) -> Result<GroupRow> {
        if GroupRepo::get_by_name(conn, name)?.is_some() {
            return Err(MessagingError::DuplicateGroup(name.to_string()));
        }
        Ok(GroupRepo::create(conn, id, name, created_by.as_str(), at)?)
    }

    pub fn delete(conn: &Connection, name: &str) -> Result<bool> {
        if name == EVERYONE {
            return Err(MessagingError::ProtectedGroup(name.to_string()));
        }
        let group = GroupRepo::get_by_name(conn, name)?.ok_or_else(|| MessagingError::UnknownGroup(name.to_string()))?;
        Ok(GroupRepo::delete(conn, &group.id)?)
    }

    pub fn list(conn: &Connection) -> Result<Vec<GroupRow>> {
        Ok(GroupRepo::list(conn)?)
    }

    pub fn info(conn: &Connection, name: &str) -> Result<GroupRow> {
        GroupRepo::get_by_name(conn, name)?.ok_or_else(|| MessagingError::UnknownGroup(name.to_string()))
    }

    pub fn add_member(conn: &Connection, group_name: &str, member: &GroupMember, at: &str) -> Result<()> {
        if group_name == EVERYONE {
            return Err(MessagingError::ProtectedGroup(group_name.to_string()));
        }
        let group = GroupRepo::get_by_name(conn, group_name)?
            .ok_or_else(|| MessagingError::UnknownGroup(group_name.to_string()))?;
        if let GroupMember::Agent(agent_id) = member {
            if AgentRepo::get_by_id(conn, agent_id.as_str())?.is_none() {
                return Err(MessagingError::UnknownAgent(agent_id.to_string()));
            }
        }
        let (member_type, member_id) = member.type_and_id();
        GroupRepo::add_member(conn, &group.id, member_type, member_id, at)?;
        Ok(())
    }

    pub fn remove_member(conn: &Connection, group_name: &str, member: &GroupMember) -> Result<bool> {
        if group_name == EVERYONE {
            return Err(MessagingError::ProtectedGroup(group_name.to_string()));
        }
        let group = GroupRepo::get_by_name(conn, group_name)?
            .ok_or_else(|| MessagingError::UnknownGroup(group_name.to_string()))?;
        let (member_type, member_id) = member.type_and_id();
        Ok(GroupRepo::remove_member(conn, &group.id, member_type, member_id)?)
    }

    /// Resolve the members of a group. `everyone` is computed from every
    /// registered agent rather than stored membership rows.
    pub fn members(conn: &Connection, group_name: &str) -> Result<Vec<String>> {
        if group_name == EVERYONE {
            return Ok(AgentRepo::list(conn, &Default::default())?.into_iter().map(|a| a.id).collect());
        }
        let group = GroupRepo::get_by_name(conn, group_name)?
            .ok_or_else(|| MessagingError::UnknownGroup(group_name.to_string()))?;
        Ok(GroupRepo::members(conn, &group.id)?)
    }
}
