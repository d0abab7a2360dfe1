//! Branded identifier newtypes.
//!
//! Every entity id in Thrum is a thin wrapper around `String` rather than a
//! bare `String`, following the branded-id pattern the event/session/
//! workspace ids use elsewhere in the stack. This keeps callers from mixing
//! up, say, a `ThreadId` and a `MessageId` at a function boundary — the
//! compiler catches it instead of a test.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

macro_rules! branded_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an already-formatted id without validation.
            ///
            /// Used when round-tripping ids read back out of the event log
            /// or the projection, which are trusted to already be
            /// well-formed.
            #[must_use]
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() {
                    return Err(CoreError::InvalidId {
                        kind: stringify!($name),
                        value: s.to_string(),
                    });
                }
                Ok(Self(s.to_string()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(EventId, "ev");
branded_id!(MessageId, "msg");
branded_id!(ThreadId, "thr");
branded_id!(SessionId, "ses");

/// An agent's identity within a Thrum repository.
///
/// Unlike the other ids, `AgentId` is not generated — it is chosen by the
/// registering agent — so it carries its own validation instead of being
/// accepted verbatim.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

const RESERVED_AGENT_NAMES: &[&str] = &["all", "system", "thrum", "broadcast", "daemon"];
const MAX_AGENT_NAME_LEN: usize = 64;

impl AgentId {
    /// Validate and construct an `AgentId`.
    ///
    /// Names must be non-empty, at most 64 bytes, made only of ASCII
    /// alphanumerics, `-`, `_`, and `.`, and must not collide with a
    /// reserved name used by the subscription/mention vocabulary (`all`
    /// matches every agent in a scope; `system`, `thrum`, and `daemon` are
    /// reserved for internal bookkeeping events; `broadcast` is reserved
    /// for future use).
    pub fn new(name: &str) -> Result<Self, CoreError> {
        if name.is_empty() || name.len() > MAX_AGENT_NAME_LEN {
            return Err(CoreError::InvalidId {
                kind: "AgentId",
                value: name.to_string(),
            });
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
        {
            return Err(CoreError::InvalidId {
                kind: "AgentId",
                value: name.to_string(),
            });
        }
        if RESERVED_AGENT_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
            return Err(CoreError::ReservedAgentName {
                name: name.to_string(),
            });
        }
        Ok(Self(name.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for AgentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
