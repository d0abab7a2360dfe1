//! Event id generation and validation.
//!
//! Event ids are lexicographically sortable: a millisecond UTC timestamp in
//! `YYYYMMDDTHHMMSS.mmmZ` form, a `-`, then 10 random base36 characters to
//! break ties between events minted in the same millisecond. Sortability by
//! string comparison is what lets the merge engine order events from
//! multiple clones without consulting the projection.

use rand::Rng;

use thrum_core::ids::EventId;

use crate::errors::{EventsError, Result};

/// Mint a new, well-formed event id for the current instant.
#[must_use]
pub fn generate() -> EventId {
    let now = chrono::Utc::now();
    let mut rng = rand::rng();
    let suffix: String = (0..10)
        .map(|_| {
            const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuv";
            ALPHABET[rng.random_range(0..ALPHABET.len())] as char
        })
        .collect();
    EventId::from_raw(format!(
        "{}-{}",
        now.format("%Y%m%dT%H%M%S%.3fZ"),
        suffix
    ))
}

/// Validate that an id has the time-prefixed shape the merge/sort order
/// depends on. Ids read back from disk or received from a peer clone are
/// checked with this before being trusted.
pub fn validate(id: &str) -> Result<()> {
    let Some((timestamp_part, suffix_part)) = id.split_once('-') else {
        return Err(EventsError::InvalidEventId(id.to_string()));
    };
    if suffix_part.is_empty() || !suffix_part.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(EventsError::InvalidEventId(id.to_string()));
    }
    let Some(timestamp_part) = timestamp_part.strip_suffix('Z') else {
        return Err(EventsError::InvalidEventId(id.to_string()));
    };
    if chrono::NaiveDateTime::parse_from_str(timestamp_part, "%Y%m%dT%H%M%S%.3f").is_err() {
        return Err(EventsError::InvalidEventId(id.to_string()));
    }
    Ok(())
}
