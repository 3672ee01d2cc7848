//! Strongly-typed identifiers.
//!
//! Race ids come from the ingestion side and are opaque strings that stay
//! stable for the lifetime of a race. Event ids are the monotonically
//! increasing keys of the change log. Subscriber ids are generated locally
//! (UUID v7) for every subscription the broadcaster hands out.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Stable identifier of a race, unique across the working set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RaceId(pub String);

impl RaceId {
    /// Create a race id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RaceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RaceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Identifier of a change-log entry.
///
/// Ids are strictly increasing and never reused, so the highest id seen
/// doubles as the event cursor. `EventId::ZERO` sorts before every real
/// event and is the starting cursor of a fresh poller.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct EventId(#[ts(type = "number")] pub u64);

impl EventId {
    /// The cursor value that precedes every event.
    pub const ZERO: Self = Self(0);

    /// Return the raw numeric id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier handed to each broadcaster subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SubscriberId(pub Uuid);

impl SubscriberId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_order_numerically() {
        assert!(EventId(41) < EventId(42));
        assert!(EventId::ZERO < EventId(1));
    }

    #[test]
    fn event_id_is_a_json_number_in_both_wire_and_bindings() {
        let json = serde_json::to_string(&EventId(42)).ok();
        assert_eq!(json.as_deref(), Some("42"));
        assert_eq!(EventId::inline(), "number");
    }

    #[test]
    fn race_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&RaceId::new("R1_AQU")).ok();
        assert_eq!(json.as_deref(), Some("\"R1_AQU\""));
    }

    #[test]
    fn subscriber_ids_are_unique() {
        assert_ne!(SubscriberId::new(), SubscriberId::new());
    }
}
