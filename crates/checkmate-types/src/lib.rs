//! Shared type definitions for Checkmate Live.
//!
//! This crate is the single source of truth for the race data model and
//! the subscriber wire contract. Types defined here flow downstream to
//! `TypeScript` via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Race, event, and subscriber identifiers
//! - [`enums`] -- Factor keys and adapter health
//! - [`structs`] -- Races, runners, quotes, factors, scored races
//! - [`messages`] -- Server/client WebSocket messages

pub mod enums;
pub mod ids;
pub mod messages;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{AdapterHealth, FactorKey};
pub use ids::{EventId, RaceId, SubscriberId};
pub use messages::{
    ClientMessage, ServerMessage, Snapshot, SnapshotKind, encode_empty, encode_snapshot,
};
pub use structs::{
    AdapterStatus, ChangeEvent, Factor, FactorMap, OddsQuote, Race, Runner, RunnerView,
    ScoredRace,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the dashboard.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files under `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::RaceId::export_all();
        let _ = crate::ids::EventId::export_all();
        let _ = crate::ids::SubscriberId::export_all();

        let _ = crate::enums::FactorKey::export_all();
        let _ = crate::enums::AdapterHealth::export_all();

        let _ = crate::structs::OddsQuote::export_all();
        let _ = crate::structs::Runner::export_all();
        let _ = crate::structs::Race::export_all();
        let _ = crate::structs::Factor::export_all();
        let _ = crate::structs::FactorMap::export_all();
        let _ = crate::structs::RunnerView::export_all();
        let _ = crate::structs::ScoredRace::export_all();
        let _ = crate::structs::AdapterStatus::export_all();
        let _ = crate::structs::ChangeEvent::export_all();

        let _ = crate::messages::Snapshot::export_all();
        let _ = crate::messages::SnapshotKind::export_all();
        let _ = crate::messages::ServerMessage::export_all();
        let _ = crate::messages::ClientMessage::export_all();
    }
}
