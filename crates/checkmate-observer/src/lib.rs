//! Observer server for Checkmate Live.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/races`) streaming qualified-race
//!   snapshots from the [`Broadcaster`](checkmate_core::Broadcaster)
//! - **REST endpoints** for the current snapshot, adapter statuses, the
//!   active scoring configuration, and poller health
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! The observer never touches the store. Every response is served from
//! the broadcaster's in-memory snapshot, so viewers cannot slow down the
//! change poller. Each `WebSocket` connection owns one broadcaster
//! subscription and releases it when the socket closes.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerError, bind, serve};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
