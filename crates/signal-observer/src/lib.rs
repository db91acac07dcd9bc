//! HTTP adapter for the adaptive signal timing engine.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Timing endpoint** (`POST /api/timings`) for one-shot allocation over
//!   a batch of lane reports
//! - **Ingest endpoint** (`POST /api/observations`) feeding the
//!   controller's observation inbox
//! - **Schedule endpoint** (`GET /api/schedule`) returning the schedule in
//!   force
//! - **`WebSocket` endpoint** (`/ws/schedules`) streaming every published
//!   schedule via [`tokio::sync::broadcast`]
//! - **Operator REST endpoints** for runtime control (pause, resume,
//!   speed, trigger, status, stop)
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! Reads go straight to the [`Controller`]'s current schedule, which is an
//! atomically swapped `Arc`, so no request ever waits on a recompute.
//! The engine pushes each published schedule into [`AppState::broadcast`]
//! for `WebSocket` clients.
//!
//! [`Controller`]: signal_core::controller::Controller

pub mod error;
pub mod handlers;
pub mod operator;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
