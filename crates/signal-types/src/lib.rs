//! Shared type definitions for the adaptive signal timing engine.
//!
//! Every crate in the workspace speaks in these types, and they flow
//! downstream to `TypeScript` via `ts-rs` for dashboard consumers.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers
//! - [`lane`] -- The four intersection approaches and [`LaneMap`]
//! - [`structs`] -- Observation reports, green times, and schedules

pub mod ids;
pub mod lane;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use ids::IntersectionId;
pub use lane::{InvalidLaneError, Lane, LaneMap};
pub use structs::{
    GreenTime, LaneObservation, ObservationReport, PublishedSchedule, Schedule,
};
