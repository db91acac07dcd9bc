//! Observation and schedule records exchanged between the sensing
//! back-ends, the timing engine, and its consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::IntersectionId;
use crate::lane::Lane;

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// A single lane report as submitted by a sensing back-end.
///
/// This is the untrusted wire form: the lane is free text and the count is
/// signed, because detection pipelines occasionally emit garbage. The engine
/// normalizes reports into [`LaneObservation`]s before allocating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ObservationReport {
    /// Lane identifier (`north`, `south`, `east`, `west`).
    pub lane: String,
    /// Number of vehicles counted on the approach. `None` when the
    /// back-end omitted the count.
    #[serde(default)]
    #[ts(type = "number | null")]
    pub vehicle_count: Option<i64>,
    /// Whether an emergency vehicle was detected on the approach.
    #[serde(default)]
    pub emergency_present: bool,
    /// When the frame behind this report was captured.
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

impl ObservationReport {
    /// Convenience constructor for a report without a capture timestamp.
    pub fn new(lane: impl Into<String>, vehicle_count: i64, emergency_present: bool) -> Self {
        Self {
            lane: lane.into(),
            vehicle_count: Some(vehicle_count),
            emergency_present,
            observed_at: None,
        }
    }
}

/// A validated observation for one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LaneObservation {
    /// The approach this observation describes.
    pub lane: Lane,
    /// Non-negative vehicle count.
    pub vehicle_count: u32,
    /// Whether an emergency vehicle is present.
    pub emergency_present: bool,
    /// Capture time, or `None` when the lane was filled in by default.
    pub observed_at: Option<DateTime<Utc>>,
}

impl LaneObservation {
    /// An empty observation: no vehicles, no emergency, no timestamp.
    pub const fn empty(lane: Lane) -> Self {
        Self {
            lane,
            vehicle_count: 0,
            emergency_present: false,
            observed_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

/// Green-light duration for one lane within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GreenTime {
    /// The approach receiving the green phase.
    pub lane: Lane,
    /// Whole seconds of green.
    pub seconds: u32,
}

/// The four green times of one allocation cycle.
///
/// `green_times` always holds exactly one entry per lane in [`Lane::ALL`]
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Schedule {
    /// Per-lane green durations in fixed lane order.
    pub green_times: Vec<GreenTime>,
    /// Whether any lane is under emergency override.
    pub emergency_active: bool,
    /// Lanes under emergency override, in fixed lane order.
    pub emergency_lanes: Vec<Lane>,
    /// Set when the schedule was computed from observations older than the
    /// staleness window.
    pub stale: bool,
}

impl Schedule {
    /// Green seconds allotted to `lane`, if present.
    pub fn seconds_for(&self, lane: Lane) -> Option<u32> {
        self.green_times
            .iter()
            .find(|g| g.lane == lane)
            .map(|g| g.seconds)
    }

    /// Sum of all green durations in the cycle.
    pub fn total_seconds(&self) -> u64 {
        self.green_times
            .iter()
            .map(|g| u64::from(g.seconds))
            .fold(0_u64, u64::saturating_add)
    }
}

/// A schedule as published by the controller for one intersection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PublishedSchedule {
    /// The intersection this schedule drives.
    pub intersection_id: IntersectionId,
    /// Monotonically increasing cycle counter (0 = initial fallback).
    #[ts(type = "number")]
    pub cycle: u64,
    /// Wall-clock time the schedule was computed.
    pub computed_at: DateTime<Utc>,
    /// Set when any input lane was missing, clamped, or duplicated.
    pub degraded: bool,
    /// The timing decision itself.
    pub schedule: Schedule,
}
