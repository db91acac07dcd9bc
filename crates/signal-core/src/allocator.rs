//! Green-time allocation: proportional shares with a safety floor and an
//! emergency override.
//!
//! The allocator is a pure function of an [`ObservationSet`] and the
//! [`TimingConfig`]. It runs in two separate passes:
//!
//! 1. **Proportional pass** -- each lane gets
//!    `vehicle_count / total_vehicles * cycle_budget` seconds, rounded half
//!    up, then floored at `min_green_seconds`. With no vehicles at all every
//!    lane gets exactly `min_green_seconds`. The budget is a target: floors
//!    may push the sum above it and nothing is rescaled.
//! 2. **Override pass** -- every [`OverrideRule`] derived from the
//!    observations is applied in fixed lane order. Rules only ever raise a
//!    lane's time.
//!
//! All arithmetic is integral (`u128` intermediates), so identical inputs
//! always give identical schedules.

use signal_types::{GreenTime, InvalidLaneError, Lane, LaneMap, ObservationReport, Schedule};

use crate::config::TimingConfig;
use crate::observation::{self, ObservationSet};

/// A rule applied after the proportional pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideRule {
    /// Raise `lane` to at least `min_seconds` because an emergency vehicle
    /// is present on it.
    EmergencyFloor {
        /// The lane carrying the emergency vehicle.
        lane: Lane,
        /// Minimum green seconds for that lane.
        min_seconds: u32,
    },
}

impl OverrideRule {
    /// Apply the rule to a working set of per-lane seconds.
    pub fn apply(self, seconds: &mut LaneMap<u32>) {
        match self {
            Self::EmergencyFloor { lane, min_seconds } => {
                let slot = seconds.get_mut(lane);
                *slot = (*slot).max(min_seconds);
            }
        }
    }
}

/// The outcome of allocating a raw report batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// The normalized observations the schedule was computed from.
    pub observations: ObservationSet,
    /// The resulting schedule (never stale).
    pub schedule: Schedule,
}

/// Derive the override rules for a set of observations, in lane order.
pub fn override_rules(observations: &ObservationSet, timing: &TimingConfig) -> Vec<OverrideRule> {
    observations
        .lanes()
        .iter()
        .filter(|(_, obs)| obs.emergency_present)
        .map(|(lane, _)| OverrideRule::EmergencyFloor {
            lane,
            min_seconds: timing.emergency_min_seconds,
        })
        .collect()
}

/// Compute `count / total * budget` rounded half up.
///
/// Returns 0 when `total` is 0. The result never exceeds `budget` when
/// `count <= total`.
pub fn proportional_share(count: u32, total: u64, budget: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    // floor((2 * count * budget + total) / (2 * total)) == round_half_up(count * budget / total)
    let total = u128::from(total);
    let numerator = u128::from(count)
        .saturating_mul(u128::from(budget))
        .saturating_mul(2)
        .saturating_add(total);
    let denominator = total.saturating_mul(2);
    let share = numerator.checked_div(denominator).unwrap_or(0);
    u32::try_from(share).unwrap_or(u32::MAX)
}

/// Allocate green times for a complete observation set.
///
/// The returned schedule lists every lane in [`Lane::ALL`] order and is
/// never marked stale; staleness is the controller's concern.
pub fn allocate(observations: &ObservationSet, timing: &TimingConfig) -> Schedule {
    let total = observations.total_vehicles();

    let mut seconds = observations.lanes().map(|_, obs| {
        proportional_share(obs.vehicle_count, total, timing.cycle_budget_seconds)
            .max(timing.min_green_seconds)
    });

    let rules = override_rules(observations, timing);
    for rule in &rules {
        rule.apply(&mut seconds);
    }

    let emergency_lanes: Vec<Lane> = rules
        .iter()
        .map(|rule| match *rule {
            OverrideRule::EmergencyFloor { lane, .. } => lane,
        })
        .collect();

    Schedule {
        green_times: seconds
            .iter()
            .map(|(lane, &secs)| GreenTime {
                lane,
                seconds: secs,
            })
            .collect(),
        emergency_active: !emergency_lanes.is_empty(),
        emergency_lanes,
        stale: false,
    }
}

/// Normalize a raw report batch and allocate it.
///
/// # Errors
///
/// Returns [`InvalidLaneError`] if any report names an unknown lane.
pub fn allocate_reports(
    reports: &[ObservationReport],
    timing: &TimingConfig,
) -> Result<Allocation, InvalidLaneError> {
    let observations = observation::normalize(reports)?;
    let schedule = allocate(&observations, timing);
    Ok(Allocation {
        observations,
        schedule,
    })
}
