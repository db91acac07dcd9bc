//! Normalization of raw observation reports into a complete lane set.
//!
//! Sensing back-ends submit loosely-typed [`ObservationReport`]s. Before
//! anything is allocated, a batch is folded into an [`ObservationSet`]
//! holding exactly one [`LaneObservation`] per lane:
//!
//! - unknown lane identifiers reject the whole batch ([`InvalidLaneError`]),
//! - negative counts clamp to 0, counts beyond `u32` saturate, a missing
//!   count is read as 0,
//! - missing lanes become empty observations,
//! - a repeated lane keeps the later report.
//!
//! Everything except the unknown lane is recorded as an
//! [`ObservationIssue`] and the batch is flagged degraded. Normalization is
//! pure; callers decide how to report the issues (see
//! [`ObservationSet::log_issues`]).

use core::fmt;

use signal_types::{InvalidLaneError, Lane, LaneMap, LaneObservation, ObservationReport};
use tracing::warn;

/// A recoverable defect found while normalizing a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationIssue {
    /// No report was supplied for the lane; it was treated as empty.
    MissingLane {
        /// The lane that was filled in.
        lane: Lane,
    },
    /// A negative vehicle count was clamped to 0.
    NegativeCount {
        /// The affected lane.
        lane: Lane,
        /// The count as reported.
        reported: i64,
    },
    /// A vehicle count too large for `u32` was saturated.
    CountOverflow {
        /// The affected lane.
        lane: Lane,
        /// The count as reported.
        reported: i64,
    },
    /// The report carried no vehicle count; 0 was used.
    MissingCount {
        /// The affected lane.
        lane: Lane,
    },
    /// More than one report named the lane; the later one was kept.
    DuplicateLane {
        /// The affected lane.
        lane: Lane,
    },
}

impl fmt::Display for ObservationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLane { lane } => write!(f, "no observation for {lane}, using empty lane"),
            Self::NegativeCount { lane, reported } => {
                write!(f, "negative vehicle count {reported} on {lane} clamped to 0")
            }
            Self::CountOverflow { lane, reported } => {
                write!(f, "vehicle count {reported} on {lane} saturated")
            }
            Self::MissingCount { lane } => {
                write!(f, "no vehicle count for {lane}, using 0")
            }
            Self::DuplicateLane { lane } => {
                write!(f, "duplicate observation for {lane}, keeping the later one")
            }
        }
    }
}

/// Exactly one observation per lane, plus any issues met on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationSet {
    lanes: LaneMap<LaneObservation>,
    issues: Vec<ObservationIssue>,
}

impl ObservationSet {
    /// An all-empty set: no vehicles, no emergencies, no issues.
    pub fn empty() -> Self {
        Self {
            lanes: LaneMap::from_fn(LaneObservation::empty),
            issues: Vec::new(),
        }
    }

    /// Build a set from already-validated observations.
    ///
    /// The lane key wins over any `lane` field inside the observation.
    pub fn from_lanes(lanes: LaneMap<LaneObservation>) -> Self {
        Self {
            lanes: lanes.map(|lane, obs| LaneObservation { lane, ..obs }),
            issues: Vec::new(),
        }
    }

    /// Build a set from plain `(vehicle_count, emergency_present)` pairs.
    pub fn from_counts(counts: LaneMap<(u32, bool)>) -> Self {
        Self::from_lanes(counts.map(|lane, (vehicle_count, emergency_present)| {
            LaneObservation {
                lane,
                vehicle_count,
                emergency_present,
                observed_at: None,
            }
        }))
    }

    /// The observation for `lane`.
    pub const fn get(&self, lane: Lane) -> &LaneObservation {
        self.lanes.get(lane)
    }

    /// All observations keyed by lane.
    pub const fn lanes(&self) -> &LaneMap<LaneObservation> {
        &self.lanes
    }

    /// Defects recovered during normalization.
    pub fn issues(&self) -> &[ObservationIssue] {
        &self.issues
    }

    /// Whether any lane was defaulted, clamped, or deduplicated.
    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Sum of vehicle counts over all lanes.
    pub fn total_vehicles(&self) -> u64 {
        self.lanes
            .iter()
            .map(|(_, obs)| u64::from(obs.vehicle_count))
            .fold(0_u64, u64::saturating_add)
    }

    /// Emit one `warn` event per recovered issue.
    pub fn log_issues(&self) {
        for issue in &self.issues {
            warn!(issue = %issue, "Degraded observation");
        }
    }
}

impl Default for ObservationSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// Fold a batch of reports into a complete [`ObservationSet`].
///
/// # Errors
///
/// Returns [`InvalidLaneError`] naming the first report whose lane is not
/// one of the four known approaches. No partial set is produced.
pub fn normalize(reports: &[ObservationReport]) -> Result<ObservationSet, InvalidLaneError> {
    let mut slots: LaneMap<Option<LaneObservation>> = LaneMap::default();
    let mut issues = Vec::new();

    for report in reports {
        let lane: Lane = report.lane.parse()?;

        let vehicle_count = match report.vehicle_count {
            None => {
                issues.push(ObservationIssue::MissingCount { lane });
                0
            }
            Some(reported) if reported < 0 => {
                issues.push(ObservationIssue::NegativeCount { lane, reported });
                0
            }
            Some(reported) => u32::try_from(reported).unwrap_or_else(|_| {
                issues.push(ObservationIssue::CountOverflow { lane, reported });
                u32::MAX
            }),
        };

        let slot = slots.get_mut(lane);
        if slot.is_some() {
            issues.push(ObservationIssue::DuplicateLane { lane });
        }
        *slot = Some(LaneObservation {
            lane,
            vehicle_count,
            emergency_present: report.emergency_present,
            observed_at: report.observed_at,
        });
    }

    let lanes = slots.map(|lane, slot| {
        slot.unwrap_or_else(|| {
            issues.push(ObservationIssue::MissingLane { lane });
            LaneObservation::empty(lane)
        })
    });

    Ok(ObservationSet { lanes, issues })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn full_batch() -> Vec<ObservationReport> {
        vec![
            ObservationReport::new("north", 4, false),
            ObservationReport::new("south", 2, true),
            ObservationReport::new("east", 0, false),
            ObservationReport::new("west", 9, false),
        ]
    }

    #[test]
    fn complete_batch_is_not_degraded() {
        let set = normalize(&full_batch()).unwrap();
        assert!(!set.is_degraded());
        assert_eq!(set.get(Lane::West).vehicle_count, 9);
        assert!(set.get(Lane::South).emergency_present);
        assert_eq!(set.total_vehicles(), 15);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut reversed = full_batch();
        reversed.reverse();
        assert_eq!(normalize(&reversed).unwrap(), normalize(&full_batch()).unwrap());
    }

    #[test]
    fn missing_lanes_are_filled_with_empty_observations() {
        let set = normalize(&[ObservationReport::new("east", 3, true)]).unwrap();
        assert!(set.is_degraded());
        assert_eq!(set.issues().len(), 3);
        assert_eq!(*set.get(Lane::North), LaneObservation::empty(Lane::North));
        assert!(set.get(Lane::East).emergency_present);
        assert!(set
            .issues()
            .contains(&ObservationIssue::MissingLane { lane: Lane::West }));
    }

    #[test]
    fn empty_batch_yields_empty_set() {
        let set = normalize(&[]).unwrap();
        assert_eq!(set.total_vehicles(), 0);
        assert_eq!(set.issues().len(), 4);
    }

    #[test]
    fn negative_counts_are_clamped() {
        let mut batch = full_batch();
        batch[0].vehicle_count = Some(-5);
        let set = normalize(&batch).unwrap();
        assert_eq!(set.get(Lane::North).vehicle_count, 0);
        assert_eq!(
            set.issues(),
            &[ObservationIssue::NegativeCount {
                lane: Lane::North,
                reported: -5
            }]
        );
    }

    #[test]
    fn oversized_counts_saturate() {
        let mut batch = full_batch();
        batch[1].vehicle_count = Some(i64::MAX);
        let set = normalize(&batch).unwrap();
        assert_eq!(set.get(Lane::South).vehicle_count, u32::MAX);
        assert!(set.is_degraded());
    }

    #[test]
    fn missing_count_reads_as_empty_and_degrades() {
        let mut batch = full_batch();
        batch[3].vehicle_count = None;
        let set = normalize(&batch).unwrap();
        assert_eq!(set.get(Lane::West).vehicle_count, 0);
        assert_eq!(
            set.issues(),
            &[ObservationIssue::MissingCount { lane: Lane::West }]
        );
    }

    #[test]
    fn duplicate_lane_keeps_later_report() {
        let mut batch = full_batch();
        batch.push(ObservationReport::new("North", 11, true));
        let set = normalize(&batch).unwrap();
        assert_eq!(set.get(Lane::North).vehicle_count, 11);
        assert!(set.get(Lane::North).emergency_present);
        assert_eq!(
            set.issues(),
            &[ObservationIssue::DuplicateLane { lane: Lane::North }]
        );
    }

    #[test]
    fn unknown_lane_rejects_batch() {
        let mut batch = full_batch();
        batch.push(ObservationReport::new("northeast", 1, false));
        let err = normalize(&batch).unwrap_err();
        assert_eq!(err.value, "northeast");
    }

    #[test]
    fn from_lanes_rekeys_observations() {
        let set = ObservationSet::from_lanes(LaneMap::from_fn(|_| LaneObservation {
            vehicle_count: 1,
            ..LaneObservation::empty(Lane::North)
        }));
        assert_eq!(set.get(Lane::West).lane, Lane::West);
        assert_eq!(set.total_vehicles(), 4);
    }
}
