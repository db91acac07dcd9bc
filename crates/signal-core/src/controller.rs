//! The per-intersection controller: owns the current schedule and
//! serializes recomputation.
//!
//! Each cycle moves through `Idle -> Computing -> Published -> Idle`. The
//! current [`PublishedSchedule`] lives behind a [`watch`] channel and is
//! swapped as a whole `Arc`, so a reader either sees the previous schedule
//! or the new one, never a mixture. Recomputes for one controller queue on
//! an async mutex; at most one is in flight.
//!
//! A controller is born with a fallback schedule (all lanes empty, marked
//! stale) so the intersection is never without timings.
//!
//! The controller never pushes schedules anywhere. Delivery to signal
//! hardware or API clients is the caller's job (see
//! [`runner::run_loop`](crate::runner::run_loop)).

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use chrono::Utc;
use signal_types::{InvalidLaneError, IntersectionId, ObservationReport, PublishedSchedule};
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::allocator;
use crate::config::{SignalConfig, TimingConfig};
use crate::observation::{self, ObservationSet};

/// Errors surfaced by [`Controller::recompute`].
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// A report named a lane that does not exist. The current schedule is
    /// left untouched.
    #[error("rejected observation batch: {source}")]
    InvalidLane {
        /// The underlying lane error.
        #[from]
        source: InvalidLaneError,
    },
}

/// Where the controller is within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    /// Waiting for the next tick or trigger.
    Idle,
    /// The allocator is running; the previous schedule is still current.
    Computing,
    /// A new schedule has just replaced the previous one.
    Published,
}

impl ControllerPhase {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Computing => 1,
            Self::Published => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Computing,
            2 => Self::Published,
            _ => Self::Idle,
        }
    }
}

/// Mutable bookkeeping guarded by the recompute lock.
#[derive(Debug)]
struct CycleState {
    /// Observations behind the most recent schedule.
    last_known: ObservationSet,
    /// When fresh observations last arrived (`None` = never).
    last_fresh_at: Option<Instant>,
    /// Number of schedules computed so far.
    cycle: u64,
}

/// Signal-timing controller for a single intersection.
#[derive(Debug)]
pub struct Controller {
    intersection_id: IntersectionId,
    timing: TimingConfig,
    staleness_window: Duration,
    current: watch::Sender<Arc<PublishedSchedule>>,
    state: Mutex<CycleState>,
    phase: AtomicU8,
}

impl Controller {
    /// Create a controller holding the all-empty fallback schedule.
    pub fn new(
        intersection_id: IntersectionId,
        timing: TimingConfig,
        staleness_window: Duration,
    ) -> Self {
        let last_known = ObservationSet::empty();
        let mut schedule = allocator::allocate(&last_known, &timing);
        schedule.stale = true;

        let initial = Arc::new(PublishedSchedule {
            intersection_id,
            cycle: 0,
            computed_at: Utc::now(),
            degraded: false,
            schedule,
        });
        let (current, _) = watch::channel(initial);

        Self {
            intersection_id,
            timing,
            staleness_window,
            current,
            state: Mutex::new(CycleState {
                last_known,
                last_fresh_at: None,
                cycle: 0,
            }),
            phase: AtomicU8::new(ControllerPhase::Idle.as_u8()),
        }
    }

    /// Create a controller from the loaded configuration.
    pub fn from_config(intersection_id: IntersectionId, config: &SignalConfig) -> Self {
        Self::new(intersection_id, config.timing, config.staleness_window())
    }

    /// The intersection this controller drives.
    pub const fn intersection_id(&self) -> IntersectionId {
        self.intersection_id
    }

    /// The allocation constants in use.
    pub const fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// The configured staleness window.
    pub const fn staleness_window(&self) -> Duration {
        self.staleness_window
    }

    /// The schedule currently in force. Always complete.
    pub fn current_schedule(&self) -> Arc<PublishedSchedule> {
        Arc::clone(&self.current.borrow())
    }

    /// The current cycle phase.
    pub fn phase(&self) -> ControllerPhase {
        ControllerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Recompute from a fresh report batch.
    ///
    /// Missing lanes, negative counts, and duplicates are recovered and
    /// logged; the published schedule is flagged `degraded`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidLane`] if any report names an
    /// unknown lane. Nothing is published in that case.
    pub async fn recompute(
        &self,
        reports: &[ObservationReport],
    ) -> Result<Arc<PublishedSchedule>, ControllerError> {
        let observations = observation::normalize(reports)?;
        Ok(self.recompute_observations(observations).await)
    }

    /// Recompute from an already-normalized, fresh observation set.
    pub async fn recompute_observations(
        &self,
        observations: ObservationSet,
    ) -> Arc<PublishedSchedule> {
        let mut state = self.state.lock().await;
        self.set_phase(ControllerPhase::Computing);

        observations.log_issues();
        state.last_known = observations;
        state.last_fresh_at = Some(Instant::now());

        self.publish_locked(&mut state, false)
    }

    /// Recompute from the last-known observations because no fresh data
    /// arrived this tick.
    ///
    /// The result is flagged `stale` once the last fresh batch is older
    /// than the staleness window, or if no fresh batch was ever received.
    pub async fn recompute_last_known(&self) -> Arc<PublishedSchedule> {
        let mut state = self.state.lock().await;
        self.set_phase(ControllerPhase::Computing);

        let stale = state
            .last_fresh_at
            .is_none_or(|at| at.elapsed() > self.staleness_window);
        if stale {
            warn!(
                intersection_id = %self.intersection_id,
                staleness_window_ms = u64::try_from(self.staleness_window.as_millis()).unwrap_or(u64::MAX),
                "No fresh observations within staleness window, reusing last-known data"
            );
        }

        self.publish_locked(&mut state, stale)
    }

    /// Allocate from `state.last_known`, swap the result in, and return it.
    fn publish_locked(&self, state: &mut CycleState, stale: bool) -> Arc<PublishedSchedule> {
        let mut schedule = allocator::allocate(&state.last_known, &self.timing);
        schedule.stale = stale;

        state.cycle = state.cycle.saturating_add(1);
        let published = Arc::new(PublishedSchedule {
            intersection_id: self.intersection_id,
            cycle: state.cycle,
            computed_at: Utc::now(),
            degraded: state.last_known.is_degraded(),
            schedule,
        });

        self.current.send_replace(Arc::clone(&published));
        self.set_phase(ControllerPhase::Published);

        debug!(
            intersection_id = %self.intersection_id,
            cycle = published.cycle,
            stale,
            degraded = published.degraded,
            emergency_active = published.schedule.emergency_active,
            "Schedule recomputed"
        );

        self.set_phase(ControllerPhase::Idle);
        published
    }

    fn set_phase(&self, phase: ControllerPhase) {
        self.phase.store(phase.as_u8(), Ordering::Release);
    }
}
