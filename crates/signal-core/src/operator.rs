//! Operator control state for the run loop.
//!
//! Shared between the run loop task and the operator HTTP handlers. The
//! operator can pause and resume the loop, change its cadence, request an
//! immediate recompute, and stop it. A stop takes effect at the next tick
//! boundary, never in the middle of a recompute.
//!
//! Control flags are atomics so the loop reads them without locking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::controller::ControllerPhase;

/// Smallest tick interval the operator may set, in milliseconds.
pub const MIN_TICK_INTERVAL_MS: u64 = 100;

/// Reason the run loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopEndReason {
    /// An operator issued a stop command.
    OperatorStop,
    /// The configured `max_cycles` bound was reached.
    MaxCyclesReached,
}

/// Shared operator control state.
#[derive(Debug)]
pub struct OperatorState {
    /// Whether the loop is currently paused.
    paused: AtomicBool,

    /// Wakes a paused loop.
    resume_notify: Notify,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Whether an on-demand recompute has been requested.
    trigger_requested: AtomicBool,

    /// Wakes a loop sleeping between ticks (stop or trigger).
    wake_notify: Notify,

    /// Current tick interval in milliseconds (runtime-adjustable).
    tick_interval_ms: AtomicU64,

    /// Wall-clock time the loop state was created.
    started_at: DateTime<Utc>,

    /// Maximum number of cycles (0 = unlimited).
    max_cycles: u64,

    /// Reason the loop ended, if it has.
    end_reason: Mutex<Option<LoopEndReason>>,
}

impl OperatorState {
    /// Create operator state with the given cadence and cycle bound.
    pub fn new(tick_interval_ms: u64, max_cycles: u64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            trigger_requested: AtomicBool::new(false),
            wake_notify: Notify::new(),
            tick_interval_ms: AtomicU64::new(tick_interval_ms),
            started_at: Utc::now(),
            max_cycles,
            end_reason: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Check whether the loop is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause the loop. The current schedule stays in force.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume the loop and wake it.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Wait until the loop is no longer paused or a stop is requested.
    pub async fn wait_if_paused(&self) {
        while self.is_paused() && !self.is_stop_requested() {
            self.resume_notify.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a stop at the next tick boundary.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.resume_notify.notify_one();
        self.wake_notify.notify_one();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record the reason the loop ended.
    pub async fn set_end_reason(&self, reason: LoopEndReason) {
        let mut guard = self.end_reason.lock().await;
        *guard = Some(reason);
    }

    /// Get the reason the loop ended, if it has.
    pub async fn end_reason(&self) -> Option<LoopEndReason> {
        self.end_reason.lock().await.clone()
    }

    // -----------------------------------------------------------------------
    // On-demand recompute
    // -----------------------------------------------------------------------

    /// Ask the loop to recompute now instead of waiting out the interval.
    pub fn request_recompute(&self) {
        self.trigger_requested.store(true, Ordering::Release);
        self.wake_notify.notify_one();
    }

    /// Consume a pending recompute request. Returns whether one was set.
    pub fn take_recompute_request(&self) -> bool {
        self.trigger_requested.swap(false, Ordering::AcqRel)
    }

    /// Sleep for `duration` unless a stop or recompute request arrives
    /// first.
    ///
    /// A wake-up only ends the sleep early if a request is still pending;
    /// a permit left over from an already-served trigger is absorbed.
    pub async fn sleep_or_wake(&self, duration: std::time::Duration) {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            if self.is_stop_requested() || self.trigger_requested.load(Ordering::Acquire) {
                return;
            }
            tokio::select! {
                () = &mut sleep => return,
                () = self.wake_notify.notified() => {}
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tick Speed
    // -----------------------------------------------------------------------

    /// Get the current tick interval in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Set the tick interval in milliseconds.
    ///
    /// Returns the previous interval on success, or `None` if the value is
    /// below [`MIN_TICK_INTERVAL_MS`].
    pub fn set_tick_interval_ms(&self, ms: u64) -> Option<u64> {
        if ms < MIN_TICK_INTERVAL_MS {
            return None;
        }
        let prev = self.tick_interval_ms.swap(ms, Ordering::AcqRel);
        Some(prev)
    }

    // -----------------------------------------------------------------------
    // Boundaries
    // -----------------------------------------------------------------------

    /// Check whether the cycle bound has been reached.
    ///
    /// Returns `true` if `max_cycles > 0` and `cycles >= max_cycles`.
    pub const fn cycle_limit_reached(&self, cycles: u64) -> bool {
        self.max_cycles > 0 && cycles >= self.max_cycles
    }

    /// Get the configured cycle bound.
    pub const fn max_cycles(&self) -> u64 {
        self.max_cycles
    }

    /// Return the wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Return elapsed seconds since start.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }
}

/// JSON-serializable status of the controller for the operator API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerStatus {
    /// Cycle number of the schedule in force.
    pub cycle: u64,
    /// Current controller phase.
    pub phase: ControllerPhase,
    /// Whether the schedule in force is stale.
    pub stale: bool,
    /// Whether an emergency override is active.
    pub emergency_active: bool,
    /// Whether the loop is paused.
    pub paused: bool,
    /// Whether a stop has been requested.
    pub stop_requested: bool,
    /// Current tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Elapsed wall-clock seconds since start.
    pub elapsed_seconds: u64,
    /// Configured cycle bound (0 = unlimited).
    pub max_cycles: u64,
    /// The reason the loop ended, if applicable.
    pub end_reason: Option<LoopEndReason>,
    /// ISO 8601 timestamp of when the loop started.
    pub started_at: String,
}
