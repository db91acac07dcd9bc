//! Shared application state for the HTTP adapter.
//!
//! [`AppState`] holds the controller whose schedule the endpoints serve,
//! the observation inbox the ingest endpoint feeds, and the broadcast
//! channel that carries published schedules to `WebSocket` clients.

use std::sync::Arc;

use signal_core::controller::Controller;
use signal_core::operator::OperatorState;
use signal_core::source::ObservationInbox;
use signal_types::PublishedSchedule;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel for published schedules.
///
/// If a subscriber falls behind by more than this many messages it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest message.
const BROADCAST_CAPACITY: usize = 64;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for published schedules.
    pub tx: broadcast::Sender<PublishedSchedule>,
    /// The intersection controller.
    pub controller: Arc<Controller>,
    /// Mailbox drained by the run loop once per tick.
    pub inbox: ObservationInbox,
    /// Shared operator control state (present when the run loop is running).
    pub operator_state: Option<Arc<OperatorState>>,
}

impl AppState {
    /// Create application state around a controller and its inbox.
    pub fn new(controller: Arc<Controller>, inbox: ObservationInbox) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            controller,
            inbox,
            operator_state: None,
        }
    }

    /// Attach operator control state.
    #[must_use]
    pub fn with_operator(mut self, operator: Arc<OperatorState>) -> Self {
        self.operator_state = Some(operator);
        self
    }

    /// Subscribe to the schedule broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedSchedule> {
        self.tx.subscribe()
    }

    /// Publish a schedule to all connected clients.
    ///
    /// Returns the number of receivers that received the message.
    /// Returns 0 if no clients are connected (this is not an error).
    pub fn broadcast(&self, schedule: &PublishedSchedule) -> usize {
        // send returns Err only when there are zero receivers.
        self.tx.send(schedule.clone()).unwrap_or(0)
    }
}
