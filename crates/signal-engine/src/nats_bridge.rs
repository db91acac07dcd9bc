//! NATS transport for observations and schedules.
//!
//! # Subject Convention
//!
//! - **Observation subscribe:** `{prefix}.{intersection_id}.observations`
//!   carrying a JSON array of lane reports
//! - **Schedule publish:** `{prefix}.{intersection_id}.schedule` carrying a
//!   JSON [`PublishedSchedule`]
//!
//! # Sync/Async Bridge
//!
//! [`SchedulePublisher::publish`] is synchronous and must not block the run
//! loop, so each serialized schedule is queued on an unbounded channel and
//! a single long-lived task performs the async publishes in order.

use std::sync::Arc;

use futures::StreamExt as _;
use signal_core::observation;
use signal_core::operator::OperatorState;
use signal_core::runner::SchedulePublisher;
use signal_core::source::ObservationInbox;
use signal_types::{IntersectionId, ObservationReport, PublishedSchedule};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::EngineError;

/// Subject on which sensing back-ends publish report batches.
pub fn observations_subject(prefix: &str, intersection_id: IntersectionId) -> String {
    format!("{prefix}.{intersection_id}.observations")
}

/// Subject on which the engine publishes schedules.
pub fn schedule_subject(prefix: &str, intersection_id: IntersectionId) -> String {
    format!("{prefix}.{intersection_id}.schedule")
}

/// Errors decoding an observation message.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not a JSON array of reports.
    #[error("malformed observation payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A report named an unknown lane.
    #[error(transparent)]
    InvalidLane(#[from] signal_types::InvalidLaneError),
}

/// Decode and validate one observation message.
pub fn decode_batch(payload: &[u8]) -> Result<Vec<ObservationReport>, DecodeError> {
    let reports: Vec<ObservationReport> = serde_json::from_slice(payload)?;
    let _ = observation::normalize(&reports)?;
    Ok(reports)
}

/// Connect to a NATS server.
///
/// # Errors
///
/// Returns [`EngineError::Nats`] if the connection fails.
pub async fn connect(url: &str) -> Result<async_nats::Client, EngineError> {
    async_nats::connect(url)
        .await
        .map_err(|e| EngineError::Nats {
            message: format!("failed to connect to NATS at {url}: {e}"),
        })
}

/// Subscribe to observation batches and deposit each valid batch in the
/// inbox, requesting an immediate recompute.
///
/// # Errors
///
/// Returns [`EngineError::Nats`] if the subscription cannot be created.
pub async fn spawn_observation_subscriber(
    client: &async_nats::Client,
    subject: String,
    inbox: ObservationInbox,
    operator: Arc<OperatorState>,
) -> Result<JoinHandle<()>, EngineError> {
    let mut sub = client
        .subscribe(subject.clone())
        .await
        .map_err(|e| EngineError::Nats {
            message: format!("failed to subscribe to {subject}: {e}"),
        })?;

    info!(%subject, "Observation subscriber started");

    Ok(tokio::spawn(async move {
        while let Some(msg) = sub.next().await {
            match decode_batch(&msg.payload) {
                Ok(reports) => {
                    let count = reports.len();
                    let replaced = inbox.deposit(reports);
                    operator.request_recompute();
                    debug!(reports = count, replaced, "Observation batch received over NATS");
                }
                Err(e) => {
                    warn!(error = %e, subject = %msg.subject, "Dropping observation message");
                }
            }
        }
        warn!("NATS observation subscription ended");
    }))
}

/// Publishes every schedule to NATS.
///
/// Payloads go through one channel to a single forwarding task, so
/// subscribers see schedules in cycle order.
pub struct NatsSchedulePublisher {
    tx: mpsc::UnboundedSender<(u64, Vec<u8>)>,
}

impl NatsSchedulePublisher {
    /// Create a publisher for `subject` on an existing connection and
    /// start its forwarding task.
    pub fn new(client: async_nats::Client, subject: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, Vec<u8>)>();
        tokio::spawn(async move {
            while let Some((cycle, payload)) = rx.recv().await {
                if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                    warn!(error = %e, %subject, cycle, "Failed to publish schedule");
                }
            }
            debug!(%subject, "Schedule forwarding task finished");
        });
        Self::with_sender(tx)
    }

    const fn with_sender(tx: mpsc::UnboundedSender<(u64, Vec<u8>)>) -> Self {
        Self { tx }
    }
}

impl SchedulePublisher for NatsSchedulePublisher {
    fn publish(&mut self, schedule: &PublishedSchedule) {
        let payload = match serde_json::to_vec(schedule) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to serialize schedule for NATS");
                return;
            }
        };
        if self.tx.send((schedule.cycle, payload)).is_err() {
            warn!(cycle = schedule.cycle, "Schedule forwarding task has stopped");
        }
    }
}
