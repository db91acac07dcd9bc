//! Schedule publisher that feeds the HTTP adapter's `WebSocket` stream.

use std::sync::Arc;

use signal_core::runner::SchedulePublisher;
use signal_observer::state::AppState;
use signal_types::PublishedSchedule;
use tracing::debug;

/// Bridges the run loop to connected `WebSocket` clients.
pub struct ObserverPublisher {
    state: Arc<AppState>,
}

impl ObserverPublisher {
    /// Create a publisher backed by the given app state.
    pub const fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl SchedulePublisher for ObserverPublisher {
    fn publish(&mut self, schedule: &PublishedSchedule) {
        let receivers = self.state.broadcast(schedule);
        debug!(cycle = schedule.cycle, receivers, "Schedule broadcast sent");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use signal_core::config::TimingConfig;
    use signal_core::controller::Controller;
    use signal_core::source::ObservationInbox;
    use signal_types::IntersectionId;

    use super::*;

    #[tokio::test]
    async fn broadcasts_to_subscribers() {
        let controller = Arc::new(Controller::new(
            IntersectionId::new(),
            TimingConfig::default(),
            Duration::from_secs(60),
        ));
        let state = Arc::new(AppState::new(
            Arc::clone(&controller),
            ObservationInbox::new(),
        ));
        let mut rx = state.subscribe();
        let mut publisher = ObserverPublisher::new(Arc::clone(&state));

        let published = controller.recompute_last_known().await;
        publisher.publish(&published);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.cycle, published.cycle);
    }
}
