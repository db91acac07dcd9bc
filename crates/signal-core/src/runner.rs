//! Cadence driver for a single intersection.
//!
//! [`run_loop`] polls the observation source once per tick, recomputes the
//! schedule through the [`Controller`], and hands every published schedule
//! to a [`SchedulePublisher`]. Around that cycle sits the operator control
//! plane:
//!
//! - **Pause/resume**: the schedule in force stays in force while paused
//! - **Variable cadence**: the tick interval is adjustable at runtime
//! - **On-demand recompute**: a trigger cuts the current sleep short
//! - **Bounded runs**: stop after `max_cycles` published schedules
//! - **Operator stop**: takes effect at the next tick boundary
//!
//! Nothing that happens inside a cycle stops the loop. Source failures and
//! rejected batches fall back to the last-known observations, so the
//! intersection always gets a schedule.

use std::sync::Arc;
use std::time::Duration;

use signal_types::PublishedSchedule;
use tracing::{error, info, warn};

use crate::controller::Controller;
use crate::operator::{LoopEndReason, OperatorState};
use crate::source::{ObservationSource, SourceError};

/// Result of a run loop.
#[derive(Debug)]
pub struct LoopResult {
    /// The reason the loop ended.
    pub end_reason: LoopEndReason,
    /// The last schedule published by the loop, if any cycle ran.
    pub final_schedule: Option<Arc<PublishedSchedule>>,
    /// Total number of cycles executed.
    pub total_cycles: u64,
}

/// Receives each schedule the loop publishes.
///
/// Implementations forward the schedule to signal hardware, the observer
/// snapshot, a message bus, and so on. Publishing must not block.
pub trait SchedulePublisher: Send {
    /// Called after each cycle with the schedule now in force.
    fn publish(&mut self, schedule: &PublishedSchedule);
}

/// A publisher that discards every schedule.
pub struct NoOpPublisher;

impl SchedulePublisher for NoOpPublisher {
    fn publish(&mut self, _schedule: &PublishedSchedule) {}
}

/// Fan out to several publishers in order.
impl SchedulePublisher for Vec<Box<dyn SchedulePublisher>> {
    fn publish(&mut self, schedule: &PublishedSchedule) {
        for publisher in self.iter_mut() {
            publisher.publish(schedule);
        }
    }
}

/// Drive the controller until the operator stops it or the cycle bound is
/// reached.
///
/// Each cycle:
///
/// 1. waits while paused,
/// 2. ends the loop if a stop was requested,
/// 3. polls `source` and recomputes (fresh data) or falls back to the
///    last-known observations (no data, source error, rejected batch),
/// 4. hands the result to `publisher`,
/// 5. ends the loop if `max_cycles` is reached,
/// 6. sleeps for the tick interval unless woken by a trigger or stop.
pub async fn run_loop(
    controller: &Controller,
    source: &mut dyn ObservationSource,
    publisher: &mut dyn SchedulePublisher,
    operator: &Arc<OperatorState>,
) -> LoopResult {
    let intersection_id = controller.intersection_id();
    let mut last_schedule: Option<Arc<PublishedSchedule>> = None;
    let mut total_cycles: u64 = 0;

    info!(
        %intersection_id,
        max_cycles = operator.max_cycles(),
        tick_interval_ms = operator.tick_interval_ms(),
        "Run loop starting"
    );

    loop {
        if operator.is_paused() {
            info!("Run loop paused, holding current schedule");
            operator.wait_if_paused().await;
            info!("Run loop resumed");
        }

        if operator.is_stop_requested() {
            info!("Operator stop requested");
            return finish(operator, LoopEndReason::OperatorStop, last_schedule, total_cycles)
                .await;
        }

        let triggered = operator.take_recompute_request();

        let published = match source.poll_observations(intersection_id) {
            Ok(Some(reports)) => match controller.recompute(&reports).await {
                Ok(published) => published,
                Err(e) => {
                    error!(%intersection_id, error = %e, "Observation batch rejected");
                    controller.recompute_last_known().await
                }
            },
            Ok(None) => controller.recompute_last_known().await,
            Err(SourceError::Closed) => {
                warn!(%intersection_id, "Observation source closed, using last-known data");
                controller.recompute_last_known().await
            }
            Err(e) => {
                warn!(%intersection_id, error = %e, "Observation source failed, using last-known data");
                controller.recompute_last_known().await
            }
        };

        total_cycles = total_cycles.saturating_add(1);
        publisher.publish(&published);

        info!(
            cycle = published.cycle,
            stale = published.schedule.stale,
            degraded = published.degraded,
            emergency_active = published.schedule.emergency_active,
            triggered,
            "Schedule published"
        );

        if operator.cycle_limit_reached(total_cycles) {
            info!(
                total_cycles,
                max_cycles = operator.max_cycles(),
                "Cycle limit reached"
            );
            return finish(
                operator,
                LoopEndReason::MaxCyclesReached,
                Some(published),
                total_cycles,
            )
            .await;
        }

        last_schedule = Some(published);

        operator
            .sleep_or_wake(Duration::from_millis(operator.tick_interval_ms()))
            .await;
    }
}

async fn finish(
    operator: &OperatorState,
    end_reason: LoopEndReason,
    final_schedule: Option<Arc<PublishedSchedule>>,
    total_cycles: u64,
) -> LoopResult {
    operator.set_end_reason(end_reason.clone()).await;
    LoopResult {
        end_reason,
        final_schedule,
        total_cycles,
    }
}

/// Log the end of a run loop.
///
/// The schedule in force when the loop ends stays readable through the
/// controller; the HTTP server keeps serving it.
pub fn log_loop_end(result: &LoopResult) {
    info!(
        reason = ?result.end_reason,
        total_cycles = result.total_cycles,
        final_cycle = result.final_schedule.as_ref().map(|s| s.cycle),
        "Run loop ended"
    );

    if let Some(ref published) = result.final_schedule {
        for green in &published.schedule.green_times {
            info!(lane = %green.lane, seconds = green.seconds, "Final green time");
        }
    } else {
        warn!("Run loop ended with no cycles executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use signal_types::{IntersectionId, Lane, ObservationReport};

    use super::*;
    use crate::config::TimingConfig;
    use crate::source::{ObservationInbox, StaticObservationSource};

    fn controller() -> Controller {
        Controller::new(
            IntersectionId::new(),
            TimingConfig::default(),
            Duration::from_secs(60),
        )
    }

    fn even_reports(count: i64) -> Vec<ObservationReport> {
        Lane::ALL
            .iter()
            .map(|lane| ObservationReport::new(lane.as_str(), count, false))
            .collect()
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Vec<PublishedSchedule>,
    }

    impl SchedulePublisher for RecordingPublisher {
        fn publish(&mut self, schedule: &PublishedSchedule) {
            self.published.push(schedule.clone());
        }
    }

    /// Fails on the first poll, then reports the source closed.
    struct FlakySource {
        polls: u32,
    }

    impl ObservationSource for FlakySource {
        fn poll_observations(
            &mut self,
            _intersection_id: IntersectionId,
        ) -> Result<Option<Vec<ObservationReport>>, SourceError> {
            self.polls = self.polls.saturating_add(1);
            if self.polls == 1 {
                Err(SourceError::Internal {
                    message: String::from("camera offline"),
                })
            } else {
                Err(SourceError::Closed)
            }
        }
    }

    #[tokio::test]
    async fn bounded_by_max_cycles() {
        let ctrl = controller();
        let mut source = StaticObservationSource::new(even_reports(10));
        let operator = Arc::new(OperatorState::new(0, 5));
        let mut publisher = RecordingPublisher::default();

        let result = run_loop(&ctrl, &mut source, &mut publisher, &operator).await;

        assert_eq!(result.end_reason, LoopEndReason::MaxCyclesReached);
        assert_eq!(result.total_cycles, 5);
        assert_eq!(publisher.published.len(), 5);
        assert_eq!(result.final_schedule.unwrap().cycle, 5);
        assert_eq!(
            operator.end_reason().await,
            Some(LoopEndReason::MaxCyclesReached)
        );
    }

    #[tokio::test]
    async fn operator_stop_before_first_cycle() {
        let ctrl = controller();
        let mut source = StaticObservationSource::new(even_reports(10));
        let operator = Arc::new(OperatorState::new(0, 0));
        operator.request_stop();

        let result = run_loop(&ctrl, &mut source, &mut NoOpPublisher, &operator).await;

        assert_eq!(result.end_reason, LoopEndReason::OperatorStop);
        assert_eq!(result.total_cycles, 0);
        assert!(result.final_schedule.is_none());
        assert_eq!(ctrl.current_schedule().cycle, 0);
    }

    #[tokio::test]
    async fn fresh_data_is_published_each_cycle() {
        let ctrl = controller();
        let mut source = StaticObservationSource::new(even_reports(10));
        let operator = Arc::new(OperatorState::new(0, 2));
        let mut publisher = RecordingPublisher::default();

        let _ = run_loop(&ctrl, &mut source, &mut publisher, &operator).await;

        for published in &publisher.published {
            assert!(!published.schedule.stale);
            assert!(published.schedule.green_times.iter().all(|g| g.seconds == 15));
        }
        assert_eq!(ctrl.current_schedule().cycle, 2);
    }

    #[tokio::test]
    async fn empty_inbox_publishes_stale_fallback() {
        let ctrl = controller();
        let mut inbox = ObservationInbox::new();
        let operator = Arc::new(OperatorState::new(0, 1));
        let mut publisher = RecordingPublisher::default();

        let _ = run_loop(&ctrl, &mut inbox, &mut publisher, &operator).await;

        let published = &publisher.published[0];
        assert!(published.schedule.stale);
        assert!(published.schedule.green_times.iter().all(|g| g.seconds == 10));
    }

    #[tokio::test]
    async fn invalid_batch_does_not_stop_the_loop() {
        let ctrl = controller();
        let mut source = StaticObservationSource::new(vec![ObservationReport::new(
            "northeast", 5, false,
        )]);
        let operator = Arc::new(OperatorState::new(0, 3));
        let mut publisher = RecordingPublisher::default();

        let result = run_loop(&ctrl, &mut source, &mut publisher, &operator).await;

        assert_eq!(result.total_cycles, 3);
        assert!(publisher.published.iter().all(|p| p.schedule.stale));
    }

    #[tokio::test]
    async fn source_errors_fall_back_to_last_known() {
        let ctrl = controller();
        let mut source = FlakySource { polls: 0 };
        let operator = Arc::new(OperatorState::new(0, 3));
        let mut publisher = RecordingPublisher::default();

        let result = run_loop(&ctrl, &mut source, &mut publisher, &operator).await;

        assert_eq!(result.end_reason, LoopEndReason::MaxCyclesReached);
        assert_eq!(publisher.published.len(), 3);
        assert_eq!(source.polls, 3);
    }

    #[tokio::test]
    async fn fresh_then_silent_reuses_last_known_counts() {
        let ctrl = controller();
        let mut inbox = ObservationInbox::new();
        let _ = inbox.deposit(vec![
            ObservationReport::new("north", 30, false),
            ObservationReport::new("south", 0, false),
            ObservationReport::new("east", 0, false),
            ObservationReport::new("west", 0, false),
        ]);
        let operator = Arc::new(OperatorState::new(0, 2));
        let mut publisher = RecordingPublisher::default();

        let _ = run_loop(&ctrl, &mut inbox, &mut publisher, &operator).await;

        let second = &publisher.published[1];
        assert!(!second.schedule.stale);
        assert_eq!(second.schedule.seconds_for(Lane::North), Some(60));
    }

    #[tokio::test]
    async fn fan_out_reaches_every_publisher() {
        struct Counter(Arc<std::sync::atomic::AtomicU64>);
        impl SchedulePublisher for Counter {
            fn publish(&mut self, _schedule: &PublishedSchedule) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }

        let hits = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let mut publishers: Vec<Box<dyn SchedulePublisher>> = vec![
            Box::new(Counter(Arc::clone(&hits))),
            Box::new(NoOpPublisher),
            Box::new(Counter(Arc::clone(&hits))),
        ];
        let ctrl = controller();
        let mut source = StaticObservationSource::new(even_reports(2));
        let operator = Arc::new(OperatorState::new(0, 2));

        let _ = run_loop(&ctrl, &mut source, &mut publishers, &operator).await;

        assert_eq!(hits.load(std::sync::atomic::Ordering::Relaxed), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_wakes_loop_early() {
        let ctrl = Arc::new(controller());
        let operator = Arc::new(OperatorState::new(3_600_000, 2));

        let handle = {
            let ctrl = Arc::clone(&ctrl);
            let operator = Arc::clone(&operator);
            tokio::spawn(async move {
                let mut source = StaticObservationSource::new(even_reports(1));
                let start = tokio::time::Instant::now();
                let result = run_loop(&ctrl, &mut source, &mut NoOpPublisher, &operator).await;
                (result, start.elapsed())
            })
        };

        tokio::task::yield_now().await;
        operator.request_recompute();

        let (result, elapsed) = handle.await.unwrap();
        assert_eq!(result.total_cycles, 2);
        assert!(elapsed < Duration::from_secs(3600));
    }

    /// Records when each poll happened and fires one trigger on the first.
    struct TriggeringSource {
        operator: Arc<OperatorState>,
        start: tokio::time::Instant,
        offsets_ms: Vec<u128>,
    }

    impl ObservationSource for TriggeringSource {
        fn poll_observations(
            &mut self,
            _intersection_id: IntersectionId,
        ) -> Result<Option<Vec<ObservationReport>>, SourceError> {
            if self.offsets_ms.is_empty() {
                self.operator.request_recompute();
            }
            self.offsets_ms.push(self.start.elapsed().as_millis());
            Ok(Some(even_reports(3)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_trigger_yields_one_extra_cycle() {
        let ctrl = controller();
        let operator = Arc::new(OperatorState::new(10_000, 4));
        let mut source = TriggeringSource {
            operator: Arc::clone(&operator),
            start: tokio::time::Instant::now(),
            offsets_ms: Vec::new(),
        };

        let result = run_loop(&ctrl, &mut source, &mut NoOpPublisher, &operator).await;

        assert_eq!(result.total_cycles, 4);
        assert_eq!(source.offsets_ms, vec![0, 0, 10_000, 20_000]);
    }
}
