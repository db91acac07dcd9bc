//! Signal timing engine binary.
//!
//! Wires together configuration, logging, the intersection controller,
//! the HTTP adapter, the optional NATS bridge, and the run loop.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `signal-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Create the controller and its observation inbox
//! 4. Create operator state from the controller settings
//! 5. Start the HTTP server
//! 6. Connect the NATS bridge when enabled
//! 7. Run the loop until stopped or the cycle bound is reached
//! 8. Log the result and keep serving the final schedule until Ctrl-C

mod error;
mod nats_bridge;
mod observer_publisher;

use std::path::Path;
use std::sync::Arc;

use signal_core::config::{LogFormat, LoggingConfig, SignalConfig};
use signal_core::controller::Controller;
use signal_core::operator::OperatorState;
use signal_core::runner::{self, SchedulePublisher};
use signal_core::source::ObservationInbox;
use signal_observer::state::AppState;
use signal_types::IntersectionId;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::nats_bridge::NatsSchedulePublisher;
use crate::observer_publisher::ObserverPublisher;

const CONFIG_PATH: &str = "signal-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the HTTP server
/// cannot be started.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;

    info!("signal-engine starting");
    if !from_file {
        info!(path = CONFIG_PATH, "Config file not found, using defaults");
    }

    // 3. Create the controller.
    let intersection_id = config
        .intersection
        .id
        .map_or_else(IntersectionId::new, IntersectionId::from);
    let controller = Arc::new(Controller::from_config(intersection_id, &config));
    let inbox = ObservationInbox::new();
    info!(
        %intersection_id,
        name = %config.intersection.name,
        cycle_budget_seconds = config.timing.cycle_budget_seconds,
        min_green_seconds = config.timing.min_green_seconds,
        emergency_min_seconds = config.timing.emergency_min_seconds,
        staleness_window_ms = u64::try_from(controller.staleness_window().as_millis()).unwrap_or(u64::MAX),
        "Controller initialized"
    );

    // 4. Create operator state.
    let operator = Arc::new(OperatorState::new(
        config.controller.tick_interval_ms,
        config.controller.max_cycles,
    ));

    // 5. Start the HTTP server.
    let observer_port = config.infrastructure.observer_port;
    let app_state = Arc::new(
        AppState::new(Arc::clone(&controller), inbox.clone()).with_operator(Arc::clone(&operator)),
    );
    let _observer_handle =
        signal_observer::startup::spawn_observer(observer_port, Arc::clone(&app_state))
            .map_err(EngineError::from)?;

    let mut publishers: Vec<Box<dyn SchedulePublisher>> =
        vec![Box::new(ObserverPublisher::new(app_state))];

    // 6. Connect the NATS bridge.
    if config.infrastructure.nats_enabled {
        match connect_nats(&config, intersection_id, &inbox, &operator).await {
            Ok(publisher) => publishers.push(Box::new(publisher)),
            Err(e) => {
                warn!(error = %e, "NATS bridge unavailable, continuing with HTTP ingest only");
            }
        }
    }

    // 7. Run the loop.
    let mut source = inbox;
    let result = runner::run_loop(&controller, &mut source, &mut publishers, &operator).await;

    // 8. Log results and keep serving.
    runner::log_loop_end(&result);
    info!("Run loop finished, HTTP API still serving the final schedule (Ctrl-C to exit)");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
    }

    info!(
        end_reason = ?result.end_reason,
        total_cycles = result.total_cycles,
        "signal-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `signal-config.yaml` in the working directory.
///
/// Returns the config and whether it came from the file.
fn load_config() -> Result<(SignalConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((SignalConfig::from_file(config_path)?, true))
    } else {
        let mut config = SignalConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok((config, false))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match logging.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}

/// Connect to NATS, start the observation subscriber, and build the
/// schedule publisher.
async fn connect_nats(
    config: &SignalConfig,
    intersection_id: IntersectionId,
    inbox: &ObservationInbox,
    operator: &Arc<OperatorState>,
) -> Result<NatsSchedulePublisher, EngineError> {
    let infra = &config.infrastructure;
    info!(nats_url = %infra.nats_url, "Connecting to NATS");
    let client = nats_bridge::connect(&infra.nats_url).await?;

    let _subscriber = nats_bridge::spawn_observation_subscriber(
        &client,
        nats_bridge::observations_subject(&infra.subject_prefix, intersection_id),
        inbox.clone(),
        Arc::clone(operator),
    )
    .await?;

    let subject = nats_bridge::schedule_subject(&infra.subject_prefix, intersection_id);
    info!(%subject, "NATS bridge connected");
    Ok(NatsSchedulePublisher::new(client, subject))
}
