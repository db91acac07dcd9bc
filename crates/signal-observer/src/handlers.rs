//! REST endpoint handlers for the timing API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/schedule` | Schedule currently in force |
//! | `POST` | `/api/timings` | One-shot allocation over a report batch |
//! | `POST` | `/api/observations` | Queue a report batch for the next tick |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use serde::{Deserialize, Serialize};
use signal_core::allocator;
use signal_core::observation;
use signal_types::{Lane, LaneMap, ObservationReport, Schedule};
use tracing::{debug, info};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/timings` and `POST /api/observations`.
#[derive(Debug, Deserialize)]
pub struct ObservationBatch {
    /// One report per lane. Missing lanes count as empty.
    pub observations: Vec<ObservationReport>,
}

/// Emergency section of a timing response.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmergencyInfo {
    /// Whether any lane reported an emergency vehicle.
    pub detected: bool,
    /// Lanes with an emergency vehicle, in fixed lane order.
    pub lanes: Vec<Lane>,
}

/// Response body for `POST /api/timings`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TimingResponse {
    /// Green seconds per lane.
    pub timings: LaneMap<u32>,
    /// Emergency override details.
    pub emergency_info: EmergencyInfo,
    /// Whether any report was defaulted, clamped, or duplicated.
    pub degraded: bool,
    /// Always `"success"`.
    pub status: String,
}

impl TimingResponse {
    fn from_schedule(schedule: &Schedule, degraded: bool) -> Self {
        let timings = LaneMap::from_fn(|lane| schedule.seconds_for(lane).unwrap_or(0));
        Self {
            timings,
            emergency_info: EmergencyInfo {
                detected: schedule.emergency_active,
                lanes: schedule.emergency_lanes.clone(),
            },
            degraded,
            status: String::from("success"),
        }
    }
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing the schedule in force and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let current = state.controller.current_schedule();
    let mut rows = String::new();
    for green in &current.schedule.green_times {
        let marker = if current.schedule.emergency_lanes.contains(&green.lane) {
            " (emergency)"
        } else {
            ""
        };
        rows.push_str(&format!(
            "<div class=\"metric\"><div class=\"label\">{}{marker}</div><div class=\"value\">{}s</div></div>\n",
            green.lane, green.seconds
        ));
    }
    let status = if current.schedule.stale {
        "<span class=\"stale\">STALE</span>"
    } else {
        "<span class=\"status\">LIVE</span>"
    };
    let cycle = current.cycle;
    let intersection_id = current.intersection_id;

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Signal Timing</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        .stale {{ color: #d29922; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Signal Timing</h1>
    <p class="subtitle">Intersection {intersection_id} -- cycle {cycle}</p>

    <p>Status: {status}</p>

    <div>
{rows}    </div>

    <h2>API</h2>
    <ul>
        <li>GET <a href="/api/schedule">/api/schedule</a></li>
        <li>POST /api/timings</li>
        <li>POST /api/observations</li>
        <li>GET /ws/schedules</li>
        <li>GET <a href="/api/operator/status">/api/operator/status</a></li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/schedule
// ---------------------------------------------------------------------------

/// Return the schedule in force.
///
/// Returns 404 until the controller has published its first computed
/// schedule; the startup fallback is not served.
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let current = state.controller.current_schedule();
    if current.cycle == 0 {
        return Err(ObserverError::NotFound(String::from(
            "no schedule has been published yet",
        )));
    }
    Ok(Json(current.as_ref().clone()))
}

// ---------------------------------------------------------------------------
// POST /api/timings
// ---------------------------------------------------------------------------

/// Allocate green times for a report batch and return them directly.
///
/// Uses the controller's timing parameters but does not touch the
/// schedule in force.
pub async fn post_timings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ObservationBatch>,
) -> Result<impl IntoResponse, ObserverError> {
    let allocation = allocator::allocate_reports(&body.observations, state.controller.timing())?;
    allocation.observations.log_issues();

    debug!(
        total_vehicles = allocation.observations.total_vehicles(),
        emergency_active = allocation.schedule.emergency_active,
        "One-shot timing computed"
    );

    Ok(Json(TimingResponse::from_schedule(
        &allocation.schedule,
        allocation.observations.is_degraded(),
    )))
}

// ---------------------------------------------------------------------------
// POST /api/observations
// ---------------------------------------------------------------------------

/// Validate a report batch and queue it for the next tick.
///
/// Lane identifiers are checked up front so a bad batch is rejected here
/// instead of being dropped silently by the run loop.
pub async fn post_observations(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ObservationBatch>,
) -> Result<impl IntoResponse, ObserverError> {
    let normalized = observation::normalize(&body.observations)?;
    let degraded = normalized.is_degraded();
    let reports = body.observations.len();

    let replaced = state.inbox.deposit(body.observations);
    if let Some(operator) = state.operator_state.as_ref() {
        operator.request_recompute();
    }

    info!(reports, degraded, replaced, "Observation batch queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "ok": true,
            "accepted": reports,
            "degraded": degraded,
            "replaced_unread": replaced,
        })),
    ))
}
