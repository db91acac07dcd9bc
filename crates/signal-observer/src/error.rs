//! Error types for the HTTP adapter.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use signal_types::InvalidLaneError;

/// Errors that can occur in the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A report named a lane that does not exist.
    #[error(transparent)]
    InvalidLane(#[from] InvalidLaneError),

    /// The request was well-formed JSON but semantically invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::InvalidLane(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let mut body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });
        if let (Self::InvalidLane(e), Some(map)) = (&self, body.as_object_mut()) {
            map.insert(String::from("lane"), serde_json::Value::from(e.value.clone()));
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    async fn body_json(error: ObserverError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn invalid_lane_body_names_the_lane() {
        let (status, json) = body_json(ObserverError::from(InvalidLaneError {
            value: String::from("up"),
        }))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], 400);
        assert_eq!(json["lane"], "up");
    }

    #[tokio::test]
    async fn every_variant_maps_to_its_status() {
        let cases = [
            (ObserverError::NotFound(String::from("x")), StatusCode::NOT_FOUND),
            (ObserverError::BadRequest(String::from("x")), StatusCode::BAD_REQUEST),
            (
                ObserverError::Internal(String::from("x")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            let (status, json) = body_json(error).await;
            assert_eq!(status, expected);
            assert_eq!(json["error"], "x");
            assert!(json.get("lane").is_none());
        }
    }
}
