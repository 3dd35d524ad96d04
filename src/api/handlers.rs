use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::context::ClientContext;
use crate::analytics::{AnalyticsError, AnalyticsReport, ErrorKind, EventRecorder};
use crate::config::ClientIpConfig;

pub struct AppState {
    pub recorder: EventRecorder,
    pub client_ip: ClientIpConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "propertyId")]
    pub property_id: Option<String>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(err: AnalyticsError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Dependency => {
            tracing::error!(error = %err, "analytics request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let error = match status {
        StatusCode::INTERNAL_SERVER_ERROR => "Failed to process analytics".to_string(),
        _ => err.to_string(),
    };

    (status, Json(ErrorResponse { error }))
}

/// Record a profile interaction and return the refreshed report
pub async fn track_interaction(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    ClientContext(context): ClientContext,
    Json(payload): Json<TrackRequest>,
) -> ApiResult<AnalyticsReport> {
    state
        .recorder
        .record(&agent_id, payload.kind.as_deref(), payload.property_id, context)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Analytics report for an agent, on demand
pub async fn get_agent_analytics(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<AnalyticsReport> {
    state
        .recorder
        .reporter()
        .report(&agent_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_errors_hide_details() {
        let err = AnalyticsError::Storage(anyhow::anyhow!(
            "error communicating with database: connection refused (db.internal:5432)"
        ));

        let (status, Json(body)) = error_response(err);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Failed to process analytics");
        assert!(!body.error.contains("db.internal"));
    }

    #[test]
    fn test_client_errors_keep_message() {
        let (status, Json(body)) =
            error_response(AnalyticsError::InvalidInteractionType("click".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("click"));

        let (status, Json(body)) =
            error_response(AnalyticsError::AgentNotFound("ghost".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.error.contains("ghost"));
    }
}
