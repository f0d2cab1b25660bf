use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use osw_confidence_core::models::QueueMessage;

use crate::error::ApiError;
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Acknowledgement of an enqueued message
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    #[serde(rename = "messageId")]
    pub message_id: String,
}

/// Create the HTTP router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/api/v1/messages", post(enqueue_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse { status: "ok".to_string(), service: state.service_name.clone() })
}

/// Publish a request envelope onto the incoming topic
async fn enqueue_message(
    State(state): State<Arc<AppState>>,
    Json(message): Json<QueueMessage>,
) -> Result<impl IntoResponse, ApiError> {
    if message.message_id.trim().is_empty() {
        return Err(ApiError::bad_request("messageId is required"));
    }

    tracing::info!(
        message_id = %message.message_id,
        topic = %state.incoming_topic,
        "Enqueuing message from HTTP"
    );

    let message_id = message.message_id.clone();
    state.bus.publish(&state.incoming_topic, message).await?;

    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { accepted: true, message_id })))
}
