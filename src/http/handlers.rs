//! Axum HTTP handlers for the web server
//!
//! Provides the event-stream endpoint (subscribe, direct submit, terminate), the
//! message ingress endpoint, and general metadata endpoints.

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::transport::{deliver, endpoint_url, Delivery, ENDPOINT_EVENT};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
    pub sse_endpoint: String,
    pub message_endpoint: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.sessions.len(),
    })
}

pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: state.config.server_name.clone(),
        version: state.config.server_version.clone(),
        protocol_version: state.config.protocol_version.clone(),
        sse_endpoint: state.config.sse_path.clone(),
        message_endpoint: state.config.message_path.clone(),
    })
}

/// Opens an event stream, registers its session and announces the message
/// endpoint as the first frame.
pub async fn subscribe(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (session, stream) = state.sessions.open(state.config.session_buffer);
    let url = endpoint_url(
        &base_url(&state, &headers),
        &state.config.message_path,
        session.id(),
    );

    if let Err(err) = session.send(ENDPOINT_EVENT, &url).await {
        warn!(session_id = %session.id(), error = %err, "failed to announce endpoint");
        return AppError::internal(err.to_string()).into_response();
    }
    info!(session_id = %session.id(), endpoint = %url, "event stream established");

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Accepts one JSON-RPC payload and always answers inline.
pub async fn direct_submit(State(state): State<AppState>, body: Bytes) -> Response {
    match state.dispatcher.handle_payload(&body) {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

pub async fn terminate(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<StatusCode, AppError> {
    let Some(session_id) = query.session_id else {
        return Err(AppError::bad_request(
            "missing_session_id",
            "sessionId query parameter is required",
        ));
    };

    if state.sessions.terminate(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("unknown_session", "no live session with that id"))
    }
}

/// Accepts one JSON-RPC payload for a session. The response is pushed over the
/// session's stream when possible, otherwise returned as this call's body.
pub async fn message_endpoint(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Response {
    let Some(response) = state.dispatcher.handle_payload(&body) else {
        return StatusCode::ACCEPTED.into_response();
    };

    match deliver(&state.sessions, query.session_id.as_deref(), response).await {
        Delivery::Pushed => StatusCode::ACCEPTED.into_response(),
        Delivery::Inline(response) => (StatusCode::OK, Json(response)).into_response(),
    }
}

fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = state.config.public_base_url.as_deref() {
        return base.to_string();
    }

    headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(|host| format!("http://{host}"))
        .unwrap_or_else(|| {
            format!(
                "http://{}:{}",
                state.config.bind_addr, state.config.bind_port
            )
        })
}
