use std::convert::Infallible;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde_json::{Value, json};

use super::AppState;
use super::error::ApiError;
use crate::observability::RELAY_REJECTED;
use crate::types::{ChatRequest, Mode, ModeSummary, today};

/// `POST /api/chat`: relay one conversation as an event stream.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let (messages, mode) = match ChatRequest::from_slice(&body).and_then(ChatRequest::into_parts) {
        Ok(parts) => parts,
        Err(err) => {
            RELAY_REJECTED.click();
            tracing::debug!(error = %err, "rejected chat request");
            return Err(err.into());
        }
    };

    let stream = state.relay.relay_mode(messages, mode).await?;
    let body = Body::from_stream(
        stream.map(|event| Ok::<_, Infallible>(Bytes::from(event.to_wire()))),
    );

    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(response)
}

/// Any other method on `/api/chat`.
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

/// `GET /api/modes`
pub async fn list_modes() -> Json<Vec<ModeSummary>> {
    Json(
        Mode::ALL
            .iter()
            .map(|mode| ModeSummary::from(mode.descriptor()))
            .collect(),
    )
}

/// `GET /api/modes/{id}`: one mode with its start-of-chat message.
pub async fn get_mode(Path(id): Path<String>) -> Result<Json<ModeSummary>, ApiError> {
    let descriptor = Mode::lookup(&id).map_err(|_| ApiError::not_found("Invalid mode"))?;
    let mut summary = ModeSummary::from(descriptor);
    summary.welcome = Some(descriptor.start_of_chat(today()));
    Ok(Json(summary))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
