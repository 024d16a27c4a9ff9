//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::engine::{InferenceHandler, Reply};
use crate::error::ServeError;

/// Shared application state
pub struct AppState {
    pub handler: Arc<InferenceHandler>,
}

impl AppState {
    pub fn new(handler: Arc<InferenceHandler>) -> Self {
        Self { handler }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Liveness check
pub async fn ping() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "message": "pong" })),
    )
}

/// Return the decoded JSON body unchanged
pub async fn echo(method: Method, body: Result<Bytes, BytesRejection>) -> Reply {
    let body = match read_body(&method, body) {
        Ok(body) => body,
        Err(reply) => return reply,
    };
    if body.is_empty() {
        return Reply::new(StatusCode::OK, json!({}));
    }
    match serde_json::from_slice::<Value>(&body) {
        Ok(value) => Reply::new(StatusCode::OK, value),
        Err(e) => Reply::error(&ServeError::InvalidJson(e.to_string())),
    }
}

/// Classify a feature vector
pub async fn predict(
    State(state): State<Arc<AppState>>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Reply {
    match read_body(&method, body) {
        Ok(body) => state.handler.handle(&method, &body).await,
        Err(reply) => reply,
    }
}

/// Method check first, then the buffered body
///
/// Rejections from the body extractor (size limit, broken stream) become
/// JSON error replies instead of axum's plain-text ones.
fn read_body(method: &Method, body: Result<Bytes, BytesRejection>) -> Result<Bytes, Reply> {
    if method != Method::POST {
        return Err(Reply::error(&ServeError::BadMethod));
    }
    body.map_err(|rejection| {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        Reply::error(&ServeError::UnreadableBody {
            status: rejection.status(),
            reason: rejection.body_text(),
        })
    })
}
