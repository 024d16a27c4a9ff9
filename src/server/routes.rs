//! Route definitions

use std::sync::Arc;

use axum::{routing::any, Router};

use super::handlers::{echo, ping, predict, AppState};

/// Create the API router
///
/// Every route accepts any method; the handlers answer unsupported methods
/// with a JSON 405 body instead of axum's empty one.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/predict", any(predict))
        // Debug endpoints
        .route("/api/ping", any(ping))
        .route("/api/echo", any(echo))
}
