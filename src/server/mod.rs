//! HTTP server for inference
//!
//! Exposes the prediction handler plus the ping and echo debug endpoints.

mod handlers;
mod routes;

use std::sync::Arc;

use anyhow::Result;
use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

pub use handlers::AppState;
pub use routes::api_routes;

/// Build the application router with middleware applied
pub fn app(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .merge(api_routes())
        .layer(DefaultBodyLimit::max(config.max_body_size));

    if config.cors_enabled {
        app = app.layer(cors_layer(&config.cors_origins));
    }

    if config.request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the HTTP inference server and run until Ctrl-C
pub async fn start(state: Arc<AppState>, config: ServerConfig) -> Result<()> {
    let app = app(state, &config);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /api/predict - Classify a feature vector");
    tracing::info!("  ANY  /api/ping - Liveness check");
    tracing::info!("  POST /api/echo - Echo the JSON body");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
