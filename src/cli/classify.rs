//! One-shot classification command

use std::sync::Arc;

use anyhow::{bail, Result};
use axum::http::Method;

use crate::config::PetalConfig;
use crate::engine::{build_handler, ArtifactCache};

/// Classify one feature vector and print the JSON reply
pub async fn classify(config: PetalConfig, features: Vec<f64>) -> Result<()> {
    let handler = build_handler(&config, Arc::new(ArtifactCache::new()));
    let body = serde_json::to_vec(&serde_json::json!({ "features": features }))?;

    let reply = handler.handle(&Method::POST, &body).await;
    println!("{}", serde_json::to_string_pretty(&reply.body)?);

    if !reply.status.is_success() {
        bail!("classification failed with status {}", reply.status);
    }
    Ok(())
}
