//! Error taxonomy for the inference pipeline
//!
//! Every failure inside the request pipeline is a [`ServeError`]. The
//! handler boundary maps each one to a status code and a JSON body with an
//! `error` string and, for server-side failures, a `traceback` string.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::path::PathBuf;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for the inference pipeline
pub type ServeResult<T> = Result<T, ServeError>;

/// Coarse classification of a [`ServeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadMethod,
    BadRequestBody,
    DependencyUnavailable,
    ArtifactNotFound,
    ArtifactLoadError,
    PredictionError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadMethod => "bad_method",
            ErrorKind::BadRequestBody => "bad_request_body",
            ErrorKind::DependencyUnavailable => "dependency_unavailable",
            ErrorKind::ArtifactNotFound => "artifact_not_found",
            ErrorKind::ArtifactLoadError => "artifact_load_error",
            ErrorKind::PredictionError => "prediction_error",
        }
    }
}

/// Failure inside the request pipeline
#[derive(Error, Debug)]
pub enum ServeError {
    /// Request used a method other than POST
    #[error("Only POST supported")]
    BadMethod,

    /// Body is not valid JSON
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    /// Body is valid JSON but not an object
    #[error("Request body must be a JSON object")]
    NotAnObject,

    /// `features` key absent or null
    #[error("Missing \"features\" in request body")]
    MissingFeatures,

    /// Body could not be read, e.g. it exceeds the configured size limit
    #[error("Failed to read request body: {reason}")]
    UnreadableBody { status: StatusCode, reason: String },

    /// The inference backend could not be initialized
    #[error("Inference runtime unavailable: {0:#}")]
    DependencyUnavailable(anyhow::Error),

    /// No remote URL configured and no local artifact present
    #[error(
        "Model file not found (looked in {}). Set MODEL_URL to a downloadable model artifact, \
         or place the model file at one of those paths",
        display_paths(.candidates)
    )]
    ArtifactNotFound { candidates: Vec<PathBuf> },

    /// Fetching the remote artifact failed
    #[error("Model download failed from {url}: {cause:#}")]
    ArtifactDownload { url: String, cause: anyhow::Error },

    /// The artifact file exists but could not be deserialized
    #[error("Failed to load model from {}: {cause:#}", .path.display())]
    ArtifactLoad { path: PathBuf, cause: anyhow::Error },

    /// Feature coercion, prediction or label lookup failed
    #[error("Prediction failed: {0:#}")]
    Prediction(anyhow::Error),
}

impl ServeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServeError::BadMethod => ErrorKind::BadMethod,
            ServeError::InvalidJson(_)
            | ServeError::NotAnObject
            | ServeError::MissingFeatures
            | ServeError::UnreadableBody { .. } => ErrorKind::BadRequestBody,
            ServeError::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
            ServeError::ArtifactNotFound { .. } => ErrorKind::ArtifactNotFound,
            ServeError::ArtifactDownload { .. } | ServeError::ArtifactLoad { .. } => {
                ErrorKind::ArtifactLoadError
            }
            ServeError::Prediction(_) => ErrorKind::PredictionError,
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        if let ServeError::UnreadableBody { status, .. } = self {
            return *status;
        }
        match self.kind() {
            ErrorKind::BadMethod => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::BadRequestBody => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Diagnostic trace attached to server-side failures
    ///
    /// Contains the full error chain and, when `RUST_BACKTRACE` or
    /// `RUST_LIB_BACKTRACE` is set, the captured stack.
    pub fn traceback(&self) -> Option<String> {
        if !self.status().is_server_error() {
            return None;
        }

        let trace = match self {
            ServeError::DependencyUnavailable(cause)
            | ServeError::Prediction(cause)
            | ServeError::ArtifactDownload { cause, .. }
            | ServeError::ArtifactLoad { cause, .. } => format!("{}\n\n{:?}", self, cause),
            _ => {
                let backtrace = Backtrace::capture();
                match backtrace.status() {
                    BacktraceStatus::Captured => {
                        format!("{}\n\nStack backtrace:\n{}", self, backtrace)
                    }
                    _ => self.to_string(),
                }
            }
        };

        Some(trace)
    }

    /// Convert into the JSON error body returned to clients
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            traceback: self.traceback(),
        }
    }
}

/// JSON body of every error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
