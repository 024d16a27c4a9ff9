//! Petal - HTTP inference server for a pre-trained iris classifier
//!
//! Petal loads a tree-ensemble classifier artifact, from a bundled file or
//! a remote URL, and serves predictions over a small JSON API.
//!
//! # Architecture
//!
//! - **engine**: artifact resolution, caching and the request handler
//! - **loader**: artifact decoding and validation
//! - **model**: classifier trait, forest implementation, label mapping
//! - **server**: axum routes and middleware
//! - **cli**: `serve`, `classify`, `pull` and `info` commands
//!
//! # Example
//!
//! ```bash
//! # Start server using app/model.json or model.json
//! petal serve --port 8080
//!
//! # Serve a remote artifact
//! MODEL_URL=https://example.com/iris.json petal serve
//!
//! # Classify without a server
//! petal classify --features 5.1,3.5,1.4,0.2
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod server;

// Re-export key types
pub use config::{ArtifactConfig, PetalConfig, ServerConfig};
pub use engine::{ArtifactCache, ArtifactResolver, InferenceHandler};
pub use error::{ErrorKind, ServeError, ServeResult};
pub use model::{Classifier, ForestClassifier, LabelSet};
