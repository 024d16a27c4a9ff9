//! Inference request handler
//!
//! `handle(method, body)` always produces a status code and a JSON body.
//! Each stage either advances the request or ends it with a [`ServeError`]:
//!
//! 1. method check (405)
//! 2. body decode and `features` presence (400)
//! 3. lazy backend initialization (500)
//! 4. artifact pre-flight and resolution (500)
//! 5. feature coercion, prediction and label lookup (500)
//!
//! Panics raised inside the pipeline are caught and reported as prediction
//! failures.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use axum::http::{Method, StatusCode};
use futures::FutureExt;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::{BackendProvider, LazyBackend};
use super::resolver::ArtifactSource;
use crate::error::{ServeError, ServeResult};
use crate::model::{Classifier, LabelSet};

/// Decoded request body
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    /// Raw `features` value; its shape is checked against the model later
    pub features: Value,
}

/// Successful response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceResponse {
    pub predicted_class: String,
}

/// Status code and JSON body of a response
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self::new(StatusCode::OK, body),
            Err(e) => Self::error(&ServeError::Prediction(anyhow!(e))),
        }
    }

    pub fn error(err: &ServeError) -> Self {
        let body = serde_json::to_value(err.to_body())
            .unwrap_or_else(|_| serde_json::json!({ "error": err.to_string() }));
        Self::new(err.status(), body)
    }
}

/// Serves `POST` prediction requests
pub struct InferenceHandler {
    source: Arc<dyn ArtifactSource>,
    backend: LazyBackend,
    labels: LabelSet,
}

impl InferenceHandler {
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        provider: Arc<dyn BackendProvider>,
        labels: LabelSet,
    ) -> Self {
        Self {
            source,
            backend: LazyBackend::new(provider),
            labels,
        }
    }

    /// Handle one request; never fails
    pub async fn handle(&self, method: &Method, body: &[u8]) -> Reply {
        let outcome = AssertUnwindSafe(self.predict(method, body))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ServeError::Prediction(anyhow!(panic_message(panic)))));

        match outcome {
            Ok(response) => {
                tracing::debug!("Predicted {}", response.predicted_class);
                Reply::ok(&response)
            }
            Err(err) => {
                if err.status().is_server_error() {
                    tracing::error!(kind = err.kind().as_str(), "{}", err);
                } else {
                    tracing::debug!(kind = err.kind().as_str(), "Rejected request: {}", err);
                }
                Reply::error(&err)
            }
        }
    }

    /// Preload the artifact outside of a request
    pub async fn warm_up(&self) -> ServeResult<Arc<dyn Classifier>> {
        let backend = self
            .backend
            .get()
            .await
            .map_err(ServeError::DependencyUnavailable)?;
        self.source.preflight()?;
        self.source.resolve(backend).await
    }

    async fn predict(&self, method: &Method, body: &[u8]) -> ServeResult<InferenceResponse> {
        if method != Method::POST {
            return Err(ServeError::BadMethod);
        }

        let request = decode_request(body)?;

        let backend = self
            .backend
            .get()
            .await
            .map_err(ServeError::DependencyUnavailable)?;

        let model = match self.source.cached().await {
            Some(model) => model,
            None => {
                self.source.preflight()?;
                self.source.resolve(backend).await?
            }
        };

        let label = self
            .classify(model.as_ref(), &request.features)
            .map_err(ServeError::Prediction)?;

        Ok(InferenceResponse {
            predicted_class: label.to_string(),
        })
    }

    fn classify(&self, model: &dyn Classifier, features: &Value) -> Result<&str> {
        let rows = coerce_features(features, model.n_features())?;
        let predictions = model.predict(rows.view())?;
        let class = predictions
            .first()
            .copied()
            .context("model returned no prediction")?;
        self.labels.label(class)
    }
}

/// Parse the raw body into an [`InferenceRequest`]
pub fn decode_request(body: &[u8]) -> ServeResult<InferenceRequest> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ServeError::InvalidJson(e.to_string()))?;

    let Value::Object(mut map) = value else {
        return Err(ServeError::NotAnObject);
    };

    match map.remove("features") {
        None | Some(Value::Null) => Err(ServeError::MissingFeatures),
        Some(features) => Ok(InferenceRequest { features }),
    }
}

/// Reshape a JSON feature list into a single row of `n_features` columns
///
/// Nested arrays are flattened, so `[[5.1, 3.5, 1.4, 0.2]]` is accepted.
pub fn coerce_features(features: &Value, n_features: usize) -> Result<Array2<f64>> {
    let mut values = Vec::with_capacity(n_features);
    flatten_numbers(features, &mut values)?;

    if values.len() != n_features {
        bail!(
            "expected {} features, got {}",
            n_features,
            values.len()
        );
    }

    Array2::from_shape_vec((1, n_features), values).context("reshaping features")
}

fn flatten_numbers(value: &Value, out: &mut Vec<f64>) -> Result<()> {
    match value {
        Value::Number(n) => {
            let x = n
                .as_f64()
                .ok_or_else(|| anyhow!("feature {} is not representable as f64", n))?;
            out.push(x);
        }
        Value::Array(items) => {
            for item in items {
                flatten_numbers(item, out)?;
            }
        }
        other => bail!("features must be numbers, found {}", json_type(other)),
    }
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panic during prediction: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panic during prediction: {}", msg)
    } else {
        "panic during prediction".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use ndarray::ArrayView2;
    use serde_json::json;

    use crate::config::ArtifactConfig;
    use crate::engine::{ArtifactCache, ArtifactResolver, Backend, HttpBackendProvider};

    const BUNDLED: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/app/model.json"));

    /// Classifier with a fixed answer
    #[derive(Debug)]
    struct Fixed(usize);

    impl Classifier for Fixed {
        fn n_features(&self) -> usize {
            4
        }
        fn n_classes(&self) -> usize {
            3
        }
        fn describe(&self) -> String {
            "fixed".into()
        }
        fn predict(&self, rows: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
            if rows[[0, 0]] < 0.0 {
                panic!("negative sepal");
            }
            Ok(vec![self.0; rows.nrows()])
        }
    }

    /// Source that counts how often it is touched
    struct FakeSource {
        model: Arc<dyn Classifier>,
        resolves: AtomicUsize,
        preflights: AtomicUsize,
    }

    impl FakeSource {
        fn new(model: Arc<dyn Classifier>) -> Arc<Self> {
            Arc::new(Self {
                model,
                resolves: AtomicUsize::new(0),
                preflights: AtomicUsize::new(0),
            })
        }

        fn touched(&self) -> usize {
            self.resolves.load(Ordering::SeqCst) + self.preflights.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtifactSource for FakeSource {
        async fn cached(&self) -> Option<Arc<dyn Classifier>> {
            None
        }
        fn preflight(&self) -> ServeResult<()> {
            self.preflights.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn resolve(&self, _backend: &Backend) -> ServeResult<Arc<dyn Classifier>> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&self.model))
        }
    }

    struct BrokenProvider;

    impl BackendProvider for BrokenProvider {
        fn init(&self) -> Result<Backend> {
            bail!("native runtime failed to initialize")
        }
    }

    fn fake_handler(class: usize) -> (InferenceHandler, Arc<FakeSource>) {
        let source = FakeSource::new(Arc::new(Fixed(class)));
        let handler = InferenceHandler::new(
            source.clone(),
            Arc::new(HttpBackendProvider::default()),
            LabelSet::default(),
        );
        (handler, source)
    }

    fn local_handler(dir: &Path) -> InferenceHandler {
        let config = ArtifactConfig {
            model_url: None,
            candidates: vec![dir.join("app").join("model.json"), dir.join("model.json")],
            cache_path: dir.join("petal-model.json"),
            download_timeout_secs: 5,
        };
        let resolver =
            ArtifactResolver::new(config, LabelSet::default(), Arc::new(ArtifactCache::new()));
        InferenceHandler::new(
            Arc::new(resolver),
            Arc::new(HttpBackendProvider::default()),
            LabelSet::default(),
        )
    }

    #[tokio::test]
    async fn test_non_post_is_rejected_without_resolving() {
        let (handler, source) = fake_handler(0);
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
            let reply = handler.handle(&method, br#"{"features":[1,2,3,4]}"#).await;
            assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(reply.body, json!({ "error": "Only POST supported" }));
        }
        assert_eq!(source.touched(), 0);
    }

    #[tokio::test]
    async fn test_missing_features_is_bad_request() {
        let (handler, source) = fake_handler(0);
        for body in [&br#"{}"#[..], br#"{"features": null}"#, br#"{"feature": [1,2,3,4]}"#] {
            let reply = handler.handle(&Method::POST, body).await;
            assert_eq!(reply.status, StatusCode::BAD_REQUEST);
            assert_eq!(reply.body["error"], "Missing \"features\" in request body");
        }
        assert_eq!(source.touched(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (handler, _) = fake_handler(0);
        for body in [&b"{\"features\": [1, 2"[..], b"", b"features=1,2,3,4"] {
            let reply = handler.handle(&Method::POST, body).await;
            assert_eq!(reply.status, StatusCode::BAD_REQUEST);
            assert!(reply.body["error"].as_str().unwrap().starts_with("Invalid JSON"));
            assert!(reply.body.get("traceback").is_none());
        }
    }

    #[tokio::test]
    async fn test_non_object_body_is_bad_request() {
        let (handler, _) = fake_handler(0);
        let reply = handler.handle(&Method::POST, b"[5.1, 3.5, 1.4, 0.2]").await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_label_lookup() {
        let (handler, _) = fake_handler(2);
        let reply = handler
            .handle(&Method::POST, br#"{"features":[6.9,3.1,5.4,2.1]}"#)
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, json!({ "predicted_class": "virginica" }));
    }

    #[tokio::test]
    async fn test_out_of_range_class_is_prediction_error() {
        let (handler, _) = fake_handler(7);
        let reply = handler
            .handle(&Method::POST, br#"{"features":[1,2,3,4]}"#)
            .await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(reply.body["traceback"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_features_are_server_errors() {
        let (handler, _) = fake_handler(0);
        for body in [
            &br#"{"features":[1,2,3]}"#[..],
            br#"{"features":[1,2,3,4,5]}"#,
            br#"{"features":["a","b","c","d"]}"#,
            br#"{"features":5.1}"#,
        ] {
            let reply = handler.handle(&Method::POST, body).await;
            assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(reply.body["error"]
                .as_str()
                .unwrap()
                .starts_with("Prediction failed"));
            assert!(reply.body["traceback"].is_string());
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let (handler, _) = fake_handler(0);
        let reply = handler
            .handle(&Method::POST, br#"{"features":[-1,2,3,4]}"#)
            .await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(reply.body["error"]
            .as_str()
            .unwrap()
            .contains("negative sepal"));
    }

    #[tokio::test]
    async fn test_broken_backend_is_dependency_error() {
        let source = FakeSource::new(Arc::new(Fixed(0)));
        let handler =
            InferenceHandler::new(source.clone(), Arc::new(BrokenProvider), LabelSet::default());

        let reply = handler
            .handle(&Method::POST, br#"{"features":[1,2,3,4]}"#)
            .await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(reply.body["error"]
            .as_str()
            .unwrap()
            .contains("native runtime failed"));
        assert_eq!(source.touched(), 0);

        // Validation still runs before the backend is needed.
        let reply = handler.handle(&Method::POST, b"{}").await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_setosa_from_local_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/model.json"), BUNDLED).unwrap();

        let handler = local_handler(dir.path());
        let reply = handler
            .handle(&Method::POST, br#"{"features":[5.1,3.5,1.4,0.2]}"#)
            .await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, json!({ "predicted_class": "setosa" }));
    }

    #[tokio::test]
    async fn test_repeat_requests_use_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, BUNDLED).unwrap();

        let handler = local_handler(dir.path());
        let body = br#"{"features":[6.0,2.9,4.5,1.5]}"#;

        let first = handler.handle(&Method::POST, body).await;
        std::fs::remove_file(&path).unwrap();
        let second = handler.handle(&Method::POST, body).await;

        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(first, second);
        assert_eq!(first.body["predicted_class"], "versicolor");
    }

    #[tokio::test]
    async fn test_no_artifact_names_both_remediations() {
        let dir = tempfile::tempdir().unwrap();
        let handler = local_handler(dir.path());

        let reply = handler
            .handle(&Method::POST, br#"{"features":[5.1,3.5,1.4,0.2]}"#)
            .await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = reply.body["error"].as_str().unwrap();
        assert!(error.contains("MODEL_URL"));
        assert!(error.contains("app"));
        assert!(reply.body["traceback"].is_string());
    }

    #[tokio::test]
    async fn test_unreachable_url_is_download_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        // A bundled file must not mask the remote failure.
        std::fs::write(dir.path().join("model.json"), BUNDLED).unwrap();
        let config = ArtifactConfig {
            model_url: Some(format!("http://127.0.0.1:{}/model.json", port)),
            candidates: vec![dir.path().join("model.json")],
            cache_path: dir.path().join("petal-model.json"),
            download_timeout_secs: 5,
        };
        let resolver =
            ArtifactResolver::new(config, LabelSet::default(), Arc::new(ArtifactCache::new()));
        let handler = InferenceHandler::new(
            Arc::new(resolver),
            Arc::new(HttpBackendProvider::new(Some(std::time::Duration::from_secs(5)))),
            LabelSet::default(),
        );

        let reply = handler
            .handle(&Method::POST, br#"{"features":[5.1,3.5,1.4,0.2]}"#)
            .await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = reply.body["error"].as_str().unwrap();
        assert!(error.contains("download failed"));
        assert!(!error.contains("Failed to load"));
        assert!(reply.body["traceback"].is_string());
        assert!(!dir.path().join("petal-model.json").exists());
    }

    #[test]
    fn test_coerce_features_flattens_single_row() {
        let rows = coerce_features(&json!([[5.1, 3.5, 1.4, 0.2]]), 4).unwrap();
        assert_eq!(rows.shape(), &[1, 4]);
        assert_eq!(rows[[0, 2]], 1.4);
    }

    #[test]
    fn test_coerce_features_accepts_integers() {
        let rows = coerce_features(&json!([5, 3, 1, 0]), 4).unwrap();
        assert_eq!(rows[[0, 0]], 5.0);
    }

    #[test]
    fn test_coerce_features_rejects_bad_types() {
        let err = coerce_features(&json!([1, true, 3, 4]), 4).unwrap_err();
        assert!(err.to_string().contains("a boolean"));
    }

    #[test]
    fn test_decode_request() {
        let req = decode_request(br#"{"features":[1,2,3,4],"extra":true}"#).unwrap();
        assert_eq!(req.features, json!([1, 2, 3, 4]));
        assert!(matches!(
            decode_request(b"\"features\""),
            Err(ServeError::NotAnObject)
        ));
    }
}
