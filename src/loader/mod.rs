//! Artifact loading
//!
//! Reads a classifier artifact from disk, picks the decoder by file
//! extension, and validates the result before handing it out.

mod detect;

pub use detect::{detect_format, ArtifactFormat};

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::model::{Classifier, ForestClassifier};

/// Summary of an artifact file, for display
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub format: ArtifactFormat,
    pub file_size_bytes: u64,
    pub n_trees: usize,
    pub n_features: usize,
    pub n_classes: usize,
    pub class_names: Option<Vec<String>>,
}

/// Decode and validate a forest from raw bytes
pub fn decode_forest(bytes: &[u8], format: ArtifactFormat) -> Result<ForestClassifier> {
    let forest: ForestClassifier = match format {
        ArtifactFormat::Json => {
            serde_json::from_slice(bytes).context("artifact is not a valid JSON forest")?
        }
        ArtifactFormat::Yaml => {
            serde_yaml::from_slice(bytes).context("artifact is not a valid YAML forest")?
        }
    };
    forest.validate().context("artifact failed validation")?;
    Ok(forest)
}

/// Read a forest artifact from disk
pub fn read_forest<P: AsRef<Path>>(path: P) -> Result<ForestClassifier> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    decode_forest(&bytes, detect_format(path))
}

/// Load an artifact as a shareable classifier
pub fn load_artifact<P: AsRef<Path>>(path: P) -> Result<Arc<dyn Classifier>> {
    let path = path.as_ref();
    let forest = read_forest(path)?;
    tracing::debug!("Loaded {} from {}", forest.describe(), path.display());
    Ok(Arc::new(forest))
}

/// Describe an artifact without keeping it loaded
pub fn get_artifact_info<P: AsRef<Path>>(path: P) -> Result<ArtifactInfo> {
    let path = path.as_ref();
    let file_size_bytes = std::fs::metadata(path)
        .with_context(|| format!("reading {}", path.display()))?
        .len();
    let forest = read_forest(path)?;

    Ok(ArtifactInfo {
        format: detect_format(path),
        file_size_bytes,
        n_trees: forest.trees.len(),
        n_features: forest.n_features,
        n_classes: forest.n_classes,
        class_names: forest.class_names,
    })
}
