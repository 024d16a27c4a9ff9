//! Artifact format detection

use std::path::Path;

/// Serialization format of an artifact file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Yaml,
}

impl ArtifactFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ArtifactFormat::Json => "JSON",
            ArtifactFormat::Yaml => "YAML",
        }
    }
}

/// Detect the artifact format from a file path
///
/// `.yaml` and `.yml` are YAML. Everything else, including the extension-less
/// download cache, is read as JSON.
pub fn detect_format<P: AsRef<Path>>(path: P) -> ArtifactFormat {
    match path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("yaml") | Some("yml") => ArtifactFormat::Yaml,
        _ => ArtifactFormat::Json,
    }
}
