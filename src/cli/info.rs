//! Model info command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::config::PetalConfig;
use crate::engine::{ArtifactCache, ArtifactResolver};
use crate::loader::get_artifact_info;
use crate::model::LabelSet;

/// Show artifact information
pub async fn info(config: PetalConfig, path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => find_artifact(&config)?,
    };

    let info = get_artifact_info(&path)?;

    println!("Path: {}", path.display());
    println!("Format: {}\n", info.format.name());
    println!("Configuration:");
    println!("  Trees: {}", info.n_trees);
    println!("  Features: {}", info.n_features);
    println!("  Classes: {}", info.n_classes);

    let labels = LabelSet::new(config.labels.iter().cloned());
    match &info.class_names {
        Some(names) if names.as_slice() == labels.as_slice() => {
            println!("  Class names: {} (match labels)", names.join(", "));
        }
        Some(names) => {
            println!(
                "  Class names: {} (MISMATCH, labels are {})",
                names.join(", "),
                labels.as_slice().join(", ")
            );
        }
        None => {
            println!("  Class names: not recorded; assuming {}", labels.as_slice().join(", "));
        }
    }

    let size_kb = info.file_size_bytes as f64 / 1024.0;
    println!("\nFile size: {:.1} KB", size_kb);

    Ok(())
}

/// The file the server would load, without loading it
fn find_artifact(config: &PetalConfig) -> Result<PathBuf> {
    let resolver = ArtifactResolver::new(
        config.artifact.clone(),
        LabelSet::new(config.labels.iter().cloned()),
        Arc::new(ArtifactCache::new()),
    );

    if resolver.config().remote_url().is_some() {
        let cached = &resolver.config().cache_path;
        if cached.exists() {
            return Ok(cached.clone());
        }
        return Err(anyhow!(
            "MODEL_URL is set but nothing is downloaded yet; run `petal pull` first"
        ));
    }

    Ok(resolver.local_source()?)
}
