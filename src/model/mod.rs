//! Classifier abstraction and label mapping.
//!
//! [`Classifier`] is what the loader produces and the handler consumes.
//! [`LabelSet`] turns class indices into names.

mod forest;

pub use forest::{DecisionTree, ForestClassifier, Node};

use std::fmt;

use anyhow::{anyhow, ensure, Result};
use ndarray::ArrayView2;

/// A trained classifier loaded from an artifact
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Number of columns each input row must have
    fn n_features(&self) -> usize;

    /// Number of classes the model can output
    fn n_classes(&self) -> usize;

    /// Class names recorded in the artifact, if any
    fn class_names(&self) -> Option<&[String]> {
        None
    }

    /// One-line human-readable summary
    fn describe(&self) -> String;

    /// Predict one class index per row
    fn predict(&self, rows: ArrayView2<'_, f64>) -> Result<Vec<usize>>;
}

/// Ordered class names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    /// Name of a class index
    pub fn label(&self, index: usize) -> Result<&str> {
        self.labels
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("class index {} has no label ({} known)", index, self.len()))
    }

    /// Check that a classifier's classes line up with this label set
    ///
    /// The model must not emit more classes than there are labels. When the
    /// artifact records its own class names they must match exactly, in
    /// order.
    pub fn check_compatible(&self, model: &dyn Classifier) -> Result<()> {
        ensure!(
            model.n_classes() <= self.len(),
            "model has {} classes but only {} labels are configured",
            model.n_classes(),
            self.len()
        );

        if let Some(names) = model.class_names() {
            ensure!(
                names == self.labels.as_slice(),
                "artifact class order [{}] does not match labels [{}]",
                names.join(", "),
                self.labels.join(", ")
            );
        }

        Ok(())
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LABELS)
    }
}
