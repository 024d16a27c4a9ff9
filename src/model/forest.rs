//! Tree-ensemble classifier
//!
//! The on-disk artifact is a forest of binary decision trees stored as flat
//! node arrays. Children always follow their parent in the array, which
//! makes traversal terminate without a visited set.
//!
//! # Artifact format
//!
//! ```json
//! {
//!   "n_features": 4,
//!   "n_classes": 3,
//!   "class_names": ["setosa", "versicolor", "virginica"],
//!   "trees": [
//!     { "nodes": [
//!         { "type": "split", "feature": 2, "threshold": 2.45, "left": 1, "right": 2 },
//!         { "type": "leaf", "value": [50, 0, 0] },
//!         { "type": "leaf", "value": [0, 50, 50] }
//!     ] }
//!   ]
//! }
//! ```
//!
//! - `class_names` is optional; when present it must equal the configured labels.
//! - Node 0 is the root. `split` sends a row left when
//!   `row[feature] <= threshold`, right otherwise.
//! - `left` and `right` index into the same `nodes` array and must be
//!   greater than the split's own index.
//! - A `leaf` holds one non-negative weight per class (sample counts or
//!   probabilities).
//!
//! This is a direct dump of a fitted scikit-learn `RandomForestClassifier`:
//! for each estimator walk `tree_.feature`, `tree_.threshold`,
//! `tree_.children_left`, `tree_.children_right` and `tree_.value`, emitting
//! a `leaf` where `children_left == -1`. sklearn's pre-order numbering
//! already places children after their parent. The same document in YAML is
//! accepted for `.yaml`/`.yml` files.

use anyhow::{anyhow, bail, ensure, Result};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::Classifier;

/// A single node of a decision tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Go left when `row[feature] <= threshold`, right otherwise
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Per-class weights (sample counts or probabilities)
    Leaf { value: Vec<f64> },
}

/// Decision tree; node 0 is the root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    /// Walk from the root to a leaf and return its weights
    fn leaf_for(&self, row: ArrayView1<'_, f64>) -> Result<&[f64]> {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Leaf { value }) => return Ok(value.as_slice()),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row
                        .get(*feature)
                        .ok_or_else(|| anyhow!("feature {} out of range", feature))?;
                    index = if *x <= *threshold { *left } else { *right };
                }
                None => bail!("node {} does not exist", index),
            }
        }
    }

    fn validate(&self, n_features: usize, n_classes: usize) -> Result<()> {
        ensure!(!self.nodes.is_empty(), "tree has no nodes");

        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    ensure!(
                        *feature < n_features,
                        "node {}: feature {} >= n_features {}",
                        i,
                        feature,
                        n_features
                    );
                    ensure!(threshold.is_finite(), "node {}: non-finite threshold", i);
                    for child in [left, right] {
                        ensure!(
                            *child > i && *child < self.nodes.len(),
                            "node {}: child {} out of order or out of range",
                            i,
                            child
                        );
                    }
                }
                Node::Leaf { value } => {
                    ensure!(
                        value.len() == n_classes,
                        "node {}: leaf has {} class weights, expected {}",
                        i,
                        value.len(),
                        n_classes
                    );
                    ensure!(
                        value.iter().all(|w| w.is_finite() && *w >= 0.0),
                        "node {}: leaf weights must be finite and non-negative",
                        i
                    );
                }
            }
        }

        Ok(())
    }
}

/// Random-forest style classifier
///
/// Leaf weights of every tree are normalized to a distribution, averaged
/// across trees, and the class with the highest mean wins. Ties go to the
/// lowest class index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestClassifier {
    pub n_features: usize,
    pub n_classes: usize,
    /// Class names in index order, if the producer recorded them
    #[serde(default)]
    pub class_names: Option<Vec<String>>,
    pub trees: Vec<DecisionTree>,
}

impl ForestClassifier {
    /// Check structural invariants after deserialization
    pub fn validate(&self) -> Result<()> {
        ensure!(self.n_features > 0, "n_features must be positive");
        ensure!(self.n_classes > 0, "n_classes must be positive");
        ensure!(!self.trees.is_empty(), "forest has no trees");

        if let Some(names) = &self.class_names {
            ensure!(
                names.len() == self.n_classes,
                "{} class names for {} classes",
                names.len(),
                self.n_classes
            );
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.n_classes)
                .map_err(|e| e.context(format!("tree {}", i)))?;
        }

        Ok(())
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> Result<usize> {
        let mut mean = vec![0.0f64; self.n_classes];

        for tree in &self.trees {
            let leaf = tree.leaf_for(row)?;
            let total: f64 = leaf.iter().sum();
            if total > 0.0 {
                for (acc, w) in mean.iter_mut().zip(leaf) {
                    *acc += w / total;
                }
            }
        }

        let mut best = 0;
        for (class, score) in mean.iter().enumerate() {
            if *score > mean[best] {
                best = class;
            }
        }
        Ok(best)
    }
}

impl Classifier for ForestClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn class_names(&self) -> Option<&[String]> {
        self.class_names.as_deref()
    }

    fn describe(&self) -> String {
        format!(
            "forest ({} trees, {} features, {} classes)",
            self.trees.len(),
            self.n_features,
            self.n_classes
        )
    }

    fn predict(&self, rows: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        ensure!(
            rows.ncols() == self.n_features,
            "expected {} features per row, got {}",
            self.n_features,
            rows.ncols()
        );
        ensure!(
            rows.iter().all(|x| x.is_finite()),
            "feature values must be finite"
        );

        rows.rows()
            .into_iter()
            .map(|row| self.predict_row(row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump() -> ForestClassifier {
        ForestClassifier {
            n_features: 2,
            n_classes: 2,
            class_names: None,
            trees: vec![DecisionTree {
                nodes: vec![
                    Node::Split {
                        feature: 0,
                        threshold: 1.0,
                        left: 1,
                        right: 2,
                    },
                    Node::Leaf {
                        value: vec![10.0, 0.0],
                    },
                    Node::Leaf {
                        value: vec![1.0, 9.0],
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_split_goes_left_on_equal() {
        let model = stump();
        model.validate().unwrap();
        let preds = model.predict(array![[1.0, 0.0], [1.5, 0.0]].view()).unwrap();
        assert_eq!(preds, vec![0, 1]);
    }

    #[test]
    fn test_votes_are_averaged_across_trees() {
        let mut model = stump();
        // Second tree strongly prefers class 0 everywhere.
        model.trees.push(DecisionTree {
            nodes: vec![Node::Leaf {
                value: vec![100.0, 0.0],
            }],
        });
        // Tree 1 gives [0.1, 0.9], tree 2 gives [1.0, 0.0].
        let preds = model.predict(array![[2.0, 0.0]].view()).unwrap();
        assert_eq!(preds, vec![0]);
    }

    #[test]
    fn test_ties_pick_lowest_index() {
        let model = ForestClassifier {
            n_features: 1,
            n_classes: 3,
            class_names: None,
            trees: vec![DecisionTree {
                nodes: vec![Node::Leaf {
                    value: vec![0.0, 5.0, 5.0],
                }],
            }],
        };
        assert_eq!(model.predict(array![[0.0]].view()).unwrap(), vec![1]);
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let model = stump();
        let err = model.predict(array![[1.0, 2.0, 3.0]].view()).unwrap_err();
        assert!(err.to_string().contains("expected 2 features"));
    }

    #[test]
    fn test_nan_is_rejected() {
        let model = stump();
        assert!(model.predict(array![[f64::NAN, 0.0]].view()).is_err());
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let mut model = stump();
        model.trees[0].nodes[0] = Node::Split {
            feature: 0,
            threshold: 1.0,
            left: 0,
            right: 2,
        };
        let err = model.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("out of order"));
    }

    #[test]
    fn test_validate_rejects_leaf_width() {
        let mut model = stump();
        model.trees[0].nodes[1] = Node::Leaf {
            value: vec![1.0, 2.0, 3.0],
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_documented_format_decodes() {
        let json = r#"{
            "n_features": 4,
            "n_classes": 3,
            "class_names": ["setosa", "versicolor", "virginica"],
            "trees": [
                { "nodes": [
                    { "type": "split", "feature": 2, "threshold": 2.45, "left": 1, "right": 2 },
                    { "type": "leaf", "value": [50, 0, 0] },
                    { "type": "leaf", "value": [0, 50, 50] }
                ] }
            ]
        }"#;
        let model: ForestClassifier = serde_json::from_str(json).unwrap();
        model.validate().unwrap();
        assert_eq!(
            model.predict(array![[5.1, 3.5, 1.4, 0.2]].view()).unwrap(),
            vec![0]
        );
    }

    #[test]
    fn test_validate_rejects_class_name_count() {
        let mut model = stump();
        model.class_names = Some(vec!["only-one".into()]);
        assert!(model.validate().is_err());
    }
}
