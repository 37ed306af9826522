use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{tree::TreeError, DecisionTree, Evaluator};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unable to read model description {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("malformed model description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model declares {declared} trees but lists {found}")]
    TreeCount { declared: usize, found: usize },

    #[error("tree {tree} has {found} class entries, expected {expected}")]
    ClassCount {
        tree: usize,
        found: usize,
        expected: usize,
    },

    #[error("init_predict has {found} entries, expected {expected}")]
    InitPredict { found: usize, expected: usize },

    #[error("tree {tree}, class {class}: {source}")]
    Tree {
        tree: usize,
        class: usize,
        source: TreeError,
    },
}

/// Number of class streams a model needs. A binary classifier carries a single score.
pub fn fn_classes(n_classes: usize) -> usize {
    if n_classes == 2 {
        1
    } else {
        n_classes
    }
}

fn default_norm() -> f64 {
    1.0
}

/// A trained tree ensemble as exported by the model converter. `trees[tree][class]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnsembleDescription {
    pub n_classes: usize,
    pub n_features: usize,
    pub n_trees: usize,
    #[serde(default)]
    pub max_depth: usize,
    pub init_predict: Vec<f64>,
    #[serde(default = "default_norm")]
    pub norm: f64,
    pub trees: Vec<Vec<DecisionTree>>,
}

impl EnsembleDescription {
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let description: Self = serde_json::from_str(text)?;
        description.validate()?;
        Ok(description)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Width of the class dimension of the pipeline.
    pub fn class_streams(&self) -> usize {
        fn_classes(self.n_classes)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.trees.len() != self.n_trees {
            return Err(ModelError::TreeCount {
                declared: self.n_trees,
                found: self.trees.len(),
            });
        }
        let expected = self.class_streams();
        if self.init_predict.len() != expected {
            return Err(ModelError::InitPredict {
                found: self.init_predict.len(),
                expected,
            });
        }
        for (tree, classes) in self.trees.iter().enumerate() {
            if classes.len() != expected {
                return Err(ModelError::ClassCount {
                    tree,
                    found: classes.len(),
                    expected,
                });
            }
            for (class, decision_tree) in classes.iter().enumerate() {
                decision_tree
                    .validate(self.n_features)
                    .map_err(|source| ModelError::Tree {
                        tree,
                        class,
                        source,
                    })?;
            }
        }
        Ok(())
    }

    /// One evaluator per slot, in row-major (tree, then class) order.
    pub fn evaluators(&self) -> Vec<Evaluator> {
        self.trees
            .iter()
            .flat_map(|classes| classes.iter().cloned().map(Evaluator::from))
            .collect()
    }

    /// Per-class bias added to the summed tree scores.
    pub fn bias(&self, class: usize) -> f64 {
        self.init_predict.get(class).copied().unwrap_or_default()
    }
}
