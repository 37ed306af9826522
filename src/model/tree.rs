use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::TreeEvaluator;
use crate::packet::Score;

/// Marks a leaf in `children_left`/`children_right`.
const LEAF: i64 = -1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree has no nodes")]
    Empty,

    #[error("field `{field}` has {len} entries, expected {expected}")]
    Length {
        field: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("node {node} has child {child}, which is not a later node")]
    BadChild { node: usize, child: i64 },

    #[error("node {node} splits on feature {feature}, but only {n_features} features exist")]
    BadFeature {
        node: usize,
        feature: i64,
        n_features: usize,
    },
}

/// A binary decision tree in flattened array form. Node 0 is the root.
/// Internal nodes send `x[feature] <= threshold` to the left child.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Vec<i64>>,
}

impl DecisionTree {
    /// A single split on `feature` with two leaves.
    pub fn stump(feature: usize, threshold: f64, left: Score, right: Score) -> Self {
        Self {
            feature: vec![feature as i64, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![0.0, left, right],
            children_left: vec![1, LEAF, LEAF],
            children_right: vec![2, LEAF, LEAF],
            parent: Some(vec![-1, 0, 0]),
        }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Checks array shapes and links so that walking the tree always ends on a leaf.
    pub fn validate(&self, n_features: usize) -> Result<(), TreeError> {
        let nodes = self.len();
        if nodes == 0 {
            return Err(TreeError::Empty);
        }
        let lengths = [
            ("feature", self.feature.len()),
            ("threshold", self.threshold.len()),
            ("children_left", self.children_left.len()),
            ("children_right", self.children_right.len()),
        ];
        for (field, len) in lengths
            .into_iter()
            .chain(self.parent.as_ref().map(|parent| ("parent", parent.len())))
        {
            if len != nodes {
                return Err(TreeError::Length {
                    field,
                    len,
                    expected: nodes,
                });
            }
        }

        for node in 0..nodes {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == LEAF && right == LEAF {
                continue;
            }
            for child in [left, right] {
                if child <= node as i64 || child >= nodes as i64 {
                    return Err(TreeError::BadChild { node, child });
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(TreeError::BadFeature {
                    node,
                    feature,
                    n_features,
                });
            }
        }
        Ok(())
    }
}

impl TreeEvaluator for DecisionTree {
    /// Expects a validated tree. A missing feature compares as `NaN` and therefore goes right.
    fn evaluate(&self, features: &[f64]) -> Score {
        let mut node = 0;
        while let (Some(&left), Some(&right)) =
            (self.children_left.get(node), self.children_right.get(node))
        {
            if left == LEAF {
                break;
            }
            let x = usize::try_from(self.feature[node])
                .ok()
                .and_then(|feature| features.get(feature))
                .copied()
                .unwrap_or(f64::NAN);
            node = if x <= self.threshold[node] {
                left as usize
            } else {
                right as usize
            };
        }
        self.value.get(node).copied().unwrap_or(f64::NAN)
    }
}
