//! Tree evaluation and per-class aggregation: the stages that sit between the router fabric's stream ends.

mod description;
mod tree;
mod unit;
mod voting;

use enum_dispatch::enum_dispatch;

use crate::packet::Score;

pub use description::{fn_classes, EnsembleDescription, ModelError};
pub use tree::{DecisionTree, TreeError};
pub use unit::TreeUnitContext;
pub use voting::VotingStation;

/// Anything that turns one feature vector into one score.
#[enum_dispatch]
pub trait TreeEvaluator {
    fn evaluate(&self, features: &[f64]) -> Score;
}

/// Always produces the same score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantScore(pub Score);

impl TreeEvaluator for ConstantScore {
    fn evaluate(&self, _features: &[f64]) -> Score {
        self.0
    }
}

/// Scales a single feature. Reads as `NaN` when the feature is missing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureWeight {
    pub feature: usize,
    pub weight: f64,
}

impl TreeEvaluator for FeatureWeight {
    fn evaluate(&self, features: &[f64]) -> Score {
        features
            .get(self.feature)
            .map_or(f64::NAN, |value| value * self.weight)
    }
}

#[enum_dispatch(TreeEvaluator)]
#[derive(Clone, Debug)]
pub enum Evaluator {
    DecisionTree,
    ConstantScore,
    FeatureWeight,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_reaches_each_variant() {
        let evaluators: Vec<Evaluator> = vec![
            ConstantScore(0.5).into(),
            FeatureWeight {
                feature: 1,
                weight: 2.0,
            }
            .into(),
            DecisionTree::stump(0, 1.0, -1.0, 1.0).into(),
        ];
        let scores: Vec<_> = evaluators
            .iter()
            .map(|evaluator| evaluator.evaluate(&[3.0, 4.0]))
            .collect();
        assert_eq!(scores, vec![0.5, 8.0, 1.0]);
    }

    #[test]
    fn missing_feature_scores_nan() {
        let weight = FeatureWeight {
            feature: 9,
            weight: 1.0,
        };
        assert!(weight.evaluate(&[1.0]).is_nan());
    }
}
