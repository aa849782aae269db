//! Decision-tree ensembles: random forests and gradient-boosted trees.
//!
//! Trees are stored as flat node arrays. Node 0 is the root and a split's
//! children always sit at higher indices, so evaluation always terminates.

use crate::assembler::FeatureVector;
use crate::error::PredictError;
use crate::models::{check_width, sigmoid, ClassProbabilities, EstimationError, Model};
use serde::{Deserialize, Serialize};

/// How per-tree outputs combine into the positive-class probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Leaves hold class-1 probabilities; the forest averages them.
    AverageProbability,
    /// Leaves hold log-odds contributions summed onto `base_score`.
    SigmoidSum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// `x[feature] <= threshold` goes left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn validate(&self, index: usize, width: usize, aggregation: Aggregation) -> Result<(), PredictError> {
        let invalid = |msg: String| PredictError::invalid_artifact(format!("tree {}: {}", index, msg));

        if self.nodes.is_empty() {
            return Err(invalid("no nodes".to_string()));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= width {
                        return Err(invalid(format!("node {} splits on feature {}", i, feature)));
                    }
                    if !threshold.is_finite() {
                        return Err(invalid(format!("node {} has a non-finite threshold", i)));
                    }
                    for child in [left, right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(invalid(format!("node {} has bad child {}", i, child)));
                        }
                    }
                }
                Node::Leaf { value } => {
                    let ok = match aggregation {
                        Aggregation::AverageProbability => (0.0..=1.0).contains(&value),
                        Aggregation::SigmoidSum => value.is_finite(),
                    };
                    if !ok {
                        return Err(invalid(format!("node {} has leaf value {}", i, value)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk from the root to a leaf. Malformed trees error instead of panicking.
    fn evaluate(&self, row: &[f64]) -> Result<f64, EstimationError> {
        let mut index = 0;
        // A well-formed walk visits each node at most once.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(index) {
                Some(Node::Leaf { value }) => return Ok(*value),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row.get(*feature).ok_or_else(|| {
                        EstimationError::Runtime(format!(
                            "node {} splits on feature {} of a {}-wide row",
                            index,
                            feature,
                            row.len()
                        ))
                    })?;
                    index = if *x <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(EstimationError::Runtime(format!("node {} does not exist", index)))
                }
            }
        }
        Err(EstimationError::Runtime("tree walk never reached a leaf".to_string()))
    }
}

/// Tree ensemble artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub feature_names: Vec<String>,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn validate(&self) -> Result<(), PredictError> {
        if self.feature_names.is_empty() {
            return Err(PredictError::invalid_artifact("tree ensemble has no features"));
        }
        if self.trees.is_empty() {
            return Err(PredictError::invalid_artifact("tree ensemble has no trees"));
        }
        if !self.base_score.is_finite() {
            return Err(PredictError::invalid_artifact("non-finite base score"));
        }
        let width = self.feature_names.len();
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, width, self.aggregation)?;
        }
        Ok(())
    }
}

impl Model for TreeEnsemble {
    fn kind(&self) -> &'static str {
        "tree_ensemble"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, row: &FeatureVector) -> Result<ClassProbabilities, EstimationError> {
        check_width(self.feature_names.len(), row)?;
        if self.trees.is_empty() {
            return Err(EstimationError::Runtime("ensemble has no trees".to_string()));
        }

        let values = row.values();
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.evaluate(values)?;
        }

        let p = match self.aggregation {
            Aggregation::AverageProbability => total / self.trees.len() as f64,
            Aggregation::SigmoidSum => sigmoid(self.base_score + total),
        };
        Ok(ClassProbabilities::binary(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> Tree {
        Tree {
            nodes: vec![
                Node::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                Node::Leaf { value: left },
                Node::Leaf { value: right },
            ],
        }
    }

    fn forest() -> TreeEnsemble {
        TreeEnsemble {
            feature_names: vec!["Fruits".to_string(), "Milk".to_string()],
            aggregation: Aggregation::AverageProbability,
            base_score: 0.0,
            trees: vec![stump(0, 2.5, 0.2, 0.8), stump(1, 0.5, 0.4, 0.6)],
        }
    }

    #[test]
    fn test_random_forest_averages_leaves() {
        let model = forest();
        model.validate().unwrap();

        let low = model.predict_proba(&FeatureVector::new(vec![1.0, 0.0])).unwrap();
        assert!((low.positive().unwrap() - 0.3).abs() < 1e-12);

        let high = model.predict_proba(&FeatureVector::new(vec![3.0, 1.0])).unwrap();
        assert!((high.positive().unwrap() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_boosted_trees_sum_log_odds() {
        let model = TreeEnsemble {
            aggregation: Aggregation::SigmoidSum,
            base_score: -1.0,
            trees: vec![stump(0, 2.5, -0.5, 0.5), stump(1, 0.5, 0.0, 0.5)],
            ..forest()
        };
        model.validate().unwrap();

        // -1.0 + 0.5 + 0.5 = 0 -> 0.5
        let probs = model.predict_proba(&FeatureVector::new(vec![3.0, 1.0])).unwrap();
        assert!((probs.positive().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_inclusive_on_the_left() {
        let model = TreeEnsemble {
            trees: vec![stump(0, 2.0, 0.1, 0.9)],
            ..forest()
        };
        let probs = model.predict_proba(&FeatureVector::new(vec![2.0, 0.0])).unwrap();
        assert!((probs.positive().unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_backward_children() {
        let model = TreeEnsemble {
            trees: vec![Tree {
                nodes: vec![
                    Node::Split {
                        feature: 0,
                        threshold: 1.0,
                        left: 0,
                        right: 1,
                    },
                    Node::Leaf { value: 0.5 },
                ],
            }],
            ..forest()
        };
        assert_eq!(model.validate().unwrap_err().kind(), "invalid_artifact");
    }

    #[test]
    fn test_validate_rejects_probability_leaves_out_of_range() {
        let model = TreeEnsemble {
            trees: vec![stump(0, 1.0, 0.5, 1.5)],
            ..forest()
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_malformed_trees_error_instead_of_panicking() {
        let empty = TreeEnsemble {
            trees: vec![Tree { nodes: Vec::new() }],
            ..forest()
        };
        let wide_split = TreeEnsemble {
            trees: vec![stump(7, 1.0, 0.2, 0.8)],
            ..forest()
        };
        let dangling = TreeEnsemble {
            trees: vec![Tree {
                nodes: vec![Node::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 4,
                    right: 5,
                }],
            }],
            ..forest()
        };
        let cyclic = TreeEnsemble {
            trees: vec![Tree {
                nodes: vec![Node::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 0,
                }],
            }],
            ..forest()
        };

        let row = FeatureVector::new(vec![1.0, 0.0]);
        for model in [empty, wide_split, dangling, cyclic] {
            assert!(matches!(
                model.predict_proba(&row),
                Err(EstimationError::Runtime(_))
            ));
        }
    }

    #[test]
    fn test_unvalidated_ensemble_scores_fallback() {
        use crate::collector::Selections;
        use crate::models::{LoadedModel, Scorer};
        use crate::types::report::FALLBACK_SCORE;
        use std::sync::Arc;

        let broken = TreeEnsemble {
            trees: vec![Tree { nodes: Vec::new() }],
            ..forest()
        };
        let models = vec![LoadedModel::new("Random Forest", "rf.json", Arc::new(broken))];
        let answers: Selections = [("Fruits", 3), ("Milk", 1)].into_iter().collect();

        let results = Scorer::new().score_all(&models, &answers);
        assert_eq!(results[0].score, FALLBACK_SCORE);
        assert_eq!(results[0].fallback.as_ref().unwrap().kind, "estimation_failure");
    }

    #[test]
    fn test_deserialize_nodes() {
        let json = r#"{
            "feature_names": ["Fruits"],
            "aggregation": "average_probability",
            "trees": [{"nodes": [
                {"feature": 0, "threshold": 4.5, "left": 1, "right": 2},
                {"value": 0.1},
                {"value": 0.7}
            ]}]
        }"#;
        let model: TreeEnsemble = serde_json::from_str(json).unwrap();
        assert_eq!(model.base_score, 0.0);
        assert_eq!(model.trees[0].nodes[1], Node::Leaf { value: 0.1 });
        model.validate().unwrap();
    }
}
