//! Gradient-boosted regression trees
//!
//! Trees are stored as flat node arrays rooted at index 0. Children always
//! sit at higher indices than their parent, which keeps traversal bounded.

use super::{Explainable, Inference, Predictor};
use crate::error::{Error, Result};
use crate::schema::{FeatureKind, FeatureSchema, FeatureValue, FeatureVector};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Go left when `x < threshold`; NaN goes left.
    Numeric {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        gain: f64,
    },
    /// Go left when the category is one of `values`.
    Categorical {
        feature: usize,
        values: Vec<String>,
        left: usize,
        right: usize,
        #[serde(default)]
        gain: f64,
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
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let mut idx = 0usize;
        loop {
            let node = self
                .nodes
                .get(idx)
                .ok_or_else(|| Error::InferenceFailure(format!("dangling node index {}", idx)))?;
            idx = match node {
                Node::Leaf { value } => return Ok(*value),
                Node::Numeric { feature, threshold, left, right, .. } => {
                    match features.at(*feature) {
                        Some(FeatureValue::Number(x)) => {
                            if x.is_nan() || *x < *threshold { *left } else { *right }
                        }
                        Some(FeatureValue::Category(_)) => {
                            return Err(Error::InferenceFailure(format!(
                                "numeric split on categorical feature #{}",
                                feature
                            )))
                        }
                        None => return Err(Error::SchemaMismatch { expected: feature + 1, actual: features.len() }),
                    }
                }
                Node::Categorical { feature, values, left, right, .. } => {
                    match features.at(*feature) {
                        Some(FeatureValue::Category(c)) => {
                            if values.iter().any(|v| v == c) { *left } else { *right }
                        }
                        Some(FeatureValue::Number(_)) => {
                            return Err(Error::InferenceFailure(format!(
                                "categorical split on numeric feature #{}",
                                feature
                            )))
                        }
                        None => return Err(Error::SchemaMismatch { expected: feature + 1, actual: features.len() }),
                    }
                }
            };
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub(crate) fn validate(&self, schema: &FeatureSchema) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("tree ensemble has no trees".to_string());
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(format!("tree {} has no nodes", t));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                let (feature, left, right, expected) = match node {
                    Node::Leaf { value } => {
                        if !value.is_finite() {
                            return Err(format!("tree {} node {}: non-finite leaf", t, i));
                        }
                        continue;
                    }
                    Node::Numeric { feature, left, right, .. } => (*feature, *left, *right, FeatureKind::Numeric),
                    Node::Categorical { feature, left, right, .. } => (*feature, *left, *right, FeatureKind::Categorical),
                };
                let slot = schema
                    .slots()
                    .get(feature)
                    .ok_or_else(|| format!("tree {} node {}: feature #{} outside schema", t, i, feature))?;
                if slot.kind != expected {
                    return Err(format!("tree {} node {}: split kind does not match '{}'", t, i, slot.name));
                }
                for child in [left, right] {
                    if child <= i || child >= tree.nodes.len() {
                        return Err(format!("tree {} node {}: invalid child {}", t, i, child));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Predictor for TreeEnsemble {
    fn infer(&self, features: &FeatureVector) -> Result<Inference> {
        let mut total = self.base_score;
        for tree in &self.trees {
            total += tree.predict(features)?;
        }
        if !total.is_finite() {
            return Err(Error::InferenceFailure("tree ensemble produced a non-finite value".into()));
        }
        Ok(Inference::Value(total))
    }

    fn as_explainable(&self) -> Option<&dyn Explainable> {
        Some(self)
    }
}

impl Explainable for TreeEnsemble {
    /// Total split gain per feature; split counts when no gains were recorded.
    fn feature_importances(&self, schema: &FeatureSchema) -> Vec<(String, f64)> {
        let mut gains = vec![0.0f64; schema.len()];
        let mut counts = vec![0.0f64; schema.len()];
        for node in self.trees.iter().flat_map(|t| t.nodes.iter()) {
            let (feature, gain) = match node {
                Node::Numeric { feature, gain, .. } | Node::Categorical { feature, gain, .. } => (*feature, *gain),
                Node::Leaf { .. } => continue,
            };
            if feature < gains.len() {
                gains[feature] += gain.max(0.0);
                counts[feature] += 1.0;
            }
        }
        let weights = if gains.iter().sum::<f64>() > 0.0 { gains } else { counts };
        let total: f64 = weights.iter().sum();

        let mut ranked: Vec<(String, f64)> = schema
            .names()
            .zip(weights)
            .map(|(name, w)| (name.to_string(), if total > 0.0 { w / total } else { 0.0 }))
            .collect();
        ranked.sort_by_key(|(name, w)| (std::cmp::Reverse(OrderedFloat(*w)), name.clone()));
        ranked
    }
}
