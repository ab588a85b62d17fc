use super::{ClassProbabilities, Inference, Predictor};
use crate::error::{Error, Result};
use crate::schema::{FeatureSchema, FeatureVector};
use serde::{Deserialize, Serialize};

/// Multinomial logistic regression over a dense numeric vector.
///
/// A binary model may carry a single coefficient row scoring the second
/// class, the way most trainers export it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub classes: Vec<String>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LogisticModel {
    fn is_binary_single_row(&self) -> bool {
        self.classes.len() == 2 && self.coefficients.len() == 1
    }

    pub(crate) fn validate(&self, schema: &FeatureSchema) -> std::result::Result<(), String> {
        if self.classes.len() < 2 {
            return Err("logistic model needs at least two classes".to_string());
        }
        if self.coefficients.len() != self.classes.len() && !self.is_binary_single_row() {
            return Err(format!(
                "{} coefficient rows for {} classes",
                self.coefficients.len(),
                self.classes.len()
            ));
        }
        if self.intercepts.len() != self.coefficients.len() {
            return Err("intercept count does not match coefficient rows".to_string());
        }
        if let Some(row) = self.coefficients.iter().find(|r| r.len() != schema.len()) {
            return Err(format!("coefficient row of width {} for {} features", row.len(), schema.len()));
        }
        Ok(())
    }

    fn logits(&self, x: &[f64]) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(self.intercepts.iter())
            .map(|(row, b)| row.iter().zip(x.iter()).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect()
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl Predictor for LogisticModel {
    fn infer(&self, features: &FeatureVector) -> Result<Inference> {
        let x = features.to_dense()?;
        if let Some(row) = self.coefficients.first() {
            if row.len() != x.len() {
                return Err(Error::SchemaMismatch { expected: row.len(), actual: x.len() });
            }
        }
        let logits = self.logits(&x);
        let probabilities = if self.is_binary_single_row() {
            let p = 1.0 / (1.0 + (-logits[0]).exp());
            vec![1.0 - p, p]
        } else {
            softmax(&logits)
        };
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(Error::InferenceFailure("logistic model produced a non-finite probability".into()));
        }
        Ok(Inference::Classes(ClassProbabilities {
            classes: self.classes.clone(),
            probabilities,
        }))
    }
}
