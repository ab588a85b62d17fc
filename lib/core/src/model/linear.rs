use super::{Inference, Predictor};
use crate::error::{Error, Result};
use crate::schema::{FeatureKind, FeatureSchema, FeatureValue, FeatureVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Linear regression with one-hot weights for categorical slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub intercept: f64,
    /// Weight per numeric feature name.
    #[serde(default)]
    pub coefficients: BTreeMap<String, f64>,
    /// `feature -> category value -> weight`; unseen values weigh zero.
    #[serde(default)]
    pub categorical: BTreeMap<String, BTreeMap<String, f64>>,
}

impl LinearModel {
    pub(crate) fn validate(&self, schema: &FeatureSchema) -> std::result::Result<(), String> {
        for name in self.coefficients.keys() {
            match schema.slots().iter().find(|s| &s.name == name) {
                Some(slot) if slot.kind == FeatureKind::Numeric => {}
                Some(_) => return Err(format!("coefficient for categorical feature '{}'", name)),
                None => return Err(format!("coefficient for undeclared feature '{}'", name)),
            }
        }
        for name in self.categorical.keys() {
            match schema.slots().iter().find(|s| &s.name == name) {
                Some(slot) if slot.kind == FeatureKind::Categorical => {}
                Some(_) => return Err(format!("one-hot weights for numeric feature '{}'", name)),
                None => return Err(format!("one-hot weights for undeclared feature '{}'", name)),
            }
        }
        Ok(())
    }
}

impl Predictor for LinearModel {
    fn infer(&self, features: &FeatureVector) -> Result<Inference> {
        let mut total = self.intercept;
        for (name, value) in features.names().zip(features.values()) {
            match value {
                FeatureValue::Number(v) => {
                    if let Some(w) = self.coefficients.get(name) {
                        total += w * v;
                    }
                }
                FeatureValue::Category(c) => {
                    if let Some(w) = self.categorical.get(name).and_then(|m| m.get(c)) {
                        total += w;
                    }
                }
            }
        }
        if !total.is_finite() {
            return Err(Error::InferenceFailure("linear model produced a non-finite value".into()));
        }
        Ok(Inference::Value(total))
    }
}
