//! Prediction results handed back to callers

use modelvault_core::{ClassProbabilities, Error};
use modelvault_features::{LagBlock, Period, Sentiment, ShippingDerived};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShippingPrediction {
    /// Estimated delivery time in days, never negative.
    pub days: f64,
    /// Distance and dispatch values the features were built from.
    #[serde(flatten)]
    pub derived: ShippingDerived,
    pub model_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandPrediction {
    pub period: Period,
    /// Rounded, non-negative units.
    pub quantity: u64,
    /// Unclamped model output.
    pub raw: f64,
    pub model_version: String,
}

/// One month of a forecast. A month whose inference failed keeps its slot
/// with no quantity, and the error says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub period: Period,
    pub quantity: Option<u64>,
    pub raw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ForecastPoint {
    pub(crate) fn predicted(prediction: DemandPrediction) -> Self {
        Self {
            period: prediction.period,
            quantity: Some(prediction.quantity),
            raw: Some(prediction.raw),
            error: None,
        }
    }

    pub(crate) fn failed(period: Period, error: &Error) -> Self {
        Self {
            period,
            quantity: None,
            raw: None,
            error: Some(error.to_string()),
        }
    }
}

/// A multi-month demand forecast. The lag block is the one every month
/// of the horizon was predicted with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandForecast {
    pub points: Vec<ForecastPoint>,
    pub lags: LagBlock,
    pub model_version: String,
}

impl DemandForecast {
    /// Sum over the months that were predicted.
    pub fn total(&self) -> u64 {
        self.points.iter().filter_map(|p| p.quantity).fold(0, u64::saturating_add)
    }

    pub fn failed_months(&self) -> usize {
        self.points.iter().filter(|p| p.quantity.is_none()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentMethod {
    Model,
    KeywordHeuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentPrediction {
    pub sentiment: Sentiment,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub method: SentimentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<ClassProbabilities>,
    /// Text the vectorizer saw; absent for the keyword heuristic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_text: Option<String>,
}
