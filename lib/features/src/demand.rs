//! Monthly-demand features
//!
//! A demand vector combines calendar features of the target month, product
//! attributes and a lag block summarising past monthly sales. During a
//! multi-month forecast the lag block stays exactly as supplied: predictions
//! are never fed back in as new lags.

use crate::adapter::FeatureAdapter;
use crate::calendar::{month_cos, month_sin, southern_season, Period};
use crate::reference::{CategoryBaseline, CategoryBaselines};
use modelvault_core::FeatureMap;
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-6;
const WINDOWS: [usize; 3] = [3, 6, 12];

/// Lag and rolling statistics of a product's monthly sales.
///
/// Defaults describe a product with no history: statistics are zero and
/// ratio-type features are one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagBlock {
    pub lag_1: f64,
    pub lag_2: f64,
    pub lag_3: f64,
    pub lag_6: f64,
    pub lag_12: f64,
    pub rolling_mean_3: f64,
    pub rolling_std_3: f64,
    pub rolling_mean_6: f64,
    pub rolling_std_6: f64,
    pub rolling_mean_12: f64,
    pub rolling_std_12: f64,
    pub cumulative_sales_past: f64,
    pub cv_3m: f64,
    pub trend_3m: f64,
    pub category_avg_sales: f64,
    pub category_std_sales: f64,
    pub sales_vs_category: f64,
    pub product_age_months: f64,
    pub cumulative_sales: f64,
    pub lifetime_avg_sales: f64,
    pub had_sales_last_year: f64,
    pub sales_vs_lifetime_avg: f64,
}

impl Default for LagBlock {
    fn default() -> Self {
        Self {
            lag_1: 0.0,
            lag_2: 0.0,
            lag_3: 0.0,
            lag_6: 0.0,
            lag_12: 0.0,
            rolling_mean_3: 0.0,
            rolling_std_3: 0.0,
            rolling_mean_6: 0.0,
            rolling_std_6: 0.0,
            rolling_mean_12: 0.0,
            rolling_std_12: 0.0,
            cumulative_sales_past: 0.0,
            cv_3m: 0.0,
            trend_3m: 0.0,
            category_avg_sales: 1.0,
            category_std_sales: 0.0,
            sales_vs_category: 1.0,
            product_age_months: 1.0,
            cumulative_sales: 0.0,
            lifetime_avg_sales: 0.0,
            had_sales_last_year: 0.0,
            sales_vs_lifetime_avg: 1.0,
        }
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

/// Sample standard deviation; zero below two points.
fn sample_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}

/// The last `w` months, if there are that many.
fn tail(xs: &[f64], w: usize) -> Option<&[f64]> {
    xs.len().checked_sub(w).map(|start| &xs[start..])
}

impl LagBlock {
    /// Derive the block from monthly sales, oldest first, the last entry
    /// being the month just before the one to predict.
    pub fn from_history(history: &[f64], baseline: Option<CategoryBaseline>) -> Self {
        let mut block = LagBlock::default();
        if let Some(b) = baseline {
            block.category_avg_sales = b.avg_sales;
            block.category_std_sales = b.std_sales;
        }
        if history.is_empty() {
            return block;
        }

        let n = history.len();
        let lag = |k: usize| if n >= k { history[n - k] } else { 0.0 };
        block.lag_1 = lag(1);
        block.lag_2 = lag(2);
        block.lag_3 = lag(3);
        block.lag_6 = lag(6);
        block.lag_12 = lag(12);

        let rolling: Vec<(f64, f64)> = WINDOWS
            .iter()
            .map(|&w| tail(history, w).map_or((0.0, 0.0), |xs| (mean(xs), sample_std(xs))))
            .collect();
        (block.rolling_mean_3, block.rolling_std_3) = rolling[0];
        (block.rolling_mean_6, block.rolling_std_6) = rolling[1];
        (block.rolling_mean_12, block.rolling_std_12) = rolling[2];

        block.cumulative_sales_past = history.iter().sum();
        block.cumulative_sales = block.cumulative_sales_past;
        block.lifetime_avg_sales = mean(history);
        block.product_age_months = n as f64;

        block.cv_3m = if block.rolling_mean_3 > 0.0 {
            block.rolling_std_3 / (block.rolling_mean_3 + EPS)
        } else {
            0.0
        };
        block.trend_3m = match tail(history, 3) {
            Some(last3) => (last3[2] - last3[0]) / (3.0 + EPS),
            None => 0.0,
        };
        block.sales_vs_category = block.lifetime_avg_sales / (block.category_avg_sales + EPS);
        block.had_sales_last_year = if n >= 12 && history[n - 12] > 0.0 { 1.0 } else { 0.0 };
        block.sales_vs_lifetime_avg = history[n - 1] / (block.lifetime_avg_sales + EPS);
        block
    }

    fn write_into(&self, f: &mut FeatureMap) {
        f.insert("lag_1", self.lag_1);
        f.insert("lag_2", self.lag_2);
        f.insert("lag_3", self.lag_3);
        f.insert("lag_6", self.lag_6);
        f.insert("lag_12", self.lag_12);
        f.insert("rolling_mean_3", self.rolling_mean_3);
        f.insert("rolling_std_3", self.rolling_std_3);
        f.insert("rolling_mean_6", self.rolling_mean_6);
        f.insert("rolling_std_6", self.rolling_std_6);
        f.insert("rolling_mean_12", self.rolling_mean_12);
        f.insert("rolling_std_12", self.rolling_std_12);
        f.insert("cumulative_sales_past", self.cumulative_sales_past);
        f.insert("cv_3m", self.cv_3m);
        f.insert("trend_3m", self.trend_3m);
        f.insert("category_avg_sales", self.category_avg_sales);
        f.insert("category_std_sales", self.category_std_sales);
        f.insert("sales_vs_category", self.sales_vs_category);
        f.insert("product_age_months", self.product_age_months);
        f.insert("cumulative_sales", self.cumulative_sales);
        f.insert("lifetime_avg_sales", self.lifetime_avg_sales);
        f.insert("had_sales_last_year", self.had_sales_last_year);
        f.insert("sales_vs_lifetime_avg", self.sales_vs_lifetime_avg);
        f.insert("rolling3_x_trend", self.rolling_mean_3 * self.trend_3m);
    }
}

/// Product attributes of a demand request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductProfile {
    pub price: Option<f64>,
    pub freight_value: Option<f64>,
    /// Defaults to the price.
    pub payment_value: Option<f64>,
    pub review_score: Option<f64>,
    pub weight_g: Option<f64>,
    pub volume_cm3: Option<f64>,
    pub category: Option<String>,
}

/// Where the lag block of a request comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesHistory {
    #[default]
    Absent,
    /// Monthly quantities, oldest first.
    Monthly(Vec<f64>),
    /// A block precomputed by the caller.
    Block(LagBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandInput {
    pub period: Period,
    #[serde(default)]
    pub product: ProductProfile,
    #[serde(default)]
    pub history: SalesHistory,
}

pub struct DemandAdapter<'a> {
    baselines: &'a CategoryBaselines,
}

impl<'a> DemandAdapter<'a> {
    pub fn new(baselines: &'a CategoryBaselines) -> Self {
        Self { baselines }
    }

    /// Resolve the request's lag block once; a forecast reuses it for
    /// every month of the horizon.
    pub fn lag_block(&self, product: &ProductProfile, history: &SalesHistory) -> LagBlock {
        let baseline = product.category.as_deref().and_then(|c| self.baselines.get(c));
        match history {
            SalesHistory::Absent => LagBlock::from_history(&[], baseline),
            SalesHistory::Monthly(months) => LagBlock::from_history(months, baseline),
            SalesHistory::Block(block) => block.clone(),
        }
    }

    /// Features for one month given an already resolved lag block.
    pub fn compute_with(&self, period: Period, product: &ProductProfile, lags: &LagBlock) -> FeatureMap {
        let mut f = FeatureMap::new();
        let month = period.month;
        f.insert("month", month);
        f.insert("year", period.year);
        f.insert("quarter", period.quarter());
        f.insert("month_sin", month_sin(month));
        f.insert("month_cos", month_cos(month));
        f.insert("season", southern_season(month));
        f.insert("is_black_friday", month == 11);
        f.insert("is_christmas", month == 12);
        f.insert("is_end_year", month == 11 || month == 12);

        let price = product.price.unwrap_or(100.0);
        let freight = product.freight_value.unwrap_or(20.0);
        let weight = product.weight_g.unwrap_or(1000.0);
        let volume = product.volume_cm3.unwrap_or(10000.0);
        f.insert("price", price);
        f.insert("freight_value", freight);
        f.insert("payment_value", product.payment_value.unwrap_or(price));
        f.insert("review_score", product.review_score.unwrap_or(4.0));
        f.insert("product_weight_g", weight);
        f.insert("product_volume_cm3", volume);
        f.insert("product_density", weight / (volume + EPS));
        f.insert("price_freight_ratio", price / (freight + EPS));
        f.insert("price_per_kg", price / (weight / 1000.0 + EPS));

        lags.write_into(&mut f);
        f
    }
}

impl FeatureAdapter for DemandAdapter<'_> {
    type Input = DemandInput;
    type Derived = LagBlock;

    fn compute(&self, input: &DemandInput) -> (FeatureMap, LagBlock) {
        let lags = self.lag_block(&input.product, &input.history);
        (self.compute_with(input.period, &input.product, &lags), lags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelvault_core::FeatureSchema;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_empty_history_defaults() {
        let block = LagBlock::from_history(&[], None);
        assert_eq!(block, LagBlock::default());
        assert_eq!(block.sales_vs_category, 1.0);
        assert_eq!(block.sales_vs_lifetime_avg, 1.0);
        assert_eq!(block.lag_1, 0.0);
    }

    #[test]
    fn test_short_history() {
        let block = LagBlock::from_history(&[4.0, 6.0], None);
        assert_eq!(block.lag_1, 6.0);
        assert_eq!(block.lag_2, 4.0);
        assert_eq!(block.lag_3, 0.0);
        assert_eq!(block.rolling_mean_3, 0.0);
        assert_eq!(block.trend_3m, 0.0);
        assert_eq!(block.product_age_months, 2.0);
        assert!(close(block.lifetime_avg_sales, 5.0));
        assert!(close(block.sales_vs_lifetime_avg, 1.2));
    }

    #[test]
    fn test_full_year_history() {
        let history: Vec<f64> = (1..=12).map(f64::from).collect();
        let block = LagBlock::from_history(&history, Some(CategoryBaseline { avg_sales: 5.0, std_sales: 2.0 }));
        assert_eq!(block.lag_1, 12.0);
        assert_eq!(block.lag_12, 1.0);
        assert!(close(block.rolling_mean_3, 11.0));
        assert!(close(block.rolling_std_3, 1.0));
        assert!(close(block.trend_3m, 2.0 / 3.0));
        assert!(close(block.cv_3m, 1.0 / 11.0));
        assert_eq!(block.cumulative_sales_past, 78.0);
        assert_eq!(block.had_sales_last_year, 1.0);
        assert!(close(block.sales_vs_category, 6.5 / 5.0));
        assert_eq!(block.category_std_sales, 2.0);
    }

    #[test]
    fn test_temporal_and_ratio_features() {
        let baselines = CategoryBaselines::default();
        let adapter = DemandAdapter::new(&baselines);
        let input = DemandInput {
            period: Period::new(2024, 11).unwrap(),
            product: ProductProfile {
                price: Some(50.0),
                weight_g: Some(2000.0),
                ..Default::default()
            },
            history: SalesHistory::Absent,
        };
        let (f, _) = adapter.compute(&input);
        assert_eq!(f.number("quarter"), Some(4.0));
        assert_eq!(f.number("season"), Some(3.0));
        assert_eq!(f.number("is_black_friday"), Some(1.0));
        assert_eq!(f.number("is_christmas"), Some(0.0));
        assert_eq!(f.number("is_end_year"), Some(1.0));
        assert_eq!(f.number("payment_value"), Some(50.0));
        assert!(close(f.number("price_per_kg").unwrap(), 25.0));
        assert!(close(f.number("product_density").unwrap(), 0.2));
        assert_eq!(f.number("rolling3_x_trend"), Some(0.0));
    }

    #[test]
    fn test_lag_block_is_period_independent() {
        let baselines = CategoryBaselines::default();
        let adapter = DemandAdapter::new(&baselines);
        let product = ProductProfile::default();
        let lags = adapter.lag_block(&product, &SalesHistory::Monthly(vec![3.0, 5.0, 8.0]));
        let schema = FeatureSchema::numeric(["lag_1", "rolling_mean_3", "month"]);

        let start = Period::new(2024, 12).unwrap();
        let first = schema.conform(adapter.compute_with(start, &product, &lags));
        let second = schema.conform(adapter.compute_with(start.next().unwrap(), &product, &lags));
        assert_eq!(first.get("lag_1"), second.get("lag_1"));
        assert_eq!(first.get("rolling_mean_3"), second.get("rolling_mean_3"));
        assert_ne!(first.get("month"), second.get("month"));
    }

    #[test]
    fn test_input_deserializes_with_history_variants() {
        let json = r#"{"period": {"year": 2024, "month": 5}, "history": {"monthly": [1, 2, 3]}}"#;
        let input: DemandInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.history, SalesHistory::Monthly(vec![1.0, 2.0, 3.0]));
        assert_eq!(input.product, ProductProfile::default());
    }

    #[test]
    fn test_input_rejects_out_of_range_month() {
        for month in [0, 13] {
            let json = format!(r#"{{"period": {{"year": 2018, "month": {}}}}}"#, month);
            assert!(serde_json::from_str::<DemandInput>(&json).is_err(), "month {}", month);
        }
    }
}
