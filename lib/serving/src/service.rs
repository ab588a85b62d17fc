//! Prediction orchestration
//!
//! Every call resolves the task's active artifact from the store, builds the
//! feature vector against that artifact's schema, runs inference and clamps
//! the output to its valid domain. Reference tables are read from one
//! snapshot per call, so a concurrent refresh never mixes two versions.

use crate::reference::ReferenceSet;
use crate::result::{
    DemandForecast, DemandPrediction, ForecastPoint, SentimentMethod, SentimentPrediction, ShippingPrediction,
};
use modelvault_core::{
    Error, FallbackChain, FeatureVector, Inference, ModelArtifact, Result, TaskType, Vector,
};
use modelvault_features::{
    keyword_sentiment, BasicNormalizer, DemandAdapter, DemandInput, FeatureAdapter, Period,
    ProductProfile, SalesHistory, Sentiment, SentimentAdapter, ShippingAdapter, ShippingInput,
    TextNormalizer,
};
use modelvault_similarity::{CatalogItem, CatalogQuery, CategoryStats, Recommendations, SimilarityIndex};
use modelvault_storage::{ArtifactStore, Lookup, ModelStatus};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct PredictionService {
    store: Arc<ArtifactStore>,
    reference: RwLock<Arc<ReferenceSet>>,
    normalizer: Box<dyn TextNormalizer>,
}

impl PredictionService {
    pub fn new(store: Arc<ArtifactStore>, reference: ReferenceSet) -> Self {
        Self {
            store,
            reference: RwLock::new(Arc::new(reference)),
            normalizer: Box::new(BasicNormalizer::default()),
        }
    }

    /// Swap the review-text normalizer used before vectorizing.
    pub fn with_normalizer(mut self, normalizer: Box<dyn TextNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// The current reference snapshot.
    pub fn reference(&self) -> Arc<ReferenceSet> {
        self.reference.read().clone()
    }

    /// Reload reference tables from `dir`. On error the previous snapshot
    /// stays in place.
    pub fn refresh_reference<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let fresh = ReferenceSet::load_dir(dir.as_ref())?;
        info!(
            dir = %dir.as_ref().display(),
            catalog_items = fresh.catalog.len(),
            "reference data refreshed"
        );
        self.replace_reference(fresh);
        Ok(())
    }

    pub fn replace_reference(&self, reference: ReferenceSet) {
        *self.reference.write() = Arc::new(reference);
    }

    // ------------------------------------------------------------------
    // Shipping
    // ------------------------------------------------------------------

    pub fn predict_shipping(&self, input: &ShippingInput) -> Result<ShippingPrediction> {
        let artifact = self.store.get_active(TaskType::Shipping)?;
        let refs = self.reference();
        shipping_with(&artifact, &refs, input)
    }

    /// One result per input row, in input order. A missing or corrupt
    /// artifact fails the whole batch; anything else fails only its row.
    pub fn predict_shipping_batch(&self, inputs: &[ShippingInput]) -> Result<Vec<Result<ShippingPrediction>>> {
        let artifact = self.store.get_active(TaskType::Shipping)?;
        let refs = self.reference();
        let rows: Vec<_> = inputs
            .par_iter()
            .map(|input| shipping_with(&artifact, &refs, input))
            .collect();
        log_batch(TaskType::Shipping, &rows);
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Demand
    // ------------------------------------------------------------------

    pub fn predict_demand(&self, input: &DemandInput) -> Result<DemandPrediction> {
        let artifact = self.store.get_active(TaskType::Demand)?;
        let refs = self.reference();
        demand_with(&artifact, &refs, input)
    }

    pub fn predict_demand_batch(&self, inputs: &[DemandInput]) -> Result<Vec<Result<DemandPrediction>>> {
        let artifact = self.store.get_active(TaskType::Demand)?;
        let refs = self.reference();
        let rows: Vec<_> = inputs
            .par_iter()
            .map(|input| demand_with(&artifact, &refs, input))
            .collect();
        log_batch(TaskType::Demand, &rows);
        Ok(rows)
    }

    /// Predict `periods` consecutive months starting at `start`.
    ///
    /// The lag block is derived once from `history` and held fixed for the
    /// whole horizon; predictions are not fed back as new lags. A month that
    /// fails inference is reported in its point and does not stop the rest.
    pub fn forecast(
        &self,
        start: Period,
        periods: usize,
        product: &ProductProfile,
        history: &SalesHistory,
    ) -> Result<DemandForecast> {
        let artifact = self.store.get_active(TaskType::Demand)?;
        let refs = self.reference();
        let adapter = DemandAdapter::new(&refs.tables.category_baselines);
        let lags = adapter.lag_block(product, history);

        let points: Vec<ForecastPoint> = start
            .horizon(periods)
            .map(|period| {
                let vector = artifact.schema.conform(adapter.compute_with(period, product, &lags));
                match demand_point(&artifact, period, &vector) {
                    Ok(prediction) => ForecastPoint::predicted(prediction),
                    Err(e) => ForecastPoint::failed(period, &e),
                }
            })
            .collect();

        let forecast = DemandForecast {
            points,
            lags,
            model_version: artifact.version.clone(),
        };
        match forecast.failed_months() {
            0 => debug!(start = %start, periods, version = %artifact.version, "demand forecast complete"),
            failed => warn!(start = %start, periods, failed, "demand forecast has failed months"),
        }
        Ok(forecast)
    }

    // ------------------------------------------------------------------
    // Sentiment
    // ------------------------------------------------------------------

    /// Classify one review. Uses the vectorizer and classifier artifacts
    /// when both are present, the keyword heuristic otherwise.
    pub fn predict_sentiment(&self, text: &str) -> Result<SentimentPrediction> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("review text is empty".to_string()));
        }

        let chain: FallbackChain<'_, str, Result<SentimentPrediction>> = FallbackChain::new()
            .tier("model", |text: &str| self.model_sentiment(text))
            .tier("keyword_heuristic", |text: &str| Some(Ok(keyword_prediction(text))));

        match chain.resolve(text) {
            Some(resolved) => {
                if resolved.degraded() {
                    debug!(tier = resolved.tier, "sentiment served without model artifacts");
                }
                resolved.value
            }
            None => Ok(keyword_prediction(text)),
        }
    }

    pub fn predict_sentiment_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<Result<SentimentPrediction>> {
        let rows: Vec<_> = texts
            .par_iter()
            .map(|text| self.predict_sentiment(text.as_ref()))
            .collect();
        log_batch(TaskType::Sentiment, &rows);
        rows
    }

    /// `None` when either artifact is absent; a corrupt artifact is an error.
    fn model_sentiment(&self, text: &str) -> Option<Result<SentimentPrediction>> {
        let vectorizer = match resolve(&self.store, TaskType::TextVectorizer)? {
            Ok(artifact) => artifact,
            Err(e) => return Some(Err(e)),
        };
        let classifier = match resolve(&self.store, TaskType::Sentiment)? {
            Ok(artifact) => artifact,
            Err(e) => return Some(Err(e)),
        };
        Some(classify(self.normalizer.as_ref(), &vectorizer, &classifier, text))
    }

    // ------------------------------------------------------------------
    // Similarity
    // ------------------------------------------------------------------

    /// `k` items similar to `item_id`. Only a corrupt neighbor artifact
    /// is an error; an absent one degrades to catalog rankings.
    pub fn recommend(&self, item_id: &str, k: usize, min_similarity: f64) -> Result<Recommendations> {
        let artifact = resolve(&self.store, TaskType::Similarity).transpose()?;
        let refs = self.reference();
        let index = SimilarityIndex::new(&refs.catalog, artifact.as_deref().and_then(|a| a.payload.as_neighbors()));
        Ok(index.recommend(item_id, k, min_similarity))
    }

    pub fn recommend_by_vector(&self, vector: &[f32], k: usize) -> Result<Recommendations> {
        let artifact = resolve(&self.store, TaskType::Similarity).transpose()?;
        let refs = self.reference();
        let index = SimilarityIndex::new(&refs.catalog, artifact.as_deref().and_then(|a| a.payload.as_neighbors()));
        Ok(index.recommend_by_vector(&Vector::from_slice(vector), k))
    }

    /// Catalog items matching `query`, from the current reference snapshot.
    pub fn search_catalog(&self, query: &CatalogQuery) -> Vec<CatalogItem> {
        self.reference().catalog.search(query).into_iter().cloned().collect()
    }

    pub fn categories(&self) -> Vec<String> {
        self.reference().catalog.categories().into_iter().map(str::to_string).collect()
    }

    pub fn category_stats(&self) -> Vec<CategoryStats> {
        self.reference().catalog.category_stats()
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// One status entry per task, in [`TaskType::ALL`] order.
    pub fn status(&self) -> Vec<ModelStatus> {
        TaskType::ALL.iter().map(|&task| self.store.status(task)).collect()
    }

    /// The `top_n` most important features of the task's active model, or
    /// `None` when the model kind cannot rank its features.
    pub fn feature_importance(&self, task: TaskType, top_n: usize) -> Result<Option<Vec<(String, f64)>>> {
        let artifact = self.store.get_active(task)?;
        let Some(explainable) = artifact.payload.as_predictor().and_then(|p| p.as_explainable()) else {
            debug!(%task, kind = artifact.payload.kind(), "active model does not report importances");
            return Ok(None);
        };
        let mut ranked = explainable.feature_importances(&artifact.schema);
        ranked.truncate(top_n);
        Ok(Some(ranked))
    }
}

/// `Lookup` as an optional result: absent is `None`, corrupt is an error.
fn resolve(store: &ArtifactStore, task: TaskType) -> Option<Result<Arc<ModelArtifact>>> {
    match store.lookup(task) {
        Lookup::Found(artifact) => Some(Ok(artifact)),
        Lookup::NotFound => None,
        Lookup::Corrupt(reason) => Some(Err(Error::ArtifactCorrupt { task, reason })),
    }
}

fn shipping_with(artifact: &ModelArtifact, refs: &ReferenceSet, input: &ShippingInput) -> Result<ShippingPrediction> {
    let adapter = ShippingAdapter::new(&refs.tables.seller_dispatch, &refs.tables.regions);
    let built = adapter.build(input, &artifact.schema);
    let days = regress(artifact, &built.vector)?;
    Ok(ShippingPrediction {
        days: days.max(0.0),
        derived: built.derived,
        model_version: artifact.version.clone(),
    })
}

fn demand_with(artifact: &ModelArtifact, refs: &ReferenceSet, input: &DemandInput) -> Result<DemandPrediction> {
    let adapter = DemandAdapter::new(&refs.tables.category_baselines);
    let built = adapter.build(input, &artifact.schema);
    demand_point(artifact, input.period, &built.vector)
}

fn demand_point(artifact: &ModelArtifact, period: Period, vector: &FeatureVector) -> Result<DemandPrediction> {
    let raw = regress(artifact, vector)?;
    Ok(DemandPrediction {
        period,
        quantity: raw.round().max(0.0) as u64,
        raw,
        model_version: artifact.version.clone(),
    })
}

fn regress(artifact: &ModelArtifact, vector: &FeatureVector) -> Result<f64> {
    let outcome = artifact.infer(vector).and_then(|inference| match inference {
        Inference::Value(v) if v.is_finite() => Ok(v),
        Inference::Value(v) => Err(Error::InferenceFailure(format!("non-finite prediction {}", v))),
        Inference::Classes(_) => Err(Error::InferenceFailure(
            "expected a regression value, got class probabilities".to_string(),
        )),
    });
    if let Err(e) = &outcome {
        error!(task = %artifact.task, version = %artifact.version, error = %e, "inference failed");
    }
    outcome
}

fn classify(
    normalizer: &dyn TextNormalizer,
    vectorizer: &ModelArtifact,
    classifier: &ModelArtifact,
    text: &str,
) -> Result<SentimentPrediction> {
    let tfidf = vectorizer.payload.as_vectorizer().ok_or_else(|| {
        Error::InferenceFailure(format!("{} artifact is not a text vectorizer", vectorizer.payload.kind()))
    })?;
    if let Err(e) = tfidf.check_schema(&classifier.schema) {
        error!(
            vectorizer = %vectorizer.version,
            classifier = %classifier.version,
            error = %e,
            "vectorizer vocabulary does not match classifier inputs"
        );
        return Err(e);
    }
    let built = SentimentAdapter::new(normalizer, tfidf).build(text, &classifier.schema);

    let probabilities = match classifier.infer(&built.vector) {
        Ok(Inference::Classes(p)) => p,
        Ok(Inference::Value(_)) => {
            return Err(Error::InferenceFailure("expected class probabilities".to_string()));
        }
        Err(e) => {
            error!(version = %classifier.version, error = %e, "sentiment inference failed");
            return Err(e);
        }
    };
    let (label, p) = probabilities
        .best()
        .ok_or_else(|| Error::InferenceFailure("classifier returned no classes".to_string()))?;
    let sentiment = Sentiment::from_label(label);
    let confidence = clamp_probability(p);

    Ok(SentimentPrediction {
        sentiment,
        confidence,
        method: SentimentMethod::Model,
        probabilities: Some(probabilities),
        normalized_text: Some(built.derived),
    })
}

fn keyword_prediction(text: &str) -> SentimentPrediction {
    let score = keyword_sentiment(text);
    SentimentPrediction {
        sentiment: score.sentiment,
        confidence: clamp_probability(score.confidence),
        method: SentimentMethod::KeywordHeuristic,
        probabilities: None,
        normalized_text: None,
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

fn log_batch<T>(task: TaskType, rows: &[Result<T>]) {
    let failed = rows.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        warn!(%task, rows = rows.len(), failed, "batch finished with failed rows");
    } else {
        debug!(%task, rows = rows.len(), "batch finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelvault_core::{
        ArtifactEnvelope, Distance, FeatureSchema, FeatureSlot, LinearModel, LogisticModel, Metadata,
        ModelPayload, NeighborModel, TfidfVectorizer, TreeEnsemble,
    };
    use modelvault_core::model::{Node, Tree};
    use modelvault_features::GeoPoint;
    use modelvault_similarity::{Catalog, RecommendationMethod, SortOrder};
    use modelvault_storage::{encode_envelope, StoreConfig};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn service() -> (TempDir, PredictionService) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(StoreConfig::new(dir.path().join("models"))).unwrap();
        (dir, PredictionService::new(Arc::new(store), ReferenceSet::default()))
    }

    fn install(service: &PredictionService, task: TaskType, schema: FeatureSchema, model: ModelPayload) {
        let bytes = encode_envelope(&ArtifactEnvelope::new(task, schema, model), false).unwrap();
        service.store().upload(task, &bytes, Metadata::new()).unwrap();
    }

    fn linear(intercept: f64, coefficients: &[(&str, f64)]) -> ModelPayload {
        ModelPayload::Linear(LinearModel {
            intercept,
            coefficients: coefficients.iter().map(|(n, w)| (n.to_string(), *w)).collect(),
            categorical: BTreeMap::new(),
        })
    }

    fn shipping_model(service: &PredictionService, intercept: f64) {
        install(
            service,
            TaskType::Shipping,
            FeatureSchema::new(vec![
                FeatureSlot::numeric("distance_customer_seller"),
                FeatureSlot::numeric("price"),
                FeatureSlot::categorical("customer_state"),
            ]),
            linear(intercept, &[("distance_customer_seller", 0.01), ("price", 0.001)]),
        );
    }

    fn sp_to_rj() -> ShippingInput {
        ShippingInput {
            customer_location: Some(GeoPoint::new(-22.91, -43.17)),
            seller_location: Some(GeoPoint::new(-23.55, -46.63)),
            price: Some(0.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_artifact_is_unavailable() {
        let (_dir, service) = service();
        let err = service.predict_shipping(&ShippingInput::default()).unwrap_err();
        assert!(err.is_unavailable());
        assert!(service.predict_demand_batch(&[]).is_err());
    }

    #[test]
    fn test_shipping_reports_distance() {
        let (_dir, service) = service();
        shipping_model(&service, 2.0);
        let prediction = service.predict_shipping(&sp_to_rj()).unwrap();
        let km = prediction.derived.distance_km;
        assert!((km - 358.0).abs() / 358.0 < 0.03);
        assert!((prediction.days - (2.0 + km * 0.01)).abs() < 1e-9);
    }

    #[test]
    fn test_shipping_days_never_negative() {
        let (_dir, service) = service();
        shipping_model(&service, -100.0);
        assert_eq!(service.predict_shipping(&sp_to_rj()).unwrap().days, 0.0);
    }

    #[test]
    fn test_batch_isolates_failed_rows() {
        let (_dir, service) = service();
        shipping_model(&service, 1.0);
        let bad = ShippingInput {
            price: Some(f64::INFINITY),
            ..sp_to_rj()
        };
        let rows = service
            .predict_shipping_batch(&[sp_to_rj(), bad, ShippingInput::default()])
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        assert!(matches!(rows[1], Err(Error::InferenceFailure(_))));
        assert!(rows[2].is_ok());
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.days, service.predict_shipping(&sp_to_rj()).unwrap().days);
    }

    fn demand_model(service: &PredictionService, intercept: f64) {
        install(
            service,
            TaskType::Demand,
            FeatureSchema::numeric(["month", "lag_1"]),
            linear(intercept, &[("month", 1.0), ("lag_1", 2.0)]),
        );
    }

    #[test]
    fn test_demand_rounds_and_clamps() {
        let (_dir, service) = service();
        demand_model(&service, 0.4);
        let input = DemandInput {
            period: Period::new(2018, 3).unwrap(),
            product: ProductProfile::default(),
            history: SalesHistory::Monthly(vec![1.0]),
        };
        let prediction = service.predict_demand(&input).unwrap();
        assert!((prediction.raw - 5.4).abs() < 1e-9);
        assert_eq!(prediction.quantity, 5);

        let (_dir2, negative) = self::service();
        demand_model(&negative, -50.0);
        assert_eq!(negative.predict_demand(&input).unwrap().quantity, 0);
    }

    #[test]
    fn test_forecast_wraps_year_and_holds_lags() {
        let (_dir, service) = service();
        demand_model(&service, 0.0);
        let forecast = service
            .forecast(
                Period::new(2017, 11).unwrap(),
                4,
                &ProductProfile::default(),
                &SalesHistory::Monthly(vec![5.0]),
            )
            .unwrap();

        let periods: Vec<String> = forecast.points.iter().map(|p| p.period.to_string()).collect();
        assert_eq!(periods, vec!["2017-11", "2017-12", "2018-01", "2018-02"]);
        let quantities: Vec<Option<u64>> = forecast.points.iter().map(|p| p.quantity).collect();
        assert_eq!(quantities, vec![Some(21), Some(22), Some(11), Some(12)]);
        assert_eq!(forecast.lags.lag_1, 5.0);
        assert_eq!(forecast.total(), 66);
        assert_eq!(forecast.failed_months(), 0);
    }

    #[test]
    fn test_forecast_keeps_going_past_a_failed_month() {
        let (_dir, service) = service();
        // December overflows to infinity; every other month is month + 1
        install(
            &service,
            TaskType::Demand,
            FeatureSchema::numeric(["month", "is_christmas", "is_end_year"]),
            linear(1.0, &[("month", 1.0), ("is_christmas", f64::MAX), ("is_end_year", f64::MAX)]),
        );
        let forecast = service
            .forecast(
                Period::new(2017, 12).unwrap(),
                3,
                &ProductProfile::default(),
                &SalesHistory::Absent,
            )
            .unwrap();

        assert_eq!(forecast.points.len(), 3);
        let quantities: Vec<Option<u64>> = forecast.points.iter().map(|p| p.quantity).collect();
        assert_eq!(quantities, vec![None, Some(2), Some(3)]);
        assert!(forecast.points[0].error.as_deref().unwrap_or("").contains("non-finite"));
        assert_eq!(forecast.failed_months(), 1);
        assert_eq!(forecast.total(), 5);
    }

    #[test]
    fn test_sentiment_without_artifacts_uses_keywords() {
        let (_dir, service) = service();
        let prediction = service.predict_sentiment("Produto excelente, recomendo!").unwrap();
        assert_eq!(prediction.method, SentimentMethod::KeywordHeuristic);
        assert_eq!(prediction.sentiment, Sentiment::Positive);
        assert!(prediction.probabilities.is_none());
        assert!(matches!(service.predict_sentiment("   "), Err(Error::InvalidInput(_))));
    }

    fn vectorizer(service: &PredictionService) {
        install(
            service,
            TaskType::TextVectorizer,
            FeatureSchema::numeric(["bom", "ruim"]),
            ModelPayload::Tfidf(TfidfVectorizer::new(vec!["bom".into(), "ruim".into()], vec![1.0, 1.0])),
        );
    }

    #[test]
    fn test_sentiment_needs_both_artifacts() {
        let (_dir, service) = service();
        vectorizer(&service);
        let prediction = service.predict_sentiment("produto ruim").unwrap();
        assert_eq!(prediction.method, SentimentMethod::KeywordHeuristic);
        assert_eq!(prediction.sentiment, Sentiment::Negative);
    }

    #[test]
    fn test_sentiment_with_model() {
        let (_dir, service) = service();
        vectorizer(&service);
        install(
            &service,
            TaskType::Sentiment,
            FeatureSchema::numeric(["bom", "ruim"]),
            ModelPayload::Logistic(LogisticModel {
                classes: vec!["negative".into(), "positive".into()],
                coefficients: vec![vec![-2.0, 3.0], vec![3.0, -2.0]],
                intercepts: vec![0.0, 0.0],
            }),
        );

        let prediction = service.predict_sentiment("Produto muito BOM").unwrap();
        assert_eq!(prediction.method, SentimentMethod::Model);
        assert_eq!(prediction.sentiment, Sentiment::Positive);
        assert!(prediction.confidence > 0.5 && prediction.confidence <= 1.0);
        assert_eq!(prediction.normalized_text.as_deref(), Some("produto bom"));

        let rows = service.predict_sentiment_batch(&["ruim demais", "", "bom"]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().sentiment, Sentiment::Negative);
        assert!(rows[1].is_err());
        assert_eq!(rows[2].as_ref().unwrap().sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_mismatched_sentiment_artifacts_are_an_error() {
        let (_dir, service) = service();
        vectorizer(&service);
        install(
            &service,
            TaskType::Sentiment,
            FeatureSchema::numeric(["otimo", "pessimo"]),
            ModelPayload::Logistic(LogisticModel {
                classes: vec!["negative".into(), "positive".into()],
                coefficients: vec![vec![-2.0, 3.0], vec![3.0, -2.0]],
                intercepts: vec![0.0, 0.0],
            }),
        );

        let err = service.predict_sentiment("produto bom").unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { expected: 2, actual: 0 }));
    }

    fn catalog() -> ReferenceSet {
        let item = |id: &str, category: &str, rating: f64| CatalogItem {
            id: id.into(),
            category: Some(category.into()),
            rating,
            order_count: 3,
            avg_price: None,
        };
        ReferenceSet::new(
            Default::default(),
            Catalog::new(vec![item("a", "toys", 4.5), item("b", "toys", 4.0), item("c", "toys", 3.0)]),
        )
    }

    #[test]
    fn test_recommend_falls_back_then_uses_artifact() {
        let (_dir, service) = service();
        service.replace_reference(catalog());

        let recs = service.recommend("a", 2, 0.0).unwrap();
        assert_eq!(recs.method, RecommendationMethod::SameCategory);
        assert_eq!(recs.len(), 2);

        install(
            &service,
            TaskType::Similarity,
            FeatureSchema::numeric(["x", "y"]),
            ModelPayload::NearestNeighbors(NeighborModel::new(
                Distance::Cosine,
                vec!["a".into(), "b".into(), "c".into()],
                vec![
                    Vector::new(vec![1.0, 0.0]),
                    Vector::new(vec![0.0, 1.0]),
                    Vector::new(vec![1.0, 0.1]),
                ],
            )),
        );
        let recs = service.recommend("a", 1, 0.0).unwrap();
        assert_eq!(recs.method, RecommendationMethod::Neighbors);
        assert_eq!(recs.items[0].item_id, "c");

        let by_vector = service.recommend_by_vector(&[0.0, 1.0], 1).unwrap();
        assert_eq!(by_vector.items[0].item_id, "b");
    }

    #[test]
    fn test_catalog_browsing_follows_reference_snapshot() {
        let (_dir, service) = service();
        assert!(service.categories().is_empty());
        service.replace_reference(catalog());

        let query = CatalogQuery {
            min_rating: Some(4.0),
            sort: SortOrder::Rating,
            ..Default::default()
        };
        let ids: Vec<String> = service.search_catalog(&query).into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(service.categories(), vec!["toys"]);
        let stats = service.category_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!((stats[0].n_products, stats[0].total_orders), (3, 9));
    }

    #[test]
    fn test_corrupt_neighbor_artifact_is_reported() {
        let (dir, service) = service();
        let task_dir = dir.path().join("models").join(TaskType::Similarity.as_str());
        std::fs::create_dir_all(&task_dir).unwrap();
        std::fs::write(task_dir.join("active.artifact"), b"garbage").unwrap();
        assert!(matches!(
            service.recommend("a", 2, 0.0),
            Err(Error::ArtifactCorrupt { task: TaskType::Similarity, .. })
        ));
    }

    #[test]
    fn test_feature_importance_capability() {
        let (_dir, service) = service();
        demand_model(&service, 0.0);
        assert!(service.feature_importance(TaskType::Demand, 5).unwrap().is_none());

        install(
            &service,
            TaskType::Shipping,
            FeatureSchema::numeric(["distance_customer_seller", "price"]),
            ModelPayload::TreeEnsemble(TreeEnsemble {
                base_score: 1.0,
                trees: vec![Tree {
                    nodes: vec![
                        Node::Numeric { feature: 0, threshold: 300.0, left: 1, right: 2, gain: 9.0 },
                        Node::Leaf { value: 1.0 },
                        Node::Numeric { feature: 1, threshold: 10.0, left: 3, right: 4, gain: 1.0 },
                        Node::Leaf { value: 2.0 },
                        Node::Leaf { value: 3.0 },
                    ],
                }],
            }),
        );
        let ranked = service.feature_importance(TaskType::Shipping, 1).unwrap().unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "distance_customer_seller");
        assert!((ranked[0].1 - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_status_covers_every_task() {
        let (_dir, service) = service();
        shipping_model(&service, 1.0);
        let status = service.status();
        assert_eq!(status.len(), TaskType::ALL.len());
        assert!(status.iter().any(|s| s.task == TaskType::Shipping && s.loaded));
        assert!(status.iter().filter(|s| !s.loaded).count() == TaskType::ALL.len() - 1);
    }

    #[test]
    fn test_refresh_keeps_snapshot_on_error() {
        let (dir, service) = service();
        service.replace_reference(catalog());
        let refs = dir.path().join("refs");
        std::fs::create_dir_all(&refs).unwrap();
        std::fs::write(refs.join("catalog.json"), b"[oops").unwrap();
        assert!(service.refresh_reference(&refs).is_err());
        assert_eq!(service.reference().catalog.len(), 3);

        std::fs::write(refs.join("catalog.json"), br#"[{"id": "z", "rating": 5.0}]"#).unwrap();
        service.refresh_reference(&refs).unwrap();
        assert_eq!(service.reference().catalog.len(), 1);
    }
}
