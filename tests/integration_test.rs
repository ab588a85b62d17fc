// Integration tests for modelvault
use modelvault::prelude::*;
use modelvault::{
    haversine_km, ArtifactEnvelope, Catalog, CatalogItem, FeatureSchema, FeatureSlot, GeoPoint, ModelPayload,
    RecommendationMethod,
};
use modelvault_core::LinearModel;
use modelvault_features::{FeatureAdapter, ShippingAdapter};
use modelvault_storage::encode_envelope;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

fn shipping_schema() -> FeatureSchema {
    FeatureSchema::new(vec![
        FeatureSlot::numeric("distance_customer_seller"),
        FeatureSlot::numeric("product_weight_g"),
        FeatureSlot::categorical("customer_state"),
        FeatureSlot::numeric("seller_avg_dispatch"),
    ])
}

fn shipping_bytes(intercept: f64) -> Vec<u8> {
    let model = ModelPayload::Linear(LinearModel {
        intercept,
        coefficients: BTreeMap::from([("distance_customer_seller".to_string(), 0.01)]),
        categorical: BTreeMap::from([(
            "customer_state".to_string(),
            BTreeMap::from([("RJ".to_string(), 1.5)]),
        )]),
    });
    encode_envelope(&ArtifactEnvelope::new(TaskType::Shipping, shipping_schema(), model), true).unwrap()
}

fn meta(author: &str) -> Metadata {
    let mut m = Metadata::new();
    m.insert("author".into(), json!(author));
    m.insert("mae".into(), json!(2.4));
    m
}

fn open_store(dir: &std::path::Path) -> Arc<ArtifactStore> {
    Arc::new(ArtifactStore::open(StoreConfig::new(dir.join("models"))).unwrap())
}

#[test]
fn test_upload_history_restore_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());

    store.upload(TaskType::Shipping, &shipping_bytes(1.0), meta("first")).unwrap();
    assert!(store.list_history(TaskType::Shipping).unwrap().is_empty());
    let original = store.get_active(TaskType::Shipping).unwrap();

    let receipt = store.upload(TaskType::Shipping, &shipping_bytes(2.0), meta("second")).unwrap();
    let history = store.list_history(TaskType::Shipping).unwrap();
    assert_eq!(history.len(), 1);
    let archived_id = receipt.archived_as.unwrap();
    assert_eq!(history[0].id, archived_id);

    store.restore(TaskType::Shipping, &archived_id).unwrap();
    let restored = store.get_active(TaskType::Shipping).unwrap();
    assert_eq!(restored.payload, original.payload);
    assert_eq!(restored.metadata, original.metadata);
    assert_eq!(restored.schema, original.schema);

    // backup of "second" plus the entry restored from
    assert_eq!(store.list_history(TaskType::Shipping).unwrap().len(), 2);

    // a fresh store over the same directory sees the same state
    let reopened = open_store(dir.path());
    assert_eq!(reopened.get_active(TaskType::Shipping).unwrap().payload, original.payload);
}

#[test]
fn test_corrupt_upload_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    store.upload(TaskType::Shipping, &shipping_bytes(1.0), meta("ok")).unwrap();
    let before = store.get_active(TaskType::Shipping).unwrap();

    let err = store
        .upload(TaskType::Shipping, b"\x1f\x8b not really gzip", meta("bad"))
        .unwrap_err();
    assert!(matches!(err, Error::ArtifactCorrupt { .. }));

    // an artifact built for another task is rejected too
    let demand = encode_envelope(
        &ArtifactEnvelope::new(
            TaskType::Demand,
            FeatureSchema::numeric(["month"]),
            ModelPayload::Linear(LinearModel {
                intercept: 0.0,
                coefficients: BTreeMap::new(),
                categorical: BTreeMap::new(),
            }),
        ),
        false,
    )
    .unwrap();
    assert!(store.upload(TaskType::Shipping, &demand, Metadata::new()).is_err());

    store.invalidate(TaskType::Shipping);
    assert_eq!(*store.get_active(TaskType::Shipping).unwrap(), *before);
    assert!(store.list_history(TaskType::Shipping).unwrap().is_empty());
}

#[test]
fn test_missing_artifact_disables_feature() {
    let dir = tempfile::tempdir().unwrap();
    let service = PredictionService::new(open_store(dir.path()), ReferenceSet::default());
    let err = service.predict_shipping(&ShippingInput::default()).unwrap_err();
    assert!(err.is_unavailable());
    assert!(service.store().get_metadata(TaskType::Shipping).is_empty());
}

#[test]
fn test_feature_vector_follows_schema() {
    let refs = ReferenceSet::default();
    let adapter = ShippingAdapter::new(&refs.tables.seller_dispatch, &refs.tables.regions);
    let schema = shipping_schema();
    let built = adapter.build(
        &ShippingInput {
            customer_state: Some("RJ".into()),
            seller_state: Some("SP".into()),
            ..Default::default()
        },
        &schema,
    );
    let names: Vec<&str> = built.vector.names().collect();
    assert_eq!(names, schema.names().collect::<Vec<_>>());
    assert_eq!(built.vector.len(), schema.len());
}

#[test]
fn test_haversine_properties() {
    let sao_paulo = GeoPoint::new(-23.55, -46.63);
    let rio = GeoPoint::new(-22.91, -43.17);
    let d = haversine_km(&sao_paulo, &rio);
    assert!((d - 358.0).abs() / 358.0 < 0.03, "got {}", d);
    assert_eq!(d, haversine_km(&rio, &sao_paulo));
    assert_eq!(haversine_km(&rio, &rio), 0.0);
}

#[test]
fn test_shipping_prediction_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    store.upload(TaskType::Shipping, &shipping_bytes(1.0), meta("e2e")).unwrap();
    let service = PredictionService::new(store, ReferenceSet::default());

    let order = ShippingInput {
        customer_state: Some("RJ".into()),
        seller_state: Some("SP".into()),
        ..Default::default()
    };
    let prediction = service.predict_shipping(&order).unwrap();
    let expected = 1.0 + 1.5 + prediction.derived.distance_km * 0.01;
    assert!((prediction.days - expected).abs() < 1e-9);
    assert!(prediction.derived.distance_km > 0.0);
}

#[test]
fn test_forecast_crosses_year_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let model = ModelPayload::Linear(LinearModel {
        intercept: 1.0,
        coefficients: BTreeMap::from([("month".to_string(), 0.5), ("lag_1".to_string(), 1.0)]),
        categorical: BTreeMap::new(),
    });
    let bytes = encode_envelope(
        &ArtifactEnvelope::new(TaskType::Demand, FeatureSchema::numeric(["month", "lag_1", "year"]), model),
        false,
    )
    .unwrap();
    store.upload(TaskType::Demand, &bytes, Metadata::new()).unwrap();
    let service = PredictionService::new(store, ReferenceSet::default());

    let forecast = service
        .forecast(
            Period::new(2017, 12).unwrap(),
            3,
            &ProductProfile::default(),
            &SalesHistory::Monthly(vec![3.0, 4.0]),
        )
        .unwrap();
    let periods: Vec<(i32, u32)> = forecast.points.iter().map(|p| (p.period.year, p.period.month)).collect();
    assert_eq!(periods, vec![(2017, 12), (2018, 1), (2018, 2)]);
    assert!(forecast.points.iter().all(|p| p.raw.is_some_and(|r| r >= 0.0)));
    assert_eq!(forecast.points[0].quantity, Some(11));
    assert_eq!(forecast.points[1].quantity, Some(6));
}

#[test]
fn test_recommendations_without_artifact_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let item = |id: &str, category: &str, rating: f64, orders: u64| CatalogItem {
        id: id.into(),
        category: Some(category.into()),
        rating,
        order_count: orders,
        avg_price: None,
    };
    let catalog = Catalog::new(vec![
        item("p1", "casa", 4.6, 12),
        item("p2", "casa", 4.1, 40),
        item("p3", "casa", 3.2, 90),
        item("p4", "casa", 4.9, 1),
        item("p5", "esporte", 4.4, 7),
    ]);
    let service = PredictionService::new(
        open_store(dir.path()),
        ReferenceSet::new(Default::default(), catalog),
    );

    let first = service.recommend("p1", 3, 0.0).unwrap();
    assert_eq!(first.method, RecommendationMethod::SameCategory);
    assert_eq!(first.len(), 3);
    assert!(first.items.iter().all(|r| r.item_id != "p1"));
    assert!(first.items.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(service.recommend("p1", 3, 0.0).unwrap(), first);

    let lonely = service.recommend("p5", 3, 0.0).unwrap();
    assert_eq!(lonely.method, RecommendationMethod::GlobalTop);
    assert!(lonely.items.iter().all(|r| r.item_id != "p5"));
    assert!(lonely.len() <= 3);

    assert!(!service.recommend("unknown", 2, 0.0).unwrap().is_empty());
}

#[test]
fn test_readers_see_whole_artifacts_during_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    store.upload(TaskType::Shipping, &shipping_bytes(0.0), Metadata::new()).unwrap();

    let writer = {
        let store = store.clone();
        thread::spawn(move || {
            for i in 1..=5 {
                store
                    .upload(TaskType::Shipping, &shipping_bytes(i as f64), Metadata::new())
                    .unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let artifact = store.get_active(TaskType::Shipping).unwrap();
                    assert_eq!(artifact.schema, shipping_schema());
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.list_history(TaskType::Shipping).unwrap().len(), 5);
}
