//! Delivery-time features

use crate::adapter::FeatureAdapter;
use crate::calendar::{month_cos, month_sin, season_label};
use crate::geo::{circuity_km, GeoPoint};
use crate::reference::{RegionTable, SellerDispatch, DEFAULT_REGION};
use chrono::{Datelike, NaiveDateTime, Utc};
use modelvault_core::{FeatureMap, MISSING_CATEGORY};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DISTANCE_KM: f64 = 500.0;

/// One order to estimate a delivery time for. Absent fields take the
/// defaults the model was trained with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingInput {
    /// Defaults to now (UTC).
    pub purchase_timestamp: Option<NaiveDateTime>,
    pub seller_id: Option<String>,
    pub time_to_approve_order: Option<f64>,
    pub num_items: Option<f64>,
    pub num_unique_sellers: Option<f64>,
    pub total_freight_value: Option<f64>,
    pub total_payment_value: Option<f64>,
    pub num_payments: Option<f64>,
    pub price: Option<f64>,
    pub freight_value: Option<f64>,
    pub product_weight_g: Option<f64>,
    pub product_length_cm: Option<f64>,
    pub product_height_cm: Option<f64>,
    pub product_width_cm: Option<f64>,
    pub product_name_lenght: Option<f64>,
    pub product_description_lenght: Option<f64>,
    pub product_category_name: Option<String>,
    pub customer_state: Option<String>,
    pub seller_state: Option<String>,
    /// State recorded by geolocation; defaults to `customer_state`.
    pub customer_state_geo: Option<String>,
    /// State recorded by geolocation; defaults to `seller_state`.
    pub seller_state_geo: Option<String>,
    pub customer_location: Option<GeoPoint>,
    pub seller_location: Option<GeoPoint>,
}

/// How the customer-seller distance was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceSource {
    Coordinates,
    Regions,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShippingDerived {
    pub distance_km: f64,
    pub circuity_km: f64,
    pub distance_source: DistanceSource,
    pub seller_avg_dispatch: f64,
    /// False when the global average stood in for an unseen seller.
    pub seller_known: bool,
}

pub struct ShippingAdapter<'a> {
    dispatch: &'a SellerDispatch,
    regions: &'a RegionTable,
}

impl<'a> ShippingAdapter<'a> {
    pub fn new(dispatch: &'a SellerDispatch, regions: &'a RegionTable) -> Self {
        Self { dispatch, regions }
    }

    fn distance(&self, input: &ShippingInput) -> (f64, DistanceSource) {
        let explicit = input
            .customer_location
            .zip(input.seller_location)
            .filter(|(c, s)| c.is_valid() && s.is_valid());
        if let Some((customer, seller)) = explicit {
            return (customer.distance_km(&seller), DistanceSource::Coordinates);
        }

        let customer = input.customer_state.as_deref().and_then(|s| self.regions.resolve(s));
        let seller = input.seller_state.as_deref().and_then(|s| self.regions.resolve(s));
        match (customer, seller) {
            (Some(c), Some(s)) => (c.distance_km(&s), DistanceSource::Regions),
            _ => (DEFAULT_DISTANCE_KM, DistanceSource::Default),
        }
    }
}

impl FeatureAdapter for ShippingAdapter<'_> {
    type Input = ShippingInput;
    type Derived = ShippingDerived;

    fn compute(&self, input: &ShippingInput) -> (FeatureMap, ShippingDerived) {
        let mut f = FeatureMap::new();

        let purchased = input.purchase_timestamp.unwrap_or_else(|| Utc::now().naive_utc());
        let month = purchased.month();
        f.insert("purchase_dayofweek", purchased.weekday().num_days_from_monday());
        f.insert("purchase_month", month);
        f.insert("purchase_month_sin", month_sin(month));
        f.insert("purchase_month_cos", month_cos(month));
        f.insert("purchase_season", season_label(month));
        f.insert("time_to_approve_order", input.time_to_approve_order.unwrap_or(2.0));

        let (distance_km, distance_source) = self.distance(input);
        let circuity = circuity_km(distance_km);
        f.insert("distance_customer_seller", distance_km);
        f.insert("circuity_distance", circuity);

        f.insert("num_items", input.num_items.unwrap_or(1.0));
        f.insert("num_unique_sellers", input.num_unique_sellers.unwrap_or(1.0));
        f.insert("total_freight_value", input.total_freight_value.unwrap_or(20.0));
        f.insert("total_payment_value", input.total_payment_value.unwrap_or(100.0));
        f.insert("num_payments", input.num_payments.unwrap_or(1.0));

        let length = input.product_length_cm.unwrap_or(20.0);
        let height = input.product_height_cm.unwrap_or(10.0);
        let width = input.product_width_cm.unwrap_or(15.0);
        f.insert("price", input.price.unwrap_or(50.0));
        f.insert("freight_value", input.freight_value.unwrap_or(15.0));
        f.insert("product_weight_g", input.product_weight_g.unwrap_or(500.0));
        f.insert("product_length_cm", length);
        f.insert("product_height_cm", height);
        f.insert("product_width_cm", width);
        f.insert("product_name_lenght", input.product_name_lenght.unwrap_or(40.0));
        f.insert("product_description_lenght", input.product_description_lenght.unwrap_or(500.0));
        f.insert("product_volume_cm3", length * height * width);

        let customer_state = input.customer_state.as_deref().unwrap_or(DEFAULT_REGION);
        let seller_state = input.seller_state.as_deref().unwrap_or(DEFAULT_REGION);
        f.insert(
            "product_category_name",
            input.product_category_name.as_deref().unwrap_or(MISSING_CATEGORY),
        );
        f.insert("customer_state", customer_state);
        f.insert("seller_state", seller_state);
        f.insert(
            "customer_state_geo",
            input.customer_state_geo.as_deref().unwrap_or(customer_state),
        );
        f.insert("seller_state_geo", input.seller_state_geo.as_deref().unwrap_or(seller_state));

        let (seller_avg_dispatch, seller_known) = self.dispatch.lookup(input.seller_id.as_deref());
        f.insert("seller_avg_dispatch", seller_avg_dispatch);

        let derived = ShippingDerived {
            distance_km,
            circuity_km: circuity,
            distance_source,
            seller_avg_dispatch,
            seller_known,
        };
        (f, derived)
    }
}
