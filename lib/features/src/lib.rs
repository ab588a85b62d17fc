//! # modelvault Features
//!
//! Feature adapters that rebuild, at serving time, the exact inputs each
//! model was trained on.
//!
//! - [`ShippingAdapter`] - calendar, distance and dispatch features of an order
//! - [`DemandAdapter`] - calendar, product and lag features of a product-month
//! - [`SentimentAdapter`] - TF-IDF features of normalized review text
//!
//! Adapters borrow their [`ReferenceData`] tables and never mutate them.

pub mod adapter;
pub mod calendar;
pub mod demand;
pub mod geo;
pub mod reference;
pub mod sentiment;
pub mod shipping;

pub use adapter::{Built, FeatureAdapter};
pub use calendar::Period;
pub use demand::{DemandAdapter, DemandInput, LagBlock, ProductProfile, SalesHistory};
pub use geo::{haversine_km, GeoPoint, CIRCUITY_FACTOR, EARTH_RADIUS_KM};
pub use reference::{CategoryBaseline, CategoryBaselines, ReferenceData, RegionTable, SellerDispatch};
pub use sentiment::{keyword_sentiment, BasicNormalizer, KeywordScore, Sentiment, SentimentAdapter, TextNormalizer};
pub use shipping::{DistanceSource, ShippingAdapter, ShippingDerived, ShippingInput};
