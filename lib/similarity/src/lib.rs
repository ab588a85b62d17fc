//! # modelvault Similarity
//!
//! Item recommendations backed by a nearest-neighbor artifact, degrading to
//! deterministic catalog rankings when no artifact can answer.
//!
//! ## Example
//!
//! ```rust
//! use modelvault_similarity::{Catalog, CatalogItem, RecommendationMethod, SimilarityIndex};
//!
//! let item = |id: &str, rating: f64| CatalogItem {
//!     id: id.to_string(),
//!     category: Some("moveis_decoracao".to_string()),
//!     rating,
//!     order_count: 10,
//!     avg_price: None,
//! };
//! let catalog = Catalog::new(vec![item("a", 4.5), item("b", 4.2), item("c", 3.9)]);
//!
//! // No artifact loaded: same-category ranking answers.
//! let index = SimilarityIndex::new(&catalog, None);
//! let recs = index.recommend("a", 2, 0.0);
//! assert_eq!(recs.method, RecommendationMethod::SameCategory);
//! assert_eq!(recs.items[0].rank, 1);
//! ```

pub mod catalog;
pub mod index;
pub mod rank;
pub mod search;

pub use catalog::{Catalog, CatalogItem, CATALOG_FILE};
pub use index::{Recommendation, RecommendationMethod, Recommendations, SimilarityIndex};
pub use rank::{Blend, TOP_RATED_THRESHOLD};
pub use search::{CatalogQuery, CategoryStats, SortOrder};
