//! Catalog browsing: filtered search, category listing and per-category stats

use crate::catalog::{Catalog, CatalogItem};
use crate::rank::Blend;
use ahash::AHashMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Blend of rating and log-popularity, see [`Blend::RELEVANCE`].
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    Rating,
    Popularity,
}

/// Filters for [`Catalog::search`]. Every filter is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogQuery {
    /// Case-insensitive substring of the category name.
    pub text: Option<String>,
    /// Exact category.
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub sort: SortOrder,
    pub limit: Option<usize>,
}

impl CatalogQuery {
    fn matches(&self, item: &CatalogItem, text: Option<&str>) -> bool {
        let category = item.category.as_deref();
        if let Some(text) = text {
            if !category.is_some_and(|c| c.to_lowercase().contains(text)) {
                return false;
            }
        }
        if self.category.is_some() && category != self.category.as_deref() {
            return false;
        }
        if self.min_price.is_some() || self.max_price.is_some() {
            // unpriced items never satisfy a price filter
            let Some(price) = item.avg_price else {
                return false;
            };
            if self.min_price.is_some_and(|min| price < min) || self.max_price.is_some_and(|max| price > max) {
                return false;
            }
        }
        !self.min_rating.is_some_and(|min| item.rating < min)
    }
}

/// Aggregates over the items of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub n_products: usize,
    /// Mean over the items that have a price.
    pub avg_price: Option<f64>,
    pub avg_rating: f64,
    pub total_orders: u64,
}

fn price(item: &CatalogItem) -> Option<OrderedFloat<f64>> {
    item.avg_price.map(OrderedFloat)
}

#[derive(Default)]
struct StatsAcc {
    n: usize,
    rating_sum: f64,
    price_sum: f64,
    priced: usize,
    orders: u64,
}

impl Catalog {
    /// Items passing every filter of `query`, in the requested order. Ties
    /// break by item id.
    pub fn search(&self, query: &CatalogQuery) -> Vec<&CatalogItem> {
        let text = query
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);
        let mut found: Vec<&CatalogItem> = self
            .items()
            .iter()
            .filter(|item| query.matches(item, text.as_deref()))
            .collect();

        match query.sort {
            SortOrder::Relevance => {
                found.sort_by_key(|item| (Reverse(OrderedFloat(Blend::RELEVANCE.score(item))), item.id.clone()))
            }
            // unpriced items go last in both directions
            SortOrder::PriceAsc => found.sort_by_key(|item| (price(item).is_none(), price(item), item.id.clone())),
            SortOrder::PriceDesc => {
                found.sort_by_key(|item| (price(item).is_none(), Reverse(price(item)), item.id.clone()))
            }
            SortOrder::Rating => found.sort_by_key(|item| (Reverse(OrderedFloat(item.rating)), item.id.clone())),
            SortOrder::Popularity => found.sort_by_key(|item| (Reverse(item.order_count), item.id.clone())),
        }

        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        found
    }

    /// Distinct category names, sorted. Uncategorized items are skipped.
    pub fn categories(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.items().iter().filter_map(|i| i.category.as_deref()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// One entry per category, most ordered first.
    pub fn category_stats(&self) -> Vec<CategoryStats> {
        let mut acc: AHashMap<&str, StatsAcc> = AHashMap::new();
        for item in self.items() {
            let Some(category) = item.category.as_deref() else {
                continue;
            };
            let entry = acc.entry(category).or_default();
            entry.n += 1;
            entry.rating_sum += item.rating;
            entry.orders += item.order_count;
            if let Some(price) = item.avg_price {
                entry.price_sum += price;
                entry.priced += 1;
            }
        }

        let mut stats: Vec<CategoryStats> = acc
            .into_iter()
            .map(|(category, a)| CategoryStats {
                category: category.to_string(),
                n_products: a.n,
                avg_price: (a.priced > 0).then(|| a.price_sum / a.priced as f64),
                avg_rating: a.rating_sum / a.n as f64,
                total_orders: a.orders,
            })
            .collect();
        stats.sort_by(|a, b| (Reverse(a.total_orders), &a.category).cmp(&(Reverse(b.total_orders), &b.category)));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, category: Option<&str>, rating: f64, orders: u64, price: Option<f64>) -> CatalogItem {
        CatalogItem {
            id: id.into(),
            category: category.map(Into::into),
            rating,
            order_count: orders,
            avg_price: price,
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            item("a", Some("moveis_decoracao"), 4.5, 10, Some(120.0)),
            item("b", Some("moveis_escritorio"), 3.5, 50, Some(300.0)),
            item("c", Some("esporte_lazer"), 4.8, 5, Some(80.0)),
            item("d", Some("esporte_lazer"), 4.0, 30, None),
            item("e", None, 5.0, 100, Some(10.0)),
        ])
    }

    fn ids(items: &[&CatalogItem]) -> Vec<String> {
        items.iter().map(|i| i.id.clone()).collect()
    }

    #[test]
    fn test_search_filters() {
        let catalog = catalog();
        let query = CatalogQuery {
            text: Some("MOVEIS".into()),
            sort: SortOrder::PriceAsc,
            ..Default::default()
        };
        assert_eq!(ids(&catalog.search(&query)), vec!["a", "b"]);

        let query = CatalogQuery {
            category: Some("esporte_lazer".into()),
            min_rating: Some(4.5),
            ..Default::default()
        };
        assert_eq!(ids(&catalog.search(&query)), vec!["c"]);

        // unpriced "d" is dropped by a price filter
        let query = CatalogQuery {
            min_price: Some(50.0),
            max_price: Some(150.0),
            sort: SortOrder::PriceDesc,
            ..Default::default()
        };
        assert_eq!(ids(&catalog.search(&query)), vec!["a", "c"]);
    }

    #[test]
    fn test_search_orders() {
        let catalog = catalog();
        let sorted = |sort: SortOrder| ids(&catalog.search(&CatalogQuery { sort, ..Default::default() }));
        assert_eq!(sorted(SortOrder::Popularity), vec!["e", "b", "d", "a", "c"]);
        assert_eq!(sorted(SortOrder::Rating), vec!["e", "c", "a", "d", "b"]);
        assert_eq!(sorted(SortOrder::PriceDesc), vec!["b", "a", "c", "e", "d"]);
        assert_eq!(sorted(SortOrder::Relevance)[0], "e");

        let limited = catalog.search(&CatalogQuery {
            limit: Some(2),
            ..Default::default()
        });
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_categories_sorted_and_distinct() {
        assert_eq!(
            catalog().categories(),
            vec!["esporte_lazer", "moveis_decoracao", "moveis_escritorio"]
        );
        assert!(Catalog::default().categories().is_empty());
    }

    #[test]
    fn test_category_stats() {
        let stats = catalog().category_stats();
        let names: Vec<&str> = stats.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(names, vec!["moveis_escritorio", "esporte_lazer", "moveis_decoracao"]);

        let sport = &stats[1];
        assert_eq!(sport.n_products, 2);
        assert_eq!(sport.total_orders, 35);
        assert_eq!(sport.avg_price, Some(80.0));
        assert!((sport.avg_rating - 4.4).abs() < 1e-12);
    }

    #[test]
    fn test_query_deserializes_with_defaults() {
        let query: CatalogQuery = serde_json::from_str(r#"{"min_rating": 4, "sort": "price_asc"}"#).unwrap();
        assert_eq!(query.min_rating, Some(4.0));
        assert_eq!(query.sort, SortOrder::PriceAsc);
        assert!(query.text.is_none());
    }
}
