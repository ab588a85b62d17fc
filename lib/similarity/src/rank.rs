//! Rule-based ranking of catalog items
//!
//! Used when no neighbor artifact can answer. Both rankings blend rating and
//! log-popularity and break ties by item id, so the same catalog snapshot
//! always yields the same list.

use crate::catalog::{Catalog, CatalogItem};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

/// Minimum rating for the global top list.
pub const TOP_RATED_THRESHOLD: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blend {
    pub rating: f64,
    pub popularity: f64,
}

impl Blend {
    pub const SAME_CATEGORY: Blend = Blend { rating: 0.6, popularity: 0.4 };
    pub const GLOBAL: Blend = Blend { rating: 0.5, popularity: 0.5 };
    /// Default order of catalog search results.
    pub const RELEVANCE: Blend = Blend { rating: 0.4, popularity: 0.6 };

    #[inline]
    pub fn score(&self, item: &CatalogItem) -> f64 {
        self.rating * item.rating + self.popularity * (item.order_count as f64).ln_1p()
    }
}

/// Top `k` items by blended score, best first.
pub fn top_by<'a, I>(items: I, blend: Blend, k: usize) -> Vec<(&'a CatalogItem, f64)>
where
    I: IntoIterator<Item = &'a CatalogItem>,
{
    let mut scored: Vec<(&CatalogItem, f64)> = items
        .into_iter()
        .map(|item| (item, blend.score(item)))
        .filter(|(_, s)| !s.is_nan())
        .collect();
    scored.sort_by(|(a, sa), (b, sb)| {
        (Reverse(OrderedFloat(*sa)), &a.id).cmp(&(Reverse(OrderedFloat(*sb)), &b.id))
    });
    scored.truncate(k);
    scored
}

/// Same-category ranking; `None` when the category holds fewer than `k`
/// other items or the item is unknown.
pub fn same_category<'a>(catalog: &'a Catalog, item_id: &'a str, k: usize) -> Option<Vec<(&'a CatalogItem, f64)>> {
    let category = catalog.get(item_id)?.category.as_deref()?;
    let peers: Vec<&CatalogItem> = catalog.same_category(item_id, category).collect();
    if peers.len() < k {
        return None;
    }
    Some(top_by(peers, Blend::SAME_CATEGORY, k))
}

/// Global top-rated list, never containing `exclude`.
///
/// Items rated at least [`TOP_RATED_THRESHOLD`] are preferred; when there
/// are none, every item is eligible.
pub fn global_top<'a>(catalog: &'a Catalog, exclude: Option<&str>, k: usize) -> Vec<(&'a CatalogItem, f64)> {
    let eligible = |item: &&CatalogItem| Some(item.id.as_str()) != exclude;
    let rated: Vec<&CatalogItem> = catalog
        .items()
        .iter()
        .filter(eligible)
        .filter(|item| item.rating >= TOP_RATED_THRESHOLD)
        .collect();
    if rated.is_empty() {
        top_by(catalog.items().iter().filter(eligible), Blend::GLOBAL, k)
    } else {
        top_by(rated, Blend::GLOBAL, k)
    }
}
