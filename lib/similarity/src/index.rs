//! Nearest-neighbor recommendations with rule-based degradation
//!
//! ```text
//!  recommend(item, k)
//!        │
//!        ▼
//!  ┌─────────────┐  artifact missing / item not indexed
//!  │  neighbors  │──────────────────┐
//!  └─────────────┘                  ▼
//!                           ┌───────────────┐  category too small
//!                           │ same_category │──────────────┐
//!                           └───────────────┘              ▼
//!                                                   ┌────────────┐
//!                                                   │ global_top │
//!                                                   └────────────┘
//! ```

use crate::catalog::{Catalog, CatalogItem};
use crate::rank;
use modelvault_core::{FallbackChain, NeighborModel, Vector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which tier produced a recommendation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationMethod {
    Neighbors,
    SameCategory,
    GlobalTop,
}

impl RecommendationMethod {
    fn from_tier(tier: &str) -> Self {
        match tier {
            "neighbors" => RecommendationMethod::Neighbors,
            "same_category" => RecommendationMethod::SameCategory,
            _ => RecommendationMethod::GlobalTop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// 1-based, consecutive.
    pub rank: usize,
    pub item_id: String,
    /// Similarity for neighbor results, blended rating score otherwise.
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<CatalogItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendations {
    pub method: RecommendationMethod,
    pub items: Vec<Recommendation>,
}

impl Recommendations {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Recommends items from a neighbor artifact when one is loaded, falling
/// back to deterministic catalog rankings otherwise.
pub struct SimilarityIndex<'a> {
    catalog: &'a Catalog,
    neighbors: Option<&'a NeighborModel>,
}

struct Query<'q> {
    item_id: &'q str,
    k: usize,
    min_similarity: f64,
}

impl<'a> SimilarityIndex<'a> {
    pub fn new(catalog: &'a Catalog, neighbors: Option<&'a NeighborModel>) -> Self {
        Self { catalog, neighbors }
    }

    pub fn has_artifact(&self) -> bool {
        self.neighbors.is_some_and(|n| !n.is_empty())
    }

    /// `k` items most similar to `item_id`, never including it.
    ///
    /// Never fails: an unknown item degrades to the global top list.
    pub fn recommend(&self, item_id: &str, k: usize, min_similarity: f64) -> Recommendations {
        if k == 0 {
            return Recommendations {
                method: if self.has_artifact() { RecommendationMethod::Neighbors } else { RecommendationMethod::GlobalTop },
                items: Vec::new(),
            };
        }

        let chain: FallbackChain<'_, Query<'_>, Vec<(String, f64)>> = FallbackChain::new()
            .tier("neighbors", |q: &Query<'_>| self.neighbor_tier(q))
            .tier("same_category", |q: &Query<'_>| {
                rank::same_category(self.catalog, q.item_id, q.k).map(owned)
            })
            .tier("global_top", |q: &Query<'_>| Some(owned(rank::global_top(self.catalog, Some(q.item_id), q.k))));

        let query = Query { item_id, k, min_similarity };
        match chain.resolve(&query) {
            Some(resolved) => self.package(RecommendationMethod::from_tier(resolved.tier), resolved.value),
            None => self.package(RecommendationMethod::GlobalTop, Vec::new()),
        }
    }

    /// `k` items nearest to a vector already in the artifact's feature space.
    /// Falls back to the global top list when no artifact is loaded.
    pub fn recommend_by_vector(&self, vector: &Vector, k: usize) -> Recommendations {
        let model = self.neighbors.filter(|m| !m.is_empty() && m.row(0).map(Vector::dim) == Some(vector.dim()));
        match model {
            Some(model) => {
                let hits = model
                    .kneighbors(vector, k)
                    .into_iter()
                    .filter_map(|n| model.item_id(n.index).map(|id| (id.to_string(), 1.0 - f64::from(n.distance))))
                    .collect();
                self.package(RecommendationMethod::Neighbors, hits)
            }
            None => {
                debug!(dim = vector.dim(), "no usable neighbor artifact for vector query");
                self.package(RecommendationMethod::GlobalTop, owned(rank::global_top(self.catalog, None, k)))
            }
        }
    }

    fn neighbor_tier(&self, q: &Query<'_>) -> Option<Vec<(String, f64)>> {
        let model = self.neighbors.filter(|m| !m.is_empty())?;
        let position = model.position(q.item_id)?;
        let row = model.row(position)?;

        let hits = model
            .kneighbors(row, q.k + 1)
            .into_iter()
            .filter(|n| n.index != position)
            .take(q.k)
            .filter_map(|n| {
                let similarity = 1.0 - f64::from(n.distance);
                let id = model.item_id(n.index)?;
                (similarity >= q.min_similarity).then(|| (id.to_string(), similarity))
            })
            .collect();
        Some(hits)
    }

    fn package(&self, method: RecommendationMethod, ranked: Vec<(String, f64)>) -> Recommendations {
        let items = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (item_id, score))| Recommendation {
                rank: i + 1,
                item: self.catalog.get(&item_id).cloned(),
                item_id,
                score,
            })
            .collect();
        Recommendations { method, items }
    }
}

fn owned(ranked: Vec<(&CatalogItem, f64)>) -> Vec<(String, f64)> {
    ranked.into_iter().map(|(item, score)| (item.id.clone(), score)).collect()
}
