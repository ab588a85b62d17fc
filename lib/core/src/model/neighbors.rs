use crate::vector::Vector;
use ahash::{AHashMap, AHashSet};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    #[default]
    Cosine,
    Euclidean,
}

/// One neighbor returned by [`NeighborModel::kneighbors`].
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Brute-force nearest-neighbor model over a fixed item-feature matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborModel {
    #[serde(default)]
    pub metric: Distance,
    /// Item id of each matrix row.
    pub item_ids: Vec<String>,
    pub matrix: Vec<Vector>,
    #[serde(skip)]
    positions: OnceLock<AHashMap<String, usize>>,
}

impl PartialEq for NeighborModel {
    fn eq(&self, other: &Self) -> bool {
        self.metric == other.metric && self.item_ids == other.item_ids && self.matrix == other.matrix
    }
}

impl NeighborModel {
    pub fn new(metric: Distance, item_ids: Vec<String>, matrix: Vec<Vector>) -> Self {
        Self {
            metric,
            item_ids,
            matrix,
            positions: OnceLock::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Row index of an item.
    pub fn position(&self, item_id: &str) -> Option<usize> {
        self.positions
            .get_or_init(|| {
                self.item_ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| (id.clone(), i))
                    .collect()
            })
            .get(item_id)
            .copied()
    }

    #[inline]
    pub fn row(&self, index: usize) -> Option<&Vector> {
        self.matrix.get(index)
    }

    #[inline]
    pub fn item_id(&self, index: usize) -> Option<&str> {
        self.item_ids.get(index).map(String::as_str)
    }

    pub(crate) fn validate(&self, schema: &crate::schema::FeatureSchema) -> Result<(), String> {
        if self.item_ids.is_empty() {
            return Err("neighbor model has no items".to_string());
        }
        if self.item_ids.len() != self.matrix.len() {
            return Err(format!("{} item ids for {} matrix rows", self.item_ids.len(), self.matrix.len()));
        }
        if let Some(row) = self.matrix.iter().find(|r| r.dim() != schema.len()) {
            return Err(format!("matrix row of width {} for {} features", row.dim(), schema.len()));
        }
        let mut seen = AHashSet::with_capacity(self.item_ids.len());
        if let Some(dup) = self.item_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(format!("duplicate item id '{}'", dup));
        }
        Ok(())
    }

    fn distance(&self, a: &Vector, b: &Vector) -> f32 {
        match self.metric {
            Distance::Cosine => a.cosine_distance(b),
            Distance::Euclidean => a.l2_distance(b),
        }
    }

    /// The `n` rows closest to `query`, nearest first; ties go to the lower row.
    pub fn kneighbors(&self, query: &Vector, n: usize) -> Vec<Neighbor> {
        let mut scored: Vec<Neighbor> = self
            .matrix
            .iter()
            .enumerate()
            .map(|(index, row)| Neighbor {
                index,
                distance: self.distance(query, row),
            })
            .filter(|n| !n.distance.is_nan())
            .collect();
        scored.sort_by_key(|n| (OrderedFloat(n.distance), n.index));
        scored.truncate(n);
        scored
    }
}
