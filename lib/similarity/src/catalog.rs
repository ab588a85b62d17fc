//! Product catalog snapshot used for display and rule-based ranking

use ahash::AHashMap;
use modelvault_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

pub const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(alias = "product_id")]
    pub id: String,
    #[serde(default, alias = "product_category_name")]
    pub category: Option<String>,
    #[serde(default, alias = "review_score")]
    pub rating: f64,
    #[serde(default)]
    pub order_count: u64,
    #[serde(default)]
    pub avg_price: Option<f64>,
}

/// Immutable list of items with an id index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    index: AHashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog; later duplicates of an id are ignored.
    pub fn new(items: Vec<CatalogItem>) -> Self {
        let mut kept = Vec::with_capacity(items.len());
        let mut index = AHashMap::with_capacity(items.len());
        for item in items {
            if index.contains_key(&item.id) {
                warn!(id = %item.id, "duplicate catalog item ignored");
                continue;
            }
            index.insert(item.id.clone(), kept.len());
            kept.push(item);
        }
        Self { items: kept, index }
    }

    /// Load a JSON array of items. An absent file gives an empty catalog.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(bytes) => {
                let items: Vec<CatalogItem> = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))?;
                Ok(Self::new(items))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let missing = Error::ReferenceDataMissing(path.display().to_string());
                warn!(error = %missing, "using empty catalog");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    /// Items sharing a category, excluding `id` itself.
    pub fn same_category<'a>(&'a self, id: &'a str, category: &'a str) -> impl Iterator<Item = &'a CatalogItem> + 'a {
        self.items
            .iter()
            .filter(move |item| item.id != id && item.category.as_deref() == Some(category))
    }
}
