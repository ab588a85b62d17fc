//! Read-only reference tables consumed by the adapters
//!
//! Tables are loaded from a directory of JSON files. A missing file is not
//! an error: the table falls back to its documented default and a warning
//! is logged. A file that exists but does not parse is an error, so a bad
//! refresh never silently replaces good data.

use crate::geo::GeoPoint;
use ahash::AHashMap;
use modelvault_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

pub const SELLER_DISPATCH_FILE: &str = "seller_dispatch.json";
pub const REGIONS_FILE: &str = "regions.json";
pub const CATEGORY_BASELINES_FILE: &str = "category_baselines.json";

/// Global average dispatch time, in hours, when no table is available.
pub const DEFAULT_GLOBAL_DISPATCH_HOURS: f64 = 48.0;
pub const DEFAULT_REGION: &str = "SP";

/// Per-seller historical average dispatch time (hours).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerDispatch {
    pub global_average: f64,
    #[serde(default)]
    pub sellers: AHashMap<String, f64>,
}

impl Default for SellerDispatch {
    fn default() -> Self {
        Self {
            global_average: DEFAULT_GLOBAL_DISPATCH_HOURS,
            sellers: AHashMap::new(),
        }
    }
}

impl SellerDispatch {
    /// Seller average, or the global average for unseen sellers.
    pub fn lookup(&self, seller_id: Option<&str>) -> (f64, bool) {
        match seller_id.and_then(|id| self.sellers.get(id)) {
            Some(hours) => (*hours, true),
            None => (self.global_average, false),
        }
    }
}

/// Representative coordinates per state code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTable {
    pub regions: AHashMap<String, GeoPoint>,
    #[serde(default = "default_region")]
    pub fallback: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for RegionTable {
    fn default() -> Self {
        let regions = [
            ("SP", -23.55, -46.63),
            ("RJ", -22.91, -43.17),
            ("MG", -19.92, -43.94),
            ("PR", -25.42, -49.27),
            ("RS", -30.03, -51.23),
            ("BA", -12.97, -38.51),
            ("SC", -27.59, -48.55),
        ]
        .into_iter()
        .map(|(code, lat, lng)| (code.to_string(), GeoPoint::new(lat, lng)))
        .collect();
        Self {
            regions,
            fallback: default_region(),
        }
    }
}

impl RegionTable {
    /// Coordinates for a state code; unknown codes resolve to the fallback region.
    pub fn resolve(&self, state: &str) -> Option<GeoPoint> {
        self.regions
            .get(&state.trim().to_ascii_uppercase())
            .or_else(|| self.regions.get(&self.fallback))
            .copied()
    }
}

/// Monthly sales baseline of a product category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryBaseline {
    pub avg_sales: f64,
    #[serde(default)]
    pub std_sales: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryBaselines {
    pub categories: AHashMap<String, CategoryBaseline>,
}

impl CategoryBaselines {
    pub fn get(&self, category: &str) -> Option<CategoryBaseline> {
        self.categories.get(category).copied()
    }
}

/// Every table the adapters read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceData {
    pub seller_dispatch: SellerDispatch,
    pub regions: RegionTable,
    pub category_baselines: CategoryBaselines,
}

impl ReferenceData {
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let data = Self {
            seller_dispatch: load_or_default(&dir.join(SELLER_DISPATCH_FILE))?,
            regions: load_or_default(&dir.join(REGIONS_FILE))?,
            category_baselines: load_or_default(&dir.join(CATEGORY_BASELINES_FILE))?,
        };
        info!(
            dir = %dir.display(),
            sellers = data.seller_dispatch.sellers.len(),
            regions = data.regions.regions.len(),
            categories = data.category_baselines.categories.len(),
            "loaded reference data"
        );
        Ok(data)
    }
}

/// Parse a JSON table, or fall back to its default when the file is absent.
pub fn load_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let missing = Error::ReferenceDataMissing(path.display().to_string());
            warn!(error = %missing, "using default reference table");
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}
