//! Refreshable snapshot of every auxiliary table the service reads

use modelvault_core::Result;
use modelvault_features::ReferenceData;
use modelvault_similarity::{Catalog, CATALOG_FILE};
use std::path::Path;

/// Adapter tables plus the product catalog. Replaced whole on refresh,
/// never mutated.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    pub tables: ReferenceData,
    pub catalog: Catalog,
}

impl ReferenceSet {
    pub fn new(tables: ReferenceData, catalog: Catalog) -> Self {
        Self { tables, catalog }
    }

    /// Load every table from `dir`; absent files take their defaults.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            tables: ReferenceData::load_dir(dir)?,
            catalog: Catalog::from_json_file(dir.join(CATALOG_FILE))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dir_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let set = ReferenceSet::load_dir(dir.path()).unwrap();
        assert!(set.catalog.is_empty());
        assert_eq!(set.tables, ReferenceData::default());
    }

    #[test]
    fn test_malformed_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CATALOG_FILE), b"{not json").unwrap();
        assert!(ReferenceSet::load_dir(dir.path()).is_err());
    }
}
