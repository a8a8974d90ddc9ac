//! Scheme catalog loading
//!
//! The catalog is static reference data: loaded once at process start,
//! read-only afterwards, shared across sessions without synchronization.
//! An explicitly configured catalog path that cannot be read or parsed
//! aborts startup; with no path configured, the embedded default catalog
//! is used.

use sdk::errors::EngineError;
use sdk::scheme::SchemeDefinition;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// Default catalog embedded at compile time
const DEFAULT_CATALOG: &str = include_str!("../../data/schemes.json");

/// On-disk catalog file shape
#[derive(Debug, Deserialize)]
struct CatalogFile {
    schemes: Vec<SchemeDefinition>,
}

/// The loaded scheme catalog, sorted by scheme id
#[derive(Debug, Clone)]
pub struct SchemeCatalog {
    schemes: Vec<SchemeDefinition>,
}

impl SchemeCatalog {
    /// Load the catalog from an explicit path, or fall back to the embedded
    /// default catalog when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let contents = match path {
            Some(p) => fs::read_to_string(p).map_err(|e| {
                EngineError::Catalog(format!("Failed to read catalog {:?}: {}", p, e))
            })?,
            None => DEFAULT_CATALOG.to_string(),
        };

        let catalog = Self::from_json(&contents)?;
        info!(
            schemes = catalog.len(),
            source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "embedded".to_string()),
            "Loaded scheme catalog"
        );
        Ok(catalog)
    }

    /// Parse a catalog from its JSON representation
    pub fn from_json(contents: &str) -> Result<Self, EngineError> {
        let file: CatalogFile = serde_json::from_str(contents)
            .map_err(|e| EngineError::Catalog(format!("Failed to parse catalog: {}", e)))?;

        let mut seen = HashSet::new();
        for scheme in &file.schemes {
            if !seen.insert(scheme.id.as_str()) {
                return Err(EngineError::Catalog(format!(
                    "Duplicate scheme id '{}'",
                    scheme.id
                )));
            }
        }

        let mut schemes = file.schemes;
        schemes.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Self { schemes })
    }

    /// Build a catalog directly from scheme definitions (used by tests)
    pub fn from_schemes(mut schemes: Vec<SchemeDefinition>) -> Self {
        schemes.sort_by(|a, b| a.id.cmp(&b.id));
        Self { schemes }
    }

    /// Look up a scheme by id
    pub fn get(&self, id: &str) -> Option<&SchemeDefinition> {
        self.schemes
            .binary_search_by(|s| s.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.schemes[i])
    }

    /// All schemes, ordered by id
    pub fn schemes(&self) -> &[SchemeDefinition] {
        &self.schemes
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default_catalog_loads() {
        let catalog = SchemeCatalog::load(None).unwrap();
        assert!(!catalog.is_empty());
        assert!(catalog.get("pm_ujjwala").is_some());
        assert!(catalog.get("no_such_scheme").is_none());
    }

    #[test]
    fn test_missing_explicit_path_aborts() {
        let err = SchemeCatalog::load(Some(Path::new("/nonexistent/schemes.json"))).unwrap_err();
        assert!(matches!(err, EngineError::Catalog(_)));
    }

    #[test]
    fn test_corrupt_catalog_rejected() {
        let err = SchemeCatalog::from_json("{not json").unwrap_err();
        assert!(matches!(err, EngineError::Catalog(_)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{"schemes": [
            {"id": "a", "name": "A", "criteria": []},
            {"id": "a", "name": "A again", "criteria": []}
        ]}"#;
        let err = SchemeCatalog::from_json(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_schemes_sorted_by_id() {
        let json = r#"{"schemes": [
            {"id": "zeta", "name": "Z", "criteria": []},
            {"id": "alpha", "name": "A", "criteria": []}
        ]}"#;
        let catalog = SchemeCatalog::from_json(json).unwrap();
        assert_eq!(catalog.schemes()[0].id, "alpha");
        assert_eq!(catalog.schemes()[1].id, "zeta");
    }
}
