//! Catalog snapshots
//!
//! A `SchemaCatalog` is stored as pretty JSON wrapped in a `CatalogFile`
//! that records the snapshot schema version. Loading validates the catalog's
//! cross-record invariants, so a hand-edited snapshot with a dangling
//! relation is rejected up front.

use crate::{SCHEMA_VERSION, SchemaCatalog};
use metaquery_core::{EngineError, EngineResult, Validatable};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// Catalog File Wrapper
// ============================================================================

/// Wrapper for catalog snapshots that includes version information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    /// Snapshot schema version
    pub schema_version: u32,

    /// The catalog data
    pub catalog: SchemaCatalog,
}

impl CatalogFile {
    /// Wrap a catalog at the current schema version
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            catalog,
        }
    }
}

/// Bring a raw snapshot up to the current schema version, one step at a time
fn migrate(mut raw: serde_json::Value) -> EngineResult<serde_json::Value> {
    let mut version = raw
        .get("schemaVersion")
        .and_then(|v| v.as_u64())
        .unwrap_or(u64::from(SCHEMA_VERSION)) as u32;

    if version > SCHEMA_VERSION {
        return Err(EngineError::InvalidConfig(format!(
            "catalog snapshot version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }

    while version < SCHEMA_VERSION {
        version += 1;
        tracing::debug!(version, "Migrated catalog snapshot");
    }

    if let Some(obj) = raw.as_object_mut() {
        obj.insert("schemaVersion".to_string(), serde_json::Value::from(version));
    }
    Ok(raw)
}

// ============================================================================
// Save Functions
// ============================================================================

/// Serialize a catalog snapshot to a JSON string
pub fn save_catalog_to_string(catalog: &SchemaCatalog) -> EngineResult<String> {
    let file = CatalogFile::new(catalog.clone());
    serde_json::to_string_pretty(&file).map_err(EngineError::from)
}

/// Save a catalog snapshot to a file
///
/// # Example
///
/// ```rust,ignore
/// use metaquery_ir::{SchemaCatalog, save_catalog};
///
/// let catalog = SchemaCatalog::new();
/// save_catalog(&catalog, "catalog.json").unwrap();
/// ```
pub fn save_catalog(catalog: &SchemaCatalog, path: impl AsRef<Path>) -> EngineResult<()> {
    let path = path.as_ref();
    let json = save_catalog_to_string(catalog)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::FileWrite {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
    }

    std::fs::write(path, json).map_err(|e| EngineError::FileWrite {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

// ============================================================================
// Load Functions
// ============================================================================

/// Load a catalog from a JSON string.
///
/// Accepts a versioned `CatalogFile` or a bare catalog object.
pub fn load_catalog_from_str(json: &str) -> EngineResult<SchemaCatalog> {
    let raw: serde_json::Value = serde_json::from_str(json)?;

    let catalog = if raw.get("catalog").is_some() {
        let file: CatalogFile = serde_json::from_value(migrate(raw)?)?;
        file.catalog
    } else {
        serde_json::from_value::<SchemaCatalog>(raw)?
    };

    catalog.validate()?;
    tracing::debug!(
        entities = catalog.entity_count(),
        relations = catalog.relation_count(),
        "Loaded catalog"
    );
    Ok(catalog)
}

/// Load a catalog snapshot from a file
pub fn load_catalog(path: impl AsRef<Path>) -> EngineResult<SchemaCatalog> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| EngineError::FileRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    load_catalog_from_str(&json).map_err(|e| match e {
        EngineError::JsonSerialization(je) => EngineError::FileRead {
            path: path.to_path_buf(),
            message: format!("Invalid catalog snapshot: {}", je),
        },
        other => other,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ShopFixture;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_file() {
        let shop = ShopFixture::new();
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.json");

        save_catalog(&shop.catalog, &path).unwrap();
        let loaded = load_catalog(&path).unwrap();

        assert_eq!(loaded.entity_count(), 3);
        assert_eq!(
            loaded.entity(shop.user.id).map(|e| e.table_name.as_str()),
            Some("users")
        );
        assert!(loaded.with_endpoints(shop.user_roles.id).is_some());
    }

    #[test]
    fn test_snapshot_carries_schema_version() {
        let shop = ShopFixture::new();
        let json = save_catalog_to_string(&shop.catalog).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(raw["schemaVersion"], SCHEMA_VERSION);
    }

    #[test]
    fn test_load_bare_catalog() {
        let shop = ShopFixture::new();
        let json = serde_json::to_string(&shop.catalog).unwrap();
        assert_eq!(load_catalog_from_str(&json).unwrap().relation_count(), 2);
    }

    #[test]
    fn test_rejects_newer_snapshot() {
        let json = r#"{ "schemaVersion": 999, "catalog": {} }"#;
        let err = load_catalog_from_str(json).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_dangling_relation() {
        let mut shop = ShopFixture::new();
        shop.catalog.entities.remove(&shop.order.id);
        let json = save_catalog_to_string(&shop.catalog).unwrap();
        let err = load_catalog_from_str(&json).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_catalog("/definitely/not/here.json").unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_load_invalid_json_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_catalog(&path).unwrap_err();
        assert!(matches!(err, EngineError::FileRead { .. }));
    }
}
