//! The catalog of items that can be placed on the play field.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    /// Identifier used by layout objects.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Sugar added when the item is grabbed.
    pub sugar_value: i64,
}

impl CatalogItem {
    /// Creates a catalog entry.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, sugar_value: i64) -> Self {
        Self {
            id,
            name: name.into(),
            sugar_value,
        }
    }
}

/// Read-only list of catalog items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            items: vec![
                CatalogItem::new(1, "Candy", 15),
                CatalogItem::new(2, "Chocolate", 25),
                CatalogItem::new(3, "Gummy Bear", 20),
                CatalogItem::new(4, "Lollipop", 30),
            ],
        }
    }
}

impl Catalog {
    /// Loads the catalog from `path`, or the built-in one when `None`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConfigParseError` if the file cannot be read or
    /// is not a JSON array of items, and `CoreError::ConfigValidationError`
    /// if two items share an id.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path)
            .map_err(|e| CoreError::config_parse(path, format!("failed to read catalog: {e}")))?;
        let items: Vec<CatalogItem> = serde_json::from_str(&contents)
            .map_err(|e| CoreError::config_parse(path, e.to_string()))?;

        let catalog = Self { items };
        if let Some(id) = catalog.duplicate_id() {
            return Err(CoreError::config_validation(
                format!("catalog id {id} appears more than once"),
                "Give every catalog item a unique id",
            ));
        }
        Ok(catalog)
    }

    /// All items, in file order.
    #[must_use]
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    fn duplicate_id(&self) -> Option<i64> {
        self.items
            .iter()
            .enumerate()
            .find(|(i, item)| self.items[..*i].iter().any(|o| o.id == item.id))
            .map(|(_, item)| item.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = Catalog::load(None).unwrap();
        let names: Vec<_> = catalog.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Candy", "Chocolate", "Gummy Bear", "Lollipop"]);
        assert_eq!(catalog.items()[1].sugar_value, 25);
    }

    #[test]
    fn test_catalog_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, r#"[{"id": 9, "name": "Marshmallow", "sugarValue": 12}]"#).unwrap();

        let catalog = Catalog::load(Some(&path)).unwrap();
        assert_eq!(catalog.items(), [CatalogItem::new(9, "Marshmallow", 12)]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "name": "A", "sugarValue": 1}, {"id": 1, "name": "B", "sugarValue": 2}]"#,
        )
        .unwrap();

        assert!(Catalog::load(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_catalog_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Catalog::load(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(err.is_fatal());
    }
}
