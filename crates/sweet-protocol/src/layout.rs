//! Layout records placed within the claw's reachable area.

use serde::{Deserialize, Serialize};

/// An item placed on the play field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutObject {
    /// Catalog identifier of the item.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Sugar added to the level when the item is grabbed.
    pub sugar_value: i64,
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl LayoutObject {
    /// Creates a new layout object.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, sugar_value: i64, x: i32, y: i32) -> Self {
        Self {
            id,
            name: name.into(),
            sugar_value,
            x,
            y,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_object_uses_camel_case() {
        let object = LayoutObject::new(1, "Candy", 15, 10, 10);
        let json = serde_json::to_string(&object).unwrap();
        assert!(json.contains(r#""sugarValue":15"#));
        assert!(!json.contains("sugar_value"));
    }
}
