//! Material entity type - catalog items (raw materials and finished products)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::entity::{default_revision, Entity};
use crate::core::identity::{EntityId, EntityPrefix};

/// A purchasable or manufacturable catalog item
///
/// Finished products use the same record as raw materials; a product is a
/// material that some bill of materials produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Unique identifier
    pub id: EntityId,

    /// Display name
    pub name: String,

    /// Internal reference code (e.g., "FG-NUG-500")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_reference: Option<String>,

    /// Stated cost per unit
    #[serde(default)]
    pub unit_cost: Decimal,

    /// Sales price per unit
    #[serde(default)]
    pub sales_price: Decimal,

    /// Unit of measure (kg, pcs, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,

    /// Quantity on hand; `None` means stock is not tracked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_hand: Option<f64>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Author (who created this material)
    pub author: String,

    /// Entity revision number
    #[serde(default = "default_revision")]
    pub entity_revision: u32,
}

impl Entity for Material {
    const PREFIX: EntityPrefix = EntityPrefix::Mat;
    const DIR: &'static str = "catalog/materials";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.name
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn revision(&self) -> u32 {
        self.entity_revision
    }
}

impl Material {
    /// Create a new material with a stated unit cost
    pub fn new(name: String, unit_cost: Decimal, author: String) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Mat),
            name,
            internal_reference: None,
            unit_cost,
            sales_price: Decimal::ZERO,
            uom: None,
            on_hand: None,
            created: Utc::now(),
            author,
            entity_revision: 1,
        }
    }

    /// Whether `qty` can be drawn from stock
    ///
    /// Untracked materials are always available.
    pub fn has_available(&self, qty: f64) -> bool {
        self.on_hand.map_or(true, |on_hand| on_hand >= qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_creation() {
        let mat = Material::new("Chicken breast".to_string(), Decimal::from(42_000), "test".to_string());

        assert!(mat.id.to_string().starts_with("MAT-"));
        assert_eq!(mat.name, "Chicken breast");
        assert_eq!(mat.unit_cost, Decimal::from(42_000));
        assert_eq!(mat.sales_price, Decimal::ZERO);
        assert_eq!(mat.entity_revision, 1);
    }

    #[test]
    fn test_material_roundtrip() {
        let mut mat = Material::new("Breadcrumbs".to_string(), Decimal::new(1250, 2), "test".to_string());
        mat.internal_reference = Some("RM-BRD".to_string());
        mat.on_hand = Some(12.5);

        let yaml = serde_yml::to_string(&mat).unwrap();
        let parsed: Material = serde_yml::from_str(&yaml).unwrap();

        assert_eq!(mat, parsed);
    }

    #[test]
    fn test_availability() {
        let mut mat = Material::new("Salt".to_string(), Decimal::ONE, "test".to_string());
        assert!(mat.has_available(1_000_000.0));

        mat.on_hand = Some(3.0);
        assert!(mat.has_available(3.0));
        assert!(!mat.has_available(3.5));
    }

    #[test]
    fn test_numeric_cost_in_yaml() {
        let id = EntityId::new(EntityPrefix::Mat);
        let yaml = format!(
            "id: {}\nname: Flour\nunit_cost: 1000\ncreated: 2024-01-01T00:00:00Z\nauthor: test\n",
            id
        );
        let mat: Material = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(mat.unit_cost, Decimal::from(1000));
        assert_eq!(mat.entity_revision, 1);
    }
}
