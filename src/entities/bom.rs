//! Bill of materials entity type - recipes for manufactured products

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::{default_revision, Entity};
use crate::core::identity::{EntityId, EntityPrefix};

/// One line of a bill of materials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomComponent {
    /// Material ID (MAT-...); may itself be a product with its own BoM
    #[serde(alias = "product_id")]
    pub material_id: String,

    /// Quantity consumed per `base_qty` units of the parent product
    pub per_unit_qty: f64,
}

impl BomComponent {
    pub fn new(material_id: impl Into<String>, per_unit_qty: f64) -> Self {
        Self {
            material_id: material_id.into(),
            per_unit_qty,
        }
    }
}

/// A bill of materials for a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterials {
    /// Unique identifier
    pub id: EntityId,

    /// Product this BoM produces (MAT-...)
    pub product_id: String,

    /// Human label (e.g., "Nugget 500g - v2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Product quantity the component quantities describe
    #[serde(default = "default_base_qty")]
    pub base_qty: f64,

    /// Component lines, in display order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<BomComponent>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Author (who created this BoM)
    pub author: String,

    /// Entity revision number
    #[serde(default = "default_revision")]
    pub entity_revision: u32,
}

fn default_base_qty() -> f64 {
    1.0
}

impl Entity for BillOfMaterials {
    const PREFIX: EntityPrefix = EntityPrefix::Bom;
    const DIR: &'static str = "manufacturing/boms";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> &str {
        self.reference.as_deref().unwrap_or(&self.product_id)
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

impl BillOfMaterials {
    /// Create an empty BoM for a product, describing one unit
    pub fn new(product_id: impl Into<String>, author: String) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Bom),
            product_id: product_id.into(),
            reference: None,
            base_qty: default_base_qty(),
            components: Vec::new(),
            created: Utc::now(),
            author,
            entity_revision: 1,
        }
    }

    /// Builder-style component append
    pub fn with_component(mut self, material_id: impl Into<String>, per_unit_qty: f64) -> Self {
        self.components.push(BomComponent::new(material_id, per_unit_qty));
        self
    }

    /// Find the line for a material
    pub fn component(&self, material_id: &str) -> Option<&BomComponent> {
        self.components.iter().find(|c| c.material_id == material_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_defaults() {
        let bom = BillOfMaterials::new("MAT-X", "test".to_string());
        assert!(bom.id.to_string().starts_with("BOM-"));
        assert_eq!(bom.base_qty, 1.0);
        assert!(bom.components.is_empty());
        assert_eq!(bom.title(), "MAT-X");
    }

    #[test]
    fn test_bom_yaml_defaults_and_alias() {
        let id = EntityId::new(EntityPrefix::Bom);
        let yaml = format!(
            r#"id: {}
product_id: MAT-A
components:
  - material_id: MAT-B
    per_unit_qty: 0.5
  - product_id: MAT-C
    per_unit_qty: 2
created: 2024-01-01T00:00:00Z
author: test
"#,
            id
        );
        let bom: BillOfMaterials = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(bom.base_qty, 1.0);
        assert_eq!(bom.components.len(), 2);
        assert_eq!(bom.components[1].material_id, "MAT-C");
        assert_eq!(bom.components[1].per_unit_qty, 2.0);
    }

    #[test]
    fn test_component_lookup() {
        let bom = BillOfMaterials::new("MAT-A", "test".to_string())
            .with_component("MAT-B", 1.5)
            .with_component("MAT-C", 0.25);
        assert_eq!(bom.component("MAT-C").map(|c| c.per_unit_qty), Some(0.25));
        assert!(bom.component("MAT-Z").is_none());
    }
}
