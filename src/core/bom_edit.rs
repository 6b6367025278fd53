//! BoM editing as a pure reducer
//!
//! An edit never mutates the BoM it is given; `apply` returns the edited copy
//! or an error, leaving the caller's value untouched. Totals are not stored
//! on the BoM, they are recomputed from it through the cost engine.

use thiserror::Error;

use crate::entities::{BillOfMaterials, BomComponent};

/// A single change to a BoM
#[derive(Debug, Clone, PartialEq)]
pub enum BomEdit {
    /// Add a line; an existing line for the same material has its quantity increased
    AddComponent { material_id: String, per_unit_qty: f64 },
    RemoveComponent { material_id: String },
    SetComponentQty { material_id: String, per_unit_qty: f64 },
    SetBaseQty(f64),
    SetReference(Option<String>),
}

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("Quantity must be a finite number greater than zero, got {0}")]
    InvalidQuantity(f64),

    #[error("Component {0} is not in this BoM")]
    UnknownComponent(String),

    #[error("A BoM cannot contain its own product ({0})")]
    SelfReference(String),
}

fn positive(qty: f64) -> Result<f64, EditError> {
    if qty.is_finite() && qty > 0.0 {
        Ok(qty)
    } else {
        Err(EditError::InvalidQuantity(qty))
    }
}

/// Apply one edit, returning the new BoM
pub fn apply(bom: &BillOfMaterials, edit: BomEdit) -> Result<BillOfMaterials, EditError> {
    let mut next = bom.clone();

    match edit {
        BomEdit::AddComponent {
            material_id,
            per_unit_qty,
        } => {
            let qty = positive(per_unit_qty)?;
            if material_id == bom.product_id {
                return Err(EditError::SelfReference(material_id));
            }
            match next
                .components
                .iter_mut()
                .find(|c| c.material_id == material_id)
            {
                Some(line) => line.per_unit_qty += qty,
                None => next.components.push(BomComponent::new(material_id, qty)),
            }
        }
        BomEdit::RemoveComponent { material_id } => {
            let before = next.components.len();
            next.components.retain(|c| c.material_id != material_id);
            if next.components.len() == before {
                return Err(EditError::UnknownComponent(material_id));
            }
        }
        BomEdit::SetComponentQty {
            material_id,
            per_unit_qty,
        } => {
            let qty = positive(per_unit_qty)?;
            let line = next
                .components
                .iter_mut()
                .find(|c| c.material_id == material_id)
                .ok_or(EditError::UnknownComponent(material_id))?;
            line.per_unit_qty = qty;
        }
        BomEdit::SetBaseQty(qty) => {
            next.base_qty = positive(qty)?;
        }
        BomEdit::SetReference(reference) => {
            next.reference = reference.filter(|r| !r.trim().is_empty());
        }
    }

    next.entity_revision += 1;
    Ok(next)
}

/// Apply a sequence of edits, stopping at the first failure
pub fn apply_all(
    bom: &BillOfMaterials,
    edits: impl IntoIterator<Item = BomEdit>,
) -> Result<BillOfMaterials, EditError> {
    edits
        .into_iter()
        .try_fold(bom.clone(), |current, edit| apply(&current, edit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bom() -> BillOfMaterials {
        BillOfMaterials::new("MAT-P", "test".to_string()).with_component("MAT-A", 1.0)
    }

    #[test]
    fn test_add_new_and_merge_existing() {
        let start = bom();
        let next = apply(
            &start,
            BomEdit::AddComponent {
                material_id: "MAT-B".to_string(),
                per_unit_qty: 0.25,
            },
        )
        .unwrap();
        assert_eq!(next.components.len(), 2);

        let merged = apply(
            &next,
            BomEdit::AddComponent {
                material_id: "MAT-A".to_string(),
                per_unit_qty: 0.5,
            },
        )
        .unwrap();
        assert_eq!(merged.component("MAT-A").unwrap().per_unit_qty, 1.5);
        assert_eq!(merged.entity_revision, start.entity_revision + 2);

        // Input is untouched
        assert_eq!(start.components.len(), 1);
    }

    #[test]
    fn test_remove_unknown_component() {
        let err = apply(
            &bom(),
            BomEdit::RemoveComponent {
                material_id: "MAT-Z".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(err, EditError::UnknownComponent("MAT-Z".to_string()));
    }

    #[test]
    fn test_rejects_self_reference_and_bad_qty() {
        assert!(matches!(
            apply(
                &bom(),
                BomEdit::AddComponent {
                    material_id: "MAT-P".to_string(),
                    per_unit_qty: 1.0,
                }
            ),
            Err(EditError::SelfReference(_))
        ));
        assert!(matches!(
            apply(&bom(), BomEdit::SetBaseQty(-2.0)),
            Err(EditError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_apply_all_stops_on_error() {
        let result = apply_all(
            &bom(),
            vec![
                BomEdit::SetBaseQty(5.0),
                BomEdit::SetComponentQty {
                    material_id: "MAT-Q".to_string(),
                    per_unit_qty: 1.0,
                },
            ],
        );
        assert!(result.is_err());

        let ok = apply_all(
            &bom(),
            vec![
                BomEdit::SetBaseQty(5.0),
                BomEdit::SetReference(Some("Nugget 5kg".to_string())),
            ],
        )
        .unwrap();
        assert_eq!(ok.base_qty, 5.0);
        assert_eq!(ok.reference.as_deref(), Some("Nugget 5kg"));
    }
}
