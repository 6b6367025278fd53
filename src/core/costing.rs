//! Bill-of-materials cost rollup
//!
//! Turns a BoM and a production quantity into scaled component quantities and
//! costs. Components that are themselves manufactured are costed by recursing
//! into their own BoM, depth first. The product's catalog cost is reported
//! next to the bottom-up rollup; the two are never reconciled.
//!
//! Quantities stay `f64` at full precision through every level; money is
//! `Decimal`, normalized but never rounded. Rounding is left to whoever
//! prints the result.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::core::store::{Store, StoreError};
use crate::entities::{BillOfMaterials, Material};

/// Errors from computing a cost breakdown
#[derive(Debug, Error)]
pub enum CostError {
    #[error("Invalid quantity: {0} (must be a finite number greater than zero)")]
    InvalidQuantity(f64),

    #[error("Invalid bill of materials {bom_id}: {reason}")]
    InvalidBomDefinition { bom_id: String, reason: String },

    #[error("Cyclic BoM reference: {}", path.join(" -> "))]
    CyclicBomReference { path: Vec<String> },

    #[error("Cost of BoM {bom_id} at quantity {qty} is out of range")]
    Overflow { bom_id: String, qty: f64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where a component's unit cost came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    /// Stated catalog cost
    Catalog,
    /// Rolled up from the component's own BoM
    SubBom,
}

impl std::fmt::Display for CostSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostSource::Catalog => write!(f, "catalog"),
            CostSource::SubBom => write!(f, "sub-bom"),
        }
    }
}

/// Cost of one BoM line at the requested quantity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentCost {
    pub material_id: String,
    pub name: String,
    pub per_unit_qty: f64,
    /// `produced_qty * per_unit_qty / base_qty`
    pub scaled_qty: f64,
    pub component_unit_cost: Decimal,
    /// `scaled_qty * component_unit_cost`
    pub component_total_cost: Decimal,
    pub source: CostSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_breakdown: Option<Box<CostBreakdown>>,
}

/// Result of a cost rollup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub bom_id: String,
    pub product_id: String,
    pub product_name: String,
    pub produced_qty: f64,
    /// Catalog-stated cost of one product unit
    pub product_unit_cost: Decimal,
    pub product_sales_price: Decimal,
    /// `produced_qty * product_unit_cost`
    pub product_total_cost: Decimal,
    /// Component cost of one product unit, rolled up
    pub boms_unit_cost: Decimal,
    /// `boms_unit_cost * produced_qty`
    pub boms_cost: Decimal,
    pub components: Vec<ComponentCost>,
}

impl CostBreakdown {
    /// Every component line, depth first, with its nesting depth
    pub fn flatten(&self) -> Vec<(usize, &ComponentCost)> {
        let mut lines = Vec::new();
        collect_lines(self, 0, &mut lines);
        lines
    }

    /// Difference between the bottom-up rollup and the catalog cost
    pub fn rollup_variance(&self) -> Decimal {
        self.boms_cost.saturating_sub(self.product_total_cost)
    }
}

fn collect_lines<'a>(
    breakdown: &'a CostBreakdown,
    depth: usize,
    lines: &mut Vec<(usize, &'a ComponentCost)>,
) {
    for line in &breakdown.components {
        lines.push((depth, line));
        if let Some(sub) = &line.sub_breakdown {
            collect_lines(sub, depth + 1, lines);
        }
    }
}

/// Round a quantity for display
pub fn round_qty(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Compute the cost breakdown of producing `produced_qty` units from `bom`
///
/// `resolve_sub_bom` maps a component's material id to the BoM that makes it
/// (or `None` for purchased materials); `catalog` looks up materials. Errors
/// from either are returned as-is inside [`CostError::Store`].
pub fn compute_breakdown<R, C>(
    bom: &BillOfMaterials,
    produced_qty: f64,
    resolve_sub_bom: R,
    catalog: C,
) -> Result<CostBreakdown, CostError>
where
    R: Fn(&str) -> Result<Option<BillOfMaterials>, StoreError>,
    C: Fn(&str) -> Result<Material, StoreError>,
{
    let mut stack = Vec::new();
    rollup(bom, produced_qty, &resolve_sub_bom, &catalog, &mut stack)
}

/// [`compute_breakdown`] with sub-BoMs and materials looked up in a store
pub fn compute_breakdown_with<S: Store + ?Sized>(
    store: &S,
    bom: &BillOfMaterials,
    produced_qty: f64,
) -> Result<CostBreakdown, CostError> {
    compute_breakdown(
        bom,
        produced_qty,
        |product_id| store.find_bom_for_product(product_id),
        |material_id| store.fetch_material(material_id),
    )
}

/// Check a BoM's own invariants (not its sub-BoMs)
pub fn validate_bom(bom: &BillOfMaterials) -> Result<(), CostError> {
    let invalid = |reason: String| CostError::InvalidBomDefinition {
        bom_id: bom.id.to_string(),
        reason,
    };

    if !(bom.base_qty.is_finite() && bom.base_qty > 0.0) {
        return Err(invalid(format!("base_qty must be greater than zero, got {}", bom.base_qty)));
    }

    if let Some(line) = bom
        .components
        .iter()
        .find(|c| !(c.per_unit_qty.is_finite() && c.per_unit_qty > 0.0))
    {
        return Err(invalid(format!(
            "component {} has per_unit_qty {}, must be greater than zero",
            line.material_id, line.per_unit_qty
        )));
    }

    Ok(())
}

fn validate_qty(qty: f64) -> Result<(), CostError> {
    if qty.is_finite() && qty > 0.0 {
        Ok(())
    } else {
        Err(CostError::InvalidQuantity(qty))
    }
}

fn to_money_factor(qty: f64) -> Result<Decimal, CostError> {
    Decimal::try_from(qty).map_err(|_| CostError::InvalidQuantity(qty))
}

fn money_mul(bom: &BillOfMaterials, qty: f64, a: Decimal, b: Decimal) -> Result<Decimal, CostError> {
    a.checked_mul(b).ok_or_else(|| CostError::Overflow {
        bom_id: bom.id.to_string(),
        qty,
    })
}

fn rollup<R, C>(
    bom: &BillOfMaterials,
    produced_qty: f64,
    resolve_sub_bom: &R,
    catalog: &C,
    stack: &mut Vec<String>,
) -> Result<CostBreakdown, CostError>
where
    R: Fn(&str) -> Result<Option<BillOfMaterials>, StoreError>,
    C: Fn(&str) -> Result<Material, StoreError>,
{
    validate_qty(produced_qty)?;
    validate_bom(bom)?;

    if stack.contains(&bom.product_id) {
        let mut path = stack.clone();
        path.push(bom.product_id.clone());
        return Err(CostError::CyclicBomReference { path });
    }

    tracing::debug!(
        bom = %bom.id,
        product = %bom.product_id,
        depth = stack.len(),
        produced_qty,
        "rolling up bom"
    );

    stack.push(bom.product_id.clone());
    let result = rollup_lines(bom, produced_qty, resolve_sub_bom, catalog, stack);
    stack.pop();
    result
}

fn rollup_lines<R, C>(
    bom: &BillOfMaterials,
    produced_qty: f64,
    resolve_sub_bom: &R,
    catalog: &C,
    stack: &mut Vec<String>,
) -> Result<CostBreakdown, CostError>
where
    R: Fn(&str) -> Result<Option<BillOfMaterials>, StoreError>,
    C: Fn(&str) -> Result<Material, StoreError>,
{
    let product = catalog(&bom.product_id)?;
    let scale = produced_qty / bom.base_qty;

    let mut components = Vec::with_capacity(bom.components.len());
    let mut boms_unit_cost = Decimal::ZERO;

    for line in &bom.components {
        let scaled_qty = line.per_unit_qty * scale;

        let cost = match resolve_sub_bom(&line.material_id)? {
            Some(sub_bom) => {
                let sub = rollup(&sub_bom, scaled_qty, resolve_sub_bom, catalog, stack)?;
                ComponentCost {
                    material_id: line.material_id.clone(),
                    name: sub.product_name.clone(),
                    per_unit_qty: line.per_unit_qty,
                    scaled_qty,
                    component_unit_cost: sub.boms_unit_cost,
                    component_total_cost: money_mul(
                        bom,
                        produced_qty,
                        to_money_factor(scaled_qty)?,
                        sub.boms_unit_cost,
                    )?
                    .normalize(),
                    source: CostSource::SubBom,
                    sub_breakdown: Some(Box::new(sub)),
                }
            }
            None => {
                let material = catalog(&line.material_id)?;
                ComponentCost {
                    material_id: line.material_id.clone(),
                    name: material.name,
                    per_unit_qty: line.per_unit_qty,
                    scaled_qty,
                    component_unit_cost: material.unit_cost,
                    component_total_cost: money_mul(
                        bom,
                        produced_qty,
                        to_money_factor(scaled_qty)?,
                        material.unit_cost,
                    )?
                    .normalize(),
                    source: CostSource::Catalog,
                    sub_breakdown: None,
                }
            }
        };

        let line_unit_cost = money_mul(
            bom,
            produced_qty,
            to_money_factor(line.per_unit_qty / bom.base_qty)?,
            cost.component_unit_cost,
        )?;
        boms_unit_cost = boms_unit_cost
            .checked_add(line_unit_cost)
            .ok_or_else(|| CostError::Overflow {
                bom_id: bom.id.to_string(),
                qty: produced_qty,
            })?;
        components.push(cost);
    }

    let produced = to_money_factor(produced_qty)?;
    let boms_unit_cost = boms_unit_cost.normalize();

    Ok(CostBreakdown {
        bom_id: bom.id.to_string(),
        product_id: bom.product_id.clone(),
        product_name: product.name,
        produced_qty,
        product_unit_cost: product.unit_cost,
        product_sales_price: product.sales_price,
        product_total_cost: money_mul(bom, produced_qty, produced, product.unit_cost)?.normalize(),
        boms_unit_cost,
        boms_cost: money_mul(bom, produced_qty, boms_unit_cost, produced)?.normalize(),
        components,
    })
}
