//! Manufacturing order workflow
//!
//! Orders move through `Draft → Confirmed → Ready → InProgress → Done`, one
//! stage per `advance`. `cancel` sets the `failed` flag from any stage before
//! `Done` and is terminal. Product/BoM linkage and quantity can only be
//! changed while the order is a draft.
//!
//! Every transition takes the current order by reference and returns a new
//! one with `entity_revision` bumped; on error the caller's order is
//! unchanged. Persisting goes through [`Store::persist_manufacturing_order`],
//! whose revision check rejects a transition computed from a stale snapshot.

use chrono::Utc;
use thiserror::Error;

use crate::core::config::Config;
use crate::core::costing::{compute_breakdown_with, CostError};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::store::{Store, StoreError};
use crate::entities::{BillOfMaterials, ManufacturingOrder, MoComponent, MoState, MoStatus};

/// Errors from manufacturing order transitions
#[derive(Debug, Error)]
pub enum MoError {
    #[error("Invalid quantity: {0} (must be a finite number greater than zero)")]
    InvalidQuantity(f64),

    #[error("Invalid bill of materials {bom_id}: {reason}")]
    InvalidBomDefinition { bom_id: String, reason: String },

    #[error("Cyclic BoM reference: {}", path.join(" -> "))]
    CyclicBomReference { path: Vec<String> },

    #[error("Cost of BoM {bom_id} at quantity {qty} is out of range")]
    Overflow { bom_id: String, qty: f64 },

    #[error("BoM {bom_id} does not produce {product_id}")]
    BomMismatch { bom_id: String, product_id: String },

    #[error("Order {id} is {state}; product and BoM can only be changed in draft")]
    OrderLocked { id: String, state: MoState },

    #[error("Order {0} is already done")]
    AlreadyDone(String),

    #[error("Order {0} is cancelled")]
    OrderCancelled(String),

    #[error("Order {id} is short of components: {}", materials.join(", "))]
    ComponentsUnavailable { id: String, materials: Vec<String> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CostError> for MoError {
    fn from(err: CostError) -> Self {
        match err {
            CostError::InvalidQuantity(qty) => MoError::InvalidQuantity(qty),
            CostError::InvalidBomDefinition { bom_id, reason } => {
                MoError::InvalidBomDefinition { bom_id, reason }
            }
            CostError::CyclicBomReference { path } => MoError::CyclicBomReference { path },
            CostError::Overflow { bom_id, qty } => MoError::Overflow { bom_id, qty },
            CostError::Store(e) => MoError::Store(e),
        }
    }
}

/// Workflow settings
#[derive(Debug, Clone)]
pub struct MoWorkflowConfig {
    /// Block advancing past `Confirmed` while any component is short
    pub require_availability: bool,

    /// Prefix for generated references (default: "MO/")
    pub reference_prefix: String,
}

impl Default for MoWorkflowConfig {
    fn default() -> Self {
        Self {
            require_availability: false,
            reference_prefix: "MO/".to_string(),
        }
    }
}

impl MoWorkflowConfig {
    /// Create config from the main Config struct
    pub fn from_config(config: &Config) -> Self {
        Self {
            require_availability: config.require_availability(),
            reference_prefix: config.reference_prefix().to_string(),
        }
    }
}

/// Input for a new order
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub product_id: String,
    pub bom_id: String,
    pub qty: f64,
    /// Generated from the id when not given
    pub reference: Option<String>,
    pub author: String,
}

/// A requested change to an order
#[derive(Debug, Clone, PartialEq)]
pub enum MoAction {
    Advance,
    Cancel,
    Relink { product_id: String, bom_id: String },
    SetQuantity(f64),
}

/// A transition currently open to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advance { to: MoState },
    Cancel,
}

/// Whether `from → to` is an edge of the stage diagram
pub fn is_valid_transition(from: MoState, to: MoState) -> bool {
    from.next() == Some(to)
}

/// Transitions an order may take right now
pub fn allowed_transitions(order: &ManufacturingOrder) -> Vec<Transition> {
    if order.is_terminal() {
        return Vec::new();
    }
    let mut transitions = Vec::new();
    if let Some(to) = order.state.next() {
        transitions.push(Transition::Advance { to });
    }
    transitions.push(Transition::Cancel);
    transitions
}

fn validate_qty(qty: f64) -> Result<f64, MoError> {
    if qty.is_finite() && qty > 0.0 {
        Ok(qty)
    } else {
        Err(MoError::InvalidQuantity(qty))
    }
}

/// Manufacturing order state machine over a store
pub struct ManufacturingOrderStateMachine<'a, S: Store + ?Sized> {
    store: &'a S,
    config: MoWorkflowConfig,
}

impl<'a, S: Store + ?Sized> ManufacturingOrderStateMachine<'a, S> {
    pub fn new(store: &'a S, config: MoWorkflowConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &MoWorkflowConfig {
        &self.config
    }

    /// Build a draft order
    ///
    /// The BoM must exist and produce `product_id`. Components are resolved
    /// for the full quantity but not yet checked for availability.
    pub fn create(&self, input: CreateOrder) -> Result<ManufacturingOrder, MoError> {
        let qty = validate_qty(input.qty)?;
        let bom = self.bom_for(&input.bom_id, &input.product_id)?;

        let id = EntityId::new(EntityPrefix::Mo);
        let reference = input
            .reference
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| self.generate_reference(&id));

        let mut order = ManufacturingOrder {
            id,
            reference,
            product_id: input.product_id,
            bom_id: input.bom_id,
            qty,
            state: MoState::Draft,
            status: MoStatus::Process,
            components: Vec::new(),
            created: Utc::now(),
            updated: None,
            author: input.author,
            entity_revision: 1,
        };
        order.components = self.resolve_components(&bom, qty, &order.components)?;

        tracing::info!(order = %order.id, product = %order.product_id, qty, "created manufacturing order");
        Ok(order)
    }

    /// Move to the next stage
    pub fn advance(&self, order: &ManufacturingOrder) -> Result<ManufacturingOrder, MoError> {
        if order.is_cancelled() {
            return Err(MoError::OrderCancelled(order.id.to_string()));
        }
        let to = order
            .state
            .next()
            .ok_or_else(|| MoError::AlreadyDone(order.id.to_string()))?;

        let bom = self.store.fetch_bom(&order.bom_id)?;
        let mut components = self.resolve_components(&bom, order.qty, &order.components)?;

        // Every target is Confirmed or later: entering Confirmed runs the
        // check and each later advance re-runs it against current stock
        self.check_availability(&mut components)?;

        if self.config.require_availability && to > MoState::Confirmed {
            let short: Vec<String> = components
                .iter()
                .filter(|c| !c.available)
                .map(|c| c.material_id.clone())
                .collect();
            if !short.is_empty() {
                return Err(MoError::ComponentsUnavailable {
                    id: order.id.to_string(),
                    materials: short,
                });
            }
        }

        if to == MoState::Done {
            for line in &mut components {
                line.consumed_qty = line.required_qty;
            }
        }

        let mut next = order.clone();
        next.state = to;
        next.components = components;
        touch(&mut next);

        tracing::info!(order = %next.id, from = %order.state, to = %to, "advanced manufacturing order");
        Ok(next)
    }

    /// Cancel the order, keeping its stage
    pub fn cancel(&self, order: &ManufacturingOrder) -> Result<ManufacturingOrder, MoError> {
        if order.state == MoState::Done {
            return Err(MoError::AlreadyDone(order.id.to_string()));
        }
        if order.is_cancelled() {
            return Err(MoError::OrderCancelled(order.id.to_string()));
        }

        let mut next = order.clone();
        next.status = MoStatus::Failed;
        for line in &mut next.components {
            line.consumed_qty = 0.0;
        }
        touch(&mut next);

        tracing::info!(order = %next.id, state = %next.state, "cancelled manufacturing order");
        Ok(next)
    }

    /// Point a draft order at a different product and BoM
    pub fn relink(
        &self,
        order: &ManufacturingOrder,
        product_id: &str,
        bom_id: &str,
    ) -> Result<ManufacturingOrder, MoError> {
        self.ensure_editable(order)?;
        let bom = self.bom_for(bom_id, product_id)?;

        let mut next = order.clone();
        next.product_id = product_id.to_string();
        next.bom_id = bom_id.to_string();
        next.components = self.resolve_components(&bom, next.qty, &[])?;
        touch(&mut next);

        tracing::info!(order = %next.id, product = %product_id, bom = %bom_id, "relinked manufacturing order");
        Ok(next)
    }

    /// Change the quantity of a draft order
    pub fn set_quantity(
        &self,
        order: &ManufacturingOrder,
        qty: f64,
    ) -> Result<ManufacturingOrder, MoError> {
        self.ensure_editable(order)?;
        let qty = validate_qty(qty)?;
        let bom = self.store.fetch_bom(&order.bom_id)?;

        let mut next = order.clone();
        next.qty = qty;
        next.components = self.resolve_components(&bom, qty, &order.components)?;
        touch(&mut next);
        Ok(next)
    }

    /// Dispatch an action
    pub fn apply(
        &self,
        order: &ManufacturingOrder,
        action: MoAction,
    ) -> Result<ManufacturingOrder, MoError> {
        match action {
            MoAction::Advance => self.advance(order),
            MoAction::Cancel => self.cancel(order),
            MoAction::Relink { product_id, bom_id } => self.relink(order, &product_id, &bom_id),
            MoAction::SetQuantity(qty) => self.set_quantity(order, qty),
        }
    }

    /// Create an order and write it to the store
    pub fn create_and_persist(&self, input: CreateOrder) -> Result<ManufacturingOrder, MoError> {
        let order = self.create(input)?;
        Ok(self.store.persist_manufacturing_order(&order)?)
    }

    /// Fetch, transition and persist an order
    ///
    /// Fails with a revision conflict if another writer got there first; the
    /// caller decides whether to re-run.
    pub fn transition(&self, id: &str, action: MoAction) -> Result<ManufacturingOrder, MoError> {
        let current = self.store.fetch_manufacturing_order(id)?;
        let next = self.apply(&current, action)?;
        Ok(self.store.persist_manufacturing_order(&next)?)
    }

    fn ensure_editable(&self, order: &ManufacturingOrder) -> Result<(), MoError> {
        if order.state != MoState::Draft {
            return Err(MoError::OrderLocked {
                id: order.id.to_string(),
                state: order.state,
            });
        }
        if order.is_cancelled() {
            return Err(MoError::OrderCancelled(order.id.to_string()));
        }
        Ok(())
    }

    /// Fetch a BoM and check it produces `product_id`
    fn bom_for(&self, bom_id: &str, product_id: &str) -> Result<BillOfMaterials, MoError> {
        let mismatch = || MoError::BomMismatch {
            bom_id: bom_id.to_string(),
            product_id: product_id.to_string(),
        };
        let bom = match self.store.fetch_bom(bom_id) {
            Ok(bom) => bom,
            Err(StoreError::NotFound { .. }) => return Err(mismatch()),
            Err(e) => return Err(e.into()),
        };
        if bom.product_id != product_id {
            return Err(mismatch());
        }
        Ok(bom)
    }

    /// Component lines for `qty`, carrying over previous availability flags
    fn resolve_components(
        &self,
        bom: &BillOfMaterials,
        qty: f64,
        previous: &[MoComponent],
    ) -> Result<Vec<MoComponent>, MoError> {
        let breakdown = compute_breakdown_with(self.store, bom, qty)?;
        Ok(breakdown
            .components
            .into_iter()
            .map(|line| {
                let available = previous
                    .iter()
                    .find(|p| p.material_id == line.material_id)
                    .map(|p| p.available)
                    .unwrap_or(true);
                MoComponent {
                    material_id: line.material_id,
                    required_qty: line.scaled_qty,
                    consumed_qty: 0.0,
                    available,
                }
            })
            .collect())
    }

    fn check_availability(&self, components: &mut [MoComponent]) -> Result<(), MoError> {
        for line in components.iter_mut() {
            let material = self.store.fetch_material(&line.material_id)?;
            line.available = material.has_available(line.required_qty);
            if !line.available {
                tracing::debug!(material = %line.material_id, required = line.required_qty, on_hand = ?material.on_hand, "component short");
            }
        }
        Ok(())
    }

    fn generate_reference(&self, id: &EntityId) -> String {
        let full = id.to_string();
        let suffix = &full[full.len().saturating_sub(6)..];
        format!("{}{}", self.config.reference_prefix, suffix)
    }
}

fn touch(order: &mut ManufacturingOrder) {
    order.updated = Some(Utc::now());
    order.entity_revision += 1;
}
