//! Core module - fundamental types, storage and the manufacturing engine

pub mod bom_edit;
pub mod config;
pub mod costing;
pub mod entity;
pub mod identity;
pub mod manufacturing;
pub mod project;
pub mod shortid;
pub mod store;

pub use bom_edit::{BomEdit, EditError};
pub use config::{Config, ManufacturingConfig};
pub use costing::{
    compute_breakdown, compute_breakdown_with, ComponentCost, CostBreakdown, CostError, CostSource,
};
pub use entity::Entity;
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use manufacturing::{
    allowed_transitions, is_valid_transition, CreateOrder, ManufacturingOrderStateMachine,
    MoAction, MoError, MoWorkflowConfig, Transition,
};
pub use project::{Project, ProjectError};
pub use shortid::ShortIdIndex;
pub use store::{MemoryStore, ProjectStore, Store, StoreError};
