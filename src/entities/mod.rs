//! Entity type definitions

pub mod bom;
pub mod material;
pub mod order;

pub use bom::{BillOfMaterials, BomComponent};
pub use material::Material;
pub use order::{ManufacturingOrder, MoComponent, MoState, MoStatus};
