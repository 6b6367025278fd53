//! Manufacturing order entity type - work orders producing a product from a BoM

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::{default_revision, Entity};
use crate::core::identity::{EntityId, EntityPrefix};

/// Manufacturing order stage
///
/// Stored as the integer codes 1..=5 used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[derive(Default)]
pub enum MoState {
    #[default]
    Draft = 1,
    /// Confirmed; component availability has been checked
    Confirmed = 2,
    /// Ready to produce
    Ready = 3,
    InProgress = 4,
    Done = 5,
}

impl MoState {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The stage after this one, if any
    pub fn next(self) -> Option<MoState> {
        match self {
            MoState::Draft => Some(MoState::Confirmed),
            MoState::Confirmed => Some(MoState::Ready),
            MoState::Ready => Some(MoState::InProgress),
            MoState::InProgress => Some(MoState::Done),
            MoState::Done => None,
        }
    }
}

impl TryFrom<u8> for MoState {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(MoState::Draft),
            2 => Ok(MoState::Confirmed),
            3 => Ok(MoState::Ready),
            4 => Ok(MoState::InProgress),
            5 => Ok(MoState::Done),
            other => Err(format!("Invalid manufacturing order state: {}. Use 1..=5", other)),
        }
    }
}

impl From<MoState> for u8 {
    fn from(state: MoState) -> Self {
        state.code()
    }
}

impl std::fmt::Display for MoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoState::Draft => write!(f, "draft"),
            MoState::Confirmed => write!(f, "confirmed"),
            MoState::Ready => write!(f, "ready"),
            MoState::InProgress => write!(f, "in_progress"),
            MoState::Done => write!(f, "done"),
        }
    }
}

/// Processing flag, orthogonal to the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum MoStatus {
    #[default]
    Process,
    /// Cancelled
    Failed,
}

impl std::fmt::Display for MoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoStatus::Process => write!(f, "process"),
            MoStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for MoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "process" => Ok(MoStatus::Process),
            "failed" | "cancelled" => Ok(MoStatus::Failed),
            _ => Err(format!("Invalid order status: {}. Use process or failed", s)),
        }
    }
}

/// Component consumption record for an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoComponent {
    /// Material ID (MAT-...)
    pub material_id: String,

    /// Quantity needed for the full order quantity
    pub required_qty: f64,

    /// Quantity actually consumed
    #[serde(default)]
    pub consumed_qty: f64,

    /// Result of the last availability check
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// A manufacturing order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingOrder {
    /// Unique identifier
    pub id: EntityId,

    /// Human reference (e.g., "MO/2024/0012")
    pub reference: String,

    /// Product being made (MAT-...)
    pub product_id: String,

    /// BoM used to resolve components (BOM-...)
    pub bom_id: String,

    /// Quantity to produce
    pub qty: f64,

    /// Current stage
    #[serde(default)]
    pub state: MoState,

    /// Processing flag
    #[serde(default)]
    pub status: MoStatus,

    /// Resolved component consumption
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<MoComponent>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last transition timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    /// Author (who created this order)
    pub author: String,

    /// Entity revision number, used as the optimistic concurrency token
    #[serde(default = "default_revision")]
    pub entity_revision: u32,
}

impl Entity for ManufacturingOrder {
    const PREFIX: EntityPrefix = EntityPrefix::Mo;
    const DIR: &'static str = "manufacturing/orders";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.reference
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

impl ManufacturingOrder {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        self.state == MoState::Done || self.status == MoStatus::Failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == MoStatus::Failed
    }

    /// Component lines whose last availability check failed
    pub fn unavailable_components(&self) -> impl Iterator<Item = &MoComponent> {
        self.components.iter().filter(|c| !c.available)
    }
}
