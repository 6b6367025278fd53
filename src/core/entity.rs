//! Entity trait - common interface for stored records

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Common trait for all Frostline entities
pub trait Entity: Serialize + DeserializeOwned {
    /// The entity type prefix
    const PREFIX: EntityPrefix;

    /// Project-relative directory holding this entity type
    const DIR: &'static str;

    /// Get the entity's unique ID
    fn id(&self) -> &EntityId;

    /// Get a human-readable title
    fn title(&self) -> &str;

    /// Get the creation timestamp
    fn created(&self) -> DateTime<Utc>;

    /// Get the author
    fn author(&self) -> &str;

    /// Monotonic revision, bumped on every write
    fn revision(&self) -> u32;
}

pub(crate) fn default_revision() -> u32 {
    1
}
