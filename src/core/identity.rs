//! Entity identifiers - `PREFIX-ULID` strings
//!
//! Every stored record gets an id such as `MAT-01HQ3K...`. The prefix tells the
//! entity type at a glance, the ULID keeps ids sortable by creation time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Entity type prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityPrefix {
    /// Material or product (catalog item)
    Mat,
    /// Bill of materials
    Bom,
    /// Manufacturing order
    Mo,
}

impl EntityPrefix {
    /// All known prefixes
    pub fn all() -> &'static [EntityPrefix] {
        &[EntityPrefix::Mat, EntityPrefix::Bom, EntityPrefix::Mo]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::Mat => "MAT",
            EntityPrefix::Bom => "BOM",
            EntityPrefix::Mo => "MO",
        }
    }
}

impl fmt::Display for EntityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MAT" => Ok(EntityPrefix::Mat),
            "BOM" => Ok(EntityPrefix::Bom),
            "MO" => Ok(EntityPrefix::Mo),
            _ => Err(IdParseError::UnknownPrefix(s.to_string())),
        }
    }
}

/// Errors from parsing an entity id
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("Entity id '{0}' is missing the PREFIX- part")]
    MissingPrefix(String),

    #[error("Unknown entity prefix: {0}")]
    UnknownPrefix(String),

    #[error("Invalid ULID in entity id '{0}'")]
    InvalidUlid(String),
}

/// A typed entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    prefix: EntityPrefix,
    ulid: Ulid,
}

impl EntityId {
    /// Generate a fresh id for the given entity type
    pub fn new(prefix: EntityPrefix) -> Self {
        Self {
            prefix,
            ulid: Ulid::new(),
        }
    }

    /// Parse a full `PREFIX-ULID` string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    pub fn prefix(&self) -> EntityPrefix {
        self.prefix
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, ulid) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingPrefix(s.to_string()))?;
        let prefix: EntityPrefix = prefix.parse()?;
        let ulid = Ulid::from_string(ulid).map_err(|_| IdParseError::InvalidUlid(s.to_string()))?;
        Ok(Self { prefix, ulid })
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_has_prefix() {
        let id = EntityId::new(EntityPrefix::Mo);
        assert!(id.to_string().starts_with("MO-"));
        assert_eq!(id.to_string().len(), 3 + 26);
    }

    #[test]
    fn test_id_parse_roundtrip() {
        let id = EntityId::new(EntityPrefix::Bom);
        let parsed = EntityId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(parsed.prefix(), EntityPrefix::Bom);
    }

    #[test]
    fn test_id_parse_errors() {
        assert!(matches!(
            EntityId::parse("nodash"),
            Err(IdParseError::MissingPrefix(_))
        ));
        assert!(matches!(
            EntityId::parse("REQ-01HQ3K0000000000000000000"),
            Err(IdParseError::UnknownPrefix(_))
        ));
        assert!(matches!(
            EntityId::parse("MAT-not-a-ulid"),
            Err(IdParseError::InvalidUlid(_))
        ));
    }
}
