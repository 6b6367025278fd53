//! Layered configuration
//!
//! Values are merged in order, later layers winning:
//! 1. user config (`<config dir>/ferp/config.yaml`)
//! 2. project config (`.ferp/config.yaml`)
//! 3. environment (`FERP_AUTHOR`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::project::Project;

/// Manufacturing workflow settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManufacturingConfig {
    /// Refuse to start production while components are short
    pub require_availability: bool,

    /// Prefix for generated order references (default: "MO/")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_prefix: Option<String>,
}

/// Merged configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Author recorded on new entities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Currency label for money output (default: "Rp.")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_prefix: Option<String>,

    /// Decimal places for quantities and money in output (default: 2)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_precision: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturing: Option<ManufacturingConfig>,
}

impl Config {
    /// Load and merge all configuration layers
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(path) = Self::user_config_path() {
            if let Some(user) = Self::load_file(&path) {
                config.merge(user);
            }
        }

        if let Ok(project) = Project::discover() {
            if let Some(local) = Self::load_file(&project.config_path()) {
                config.merge(local);
            }
        }

        if let Ok(author) = std::env::var("FERP_AUTHOR") {
            if !author.trim().is_empty() {
                config.author = Some(author);
            }
        }

        config
    }

    /// Path of the per-user config file
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ferp")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Read one layer; unreadable or invalid files are skipped
    fn load_file(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
                None
            }
        }
    }

    /// Overlay `other` on top of `self`
    pub fn merge(&mut self, other: Config) {
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.currency_prefix.is_some() {
            self.currency_prefix = other.currency_prefix;
        }
        if other.display_precision.is_some() {
            self.display_precision = other.display_precision;
        }
        if other.manufacturing.is_some() {
            self.manufacturing = other.manufacturing;
        }
    }

    /// Author name, falling back to the login user
    pub fn author(&self) -> String {
        self.author
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn currency_prefix(&self) -> &str {
        self.currency_prefix.as_deref().unwrap_or("Rp.")
    }

    pub fn display_precision(&self) -> u32 {
        self.display_precision.unwrap_or(2)
    }

    pub fn require_availability(&self) -> bool {
        self.manufacturing
            .as_ref()
            .map(|m| m.require_availability)
            .unwrap_or(false)
    }

    pub fn reference_prefix(&self) -> &str {
        self.manufacturing
            .as_ref()
            .and_then(|m| m.reference_prefix.as_deref())
            .unwrap_or("MO/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.currency_prefix(), "Rp.");
        assert_eq!(config.display_precision(), 2);
        assert!(!config.require_availability());
        assert_eq!(config.reference_prefix(), "MO/");
    }

    #[test]
    fn test_merge_later_layer_wins() {
        let mut base: Config = serde_yml::from_str("author: alice\ncurrency_prefix: IDR").unwrap();
        let overlay: Config = serde_yml::from_str(
            "author: bob\nmanufacturing:\n  require_availability: true\n",
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.author.as_deref(), Some("bob"));
        assert_eq!(base.currency_prefix(), "IDR");
        assert!(base.require_availability());
    }

    #[test]
    fn test_project_default_config_parses() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        let config = Config::load_file(&project.config_path()).unwrap();
        assert_eq!(config.currency_prefix(), "Rp.");
        assert_eq!(config.display_precision(), 2);
        assert!(!config.require_availability());
    }
}
