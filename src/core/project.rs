//! Project discovery and initialisation
//!
//! A project is any directory containing a `.ferp/` marker directory. Entity
//! files live in plain subdirectories beneath it.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::entity::Entity;
use crate::entities::{BillOfMaterials, ManufacturingOrder, Material};

/// Marker directory name
pub const PROJECT_DIR: &str = ".ferp";

/// File suffix for entity files
pub const ENTITY_SUFFIX: &str = ".ferp.yaml";

const DEFAULT_CONFIG: &str = "# Frostline ERP project configuration\n\
# author: your-name\n\
currency_prefix: \"Rp.\"\n\
display_precision: 2\n\
manufacturing:\n  require_availability: false\n";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not a Frostline project (no .ferp/ found in {} or any parent). Run 'ferp init' first", .0.display())]
    NotFound(PathBuf),

    #[error("Project already initialized at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A discovered project root
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Find the project containing the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let cwd = std::env::current_dir()?;
        Self::discover_from(&cwd)
    }

    /// Find the project containing `start`, walking up through parents
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        start
            .ancestors()
            .find(|dir| dir.join(PROJECT_DIR).is_dir())
            .map(|dir| Self {
                root: dir.to_path_buf(),
            })
            .ok_or_else(|| ProjectError::NotFound(start.to_path_buf()))
    }

    /// Create the marker directory, default config and entity directories
    pub fn init(root: &Path) -> Result<Self, ProjectError> {
        let marker = root.join(PROJECT_DIR);
        if marker.exists() {
            return Err(ProjectError::AlreadyExists(root.to_path_buf()));
        }

        fs::create_dir_all(&marker)?;
        fs::write(marker.join("config.yaml"), DEFAULT_CONFIG)?;

        for dir in [Material::DIR, BillOfMaterials::DIR, ManufacturingOrder::DIR] {
            fs::create_dir_all(root.join(dir))?;
        }

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Open a project at a known root without discovery
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the project config file
    pub fn config_path(&self) -> PathBuf {
        self.root.join(PROJECT_DIR).join("config.yaml")
    }

    /// Directory holding entities of type `E`
    pub fn entity_dir<E: Entity>(&self) -> PathBuf {
        self.root.join(E::DIR)
    }

    /// Canonical file path for an entity id
    pub fn entity_path<E: Entity>(&self, id: &str) -> PathBuf {
        self.entity_dir::<E>().join(format!("{}{}", id, ENTITY_SUFFIX))
    }

    /// All entity files of type `E`, sorted by file name
    pub fn iter_entity_files<E: Entity>(&self) -> Vec<PathBuf> {
        let dir = self.entity_dir::<E>();
        if !dir.exists() {
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().to_string_lossy().ends_with(ENTITY_SUFFIX))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_layout() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.config_path().exists());
        assert!(tmp.path().join("catalog/materials").is_dir());
        assert!(tmp.path().join("manufacturing/boms").is_dir());
        assert!(tmp.path().join("manufacturing/orders").is_dir());
    }

    #[test]
    fn test_init_twice_fails() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();
        assert!(matches!(
            Project::init(tmp.path()),
            Err(ProjectError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();
        let nested = tmp.path().join("manufacturing/boms");

        let project = Project::discover_from(&nested).unwrap();
        assert_eq!(project.root(), tmp.path());
    }

    #[test]
    fn test_discover_outside_project() {
        let tmp = tempdir().unwrap();
        assert!(matches!(
            Project::discover_from(tmp.path()),
            Err(ProjectError::NotFound(_))
        ));
    }

    #[test]
    fn test_entity_path() {
        let project = Project::at("/work");
        let path = project.entity_path::<Material>("MAT-123");
        assert_eq!(
            path,
            PathBuf::from("/work/catalog/materials/MAT-123.ferp.yaml")
        );
    }
}
