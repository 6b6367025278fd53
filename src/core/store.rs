//! Entity storage - the data API the manufacturing core consumes
//!
//! The cost engine and the order state machine never touch files directly.
//! They read through [`Store`], which has a YAML-file implementation for
//! projects on disk and an in-memory implementation for embedding and tests.
//!
//! Writes of manufacturing orders are guarded by the order's
//! `entity_revision`: a write must carry exactly the stored revision plus one,
//! so two transitions computed from the same snapshot cannot both land.
//! On disk the read, check and rename happen under an exclusive lock on a
//! per-order `.lock` file, so separate processes are serialized too.

use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::core::entity::Entity;
use crate::core::project::Project;
use crate::entities::{BillOfMaterials, ManufacturingOrder, Material};
use crate::yaml::{parse_yaml_file, YamlError};

/// Errors raised by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{id} was modified concurrently (stored revision {stored}, write carries revision {attempted})")]
    RevisionConflict {
        id: String,
        stored: u32,
        attempted: u32,
    },

    #[error(transparent)]
    Yaml(#[from] YamlError),

    #[error("Failed to serialize {id}: {message}")]
    Serialize { id: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    fn not_found<E: Entity>(id: &str) -> Self {
        StoreError::NotFound {
            kind: kind_name::<E>(),
            id: id.to_string(),
        }
    }
}

fn kind_name<E: Entity>() -> &'static str {
    match E::PREFIX {
        crate::core::EntityPrefix::Mat => "Material",
        crate::core::EntityPrefix::Bom => "Bill of materials",
        crate::core::EntityPrefix::Mo => "Manufacturing order",
    }
}

/// Check that `attempted` is the successor of the stored revision
///
/// A missing record counts as revision 0, so new records must carry 1.
pub fn check_revision(id: &str, stored: Option<u32>, attempted: u32) -> Result<(), StoreError> {
    let stored = stored.unwrap_or(0);
    if attempted != stored + 1 {
        tracing::warn!(%id, stored, attempted, "rejecting stale write");
        return Err(StoreError::RevisionConflict {
            id: id.to_string(),
            stored,
            attempted,
        });
    }
    Ok(())
}

/// Data API used by the cost engine and the order state machine
pub trait Store {
    fn fetch_material(&self, material_id: &str) -> Result<Material, StoreError>;

    fn fetch_bom(&self, bom_id: &str) -> Result<BillOfMaterials, StoreError>;

    fn fetch_manufacturing_order(&self, id: &str) -> Result<ManufacturingOrder, StoreError>;

    /// Write an order, returning the canonical stored state
    ///
    /// Fails with [`StoreError::RevisionConflict`] unless the order's
    /// revision is exactly one past the stored revision.
    fn persist_manufacturing_order(
        &self,
        order: &ManufacturingOrder,
    ) -> Result<ManufacturingOrder, StoreError>;

    fn list_materials(&self) -> Result<Vec<Material>, StoreError>;

    fn list_boms(&self) -> Result<Vec<BillOfMaterials>, StoreError>;

    fn list_manufacturing_orders(&self) -> Result<Vec<ManufacturingOrder>, StoreError>;

    fn save_material(&self, material: &Material) -> Result<(), StoreError>;

    fn save_bom(&self, bom: &BillOfMaterials) -> Result<(), StoreError>;

    /// The BoM that manufactures `product_id`, if the product is made in-house
    ///
    /// When several BoMs exist for one product the oldest wins.
    fn find_bom_for_product(&self, product_id: &str) -> Result<Option<BillOfMaterials>, StoreError> {
        Ok(self
            .list_boms()?
            .into_iter()
            .filter(|bom| bom.product_id == product_id)
            .min_by_key(|bom| (bom.created, bom.id.to_string())))
    }
}

// =========================================================================
// YAML project store
// =========================================================================

/// Store backed by `*.ferp.yaml` files in a project
#[derive(Debug, Clone)]
pub struct ProjectStore {
    project: Project,
}

impl ProjectStore {
    pub fn new(project: Project) -> Self {
        Self { project }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    fn read<E: Entity>(&self, id: &str) -> Result<E, StoreError> {
        let path = self.project.entity_path::<E>(id);
        if !path.exists() {
            return Err(StoreError::not_found::<E>(id));
        }
        Ok(parse_yaml_file(&path)?)
    }

    fn read_all<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        self.project
            .iter_entity_files::<E>()
            .iter()
            .map(|path| parse_yaml_file::<E>(path).map_err(StoreError::from))
            .collect()
    }

    fn write<E: Entity>(&self, entity: &E) -> Result<(), StoreError> {
        let id = entity.id().to_string();
        let yaml = serde_yml::to_string(entity).map_err(|e| StoreError::Serialize {
            id: id.clone(),
            message: e.to_string(),
        })?;

        let dir = self.project.entity_dir::<E>();
        fs::create_dir_all(&dir)?;
        write_atomic(&self.project.entity_path::<E>(&id), &yaml)?;
        tracing::debug!(%id, revision = entity.revision(), "wrote entity file");
        Ok(())
    }
}

/// Write to a uniquely named temp file in the same directory, then rename
/// over the target
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Exclusive advisory lock on `<entity file>.lock`, released on drop
struct EntityLock {
    file: File,
}

impl EntityLock {
    fn acquire(entity_path: &Path) -> std::io::Result<Self> {
        let mut name = entity_path.as_os_str().to_owned();
        name.push(".lock");
        let lock_path = PathBuf::from(name);
        if let Some(dir) = lock_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for EntityLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl Store for ProjectStore {
    fn fetch_material(&self, material_id: &str) -> Result<Material, StoreError> {
        self.read(material_id)
    }

    fn fetch_bom(&self, bom_id: &str) -> Result<BillOfMaterials, StoreError> {
        self.read(bom_id)
    }

    fn fetch_manufacturing_order(&self, id: &str) -> Result<ManufacturingOrder, StoreError> {
        self.read(id)
    }

    fn persist_manufacturing_order(
        &self,
        order: &ManufacturingOrder,
    ) -> Result<ManufacturingOrder, StoreError> {
        let id = order.id.to_string();
        let _lock = EntityLock::acquire(&self.project.entity_path::<ManufacturingOrder>(&id))?;

        let stored = match self.read::<ManufacturingOrder>(&id) {
            Ok(existing) => Some(existing.entity_revision),
            Err(StoreError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        check_revision(&id, stored, order.entity_revision)?;

        self.write(order)?;
        self.read(&id)
    }

    fn list_materials(&self) -> Result<Vec<Material>, StoreError> {
        self.read_all()
    }

    fn list_boms(&self) -> Result<Vec<BillOfMaterials>, StoreError> {
        self.read_all()
    }

    fn list_manufacturing_orders(&self) -> Result<Vec<ManufacturingOrder>, StoreError> {
        self.read_all()
    }

    fn save_material(&self, material: &Material) -> Result<(), StoreError> {
        self.write(material)
    }

    fn save_bom(&self, bom: &BillOfMaterials) -> Result<(), StoreError> {
        self.write(bom)
    }
}

// =========================================================================
// In-memory store
// =========================================================================

/// Store holding everything in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    materials: Mutex<BTreeMap<String, Material>>,
    boms: Mutex<BTreeMap<String, BillOfMaterials>>,
    orders: Mutex<BTreeMap<String, ManufacturingOrder>>,
}

fn get_cloned<E: Entity + Clone>(
    map: &Mutex<BTreeMap<String, E>>,
    id: &str,
) -> Result<E, StoreError> {
    map.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(id)
        .cloned()
        .ok_or_else(|| StoreError::not_found::<E>(id))
}

fn all_cloned<E: Clone>(map: &Mutex<BTreeMap<String, E>>) -> Vec<E> {
    map.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .values()
        .cloned()
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style material insert
    pub fn with_material(self, material: Material) -> Self {
        self.insert_material(material);
        self
    }

    /// Builder-style BoM insert
    pub fn with_bom(self, bom: BillOfMaterials) -> Self {
        self.insert_bom(bom);
        self
    }

    pub fn insert_material(&self, material: Material) {
        self.materials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(material.id.to_string(), material);
    }

    pub fn insert_bom(&self, bom: BillOfMaterials) {
        self.boms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(bom.id.to_string(), bom);
    }
}

impl Store for MemoryStore {
    fn fetch_material(&self, material_id: &str) -> Result<Material, StoreError> {
        get_cloned(&self.materials, material_id)
    }

    fn fetch_bom(&self, bom_id: &str) -> Result<BillOfMaterials, StoreError> {
        get_cloned(&self.boms, bom_id)
    }

    fn fetch_manufacturing_order(&self, id: &str) -> Result<ManufacturingOrder, StoreError> {
        get_cloned(&self.orders, id)
    }

    fn persist_manufacturing_order(
        &self,
        order: &ManufacturingOrder,
    ) -> Result<ManufacturingOrder, StoreError> {
        let id = order.id.to_string();
        // Hold the lock across check and insert so the check is atomic
        let mut orders = self
            .orders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        check_revision(&id, orders.get(&id).map(|o| o.entity_revision), order.entity_revision)?;
        orders.insert(id, order.clone());
        Ok(order.clone())
    }

    fn list_materials(&self) -> Result<Vec<Material>, StoreError> {
        Ok(all_cloned(&self.materials))
    }

    fn list_boms(&self) -> Result<Vec<BillOfMaterials>, StoreError> {
        Ok(all_cloned(&self.boms))
    }

    fn list_manufacturing_orders(&self) -> Result<Vec<ManufacturingOrder>, StoreError> {
        Ok(all_cloned(&self.orders))
    }

    fn save_material(&self, material: &Material) -> Result<(), StoreError> {
        self.insert_material(material.clone());
        Ok(())
    }

    fn save_bom(&self, bom: &BillOfMaterials) -> Result<(), StoreError> {
        self.insert_bom(bom.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::{EntityId, EntityPrefix};
    use crate::entities::{MoState, MoStatus};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn order(revision: u32) -> ManufacturingOrder {
        ManufacturingOrder {
            id: EntityId::new(EntityPrefix::Mo),
            reference: "MO/0001".to_string(),
            product_id: "MAT-A".to_string(),
            bom_id: "BOM-A".to_string(),
            qty: 1.0,
            state: MoState::Draft,
            status: MoStatus::Process,
            components: Vec::new(),
            created: Utc::now(),
            updated: None,
            author: "test".to_string(),
            entity_revision: revision,
        }
    }

    #[test]
    fn test_check_revision() {
        assert!(check_revision("MO-1", None, 1).is_ok());
        assert!(check_revision("MO-1", Some(3), 4).is_ok());
        assert!(matches!(
            check_revision("MO-1", Some(3), 3),
            Err(StoreError::RevisionConflict { stored: 3, attempted: 3, .. })
        ));
        assert!(check_revision("MO-1", None, 2).is_err());
    }

    #[test]
    fn test_memory_store_persist_conflict() {
        let store = MemoryStore::new();
        let mut mo = order(1);
        store.persist_manufacturing_order(&mo).unwrap();

        mo.entity_revision = 2;
        store.persist_manufacturing_order(&mo).unwrap();

        // A second writer working from revision 1 loses
        let err = store.persist_manufacturing_order(&mo).unwrap_err();
        assert!(matches!(err, StoreError::RevisionConflict { stored: 2, .. }));
    }

    #[test]
    fn test_memory_store_not_found() {
        let store = MemoryStore::new();
        let err = store.fetch_material("MAT-NOPE").unwrap_err();
        assert_eq!(err.to_string(), "Material not found: MAT-NOPE");
    }

    #[test]
    fn test_find_bom_for_product() {
        let store = MemoryStore::new()
            .with_bom(BillOfMaterials::new("MAT-A", "test".to_string()))
            .with_bom(BillOfMaterials::new("MAT-B", "test".to_string()));

        let found = store.find_bom_for_product("MAT-B").unwrap().unwrap();
        assert_eq!(found.product_id, "MAT-B");
        assert!(store.find_bom_for_product("MAT-C").unwrap().is_none());
    }

    #[test]
    fn test_project_store_roundtrip() {
        let tmp = tempdir().unwrap();
        let store = ProjectStore::new(Project::init(tmp.path()).unwrap());

        let mat = Material::new("Chicken".to_string(), Decimal::from(500), "test".to_string());
        store.save_material(&mat).unwrap();
        assert_eq!(store.fetch_material(&mat.id.to_string()).unwrap(), mat);
        assert_eq!(store.list_materials().unwrap().len(), 1);

        let bom = BillOfMaterials::new(mat.id.to_string(), "test".to_string())
            .with_component("MAT-X", 0.5);
        store.save_bom(&bom).unwrap();
        assert_eq!(store.fetch_bom(&bom.id.to_string()).unwrap(), bom);
    }

    #[test]
    fn test_project_store_persist_order_checks_revision() {
        let tmp = tempdir().unwrap();
        let store = ProjectStore::new(Project::init(tmp.path()).unwrap());

        let mut mo = order(1);
        let stored = store.persist_manufacturing_order(&mo).unwrap();
        assert_eq!(stored, mo);

        mo.entity_revision = 3;
        assert!(matches!(
            store.persist_manufacturing_order(&mo),
            Err(StoreError::RevisionConflict { stored: 1, attempted: 3, .. })
        ));

        mo.entity_revision = 2;
        mo.state = MoState::Confirmed;
        let stored = store.persist_manufacturing_order(&mo).unwrap();
        assert_eq!(stored.state, MoState::Confirmed);
        assert_eq!(store.list_manufacturing_orders().unwrap().len(), 1);
    }

    #[test]
    fn test_project_store_concurrent_writers_one_wins() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        for _ in 0..20 {
            let base = order(1);
            ProjectStore::new(project.clone())
                .persist_manufacturing_order(&base)
                .unwrap();

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = [MoState::Confirmed, MoState::Ready]
                .into_iter()
                .map(|state| {
                    let store = ProjectStore::new(project.clone());
                    let barrier = Arc::clone(&barrier);
                    let mut next = base.clone();
                    next.entity_revision = 2;
                    next.state = state;
                    thread::spawn(move || {
                        barrier.wait();
                        store.persist_manufacturing_order(&next)
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let accepted = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(accepted, 1);
            assert!(results
                .iter()
                .any(|r| matches!(r, Err(StoreError::RevisionConflict { stored: 2, .. }))));

            let stored = ProjectStore::new(project.clone())
                .fetch_manufacturing_order(&base.id.to_string())
                .unwrap();
            assert_eq!(stored.entity_revision, 2);
        }

        // Lock files and temp files never show up as entities
        let store = ProjectStore::new(project);
        assert_eq!(store.list_manufacturing_orders().unwrap().len(), 20);
    }

    #[test]
    fn test_project_store_missing_entity() {
        let tmp = tempdir().unwrap();
        let store = ProjectStore::new(Project::init(tmp.path()).unwrap());
        assert!(matches!(
            store.fetch_bom("BOM-MISSING"),
            Err(StoreError::NotFound { kind: "Bill of materials", .. })
        ));
    }
}
