//! Short aliases for entity IDs
//!
//! Full IDs (`MO-01J...`) are awkward to type. Listing entities assigns each
//! one a persistent alias per prefix (`MAT@1`, `BOM@2`, `MO@3`) and a
//! per-listing alias (`@1`, `@2`) that is reset every time a list is printed.
//!
//! Aliases are stored in `.ferp/shortids.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

use crate::core::project::{Project, PROJECT_DIR};

const INDEX_FILE: &str = "shortids.json";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ShortIdIndex {
    /// "MO@3" -> full ID
    entries: HashMap<String, String>,
    /// Next number per prefix
    next_ids: HashMap<String, u32>,
    #[serde(skip)]
    reverse: HashMap<String, String>,
    /// "@N" aliases from the most recent listing
    #[serde(skip)]
    listing: Vec<String>,
}

impl ShortIdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index, or start empty if missing or unreadable
    pub fn load(project: &Project) -> Self {
        let path = project.root().join(PROJECT_DIR).join(INDEX_FILE);
        let Ok(content) = fs::read_to_string(&path) else {
            return Self::new();
        };
        match serde_json::from_str::<ShortIdIndex>(&content) {
            Ok(mut index) => {
                index.reverse = index
                    .entries
                    .iter()
                    .map(|(alias, id)| (id.clone(), alias.clone()))
                    .collect();
                index
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding corrupt short id index");
                Self::new()
            }
        }
    }

    pub fn save(&self, project: &Project) -> std::io::Result<()> {
        let path = project.root().join(PROJECT_DIR).join(INDEX_FILE);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    /// Register the IDs of a fresh listing, in display order
    pub fn rebuild(&mut self, entity_ids: impl IntoIterator<Item = String>) {
        self.listing.clear();
        for id in entity_ids {
            self.add(id);
        }
    }

    /// Register one ID and return its `@N` number in the current listing
    pub fn add(&mut self, entity_id: String) -> u32 {
        self.ensure_prefixed(&entity_id);
        match self.listing.iter().position(|id| *id == entity_id) {
            Some(pos) => pos as u32 + 1,
            None => {
                self.listing.push(entity_id);
                self.listing.len() as u32
            }
        }
    }

    /// Assign a persistent `PREFIX@N` alias if the ID has none yet
    pub fn ensure_prefixed(&mut self, entity_id: &str) -> String {
        if let Some(alias) = self.reverse.get(entity_id) {
            return alias.clone();
        }
        let prefix = entity_id.split('-').next().unwrap_or(entity_id);
        let next = self.next_ids.entry(prefix.to_string()).or_insert(1);
        let alias = format!("{}@{}", prefix, next);
        *next += 1;
        self.entries.insert(alias.clone(), entity_id.to_string());
        self.reverse.insert(entity_id.to_string(), alias.clone());
        alias
    }

    /// Resolve an alias to a full ID
    ///
    /// `PREFIX@N` looks up the persistent index; `@N` the current listing.
    /// Anything else is returned unchanged for prefix matching by the caller.
    pub fn resolve(&self, reference: &str) -> Option<String> {
        match reference.split_once('@') {
            Some(("", num)) => num
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| self.listing.get(i).cloned()),
            Some((prefix, _)) if prefix.chars().all(|c| c.is_ascii_alphabetic()) => {
                self.entries.get(&reference.to_ascii_uppercase()).cloned()
            }
            _ => Some(reference.to_string()),
        }
    }

    /// The persistent alias of a full ID
    pub fn get_prefixed_short_id(&self, entity_id: &str) -> Option<String> {
        self.reverse.get(entity_id).cloned()
    }

    /// Alias if known, otherwise the full ID
    pub fn display(&self, entity_id: &str) -> String {
        self.get_prefixed_short_id(entity_id)
            .unwrap_or_else(|| entity_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
