//! Code catalog access
//!
//! The catalog is the open-ended set of loadable types of the monitored
//! process. Providers hand out immutable snapshots; re-instrumentation after
//! new types were loaded is simply another resolution against a later
//! snapshot.

use probeplan_common::CodeEntity;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::domain::CatalogError;

/// Source of catalog snapshots.
pub trait CatalogProvider: Send + Sync {
    /// Current set of loadable types.
    fn snapshot(&self) -> CatalogSnapshot;
}

/// Immutable, cheaply cloneable list of code entities.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    entities: Arc<Vec<CodeEntity>>,
}

#[derive(Deserialize)]
struct CatalogFile {
    entities: Vec<CodeEntity>,
}

impl CatalogSnapshot {
    #[must_use]
    pub fn new(entities: Vec<CodeEntity>) -> Self {
        Self { entities: Arc::new(entities) }
    }

    /// Parse a snapshot from `{"entities": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_str(json).map_err(|source| CatalogError::Parse { what: "catalog", source })?;
        Ok(Self::new(file.entities))
    }

    /// Load a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the file cannot be read and
    /// [`CatalogError::Parse`] on malformed JSON.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeEntity> {
        self.entities.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up a type by its fully qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CodeEntity> {
        self.entities.iter().find(|e| e.name == name)
    }
}

/// Can probes be woven into this type at all?
///
/// Rejects bootstrap-loaded types, types whose loader cannot see the agent,
/// and every non-ordinary kind (interfaces, annotations, enums, arrays,
/// primitives, synthetic, anonymous and local types).
#[must_use]
pub fn is_weavable(entity: &CodeEntity) -> bool {
    entity.loader.is_some() && entity.loader_sees_agent && entity.kind.is_ordinary()
}

/// In-memory catalog whose contents can be swapped as types get loaded.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    current: RwLock<CatalogSnapshot>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new(entities: Vec<CodeEntity>) -> Self {
        Self { current: RwLock::new(CatalogSnapshot::new(entities)) }
    }

    #[must_use]
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self { current: RwLock::new(snapshot) }
    }

    /// Replace the contents; snapshots already handed out are unaffected.
    pub fn replace(&self, entities: Vec<CodeEntity>) {
        let mut current = self.current.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *current = CatalogSnapshot::new(entities);
    }
}

impl CatalogProvider for StaticCatalog {
    fn snapshot(&self) -> CatalogSnapshot {
        self.current.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}
