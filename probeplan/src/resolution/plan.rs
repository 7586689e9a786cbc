//! The flat instrumentation plan handed to the code transformer.

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::analysis::FlatScopeEntity;
use crate::domain::{ProbeId, ScopeId};

/// One member receiving one probe.
///
/// Identity is `(entity, probe)`: the scope id is carried along for
/// correlation but does not distinguish entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatInstrumentationEntity {
    #[serde(flatten)]
    pub entity: FlatScopeEntity,

    pub probe: ProbeId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<ScopeId>,
}

impl FlatInstrumentationEntity {
    #[must_use]
    pub fn new(entity: FlatScopeEntity, probe: ProbeId, scope_id: Option<ScopeId>) -> Self {
        Self { entity, probe, scope_id }
    }

    fn identity(&self) -> (&FlatScopeEntity, &ProbeId) {
        (&self.entity, &self.probe)
    }
}

impl PartialEq for FlatInstrumentationEntity {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for FlatInstrumentationEntity {}

impl PartialOrd for FlatInstrumentationEntity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FlatInstrumentationEntity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Hash for FlatInstrumentationEntity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for FlatInstrumentationEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.entity, self.probe)?;
        if let Some(id) = self.scope_id {
            write!(f, " ({id})")?;
        }
        Ok(())
    }
}

/// Deduplicated, ordered set of flat instrumentation entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InstrumentationPlan {
    entities: BTreeSet<FlatInstrumentationEntity>,
}

impl InstrumentationPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, coalescing with an existing `(entity, probe)`.
    ///
    /// On collision the smaller scope id is kept. Returns true if the
    /// `(entity, probe)` pair was new.
    pub fn insert(&mut self, entry: FlatInstrumentationEntity) -> bool {
        match self.entities.get(&entry) {
            Some(existing) if existing.scope_id <= entry.scope_id => false,
            Some(_) => {
                self.entities.replace(entry);
                false
            }
            None => self.entities.insert(entry),
        }
    }

    /// Merge another plan into this one.
    pub fn merge(&mut self, other: InstrumentationPlan) {
        for entry in other.entities {
            self.insert(entry);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlatInstrumentationEntity> {
        self.entities.iter()
    }

    #[must_use]
    pub fn contains(&self, entity: &FlatScopeEntity, probe: &ProbeId) -> bool {
        self.entities.iter().any(|e| &e.entity == entity && &e.probe == probe)
    }

    /// True if any entry instruments `signature` with `probe`.
    #[must_use]
    pub fn contains_signature(&self, signature: &str, probe: &ProbeId) -> bool {
        self.entities.iter().any(|e| e.entity.signature == signature && &e.probe == probe)
    }

    /// Members receiving `probe`.
    #[must_use]
    pub fn entities_for_probe(&self, probe: &ProbeId) -> Vec<&FlatScopeEntity> {
        self.entities.iter().filter(|e| &e.probe == probe).map(|e| &e.entity).collect()
    }
}

impl FromIterator<FlatInstrumentationEntity> for InstrumentationPlan {
    fn from_iter<I: IntoIterator<Item = FlatInstrumentationEntity>>(iter: I) -> Self {
        let mut plan = Self::new();
        for entry in iter {
            plan.insert(entry);
        }
        plan
    }
}

// Read back through `insert` so duplicates coalesce like a resolved plan
impl<'de> Deserialize<'de> for InstrumentationPlan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<FlatInstrumentationEntity>::deserialize(deserializer).map(Self::from_iter)
    }
}

impl<'a> IntoIterator for &'a InstrumentationPlan {
    type Item = &'a FlatInstrumentationEntity;
    type IntoIter = std::collections::btree_set::Iter<'a, FlatInstrumentationEntity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

impl fmt::Display for InstrumentationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entities {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}
