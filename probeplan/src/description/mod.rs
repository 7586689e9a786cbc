//! Instrumentation description model
//!
//! A description says what to measure, where, and under which restrictions.
//! It is assembled once through [`DescriptionBuilder`] (or loaded from JSON),
//! validated, and then only read by the resolution controller, the trace
//! coordinator and the event registry.
//!
//! ```text
//! InstrumentationDescription
//!   ├── global Restriction
//!   ├── SamplingConfig (optional)
//!   └── entities
//!         ├── Enclosing { Scope, local Restriction, probes }
//!         └── PairedEvent { PairedEvent, probes }
//! ```

pub mod builder;
pub mod restriction;
pub mod sampling;
pub mod scope;

pub use builder::{DescriptionBuilder, EntityBuilder, PairedEventBuilder, TraceEntityBuilder};
pub use restriction::{Restriction, DEFAULT_EXCLUSIONS};
pub use sampling::{SamplingConfig, DEFAULT_SAMPLING_DELAY_MS};
pub use scope::{Scope, ScopeKind, ScopeTag, TraceRoot};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::{ProbeId, ResolutionError};

/// Events that cannot be statically woven and are paired at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairedEvent {
    /// Lock wait followed by lock enter on the same (thread, resource)
    MonitorWait,
}

impl fmt::Display for PairedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairedEvent::MonitorWait => f.write_str("monitor wait"),
        }
    }
}

/// A scope with its local restriction and the probes it receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclosingEntity {
    pub scope: Scope,

    #[serde(default)]
    pub restriction: Restriction,

    #[serde(default)]
    pub probes: BTreeSet<ProbeId>,
}

impl EnclosingEntity {
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self { scope, restriction: Restriction::new(), probes: BTreeSet::new() }
    }
}

/// A paired runtime event with the probes that measure it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedEventEntity {
    pub event: PairedEvent,

    #[serde(default)]
    pub probes: BTreeSet<ProbeId>,
}

/// One entry of a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum InstrumentationEntity {
    Enclosing(EnclosingEntity),
    PairedEvent(PairedEventEntity),
}

impl fmt::Display for InstrumentationEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentationEntity::Enclosing(entity) => {
                write!(f, "{} -> [{}]", entity.scope, join_probes(&entity.probes))?;
                if !entity.restriction.is_empty() {
                    write!(f, " restricted by {}", entity.restriction)?;
                }
                Ok(())
            }
            InstrumentationEntity::PairedEvent(entity) => {
                write!(f, "{} -> [{}]", entity.event, join_probes(&entity.probes))
            }
        }
    }
}

fn join_probes(probes: &BTreeSet<ProbeId>) -> String {
    probes.iter().map(ProbeId::as_str).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// Description
// ============================================================================

/// What to measure, where, and under which restrictions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentationDescription {
    #[serde(default)]
    global_restriction: Restriction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    sampling: Option<SamplingConfig>,

    #[serde(default)]
    entities: Vec<InstrumentationEntity>,
}

impl InstrumentationDescription {
    /// Parse and validate a description from JSON.
    ///
    /// # Errors
    ///
    /// Any parse failure, including an unknown scope `kind`, and any
    /// validation failure is reported as [`ResolutionError::Configuration`].
    pub fn from_json(json: &str) -> Result<Self, ResolutionError> {
        let description: Self = serde_json::from_str(json)
            .map_err(|e| ResolutionError::Configuration(e.to_string()))?;
        description.validate()?;
        Ok(description)
    }

    /// Assemble a description directly, without a builder or validation.
    #[must_use]
    pub fn from_entities(global_restriction: Restriction, entities: Vec<InstrumentationEntity>) -> Self {
        let mut description = Self { global_restriction, sampling: None, entities: Vec::new() };
        for entity in entities {
            description.push_entity(entity);
        }
        description
    }

    #[must_use]
    pub fn global_restriction(&self) -> &Restriction {
        &self.global_restriction
    }

    #[must_use]
    pub fn sampling(&self) -> Option<&SamplingConfig> {
        self.sampling.as_ref()
    }

    #[must_use]
    pub fn entities(&self) -> &[InstrumentationEntity] {
        &self.entities
    }

    pub fn enclosing_entities(&self) -> impl Iterator<Item = &EnclosingEntity> {
        self.entities.iter().filter_map(|e| match e {
            InstrumentationEntity::Enclosing(entity) => Some(entity),
            InstrumentationEntity::PairedEvent(_) => None,
        })
    }

    pub fn paired_events(&self) -> impl Iterator<Item = &PairedEventEntity> {
        self.entities.iter().filter_map(|e| match e {
            InstrumentationEntity::PairedEvent(entity) => Some(entity),
            InstrumentationEntity::Enclosing(_) => None,
        })
    }

    /// True if any enclosing entity uses a scope of kind `tag`.
    #[must_use]
    pub fn contains_scope_kind(&self, tag: ScopeTag) -> bool {
        self.enclosing_entities().any(|e| e.scope.tag() == tag)
    }

    /// Every probe id referenced by any entity.
    #[must_use]
    pub fn referenced_probes(&self) -> BTreeSet<&ProbeId> {
        self.entities
            .iter()
            .flat_map(|e| match e {
                InstrumentationEntity::Enclosing(entity) => entity.probes.iter(),
                InstrumentationEntity::PairedEvent(entity) => entity.probes.iter(),
            })
            .collect()
    }

    /// Check range and option setup.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Configuration`] for a zero sampling
    /// interval or a trace scope without roots.
    pub fn validate(&self) -> Result<(), ResolutionError> {
        if let Some(sampling) = &self.sampling {
            sampling.validate()?;
        }

        for entity in self.enclosing_entities() {
            if let ScopeKind::Trace { roots } = &entity.scope.kind {
                if roots.is_empty() {
                    return Err(ResolutionError::Configuration(format!(
                        "trace scope {} has no root scopes",
                        entity.scope
                    )));
                }
            }
        }

        Ok(())
    }

    /// Merge another description into this one.
    ///
    /// Global restrictions are combined, sampling configs merged and
    /// entities appended, skipping entities already present.
    pub fn append(&mut self, other: &InstrumentationDescription) {
        self.global_restriction = Restriction::combine(&self.global_restriction, &other.global_restriction);

        if let Some(other_sampling) = &other.sampling {
            self.sampling.get_or_insert_with(SamplingConfig::new).merge(other_sampling);
        }

        for entity in &other.entities {
            self.push_entity(entity.clone());
        }
    }

    pub(crate) fn push_entity(&mut self, entity: InstrumentationEntity) {
        if !self.entities.contains(&entity) {
            self.entities.push(entity);
        }
    }

    pub(crate) fn global_restriction_mut(&mut self) -> &mut Restriction {
        &mut self.global_restriction
    }

    pub(crate) fn sampling_mut(&mut self) -> &mut SamplingConfig {
        self.sampling.get_or_insert_with(SamplingConfig::new)
    }
}

impl fmt::Display for InstrumentationDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Instrumentation description:")?;
        writeln!(f, "  entities:")?;
        for entity in &self.entities {
            writeln!(f, "    {entity}")?;
        }
        if !self.global_restriction.is_empty() {
            writeln!(f, "  global restriction: {}", self.global_restriction)?;
        }
        if let Some(sampling) = self.sampling.as_ref().filter(|s| !s.is_empty()) {
            writeln!(f, "  sampling: {sampling}")?;
        }
        Ok(())
    }
}
