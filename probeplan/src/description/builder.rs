//! Fluent construction of descriptions.
//!
//! Each entity builder owns its draft together with the parent builder;
//! `entity_done()` moves the draft into the parent's entity list and hands the
//! parent back, so a description reads top to bottom:
//!
//! ```
//! use probeplan::description::DescriptionBuilder;
//! use probeplan::domain::IdSource;
//!
//! let ids = IdSource::default();
//! let description = DescriptionBuilder::new(&ids)
//!     .add_global_exclusion("com.acme.internal.*")
//!     .new_method_scope_entity(["com.acme.Service.*"])
//!     .add_probe("Timing")
//!     .entity_done()
//!     .build()
//!     .unwrap();
//! assert_eq!(description.entities().len(), 1);
//! ```

use std::collections::BTreeSet;

use super::{
    EnclosingEntity, InstrumentationDescription, InstrumentationEntity, PairedEvent,
    PairedEventEntity, Scope, ScopeKind, TraceRoot,
};
use crate::domain::{ExtensionId, IdSource, ProbeId, ResolutionError, SamplerId, ScopeId};

fn to_set<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

// ============================================================================
// Description Builder
// ============================================================================

/// Builds an [`InstrumentationDescription`], drawing scope ids from `ids`.
#[derive(Debug)]
pub struct DescriptionBuilder<'ids> {
    ids: &'ids IdSource,
    draft: InstrumentationDescription,
}

impl<'ids> DescriptionBuilder<'ids> {
    #[must_use]
    pub fn new(ids: &'ids IdSource) -> Self {
        Self { ids, draft: InstrumentationDescription::default() }
    }

    /// Continue building on top of an existing description.
    #[must_use]
    pub fn extending(description: InstrumentationDescription, ids: &'ids IdSource) -> Self {
        Self { ids, draft: description }
    }

    #[must_use]
    pub fn add_global_inclusion(mut self, pattern: impl Into<String>) -> Self {
        self.draft.global_restriction_mut().add_inclusion(pattern);
        self
    }

    #[must_use]
    pub fn add_global_exclusion(mut self, pattern: impl Into<String>) -> Self {
        self.draft.global_restriction_mut().add_exclusion(pattern);
        self
    }

    #[must_use]
    pub fn add_global_modifier(mut self, modifier: u32) -> Self {
        self.draft.global_restriction_mut().add_modifier(modifier);
        self
    }

    #[must_use]
    pub fn add_sampler(mut self, sampler: impl Into<SamplerId>) -> Self {
        self.draft.sampling_mut().add(sampler);
        self
    }

    #[must_use]
    pub fn add_sampler_with_delay(mut self, sampler: impl Into<SamplerId>, delay_ms: u64) -> Self {
        self.draft.sampling_mut().add_with_delay(sampler, delay_ms);
        self
    }

    /// Merge another description into the draft.
    #[must_use]
    pub fn append_description(mut self, other: &InstrumentationDescription) -> Self {
        self.draft.append(other);
        self
    }

    #[must_use]
    pub fn new_method_scope_entity<I, S>(self, patterns: I) -> EntityBuilder<'ids>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.new_scope_entity(ScopeKind::Method { patterns: to_set(patterns) })
    }

    #[must_use]
    pub fn new_constructor_scope_entity<I, S>(self, classes: I) -> EntityBuilder<'ids>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.new_scope_entity(ScopeKind::Constructor { classes: to_set(classes) })
    }

    #[must_use]
    pub fn new_allocation_scope_entity<I, S>(self, classes: I) -> EntityBuilder<'ids>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.new_scope_entity(ScopeKind::Allocation { classes: to_set(classes) })
    }

    #[must_use]
    pub fn new_api_scope_entity(self, api: impl Into<ExtensionId>) -> EntityBuilder<'ids> {
        self.new_scope_entity(ScopeKind::Api { api: api.into() })
    }

    #[must_use]
    pub fn new_custom_scope_entity(self, analyzer: impl Into<ExtensionId>) -> EntityBuilder<'ids> {
        self.new_scope_entity(ScopeKind::Custom { analyzer: analyzer.into() })
    }

    #[must_use]
    pub fn new_synchronized_scope_entity(self) -> EntityBuilder<'ids> {
        self.new_scope_entity(ScopeKind::Synchronized)
    }

    /// Start an entity for `kind` with a freshly drawn scope id.
    #[must_use]
    pub fn new_scope_entity(self, kind: ScopeKind) -> EntityBuilder<'ids> {
        let id = ScopeId(self.ids.next_id());
        self.new_scope_entity_with_id(kind, id)
    }

    /// Start an entity for `kind` with a caller supplied scope id.
    #[must_use]
    pub fn new_scope_entity_with_id(self, kind: ScopeKind, id: ScopeId) -> EntityBuilder<'ids> {
        EntityBuilder { parent: self, draft: EnclosingEntity::new(Scope::with_id(kind, id)) }
    }

    /// Start a trace scope; its scope id becomes the expansion job id.
    #[must_use]
    pub fn new_trace_scope_entity(self) -> TraceEntityBuilder<'ids> {
        let id = ScopeId(self.ids.next_id());
        self.new_trace_scope_entity_with_id(id)
    }

    #[must_use]
    pub fn new_trace_scope_entity_with_id(self, id: ScopeId) -> TraceEntityBuilder<'ids> {
        TraceEntityBuilder {
            inner: EntityBuilder {
                parent: self,
                draft: EnclosingEntity::new(Scope::with_id(
                    ScopeKind::Trace { roots: BTreeSet::new() },
                    id,
                )),
            },
            method_patterns: BTreeSet::new(),
            constructor_classes: BTreeSet::new(),
            apis: BTreeSet::new(),
            analyzers: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn new_paired_event_entity(self, event: PairedEvent) -> PairedEventBuilder<'ids> {
        PairedEventBuilder {
            parent: self,
            draft: PairedEventEntity { event, probes: BTreeSet::new() },
        }
    }

    /// Seal the description.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Configuration`] if the draft fails
    /// [`InstrumentationDescription::validate`].
    pub fn build(self) -> Result<InstrumentationDescription, ResolutionError> {
        self.draft.validate()?;
        Ok(self.draft)
    }
}

// ============================================================================
// Entity Builders
// ============================================================================

/// Draft of one enclosing entity.
#[derive(Debug)]
pub struct EntityBuilder<'ids> {
    parent: DescriptionBuilder<'ids>,
    draft: EnclosingEntity,
}

impl<'ids> EntityBuilder<'ids> {
    #[must_use]
    pub fn add_probe(mut self, probe: impl Into<ProbeId>) -> Self {
        self.draft.probes.insert(probe.into());
        self
    }

    #[must_use]
    pub fn add_inclusion(mut self, pattern: impl Into<String>) -> Self {
        self.draft.restriction.add_inclusion(pattern);
        self
    }

    #[must_use]
    pub fn add_exclusion(mut self, pattern: impl Into<String>) -> Self {
        self.draft.restriction.add_exclusion(pattern);
        self
    }

    #[must_use]
    pub fn add_modifier(mut self, modifier: u32) -> Self {
        self.draft.restriction.add_modifier(modifier);
        self
    }

    #[must_use]
    pub fn entity_done(mut self) -> DescriptionBuilder<'ids> {
        self.parent.draft.push_entity(InstrumentationEntity::Enclosing(self.draft));
        self.parent
    }
}

/// Draft of a trace scope entity.
///
/// Root patterns of the same kind accumulate into a single root sub-scope.
#[derive(Debug)]
pub struct TraceEntityBuilder<'ids> {
    inner: EntityBuilder<'ids>,
    method_patterns: BTreeSet<String>,
    constructor_classes: BTreeSet<String>,
    apis: BTreeSet<ExtensionId>,
    analyzers: BTreeSet<ExtensionId>,
}

impl<'ids> TraceEntityBuilder<'ids> {
    #[must_use]
    pub fn add_root_method(mut self, pattern: impl Into<String>) -> Self {
        self.method_patterns.insert(pattern.into());
        self
    }

    #[must_use]
    pub fn add_root_constructor(mut self, class: impl Into<String>) -> Self {
        self.constructor_classes.insert(class.into());
        self
    }

    #[must_use]
    pub fn add_root_api(mut self, api: impl Into<ExtensionId>) -> Self {
        self.apis.insert(api.into());
        self
    }

    #[must_use]
    pub fn add_root_custom(mut self, analyzer: impl Into<ExtensionId>) -> Self {
        self.analyzers.insert(analyzer.into());
        self
    }

    #[must_use]
    pub fn add_probe(mut self, probe: impl Into<ProbeId>) -> Self {
        self.inner = self.inner.add_probe(probe);
        self
    }

    #[must_use]
    pub fn add_inclusion(mut self, pattern: impl Into<String>) -> Self {
        self.inner = self.inner.add_inclusion(pattern);
        self
    }

    #[must_use]
    pub fn add_exclusion(mut self, pattern: impl Into<String>) -> Self {
        self.inner = self.inner.add_exclusion(pattern);
        self
    }

    #[must_use]
    pub fn add_modifier(mut self, modifier: u32) -> Self {
        self.inner = self.inner.add_modifier(modifier);
        self
    }

    #[must_use]
    pub fn entity_done(mut self) -> DescriptionBuilder<'ids> {
        let mut roots = BTreeSet::new();
        if !self.method_patterns.is_empty() {
            roots.insert(TraceRoot::Method { patterns: self.method_patterns });
        }
        if !self.constructor_classes.is_empty() {
            roots.insert(TraceRoot::Constructor { classes: self.constructor_classes });
        }
        roots.extend(self.apis.into_iter().map(|api| TraceRoot::Api { api }));
        roots.extend(self.analyzers.into_iter().map(|analyzer| TraceRoot::Custom { analyzer }));

        self.inner.draft.scope.kind = ScopeKind::Trace { roots };
        self.inner.entity_done()
    }
}

/// Draft of a paired event entity.
#[derive(Debug)]
pub struct PairedEventBuilder<'ids> {
    parent: DescriptionBuilder<'ids>,
    draft: PairedEventEntity,
}

impl<'ids> PairedEventBuilder<'ids> {
    #[must_use]
    pub fn add_probe(mut self, probe: impl Into<ProbeId>) -> Self {
        self.draft.probes.insert(probe.into());
        self
    }

    #[must_use]
    pub fn entity_done(mut self) -> DescriptionBuilder<'ids> {
        self.parent.draft.push_entity(InstrumentationEntity::PairedEvent(self.draft));
        self.parent
    }
}
