//! Scope resolution controller
//!
//! Turns a description plus a catalog snapshot into a flat plan. This is the
//! one place that dispatches over scope kinds.
//!
//! ```text
//! catalog snapshot ──► pre-filter (weavable, global restriction)
//!                              │
//! description ──► analyzer table [(analyzer, effective restriction, probes, scope id)]
//!                              │
//!                              ▼
//!               every analyzer × every candidate ──► InstrumentationPlan
//! ```

use log::{debug, info};
use probeplan_common::CodeEntity;
use std::collections::BTreeSet;

use super::plan::{FlatInstrumentationEntity, InstrumentationPlan};
use crate::analysis::{ConstructorScopeAnalyzer, MethodScopeAnalyzer, ScopeAnalyzer};
use crate::catalog::{is_weavable, CatalogSnapshot};
use crate::description::{EnclosingEntity, InstrumentationDescription, Restriction, ScopeKind};
use crate::domain::{ProbeId, ResolutionError, ScopeId};
use crate::extension::{ExtensionRegistry, ProbeRegistry};

/// One row of the analyzer table.
struct ScopeJob<'d> {
    analyzer: Box<dyn ScopeAnalyzer>,
    restriction: Restriction,
    probes: &'d BTreeSet<ProbeId>,
    scope_id: Option<ScopeId>,
}

/// Resolves descriptions against catalog snapshots.
///
/// Not reentrant with respect to the code transformer: callers that weave
/// the result go through [`crate::weaving::Weaver`], which serializes rounds.
#[derive(Debug, Default)]
pub struct ScopeResolutionController {
    extensions: ExtensionRegistry,
    probes: ProbeRegistry,
}

impl ScopeResolutionController {
    #[must_use]
    pub fn new(extensions: ExtensionRegistry, probes: ProbeRegistry) -> Self {
        Self { extensions, probes }
    }

    #[must_use]
    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    #[must_use]
    pub fn probes(&self) -> &ProbeRegistry {
        &self.probes
    }

    /// Resolve every enclosing entity of `description` against `snapshot`.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::Configuration`] for an unknown probe id
    /// - [`ResolutionError::ExtensionResolution`] if a custom or API scope
    ///   analyzer cannot be instantiated
    ///
    /// Either aborts the round before any candidate is visited.
    pub fn resolve(
        &self,
        description: &InstrumentationDescription,
        snapshot: &CatalogSnapshot,
    ) -> Result<InstrumentationPlan, ResolutionError> {
        let global = description.global_restriction();
        let jobs = self.analyzer_table(description)?;

        let candidates: Vec<&CodeEntity> =
            snapshot.iter().filter(|e| is_weavable(e) && !global.is_excluded(&e.name)).collect();

        debug!(
            "Resolving {} scope(s) over {} candidate(s) of {} catalog entities",
            jobs.len(),
            candidates.len(),
            snapshot.len()
        );

        let mut plan = InstrumentationPlan::new();
        for job in &jobs {
            let mut matched = BTreeSet::new();
            for candidate in &candidates {
                matched.extend(job.analyzer.visit(candidate, &job.restriction));
            }

            for entity in matched {
                for probe in job.probes {
                    plan.insert(FlatInstrumentationEntity::new(entity.clone(), probe.clone(), job.scope_id));
                }
            }
        }

        info!("Resolved {} flat instrumentation entities", plan.len());
        Ok(plan)
    }

    fn analyzer_table<'d>(
        &self,
        description: &'d InstrumentationDescription,
    ) -> Result<Vec<ScopeJob<'d>>, ResolutionError> {
        let mut jobs = Vec::new();
        for entity in description.enclosing_entities() {
            for probe in &entity.probes {
                self.probes.check(probe)?;
            }

            let Some(analyzer) = self.analyzer_for(entity)? else {
                debug!("Skipping {} scope {}: not statically resolved", entity.scope.tag(), entity.scope);
                continue;
            };

            jobs.push(ScopeJob {
                analyzer,
                restriction: Restriction::combine(&entity.restriction, description.global_restriction()),
                probes: &entity.probes,
                scope_id: entity.scope.id,
            });
        }
        Ok(jobs)
    }

    /// Analyzer for a scope, or `None` for kinds handled elsewhere.
    ///
    /// Allocation scopes belong to the transformer's allocation hook,
    /// synchronized scopes to the event registry and trace scopes to the
    /// expansion coordinator.
    fn analyzer_for(&self, entity: &EnclosingEntity) -> Result<Option<Box<dyn ScopeAnalyzer>>, ResolutionError> {
        let analyzer: Box<dyn ScopeAnalyzer> = match &entity.scope.kind {
            ScopeKind::Method { patterns } => Box::new(MethodScopeAnalyzer::new(patterns.clone())),
            ScopeKind::Constructor { classes } => Box::new(ConstructorScopeAnalyzer::new(classes.clone())),
            ScopeKind::Api { api: id } | ScopeKind::Custom { analyzer: id } => self.extensions.instantiate(id)?,
            ScopeKind::Allocation { .. } | ScopeKind::Synchronized | ScopeKind::Trace { .. } => return Ok(None),
        };
        Ok(Some(analyzer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnnotationScopeAnalyzer;
    use crate::description::DescriptionBuilder;
    use crate::domain::IdSource;
    use probeplan_common::{KindFlags, MethodInfo, ACC_PUBLIC};

    fn controller() -> ScopeResolutionController {
        ScopeResolutionController::new(ExtensionRegistry::new(), ProbeRegistry::with_probes(["Timing", "Counter"]))
    }

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new(vec![
            CodeEntity::new("com.acme.Service")
                .with_method(MethodInfo::new("doWork", ACC_PUBLIC))
                .with_method(MethodInfo::new("internalHelper", ACC_PUBLIC)),
            CodeEntity::new("com.acme.Api")
                .with_kind(KindFlags { interface: true, ..KindFlags::default() })
                .with_method(MethodInfo::new("call", ACC_PUBLIC)),
            CodeEntity::new("com.acme.Boot").with_loader(None, true).with_method(MethodInfo::new("start", ACC_PUBLIC)),
        ])
    }

    #[test]
    fn test_global_exclusion_of_member() {
        let ids = IdSource::default();
        let description = DescriptionBuilder::new(&ids)
            .add_global_exclusion("com.acme.Service.internalHelper")
            .new_method_scope_entity(["com.acme.Service.*"])
            .add_probe("Timing")
            .entity_done()
            .build()
            .unwrap();

        let plan = controller().resolve(&description, &catalog()).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.contains_signature("com.acme.Service.doWork()", &ProbeId::from("Timing")));
    }

    #[test]
    fn test_non_weavable_types_never_planned() {
        let ids = IdSource::default();
        let description = DescriptionBuilder::new(&ids)
            .new_method_scope_entity(["com.acme.*"])
            .add_probe("Timing")
            .entity_done()
            .build()
            .unwrap();

        let plan = controller().resolve(&description, &catalog()).unwrap();
        assert!(plan.iter().all(|e| e.entity.entity == "com.acme.Service"));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_unknown_probe_is_configuration_error() {
        let ids = IdSource::default();
        let description = DescriptionBuilder::new(&ids)
            .new_method_scope_entity(["com.acme.*"])
            .add_probe("Unheard")
            .entity_done()
            .build()
            .unwrap();

        let err = controller().resolve(&description, &catalog()).unwrap_err();
        assert!(matches!(err, ResolutionError::Configuration(_)));
    }

    #[test]
    fn test_unresolvable_custom_scope() {
        let ids = IdSource::default();
        let description = DescriptionBuilder::new(&ids)
            .new_method_scope_entity(["com.acme.*"])
            .add_probe("Timing")
            .entity_done()
            .new_custom_scope_entity("com.acme.Missing")
            .add_probe("Timing")
            .entity_done()
            .build()
            .unwrap();

        let err = controller().resolve(&description, &catalog()).unwrap_err();
        assert!(matches!(err, ResolutionError::ExtensionResolution { id, .. } if id.as_str() == "com.acme.Missing"));
    }

    #[test]
    fn test_custom_scope_through_registry() {
        let mut extensions = ExtensionRegistry::new();
        extensions.register_annotation_scope(
            "marked",
            AnnotationScopeAnalyzer::default().with_marker("com.acme.Monitored", "com.acme.Timed"),
        );
        let controller = ScopeResolutionController::new(extensions, ProbeRegistry::with_probes(["Timing"]));

        let snapshot = CatalogSnapshot::new(vec![CodeEntity::new("com.acme.Job")
            .with_annotation("com.acme.Monitored")
            .with_method(MethodInfo::new("run", ACC_PUBLIC).with_annotation("com.acme.Timed"))
            .with_method(MethodInfo::new("idle", ACC_PUBLIC))]);

        let ids = IdSource::default();
        let description = DescriptionBuilder::new(&ids)
            .new_custom_scope_entity("marked")
            .add_probe("Timing")
            .entity_done()
            .build()
            .unwrap();

        let plan = controller.resolve(&description, &snapshot).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.contains_signature("com.acme.Job.run()", &ProbeId::from("Timing")));
    }

    #[test]
    fn test_event_and_trace_scopes_skipped() {
        let ids = IdSource::default();
        let description = DescriptionBuilder::new(&ids)
            .new_synchronized_scope_entity()
            .add_probe("Timing")
            .entity_done()
            .new_allocation_scope_entity(["com.acme.*"])
            .add_probe("Counter")
            .entity_done()
            .new_trace_scope_entity()
            .add_root_method("com.acme.Service.doWork()")
            .add_probe("Timing")
            .entity_done()
            .build()
            .unwrap();

        assert!(controller().resolve(&description, &catalog()).unwrap().is_empty());
    }

    #[test]
    fn test_overlapping_scopes_keep_smallest_scope_id() {
        let ids = IdSource::default();
        let description = DescriptionBuilder::new(&ids)
            .new_scope_entity_with_id(
                ScopeKind::Method { patterns: BTreeSet::from(["com.acme.Service.*".to_string()]) },
                ScopeId(20),
            )
            .add_probe("Timing")
            .entity_done()
            .new_scope_entity_with_id(
                ScopeKind::Method { patterns: BTreeSet::from(["com.acme.Service.doWork()".to_string()]) },
                ScopeId(10),
            )
            .add_probe("Timing")
            .entity_done()
            .build()
            .unwrap();

        let plan = controller().resolve(&description, &catalog()).unwrap();
        let do_work: Vec<_> = plan.iter().filter(|e| e.entity.signature == "com.acme.Service.doWork()").collect();
        assert_eq!(do_work.len(), 1);
        assert_eq!(do_work[0].scope_id, Some(ScopeId(10)));
    }
}
