//! Trace expansion coordinator
//!
//! A trace scope follows the call graph: its roots are woven with an extra
//! expansion probe, and every time that probe fires for a method not seen
//! before, the coordinator resolves and weaves that single method, again with
//! the expansion probe so that its callees keep expanding.
//!
//! ```text
//! seed(trace scope) ──► roots + TraceExpansion probe ──► Weaver
//!                                                         │
//!   woven code calls expand(signature, job) ◄─────────────┘
//!        │ claim (signature, job) in done-set
//!        ▼
//!   single-method description ──► Weaver::try_resolve_and_weave
//!        ├── ok      → Woven(n), claim stays
//!        ├── busy    → Busy, claim released
//!        └── failure → Failed, claim released, logged
//! ```
//!
//! `expand` runs on monitored application threads. It never blocks on the
//! weaver and never returns an error: a call that could not be expanded is
//! simply retried by the next invocation of the same method.

use log::{debug, error, info};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::description::{
    EnclosingEntity, InstrumentationDescription, InstrumentationEntity, Restriction, Scope, ScopeKind,
};
use crate::domain::{ExpansionError, JobId, ProbeId, ResolutionError, ScopeId};
use crate::extension::TRACE_EXPANSION_PROBE;
use crate::resolution::InstrumentationPlan;
use crate::weaving::Weaver;

/// Result of one expansion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// Resolved and handed to the transformer, with the number of entities
    Woven(usize),
    /// Another caller claimed this (signature, job) first
    AlreadyExpanded,
    /// A resolution round was in flight; retried on the next call
    Busy,
    /// Resolution or weaving failed; retried on the next call
    Failed,
}

/// Probes and effective restriction of one trace job.
#[derive(Debug, Clone)]
struct TraceJob {
    probes: BTreeSet<ProbeId>,
    restriction: Restriction,
}

/// Seeds trace scopes and expands them as calls are observed.
pub struct TraceExpansionCoordinator {
    weaver: Arc<Weaver>,
    jobs: RwLock<HashMap<JobId, TraceJob>>,
    expanded: Mutex<HashSet<(String, JobId)>>,
}

impl TraceExpansionCoordinator {
    #[must_use]
    pub fn new(weaver: Arc<Weaver>) -> Self {
        Self { weaver, jobs: RwLock::new(HashMap::new()), expanded: Mutex::new(HashSet::new()) }
    }

    /// Register a trace job and weave its root scopes.
    ///
    /// Each root is resolved as an ordinary scope carrying the job's probes
    /// plus the expansion probe, tagged with the job id, under the job's
    /// restriction combined with `global`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Configuration`] if `entity` is not a trace
    /// scope or `job` is already registered, and any error of the seeding
    /// round. A failed round leaves the job unregistered.
    pub fn seed(
        &self,
        entity: &EnclosingEntity,
        job: JobId,
        global: &Restriction,
    ) -> Result<InstrumentationPlan, ResolutionError> {
        let ScopeKind::Trace { roots } = &entity.scope.kind else {
            return Err(ResolutionError::Configuration(format!("{} is not a trace scope", entity.scope)));
        };

        let trace_job = TraceJob {
            probes: entity.probes.clone(),
            restriction: Restriction::combine(&entity.restriction, global),
        };

        let seeds = roots
            .iter()
            .map(|root| {
                InstrumentationEntity::Enclosing(Self::expanding_entity(
                    ScopeKind::from(root.clone()),
                    job,
                    &trace_job,
                ))
            })
            .collect();

        let description = InstrumentationDescription::from_entities(global.clone(), seeds);

        // Registered before weaving: woven roots may call `expand` right away
        match self.jobs_write().entry(job) {
            Entry::Occupied(_) => {
                return Err(ResolutionError::Configuration(format!("trace {job} is already registered")));
            }
            Entry::Vacant(slot) => {
                slot.insert(trace_job);
            }
        }

        match self.weaver.resolve_and_weave(&description) {
            Ok(plan) => {
                info!("Seeded trace {job} with {} root entities", plan.len());
                Ok(plan)
            }
            Err(e) => {
                self.jobs_write().remove(&job);
                Err(e)
            }
        }
    }

    /// Expand `signature` for `job`, at most once per pair.
    ///
    /// Never blocks on a resolution round and never fails: see
    /// [`ExpansionOutcome`].
    pub fn expand(&self, signature: &str, job: JobId) -> ExpansionOutcome {
        let key = (signature.to_string(), job);
        if !self.expanded_lock().insert(key.clone()) {
            return ExpansionOutcome::AlreadyExpanded;
        }

        match self.try_expand(signature, job) {
            Ok(Some(woven)) => {
                debug!("Expanded {signature} for {job}: {woven} entities");
                ExpansionOutcome::Woven(woven)
            }
            Ok(None) => {
                self.expanded_lock().remove(&key);
                debug!("Weaver busy, {signature} for {job} not yet expanded");
                ExpansionOutcome::Busy
            }
            Err(e) => {
                self.expanded_lock().remove(&key);
                error!("Trace expansion of {signature} for {job} failed: {e}");
                ExpansionOutcome::Failed
            }
        }
    }

    fn try_expand(&self, signature: &str, job: JobId) -> Result<Option<usize>, ExpansionError> {
        let trace_job = self.jobs_read().get(&job).cloned().ok_or(ExpansionError::UnknownJob(job))?;

        let entity = Self::expanding_entity(
            ScopeKind::Method { patterns: BTreeSet::from([signature.to_string()]) },
            job,
            &trace_job,
        );
        let description = InstrumentationDescription::from_entities(
            Restriction::new(),
            vec![InstrumentationEntity::Enclosing(entity)],
        );

        let plan = self.weaver.try_resolve_and_weave(&description)?;
        Ok(plan.map(|p| p.len()))
    }

    fn expanding_entity(kind: ScopeKind, job: JobId, trace_job: &TraceJob) -> EnclosingEntity {
        let mut probes = trace_job.probes.clone();
        probes.insert(ProbeId::from(TRACE_EXPANSION_PROBE));
        EnclosingEntity {
            scope: Scope::with_id(kind, ScopeId::from(job)),
            restriction: trace_job.restriction.clone(),
            probes,
        }
    }

    /// Forget every job and every expanded pair.
    ///
    /// Probes already woven stay in place; removing them is the
    /// transformer's job.
    pub fn teardown(&self) {
        self.jobs_write().clear();
        self.expanded_lock().clear();
        info!("Trace expansion state cleared");
    }

    #[must_use]
    pub fn has_job(&self, job: JobId) -> bool {
        self.jobs_read().contains_key(&job)
    }

    #[must_use]
    pub fn job_count(&self) -> usize {
        self.jobs_read().len()
    }

    #[must_use]
    pub fn is_expanded(&self, signature: &str, job: JobId) -> bool {
        self.expanded_lock().contains(&(signature.to_string(), job))
    }

    #[must_use]
    pub fn expanded_count(&self) -> usize {
        self.expanded_lock().len()
    }

    // Poisoned locks are recovered: this runs on application threads.

    fn expanded_lock(&self) -> MutexGuard<'_, HashSet<(String, JobId)>> {
        self.expanded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn jobs_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<JobId, TraceJob>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn jobs_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<JobId, TraceJob>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::description::{DescriptionBuilder, ScopeTag};
    use crate::domain::{IdSource, WeaveError};
    use crate::extension::{ExtensionRegistry, ProbeRegistry};
    use crate::resolution::ScopeResolutionController;
    use crate::weaving::CodeTransformer;
    use probeplan_common::{CodeEntity, MethodInfo, ACC_PUBLIC};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{OnceLock, Weak};
    use std::thread;

    #[derive(Default)]
    struct CountingTransformer {
        weaves: AtomicUsize,
        fail: AtomicBool,
    }

    impl CodeTransformer for CountingTransformer {
        fn weave(&self, _plan: &InstrumentationPlan) -> Result<(), WeaveError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(WeaveError("rejected".to_string()));
            }
            self.weaves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn revert(&self) -> Result<(), WeaveError> {
            Ok(())
        }
    }

    fn setup() -> (TraceExpansionCoordinator, Arc<CountingTransformer>) {
        let catalog = StaticCatalog::new(vec![
            CodeEntity::new("com.acme.Entry").with_method(MethodInfo::new("main", ACC_PUBLIC)),
            CodeEntity::new("com.acme.Service")
                .with_method(MethodInfo::new("doWork", ACC_PUBLIC))
                .with_method(MethodInfo::new("secret", ACC_PUBLIC)),
        ]);
        let transformer = Arc::new(CountingTransformer::default());
        let weaver = Weaver::new(
            ScopeResolutionController::new(ExtensionRegistry::new(), ProbeRegistry::with_probes(["Timing"])),
            Arc::new(catalog),
            transformer.clone(),
        );
        (TraceExpansionCoordinator::new(Arc::new(weaver)), transformer)
    }

    fn trace_entity(ids: &IdSource) -> EnclosingEntity {
        let description = DescriptionBuilder::new(ids)
            .new_trace_scope_entity_with_id(ScopeId(7))
            .add_root_method("com.acme.Entry.main()")
            .add_exclusion("com.acme.Service.secret")
            .add_probe("Timing")
            .entity_done()
            .build()
            .unwrap();
        assert!(description.contains_scope_kind(ScopeTag::Trace));
        let entity = description.enclosing_entities().next().unwrap().clone();
        entity
    }

    #[test]
    fn test_seed_weaves_roots_with_expansion_probe() {
        let (coordinator, transformer) = setup();
        let ids = IdSource::default();

        let plan = coordinator.seed(&trace_entity(&ids), JobId(7), &Restriction::new()).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.contains_signature("com.acme.Entry.main()", &ProbeId::from(TRACE_EXPANSION_PROBE)));
        assert!(plan.iter().all(|e| e.scope_id == Some(ScopeId(7))));
        assert_eq!(coordinator.job_count(), 1);
        assert_eq!(transformer.weaves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expand_once_per_pair() {
        let (coordinator, transformer) = setup();
        let ids = IdSource::default();
        coordinator.seed(&trace_entity(&ids), JobId(7), &Restriction::new()).unwrap();

        assert_eq!(coordinator.expand("com.acme.Service.doWork()", JobId(7)), ExpansionOutcome::Woven(2));
        assert_eq!(coordinator.expand("com.acme.Service.doWork()", JobId(7)), ExpansionOutcome::AlreadyExpanded);
        assert!(coordinator.is_expanded("com.acme.Service.doWork()", JobId(7)));
        assert_eq!(transformer.weaves.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_job_restriction_applies_to_expansion() {
        let (coordinator, _transformer) = setup();
        let ids = IdSource::default();
        coordinator.seed(&trace_entity(&ids), JobId(7), &Restriction::new()).unwrap();

        assert_eq!(coordinator.expand("com.acme.Service.secret()", JobId(7)), ExpansionOutcome::Woven(0));
    }

    #[test]
    fn test_unknown_job_fails_open() {
        let (coordinator, transformer) = setup();
        assert_eq!(coordinator.expand("com.acme.Service.doWork()", JobId(99)), ExpansionOutcome::Failed);
        assert!(!coordinator.is_expanded("com.acme.Service.doWork()", JobId(99)));
        assert_eq!(transformer.weaves.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_weave_leaves_pair_unmarked() {
        let (coordinator, transformer) = setup();
        let ids = IdSource::default();
        coordinator.seed(&trace_entity(&ids), JobId(7), &Restriction::new()).unwrap();

        transformer.fail.store(true, Ordering::SeqCst);
        assert_eq!(coordinator.expand("com.acme.Service.doWork()", JobId(7)), ExpansionOutcome::Failed);
        assert!(!coordinator.is_expanded("com.acme.Service.doWork()", JobId(7)));

        transformer.fail.store(false, Ordering::SeqCst);
        assert_eq!(coordinator.expand("com.acme.Service.doWork()", JobId(7)), ExpansionOutcome::Woven(2));
    }

    #[test]
    fn test_teardown_clears_state() {
        let (coordinator, _transformer) = setup();
        let ids = IdSource::default();
        coordinator.seed(&trace_entity(&ids), JobId(7), &Restriction::new()).unwrap();
        coordinator.expand("com.acme.Service.doWork()", JobId(7));

        coordinator.teardown();
        assert_eq!(coordinator.job_count(), 0);
        assert_eq!(coordinator.expanded_count(), 0);
        assert_eq!(coordinator.expand("com.acme.Service.doWork()", JobId(7)), ExpansionOutcome::Failed);
    }

    #[test]
    fn test_seed_rejects_registered_job() {
        let (coordinator, transformer) = setup();
        let ids = IdSource::default();
        coordinator.seed(&trace_entity(&ids), JobId(7), &Restriction::new()).unwrap();

        let err = coordinator.seed(&trace_entity(&ids), JobId(7), &Restriction::new()).unwrap_err();
        assert!(matches!(err, ResolutionError::Configuration(_)));
        assert_eq!(coordinator.job_count(), 1);
        assert_eq!(transformer.weaves.load(Ordering::SeqCst), 1);
        // the first registration keeps its restriction
        assert_eq!(coordinator.expand("com.acme.Service.secret()", JobId(7)), ExpansionOutcome::Woven(0));
    }

    #[test]
    fn test_failed_seed_unregisters_job() {
        let (coordinator, transformer) = setup();
        let ids = IdSource::default();
        transformer.fail.store(true, Ordering::SeqCst);

        assert!(coordinator.seed(&trace_entity(&ids), JobId(7), &Restriction::new()).is_err());
        assert!(!coordinator.has_job(JobId(7)));
    }

    /// Fires `expand` from another thread while the seeding round is weaving.
    #[derive(Default)]
    struct ReentrantTransformer {
        coordinator: OnceLock<Weak<TraceExpansionCoordinator>>,
        during_seed: Mutex<Option<ExpansionOutcome>>,
    }

    impl CodeTransformer for ReentrantTransformer {
        fn weave(&self, _plan: &InstrumentationPlan) -> Result<(), WeaveError> {
            let Some(coordinator) = self.coordinator.get().and_then(Weak::upgrade) else {
                return Ok(());
            };
            let mut during_seed = self.during_seed.lock().unwrap();
            if during_seed.is_none() {
                let outcome = thread::scope(|s| {
                    s.spawn(|| coordinator.expand("com.acme.Service.doWork()", JobId(7))).join().unwrap()
                });
                *during_seed = Some(outcome);
            }
            Ok(())
        }

        fn revert(&self) -> Result<(), WeaveError> {
            Ok(())
        }
    }

    #[test]
    fn test_expand_during_seeding_is_busy() {
        let catalog = StaticCatalog::new(vec![
            CodeEntity::new("com.acme.Entry").with_method(MethodInfo::new("main", ACC_PUBLIC)),
            CodeEntity::new("com.acme.Service").with_method(MethodInfo::new("doWork", ACC_PUBLIC)),
        ]);
        let transformer = Arc::new(ReentrantTransformer::default());
        let weaver = Weaver::new(
            ScopeResolutionController::new(ExtensionRegistry::new(), ProbeRegistry::with_probes(["Timing"])),
            Arc::new(catalog),
            transformer.clone(),
        );
        let coordinator = Arc::new(TraceExpansionCoordinator::new(Arc::new(weaver)));
        transformer.coordinator.set(Arc::downgrade(&coordinator)).unwrap();

        let ids = IdSource::default();
        coordinator.seed(&trace_entity(&ids), JobId(7), &Restriction::new()).unwrap();

        assert_eq!(*transformer.during_seed.lock().unwrap(), Some(ExpansionOutcome::Busy));
        assert!(!coordinator.is_expanded("com.acme.Service.doWork()", JobId(7)));
        assert_eq!(coordinator.expand("com.acme.Service.doWork()", JobId(7)), ExpansionOutcome::Woven(2));
    }

    #[test]
    fn test_seed_rejects_non_trace_scope() {
        let (coordinator, _transformer) = setup();
        let entity = EnclosingEntity::new(Scope::new(ScopeKind::Synchronized));
        assert!(matches!(
            coordinator.seed(&entity, JobId(1), &Restriction::new()),
            Err(ResolutionError::Configuration(_))
        ));
    }
}
