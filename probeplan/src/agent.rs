//! Agent assembly
//!
//! [`InstrumentationFacade`] owns every runtime component and routes each
//! entity of a description to the component that handles it:
//!
//! - enclosing scopes resolved statically → [`Weaver`]
//! - trace scopes → [`TraceExpansionCoordinator`]
//! - paired events → [`EventProbeRegistry`] and [`MonitorWaitListener`]
//! - sampling config → [`SamplingController`]
//!
//! Everything is constructed explicitly at attach time and shared by `Arc`;
//! nothing lives in a static.

use log::info;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::catalog::CatalogProvider;
use crate::description::{EnclosingEntity, InstrumentationDescription, ScopeKind, TraceRoot};
use crate::domain::{IdSource, JobId, ResolutionError, WeaveError};
use crate::events::{EventProbeFactories, EventProbeRegistry, ListenerKind, MonitorWaitListener, RecordSink};
use crate::resolution::{InstrumentationPlan, ScopeResolutionController};
use crate::sampler::{schedule_all, SamplingController, SamplingSchedule};
use crate::trace::{ExpansionOutcome, TraceExpansionCoordinator};
use crate::weaving::{CodeTransformer, Weaver};

/// What one `instrument` call set up.
#[derive(Debug, Default)]
pub struct InstrumentationSummary {
    /// Statically resolved entities plus trace seeds
    pub plan: InstrumentationPlan,
    pub trace_jobs: Vec<JobId>,
    pub event_probes: usize,
    /// Samplers handed to the sampling controller
    pub samplers: usize,
}

impl fmt::Display for InstrumentationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} flat entities, {} trace job(s), {} event probe(s), {} sampler(s)",
            self.plan.len(),
            self.trace_jobs.len(),
            self.event_probes,
            self.samplers
        )
    }
}

/// Entry point of the planning engine inside an attached agent.
pub struct InstrumentationFacade {
    weaver: Arc<Weaver>,
    coordinator: TraceExpansionCoordinator,
    events: Arc<EventProbeRegistry>,
    listener: Arc<MonitorWaitListener>,
    sampling: Arc<dyn SamplingController>,
    ids: Arc<IdSource>,
}

impl InstrumentationFacade {
    #[must_use]
    pub fn new(
        controller: ScopeResolutionController,
        catalog: Arc<dyn CatalogProvider>,
        transformer: Arc<dyn CodeTransformer>,
        event_probes: EventProbeFactories,
        sink: Arc<dyn RecordSink>,
        ids: Arc<IdSource>,
    ) -> Self {
        let weaver = Arc::new(Weaver::new(controller, catalog, transformer));
        let events = Arc::new(EventProbeRegistry::new(event_probes));
        let listener = Arc::new(MonitorWaitListener::new(events.clone(), ids.clone(), sink));
        Self {
            coordinator: TraceExpansionCoordinator::new(weaver.clone()),
            weaver,
            events,
            listener,
            sampling: Arc::new(SamplingSchedule::new()),
            ids,
        }
    }

    /// Replace the in-process [`SamplingSchedule`] with an external controller.
    #[must_use]
    pub fn with_sampling(mut self, sampling: Arc<dyn SamplingController>) -> Self {
        self.sampling = sampling;
        self
    }

    /// Apply a description.
    ///
    /// Every probe and extension reference is checked before anything is
    /// woven, so a configuration or extension error leaves the transformer
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResolutionError`] encountered.
    pub fn instrument(&self, description: &InstrumentationDescription) -> Result<InstrumentationSummary, ResolutionError> {
        description.validate()?;
        self.check_references(description)?;
        let traces = self.assign_trace_jobs(description)?;

        let mut summary = InstrumentationSummary { plan: self.weaver.resolve_and_weave(description)?, ..Default::default() };

        for (entity, job) in traces {
            summary.plan.merge(self.coordinator.seed(entity, job, description.global_restriction())?);
            summary.trace_jobs.push(job);
        }

        for entity in description.paired_events() {
            for probe in &entity.probes {
                self.events.register(ListenerKind::from(entity.event), probe)?;
                summary.event_probes += 1;
            }
            self.listener.enable();
        }

        if let Some(sampling) = description.sampling() {
            summary.samplers = schedule_all(self.sampling.as_ref(), sampling);
        }

        info!("Instrumented: {summary}");
        Ok(summary)
    }

    fn check_references(&self, description: &InstrumentationDescription) -> Result<(), ResolutionError> {
        let controller = self.weaver.controller();

        for entity in description.enclosing_entities() {
            for probe in &entity.probes {
                controller.probes().check(probe)?;
            }
            if let ScopeKind::Trace { roots } = &entity.scope.kind {
                for root in roots {
                    if let TraceRoot::Api { api: id } | TraceRoot::Custom { analyzer: id } = root {
                        controller.extensions().instantiate(id)?;
                    }
                }
            }
        }

        for entity in description.paired_events() {
            for probe in &entity.probes {
                self.events.check(probe)?;
            }
        }
        Ok(())
    }

    /// Job id per trace scope: the scope id if it has one, otherwise a fresh
    /// id that collides with no explicit id and no registered job.
    fn assign_trace_jobs<'d>(
        &self,
        description: &'d InstrumentationDescription,
    ) -> Result<Vec<(&'d EnclosingEntity, JobId)>, ResolutionError> {
        let traces: Vec<&EnclosingEntity> = description
            .enclosing_entities()
            .filter(|e| matches!(e.scope.kind, ScopeKind::Trace { .. }))
            .collect();

        let mut taken = HashSet::new();
        for job in traces.iter().filter_map(|e| e.scope.job_id()) {
            if !taken.insert(job) {
                return Err(ResolutionError::Configuration(format!("trace {job} is declared twice")));
            }
            if self.coordinator.has_job(job) {
                return Err(ResolutionError::Configuration(format!("trace {job} is already registered")));
            }
        }

        let mut assigned = Vec::with_capacity(traces.len());
        for entity in traces {
            let job = match entity.scope.job_id() {
                Some(job) => job,
                None => loop {
                    let fresh = JobId(self.ids.next_id());
                    if !taken.contains(&fresh) && !self.coordinator.has_job(fresh) {
                        taken.insert(fresh);
                        break fresh;
                    }
                },
            };
            assigned.push((entity, job));
        }
        Ok(assigned)
    }

    /// Live-path hook fired by the expansion probe.
    pub fn expand(&self, signature: &str, job: JobId) -> ExpansionOutcome {
        self.coordinator.expand(signature, job)
    }

    /// Undo every `instrument` call.
    ///
    /// Clears trace and event state first, then asks the transformer to
    /// restore the original code.
    ///
    /// # Errors
    ///
    /// Returns the transformer's [`WeaveError`].
    pub fn undo(&self) -> Result<(), WeaveError> {
        self.coordinator.teardown();
        self.listener.disable();
        self.events.clear();
        self.sampling.clear();
        self.weaver.revert()?;
        info!("Instrumentation removed");
        Ok(())
    }

    #[must_use]
    pub fn coordinator(&self) -> &TraceExpansionCoordinator {
        &self.coordinator
    }

    /// Listener to hand to the native event source.
    #[must_use]
    pub fn monitor_listener(&self) -> Arc<MonitorWaitListener> {
        self.listener.clone()
    }
}
