//! Event probe registry: which probes listen to which runtime events.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use super::monitor_listener::{MonitorEventProbe, WaitingTimeProbe};
use crate::description::PairedEvent;
use crate::domain::{IdSource, ProbeId, ResolutionError};

/// Probe id of the built-in lock waiting time probe
pub const WAITING_TIME_PROBE: &str = "WaitingTime";

/// Listener a native event source reports to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    MonitorWait,
}

impl From<PairedEvent> for ListenerKind {
    fn from(event: PairedEvent) -> Self {
        match event {
            PairedEvent::MonitorWait => ListenerKind::MonitorWait,
        }
    }
}

/// Creates one probe instance per (thread, resource) wait.
pub type EventProbeFactory = Box<dyn Fn(&IdSource) -> Box<dyn MonitorEventProbe> + Send + Sync>;

/// Event probe factories by probe id.
pub struct EventProbeFactories {
    factories: HashMap<ProbeId, EventProbeFactory>,
}

impl EventProbeFactories {
    /// No factories at all.
    #[must_use]
    pub fn empty() -> Self {
        Self { factories: HashMap::new() }
    }

    /// The built-in probes ([`WAITING_TIME_PROBE`]).
    #[must_use]
    pub fn builtin() -> Self {
        let mut factories = Self::empty();
        factories.register(WAITING_TIME_PROBE, |ids| Box::new(WaitingTimeProbe::new(ids.next_id())));
        factories
    }

    pub fn register<F>(&mut self, probe: impl Into<ProbeId>, factory: F)
    where
        F: Fn(&IdSource) -> Box<dyn MonitorEventProbe> + Send + Sync + 'static,
    {
        self.factories.insert(probe.into(), Box::new(factory));
    }

    #[must_use]
    pub fn contains(&self, probe: &ProbeId) -> bool {
        self.factories.contains_key(probe)
    }

    fn create(&self, probe: &ProbeId, ids: &IdSource) -> Option<Box<dyn MonitorEventProbe>> {
        self.factories.get(probe).map(|factory| factory(ids))
    }
}

impl Default for EventProbeFactories {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for EventProbeFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("EventProbeFactories").field("probes", &ids).finish()
    }
}

/// Listener kind → ordered probe ids.
#[derive(Debug, Default)]
pub struct EventProbeRegistry {
    factories: EventProbeFactories,
    listeners: RwLock<HashMap<ListenerKind, Vec<ProbeId>>>,
}

impl EventProbeRegistry {
    #[must_use]
    pub fn new(factories: EventProbeFactories) -> Self {
        Self { factories, listeners: RwLock::new(HashMap::new()) }
    }

    /// Attach `probe` to `listener`. Registering the same pair twice is a
    /// no-op; registration order is kept.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Configuration`] if no factory exists for
    /// `probe`.
    pub fn register(&self, listener: ListenerKind, probe: &ProbeId) -> Result<(), ResolutionError> {
        self.check(probe)?;
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let probes = listeners.entry(listener).or_default();
        if !probes.contains(probe) {
            probes.push(probe.clone());
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ResolutionError::Configuration`] if no factory exists for
    /// `probe`.
    pub fn check(&self, probe: &ProbeId) -> Result<(), ResolutionError> {
        if self.factories.contains(probe) {
            Ok(())
        } else {
            Err(ResolutionError::Configuration(format!("unknown event probe '{probe}'")))
        }
    }

    /// Probe ids attached to `listener`, in registration order.
    #[must_use]
    pub fn lookup(&self, listener: ListenerKind) -> Vec<ProbeId> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&listener)
            .cloned()
            .unwrap_or_default()
    }

    /// Fresh probe instances for every probe attached to `listener`.
    #[must_use]
    pub fn instantiate(&self, listener: ListenerKind, ids: &IdSource) -> Vec<Box<dyn MonitorEventProbe>> {
        self.lookup(listener).iter().filter_map(|probe| self.factories.create(probe, ids)).collect()
    }

    /// Detach every probe from every listener.
    pub fn clear(&self) {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
