//! Extension and probe registries
//!
//! Custom and API scopes, and probes, are named by strings in a description.
//! Both registries are filled once when the agent is assembled; an id that is
//! not registered is a configuration problem reported during resolution,
//! never a late loading failure.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::analysis::{AnnotationScopeAnalyzer, ScopeAnalyzer};
use crate::domain::{ExtensionId, ProbeId, ResolutionError};

/// Probe that makes woven trace code report calls for expansion
pub const TRACE_EXPANSION_PROBE: &str = "TraceExpansion";

/// Creates a fresh analyzer for a custom or API scope.
pub type ScopeAnalyzerFactory =
    Box<dyn Fn() -> Result<Box<dyn ScopeAnalyzer>, String> + Send + Sync>;

// ============================================================================
// Extension Registry
// ============================================================================

/// Analyzer extensions by id.
#[derive(Default)]
pub struct ExtensionRegistry {
    factories: HashMap<ExtensionId, ScopeAnalyzerFactory>,
}

impl ExtensionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `id`, replacing any earlier registration.
    pub fn register<F>(&mut self, id: impl Into<ExtensionId>, factory: F)
    where
        F: Fn() -> Result<Box<dyn ScopeAnalyzer>, String> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    /// Register an annotation based scope under `id`.
    pub fn register_annotation_scope(&mut self, id: impl Into<ExtensionId>, analyzer: AnnotationScopeAnalyzer) {
        self.register(id, move || Ok(Box::new(analyzer.clone()) as Box<dyn ScopeAnalyzer>));
    }

    #[must_use]
    pub fn contains(&self, id: &ExtensionId) -> bool {
        self.factories.contains_key(id)
    }

    /// Instantiate the analyzer registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::ExtensionResolution`] if nothing is
    /// registered under `id` or the factory fails.
    pub fn instantiate(&self, id: &ExtensionId) -> Result<Box<dyn ScopeAnalyzer>, ResolutionError> {
        let factory = self.factories.get(id).ok_or_else(|| ResolutionError::ExtensionResolution {
            id: id.clone(),
            reason: "no analyzer registered under this id".to_string(),
        })?;

        factory().map_err(|reason| ResolutionError::ExtensionResolution { id: id.clone(), reason })
    }

    /// Registered ids in sorted order.
    #[must_use]
    pub fn ids(&self) -> Vec<&ExtensionId> {
        let mut ids: Vec<_> = self.factories.keys().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry").field("ids", &self.ids()).finish()
    }
}

// ============================================================================
// Probe Registry
// ============================================================================

/// Probe ids the code transformer knows how to install.
#[derive(Debug, Clone)]
pub struct ProbeRegistry {
    known: BTreeSet<ProbeId>,
}

impl ProbeRegistry {
    /// Registry containing only the trace expansion probe.
    #[must_use]
    pub fn new() -> Self {
        Self { known: BTreeSet::from([ProbeId::from(TRACE_EXPANSION_PROBE)]) }
    }

    #[must_use]
    pub fn with_probes<I, P>(probes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProbeId>,
    {
        let mut registry = Self::new();
        for probe in probes {
            registry.register(probe);
        }
        registry
    }

    pub fn register(&mut self, probe: impl Into<ProbeId>) {
        self.known.insert(probe.into());
    }

    #[must_use]
    pub fn contains(&self, probe: &ProbeId) -> bool {
        self.known.contains(probe)
    }

    /// # Errors
    ///
    /// Returns [`ResolutionError::Configuration`] for an unregistered probe.
    pub fn check(&self, probe: &ProbeId) -> Result<(), ResolutionError> {
        if self.contains(probe) {
            Ok(())
        } else {
            Err(ResolutionError::Configuration(format!("unknown probe '{probe}'")))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeId> {
        self.known.iter()
    }
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MethodScopeAnalyzer;

    #[test]
    fn test_unknown_extension() {
        let registry = ExtensionRegistry::new();
        let err = registry.instantiate(&ExtensionId::from("com.acme.Missing")).err().unwrap();
        assert!(matches!(err, ResolutionError::ExtensionResolution { .. }));
    }

    #[test]
    fn test_failing_factory_reports_reason() {
        let mut registry = ExtensionRegistry::new();
        registry.register("broken", || Err("missing dependency".to_string()));
        let Err(ResolutionError::ExtensionResolution { id, reason }) =
            registry.instantiate(&ExtensionId::from("broken"))
        else {
            panic!("expected extension error");
        };
        assert_eq!(id.as_str(), "broken");
        assert_eq!(reason, "missing dependency");
    }

    #[test]
    fn test_registered_factory_instantiates() {
        let mut registry = ExtensionRegistry::new();
        registry.register("entry", || {
            Ok(Box::new(MethodScopeAnalyzer::new(BTreeSet::from(["*.main(*)".to_string()]))) as Box<dyn ScopeAnalyzer>)
        });
        registry.register_annotation_scope("rest", AnnotationScopeAnalyzer::default());

        assert!(registry.instantiate(&ExtensionId::from("entry")).is_ok());
        assert!(registry.instantiate(&ExtensionId::from("rest")).is_ok());
        assert_eq!(registry.ids().len(), 2);
    }

    #[test]
    fn test_probe_registry() {
        let registry = ProbeRegistry::with_probes(["Timing"]);
        assert!(registry.contains(&ProbeId::from(TRACE_EXPANSION_PROBE)));
        assert!(registry.check(&ProbeId::from("Timing")).is_ok());
        assert!(matches!(
            registry.check(&ProbeId::from("Nope")),
            Err(ResolutionError::Configuration(msg)) if msg.contains("Nope")
        ));
    }
}
