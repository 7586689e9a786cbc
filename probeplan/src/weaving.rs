//! Handing plans to the code transformer
//!
//! The transformer that rewrites code is external and not reentrant. The
//! [`Weaver`] owns the one lock that serializes "resolve, then weave", so a
//! plan reaches the transformer only after its whole round resolved without
//! error.

use crossbeam_channel::{bounded, Receiver, Sender};
use log::debug;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use crate::catalog::CatalogProvider;
use crate::description::InstrumentationDescription;
use crate::domain::{ResolutionError, WeaveError};
use crate::resolution::{InstrumentationPlan, ScopeResolutionController};

/// Installs and removes probes.
///
/// Contract: after `weave(plan)` succeeds, every future invocation of each
/// planned member triggers its probe's before/after hooks.
pub trait CodeTransformer: Send + Sync {
    /// # Errors
    ///
    /// Returns [`WeaveError`] if the plan could not be installed.
    fn weave(&self, plan: &InstrumentationPlan) -> Result<(), WeaveError>;

    /// Remove every probe installed so far.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError`] if the original code could not be restored.
    fn revert(&self) -> Result<(), WeaveError>;
}

// ============================================================================
// Channel Transformer
// ============================================================================

/// Work item for a weaving thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformRequest {
    Weave(InstrumentationPlan),
    Revert,
}

/// Forwards plans to a weaving thread over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelTransformer {
    tx: Sender<TransformRequest>,
}

impl ChannelTransformer {
    /// Create a transformer and the receiving end for the weaving thread.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Receiver<TransformRequest>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }

    fn send(&self, request: TransformRequest) -> Result<(), WeaveError> {
        self.tx.send(request).map_err(|_| WeaveError("weaving thread has shut down".to_string()))
    }
}

impl CodeTransformer for ChannelTransformer {
    fn weave(&self, plan: &InstrumentationPlan) -> Result<(), WeaveError> {
        self.send(TransformRequest::Weave(plan.clone()))
    }

    fn revert(&self) -> Result<(), WeaveError> {
        self.send(TransformRequest::Revert)
    }
}

// ============================================================================
// Weaver
// ============================================================================

/// Serializes resolution rounds and their hand-off to the transformer.
pub struct Weaver {
    controller: ScopeResolutionController,
    catalog: Arc<dyn CatalogProvider>,
    transformer: Arc<dyn CodeTransformer>,
    round: Mutex<()>,
}

impl Weaver {
    #[must_use]
    pub fn new(
        controller: ScopeResolutionController,
        catalog: Arc<dyn CatalogProvider>,
        transformer: Arc<dyn CodeTransformer>,
    ) -> Self {
        Self { controller, catalog, transformer, round: Mutex::new(()) }
    }

    #[must_use]
    pub fn controller(&self) -> &ScopeResolutionController {
        &self.controller
    }

    /// Resolve `description` against the current catalog and weave the result.
    ///
    /// Waits for any round already in flight.
    ///
    /// # Errors
    ///
    /// Resolution errors abort before the transformer is called; a
    /// transformer failure is returned as [`ResolutionError::Weave`].
    pub fn resolve_and_weave(
        &self,
        description: &InstrumentationDescription,
    ) -> Result<InstrumentationPlan, ResolutionError> {
        let _round = self.round.lock().unwrap_or_else(PoisonError::into_inner);
        self.run_round(description)
    }

    /// Like [`Self::resolve_and_weave`], but returns `Ok(None)` instead of
    /// waiting when another round is in flight.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve_and_weave`].
    pub fn try_resolve_and_weave(
        &self,
        description: &InstrumentationDescription,
    ) -> Result<Option<InstrumentationPlan>, ResolutionError> {
        let _round = match self.round.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Ok(None),
        };
        self.run_round(description).map(Some)
    }

    /// Ask the transformer to remove every installed probe.
    ///
    /// # Errors
    ///
    /// Returns the transformer's [`WeaveError`].
    pub fn revert(&self) -> Result<(), WeaveError> {
        let _round = self.round.lock().unwrap_or_else(PoisonError::into_inner);
        self.transformer.revert()
    }

    fn run_round(&self, description: &InstrumentationDescription) -> Result<InstrumentationPlan, ResolutionError> {
        let snapshot = self.catalog.snapshot();
        let plan = self.controller.resolve(description, &snapshot)?;
        if plan.is_empty() {
            debug!("Nothing to weave");
        } else {
            self.transformer.weave(&plan)?;
        }
        Ok(plan)
    }
}
