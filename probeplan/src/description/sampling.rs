//! Sampler configuration carried by a description.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{ResolutionError, SamplerId};

/// Interval used when a sampler is added without one
pub const DEFAULT_SAMPLING_DELAY_MS: u64 = 1000;

/// Sampler id to sampling interval (ms).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SamplingConfig {
    samplers: BTreeMap<SamplerId, u64>,
}

impl SamplingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sampler at [`DEFAULT_SAMPLING_DELAY_MS`].
    pub fn add(&mut self, sampler: impl Into<SamplerId>) {
        self.add_with_delay(sampler, DEFAULT_SAMPLING_DELAY_MS);
    }

    /// Add a sampler, replacing any interval already configured for it.
    pub fn add_with_delay(&mut self, sampler: impl Into<SamplerId>, delay_ms: u64) {
        self.samplers.insert(sampler.into(), delay_ms);
    }

    /// Merge `other` into this config; intervals from `other` win.
    pub fn merge(&mut self, other: &SamplingConfig) {
        for (id, delay) in &other.samplers {
            self.samplers.insert(id.clone(), *delay);
        }
    }

    #[must_use]
    pub fn delay(&self, sampler: &SamplerId) -> Option<u64> {
        self.samplers.get(sampler).copied()
    }

    #[must_use]
    pub fn contains(&self, sampler: &SamplerId) -> bool {
        self.samplers.contains_key(sampler)
    }

    /// True if every sampler of `other` is configured here.
    #[must_use]
    pub fn contains_all(&self, other: &SamplingConfig) -> bool {
        other.samplers.keys().all(|id| self.samplers.contains_key(id))
    }

    pub fn samplers(&self) -> impl Iterator<Item = (&SamplerId, u64)> {
        self.samplers.iter().map(|(id, delay)| (id, *delay))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    /// Reject zero intervals.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Configuration`] naming the first sampler
    /// configured with an interval of 0.
    pub fn validate(&self) -> Result<(), ResolutionError> {
        match self.samplers.iter().find(|(_, delay)| **delay == 0) {
            Some((id, _)) => Err(ResolutionError::Configuration(format!(
                "sampler {id} has a sampling interval of 0 ms"
            ))),
            None => Ok(()),
        }
    }
}

impl fmt::Display for SamplingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> =
            self.samplers.iter().map(|(id, delay)| format!("{id} every {delay}ms")).collect();
        f.write_str(&parts.join(", "))
    }
}
