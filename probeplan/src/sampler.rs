//! Resource sampling hand-off
//!
//! Samplers run outside the planning engine. The facade only tells a
//! [`SamplingController`] which sampler to run at which interval; samplers
//! sharing an interval are grouped so that one timer can drive them.

use log::info;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use crate::description::SamplingConfig;
use crate::domain::SamplerId;

/// Runs resource samplers on behalf of the agent.
pub trait SamplingController: Send + Sync {
    /// Run `sampler` every `delay_ms` milliseconds.
    fn schedule(&self, sampler: &SamplerId, delay_ms: u64);

    /// Stop and forget every scheduled sampler.
    fn clear(&self);
}

/// In-process schedule: interval (ms) → samplers sharing it.
#[derive(Debug, Default)]
pub struct SamplingSchedule {
    groups: RwLock<BTreeMap<u64, BTreeSet<SamplerId>>>,
}

impl SamplingSchedule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current groups.
    #[must_use]
    pub fn groups(&self) -> BTreeMap<u64, BTreeSet<SamplerId>> {
        self.groups.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

impl SamplingController for SamplingSchedule {
    fn schedule(&self, sampler: &SamplerId, delay_ms: u64) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        if groups.entry(delay_ms).or_default().insert(sampler.clone()) {
            info!("Sampling {sampler} every {delay_ms}ms");
        }
    }

    fn clear(&self) {
        self.groups.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Hand every sampler of `config` to `controller`; returns how many there were.
pub fn schedule_all(controller: &dyn SamplingController, config: &SamplingConfig) -> usize {
    let mut count = 0;
    for (sampler, delay) in config.samplers() {
        controller.schedule(sampler, delay);
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samplers_grouped_by_interval() {
        let mut config = SamplingConfig::default();
        config.add("cpu");
        config.add_with_delay("memory", 200);
        config.add_with_delay("threads", 200);

        let schedule = SamplingSchedule::new();
        assert_eq!(schedule_all(&schedule, &config), 3);

        let groups = schedule.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&200].len(), 2);
        assert!(groups[&1000].contains(&SamplerId::from("cpu")));
    }

    #[test]
    fn test_clear_forgets_every_sampler() {
        let schedule = SamplingSchedule::new();
        schedule.schedule(&SamplerId::from("cpu"), 500);
        assert!(!schedule.is_empty());

        schedule.clear();
        assert!(schedule.is_empty());
    }
}
