//! Monitor wait/enter pairing
//!
//! The native event source reports, on the thread experiencing it, that a
//! thread started waiting for a monitor and later that it entered it. The
//! listener keeps one set of probe instances per (thread, resource) between
//! the two events.

use log::warn;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::registry::{EventProbeRegistry, ListenerKind};
use crate::domain::{IdSource, ProtocolViolation};

// ============================================================================
// Records
// ============================================================================

/// Time a thread spent waiting to enter a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitingTimeRecord {
    /// Description of the contended resource
    pub location: String,
    pub call_id: u64,
    /// Enter timestamp (ns)
    pub timestamp: u64,
    /// Enter minus wait (ns)
    pub waiting_time: u64,
}

/// Measurement records produced by event probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeasurementRecord {
    WaitingTime(WaitingTimeRecord),
}

/// Receives measurement records; storage is external.
pub trait RecordSink: Send + Sync {
    fn record(&self, record: MeasurementRecord);
}

impl RecordSink for crossbeam_channel::Sender<MeasurementRecord> {
    fn record(&self, record: MeasurementRecord) {
        if self.send(record).is_err() {
            warn!("Measurement record dropped: receiver disconnected");
        }
    }
}

/// Sink that logs every record at `info`.
#[derive(Debug, Default)]
pub struct LogSink;

impl RecordSink for LogSink {
    fn record(&self, record: MeasurementRecord) {
        log::info!("{record:?}");
    }
}

// ============================================================================
// Probes
// ============================================================================

/// A probe living between a wait and the matching enter.
pub trait MonitorEventProbe: Send {
    fn on_wait(&mut self, thread: u64, resource: u64, timestamp: u64);
    fn on_entered(&mut self, thread: u64, resource: u64, timestamp: u64, sink: &dyn RecordSink);
}

/// Emits a [`WaitingTimeRecord`] per wait/enter pair.
#[derive(Debug)]
pub struct WaitingTimeProbe {
    call_id: u64,
    wait_started: Option<u64>,
}

impl WaitingTimeProbe {
    #[must_use]
    pub fn new(call_id: u64) -> Self {
        Self { call_id, wait_started: None }
    }
}

impl MonitorEventProbe for WaitingTimeProbe {
    fn on_wait(&mut self, _thread: u64, _resource: u64, timestamp: u64) {
        self.wait_started = Some(timestamp);
    }

    fn on_entered(&mut self, _thread: u64, resource: u64, timestamp: u64, sink: &dyn RecordSink) {
        let Some(started) = self.wait_started.take() else {
            return;
        };
        sink.record(MeasurementRecord::WaitingTime(WaitingTimeRecord {
            location: format!("monitor@{resource:#x}"),
            call_id: self.call_id,
            timestamp,
            waiting_time: timestamp.saturating_sub(started),
        }));
    }
}

// ============================================================================
// Listener
// ============================================================================

type PendingProbes = HashMap<(u64, u64), Vec<Box<dyn MonitorEventProbe>>>;

/// Pairs monitor wait and enter events per (thread, resource).
pub struct MonitorWaitListener {
    registry: Arc<EventProbeRegistry>,
    ids: Arc<IdSource>,
    sink: Arc<dyn RecordSink>,
    pending: Mutex<PendingProbes>,
    enabled: AtomicBool,
}

impl MonitorWaitListener {
    /// Create a disabled listener.
    #[must_use]
    pub fn new(registry: Arc<EventProbeRegistry>, ids: Arc<IdSource>, sink: Arc<dyn RecordSink>) -> Self {
        Self { registry, ids, sink, pending: Mutex::new(HashMap::new()), enabled: AtomicBool::new(false) }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Stop capturing and drop every pending wait.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `thread` starts waiting for `resource`.
    pub fn on_monitor_wait(&self, thread: u64, resource: u64, timestamp: u64) {
        if !self.is_enabled() {
            return;
        }

        let mut probes = self.registry.instantiate(ListenerKind::MonitorWait, &self.ids);
        if probes.is_empty() {
            return;
        }
        for probe in &mut probes {
            probe.on_wait(thread, resource, timestamp);
        }

        self.pending.lock().unwrap_or_else(PoisonError::into_inner).insert((thread, resource), probes);
    }

    /// `thread` entered `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolViolation`] if no wait is pending for the pair; no
    /// record is emitted then.
    pub fn on_monitor_entered(&self, thread: u64, resource: u64, timestamp: u64) -> Result<(), ProtocolViolation> {
        if !self.is_enabled() || self.registry.lookup(ListenerKind::MonitorWait).is_empty() {
            return Ok(());
        }

        let probes = self.pending.lock().unwrap_or_else(PoisonError::into_inner).remove(&(thread, resource));
        let Some(mut probes) = probes else {
            return Err(ProtocolViolation { thread, resource });
        };

        for probe in &mut probes {
            probe.on_entered(thread, resource, timestamp, self.sink.as_ref());
        }
        Ok(())
    }

    /// Native boundary entry point for enter events: violations are logged,
    /// never propagated.
    pub fn notify_monitor_entered(&self, thread: u64, resource: u64, timestamp: u64) {
        if let Err(violation) = self.on_monitor_entered(thread, resource, timestamp) {
            warn!("{violation}; measurement skipped");
        }
    }
}
