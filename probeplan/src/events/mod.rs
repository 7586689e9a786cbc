//! Runtime events that cannot be statically woven
//!
//! Lock contention is observed through wait/enter callbacks from a native
//! event source instead of rewritten code. The registry says which probes
//! listen to which event; the listener pairs the callbacks.

pub mod monitor_listener;
pub mod registry;

pub use monitor_listener::{
    LogSink, MeasurementRecord, MonitorEventProbe, MonitorWaitListener, RecordSink, WaitingTimeProbe,
    WaitingTimeRecord,
};
pub use registry::{EventProbeFactories, EventProbeFactory, EventProbeRegistry, ListenerKind, WAITING_TIME_PROBE};
