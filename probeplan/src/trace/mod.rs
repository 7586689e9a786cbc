//! Call-graph following trace scopes.

pub mod coordinator;

pub use coordinator::{ExpansionOutcome, TraceExpansionCoordinator};
