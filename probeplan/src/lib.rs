//! # probeplan - Scope Resolution and Instrumentation Planning
//!
//! probeplan is the planning engine of a performance-monitoring agent that
//! attaches to a running managed process. It takes a declarative
//! *instrumentation description* (what to measure, where, under which
//! restrictions), resolves it against the live catalog of loadable types,
//! and produces a flat, deduplicated plan of which members receive which
//! probes. Installing the probes is left to an external code transformer.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                InstrumentationDescription                       │
//! │      scopes • restrictions • probe ids • sampling config        │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ instrument()
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 InstrumentationFacade (agent)                   │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Weaver    │◀──│    Trace     │   │    Event     │         │
//! │  │ (round lock) │   │ Coordinator  │   │   Registry   │         │
//! │  └──────┬───────┘   └──────────────┘   └──────┬───────┘         │
//! │         │                   ▲                 │                 │
//! │         ▼                   │ expand()        ▼                 │
//! │  ┌──────────────┐           │          ┌──────────────┐         │
//! │  │  Resolution  │──▶ Scope Analyzers   │ Monitor Wait │         │
//! │  │  Controller  │   (method, ctor,     │   Listener   │         │
//! │  └──────┬───────┘    annotation, ext)  └──────┬───────┘         │
//! │         │ catalog snapshot                    │ records         │
//! └─────────┼─────────────────────────────────────┼─────────────────┘
//!           ▼                                     ▼
//!   CodeTransformer (external)             RecordSink (external)
//! ```
//!
//! ## Module Structure
//!
//! - [`pattern`]: `*` wildcard matching over type names and signatures
//! - [`description`]: description model, restrictions and the builder
//! - [`catalog`]: catalog provider trait, snapshots, weavability pre-filter
//! - [`analysis`]: scope analyzers producing flat scope entities
//! - [`extension`]: string id → analyzer factory and known probe ids
//! - [`resolution`]: the resolution controller and the flat plan
//! - [`weaving`]: code transformer trait and the serializing weaver
//! - [`trace`]: incremental expansion of call-graph trace scopes
//! - [`events`]: paired runtime events (lock wait → enter)
//! - [`sampler`]: hand-off of resource samplers to a sampling controller
//! - [`agent`]: the facade that wires everything together
//! - [`export`]: plan export as JSON
//! - [`cli`]: argument parsing for the dry-run binary
//! - [`domain`]: id newtypes and error types
//!
//! ## Concurrency
//!
//! Resolution runs synchronously on the requesting thread and is serialized
//! by the weaver. Trace expansion and monitor events arrive on arbitrary
//! application threads; both fail open and never propagate errors into the
//! monitored application.

pub mod agent;
pub mod analysis;
pub mod catalog;
pub mod cli;
pub mod description;
pub mod domain;
pub mod events;
pub mod export;
pub mod extension;
pub mod pattern;
pub mod resolution;
pub mod sampler;
pub mod trace;
pub mod weaving;
