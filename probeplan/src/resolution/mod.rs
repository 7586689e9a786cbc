//! Scope resolution: description + catalog snapshot → flat plan.

pub mod controller;
pub mod plan;

pub use controller::ScopeResolutionController;
pub use plan::{FlatInstrumentationEntity, InstrumentationPlan};
