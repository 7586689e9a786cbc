//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a job id where a
//! scope id is expected, or a probe id where an extension id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Scope ID
///
/// Correlates flat instrumentation entities with the scope that produced
/// them. Unique within one resolution round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope#{}", self.0)
    }
}

/// Trace expansion job ID
///
/// A trace scope's id doubles as the id of the expansion job it seeds, so
/// every entity woven on behalf of a job carries `ScopeId(job.0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job#{}", self.0)
    }
}

impl From<ScopeId> for JobId {
    fn from(id: ScopeId) -> Self {
        JobId(id.0)
    }
}

impl From<JobId> for ScopeId {
    fn from(id: JobId) -> Self {
        ScopeId(id.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Probe identifier (e.g. `Timing`), opaque beyond its name
    ProbeId
);

string_id!(
    /// Identifier of a pluggable scope analyzer (custom or API scope)
    ExtensionId
);

string_id!(
    /// Identifier of a resource sampler (e.g. `cpu`)
    SamplerId
);

/// Monotonic id generator passed explicitly to whoever needs fresh ids.
///
/// Used for scope ids by the description builder and for call ids by event
/// probes. Never shared through a static.
#[derive(Debug)]
pub struct IdSource {
    next: AtomicU64,
}

impl IdSource {
    /// Create a generator whose first id is `first`.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self { next: AtomicU64::new(first) }
    }

    /// Draw the next id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdSource {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
