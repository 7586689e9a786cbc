//! Scope kinds: where in the code a set of probes goes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::{ExtensionId, JobId, ScopeId};

/// A scope with its optional correlation id.
///
/// For trace scopes the id doubles as the expansion job id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ScopeId>,

    #[serde(flatten)]
    pub kind: ScopeKind,
}

impl Scope {
    #[must_use]
    pub fn new(kind: ScopeKind) -> Self {
        Self { id: None, kind }
    }

    #[must_use]
    pub fn with_id(kind: ScopeKind, id: ScopeId) -> Self {
        Self { id: Some(id), kind }
    }

    #[must_use]
    pub fn tag(&self) -> ScopeTag {
        self.kind.tag()
    }

    /// Job id of a trace scope.
    #[must_use]
    pub fn job_id(&self) -> Option<JobId> {
        match self.kind {
            ScopeKind::Trace { .. } => self.id.map(JobId::from),
            _ => None,
        }
    }
}

/// Closed set of scope kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScopeKind {
    /// Methods whose full signature matches one of the patterns
    Method { patterns: BTreeSet<String> },

    /// Constructors of the matching classes
    Constructor { classes: BTreeSet<String> },

    /// Allocation sites of the matching classes
    Allocation { classes: BTreeSet<String> },

    /// A named API, resolved through an analyzer extension
    Api { api: ExtensionId },

    /// A user supplied analyzer extension
    Custom { analyzer: ExtensionId },

    /// Synchronized blocks (event driven, never statically woven)
    Synchronized,

    /// Follow the call graph from the root scopes
    Trace { roots: BTreeSet<TraceRoot> },
}

impl ScopeKind {
    #[must_use]
    pub fn tag(&self) -> ScopeTag {
        match self {
            ScopeKind::Method { .. } => ScopeTag::Method,
            ScopeKind::Constructor { .. } => ScopeTag::Constructor,
            ScopeKind::Allocation { .. } => ScopeTag::Allocation,
            ScopeKind::Api { .. } => ScopeTag::Api,
            ScopeKind::Custom { .. } => ScopeTag::Custom,
            ScopeKind::Synchronized => ScopeTag::Synchronized,
            ScopeKind::Trace { .. } => ScopeTag::Trace,
        }
    }
}

/// Root sub-scope of a trace scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceRoot {
    Method { patterns: BTreeSet<String> },
    Constructor { classes: BTreeSet<String> },
    Api { api: ExtensionId },
    Custom { analyzer: ExtensionId },
}

impl From<TraceRoot> for ScopeKind {
    fn from(root: TraceRoot) -> Self {
        match root {
            TraceRoot::Method { patterns } => ScopeKind::Method { patterns },
            TraceRoot::Constructor { classes } => ScopeKind::Constructor { classes },
            TraceRoot::Api { api } => ScopeKind::Api { api },
            TraceRoot::Custom { analyzer } => ScopeKind::Custom { analyzer },
        }
    }
}

/// Discriminant of [`ScopeKind`], for kind queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeTag {
    Method,
    Constructor,
    Allocation,
    Api,
    Custom,
    Synchronized,
    Trace,
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeTag::Method => "method",
            ScopeTag::Constructor => "constructor",
            ScopeTag::Allocation => "allocation",
            ScopeTag::Api => "api",
            ScopeTag::Custom => "custom",
            ScopeTag::Synchronized => "synchronized",
            ScopeTag::Trace => "trace",
        };
        f.write_str(name)
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Method { patterns } => write!(f, "method [{}]", join(patterns)),
            ScopeKind::Constructor { classes } => write!(f, "constructor [{}]", join(classes)),
            ScopeKind::Allocation { classes } => write!(f, "allocation [{}]", join(classes)),
            ScopeKind::Api { api } => write!(f, "api {api}"),
            ScopeKind::Custom { analyzer } => write!(f, "custom {analyzer}"),
            ScopeKind::Synchronized => f.write_str("synchronized"),
            ScopeKind::Trace { roots } => {
                let roots: Vec<String> =
                    roots.iter().map(|r| ScopeKind::from(r.clone()).to_string()).collect();
                write!(f, "trace {{{}}}", roots.join("; "))
            }
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} ({id})", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_json_uses_kind_tag() {
        let scope: Scope =
            serde_json::from_str(r#"{"id": 7, "kind": "method", "patterns": ["com.acme.*"]}"#)
                .unwrap();
        assert_eq!(scope.id, Some(ScopeId(7)));
        assert_eq!(scope.tag(), ScopeTag::Method);

        let sync: Scope = serde_json::from_str(r#"{"kind": "synchronized"}"#).unwrap();
        assert_eq!(sync.kind, ScopeKind::Synchronized);
        assert_eq!(sync.id, None);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<Scope, _> = serde_json::from_str(r#"{"kind": "field", "names": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_trace_scope_job_id() {
        let roots = BTreeSet::from([TraceRoot::Method {
            patterns: BTreeSet::from(["com.acme.Entry.main()".to_string()]),
        }]);
        let trace = Scope::with_id(ScopeKind::Trace { roots }, ScopeId(42));
        assert_eq!(trace.job_id(), Some(JobId(42)));

        let method = Scope::with_id(ScopeKind::Method { patterns: BTreeSet::new() }, ScopeId(1));
        assert_eq!(method.job_id(), None);
    }

    #[test]
    fn test_display() {
        let scope = Scope::with_id(
            ScopeKind::Constructor { classes: BTreeSet::from(["com.acme.Repo".to_string()]) },
            ScopeId(3),
        );
        assert_eq!(scope.to_string(), "constructor [com.acme.Repo] (Scope#3)");
    }
}
