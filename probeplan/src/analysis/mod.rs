//! Scope analyzers
//!
//! An analyzer maps one catalog entity against the parameters of one scope
//! and yields the members that belong to it. Analyzers are pure: they see a
//! single entity and the effective restriction, nothing else.
//!
//! ```text
//! CodeEntity ──► ScopeAnalyzer::visit(entity, restriction) ──► {FlatScopeEntity}
//!                  ├── MethodScopeAnalyzer       (signature patterns)
//!                  ├── ConstructorScopeAnalyzer  (class patterns)
//!                  ├── AnnotationScopeAnalyzer   (marker annotations)
//!                  └── extensions                (custom / API scopes)
//! ```

pub mod annotation_analyzer;
pub mod constructor_analyzer;
pub mod method_analyzer;

pub use annotation_analyzer::AnnotationScopeAnalyzer;
pub use constructor_analyzer::ConstructorScopeAnalyzer;
pub use method_analyzer::MethodScopeAnalyzer;

use probeplan_common::CodeEntity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::description::Restriction;

/// A member selected by an analyzer: declaring type plus full signature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlatScopeEntity {
    /// Fully qualified name of the declaring type
    pub entity: String,

    /// `Type.member(params)`
    pub signature: String,
}

impl FlatScopeEntity {
    #[must_use]
    pub fn new(entity: impl Into<String>, signature: impl Into<String>) -> Self {
        Self { entity: entity.into(), signature: signature.into() }
    }
}

impl fmt::Display for FlatScopeEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature)
    }
}

/// Maps a candidate entity against one scope.
pub trait ScopeAnalyzer: Send + Sync {
    /// Members of `entity` that belong to this scope under `restriction`.
    fn visit(&self, entity: &CodeEntity, restriction: &Restriction) -> BTreeSet<FlatScopeEntity>;
}

/// Member-level restriction check shared by the analyzers.
///
/// The declaring type goes through the full include/exclude rule; the
/// qualified member name and the signature only through the exclusions.
pub(crate) fn is_member_excluded(
    restriction: &Restriction,
    declaring_type: &str,
    member_name: &str,
    signature: &str,
    modifiers: u32,
) -> bool {
    restriction.is_modifier_excluded(modifiers)
        || restriction.is_excluded(declaring_type)
        || restriction.matches_exclusion(&format!("{declaring_type}.{member_name}"))
        || restriction.matches_exclusion(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use probeplan_common::{ACC_PRIVATE, ACC_PUBLIC};

    #[test]
    fn test_member_exclusion_by_qualified_name() {
        let mut restriction = Restriction::new();
        restriction.add_exclusion("com.acme.Service.internalHelper");

        assert!(is_member_excluded(
            &restriction,
            "com.acme.Service",
            "internalHelper",
            "com.acme.Service.internalHelper()",
            ACC_PUBLIC
        ));
        assert!(!is_member_excluded(
            &restriction,
            "com.acme.Service",
            "doWork",
            "com.acme.Service.doWork()",
            ACC_PUBLIC
        ));
    }

    #[test]
    fn test_member_exclusion_by_modifier() {
        let mut restriction = Restriction::new();
        restriction.add_modifier(ACC_PUBLIC);
        assert!(is_member_excluded(&restriction, "com.acme.A", "run", "com.acme.A.run()", ACC_PRIVATE));
    }

    #[test]
    fn test_flat_scope_entity_ordering() {
        let a = FlatScopeEntity::new("com.acme.A", "com.acme.A.a()");
        let b = FlatScopeEntity::new("com.acme.A", "com.acme.A.b()");
        assert!(a < b);
        assert_eq!(b.to_string(), "com.acme.A.b()");
    }
}
