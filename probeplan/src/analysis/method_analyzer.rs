//! Method scope: members whose full signature matches a pattern.

use probeplan_common::{CodeEntity, MethodInfo};
use std::collections::BTreeSet;

use super::{is_member_excluded, FlatScopeEntity, ScopeAnalyzer};
use crate::description::Restriction;
use crate::pattern::{pattern_matches, pattern_prefix_matches};

/// Selects concrete methods whose signature matches one of the patterns.
#[derive(Debug, Clone)]
pub struct MethodScopeAnalyzer {
    patterns: BTreeSet<String>,
}

impl MethodScopeAnalyzer {
    #[must_use]
    pub fn new(patterns: BTreeSet<String>) -> Self {
        Self { patterns }
    }

    fn check_method(
        owner: &str,
        method: &MethodInfo,
        pattern: &str,
        restriction: &Restriction,
        found: &mut BTreeSet<FlatScopeEntity>,
    ) {
        if method.is_abstract() || method.is_native() {
            return;
        }

        let signature = method.signature(owner);
        if !pattern_matches(&signature, pattern) {
            return;
        }

        let declaring = method.declaring_type(owner);
        if is_member_excluded(restriction, declaring, &method.name, &signature, method.modifiers) {
            return;
        }

        found.insert(FlatScopeEntity::new(declaring, signature));
    }
}

impl ScopeAnalyzer for MethodScopeAnalyzer {
    fn visit(&self, entity: &CodeEntity, restriction: &Restriction) -> BTreeSet<FlatScopeEntity> {
        let mut found = BTreeSet::new();
        if restriction.is_excluded(&entity.name) {
            return found;
        }

        for pattern in &self.patterns {
            if !pattern_prefix_matches(&entity.name, pattern) {
                continue;
            }
            for method in entity.all_methods() {
                Self::check_method(&entity.name, method, pattern, restriction, &mut found);
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probeplan_common::{ACC_ABSTRACT, ACC_NATIVE, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC};

    fn analyzer(patterns: &[&str]) -> MethodScopeAnalyzer {
        MethodScopeAnalyzer::new(patterns.iter().map(|p| (*p).to_string()).collect())
    }

    fn service() -> CodeEntity {
        CodeEntity::new("com.acme.Service")
            .with_method(MethodInfo::new("doWork", ACC_PUBLIC))
            .with_method(MethodInfo::new("internalHelper", ACC_PRIVATE))
            .with_method(MethodInfo::new("save", ACC_PUBLIC | ACC_STATIC).with_parameter("java.lang.String"))
            .with_method(MethodInfo::new("template", ACC_PUBLIC | ACC_ABSTRACT))
            .with_method(MethodInfo::new("hash", ACC_PUBLIC | ACC_NATIVE))
    }

    fn signatures(found: &BTreeSet<FlatScopeEntity>) -> Vec<&str> {
        found.iter().map(|e| e.signature.as_str()).collect()
    }

    #[test]
    fn test_wildcard_selects_concrete_methods() {
        let found = analyzer(&["com.acme.Service.*"]).visit(&service(), &Restriction::new());
        assert_eq!(
            signatures(&found),
            vec![
                "com.acme.Service.doWork()",
                "com.acme.Service.internalHelper()",
                "com.acme.Service.save(java.lang.String)",
            ]
        );
    }

    #[test]
    fn test_parameter_types_are_part_of_signature() {
        let found = analyzer(&["com.acme.Service.save(java.lang.String)"]).visit(&service(), &Restriction::new());
        assert_eq!(signatures(&found), vec!["com.acme.Service.save(java.lang.String)"]);

        let found = analyzer(&["com.acme.Service.save()"]).visit(&service(), &Restriction::new());
        assert!(found.is_empty());
    }

    #[test]
    fn test_modifier_restriction() {
        let mut restriction = Restriction::new();
        restriction.add_modifier(ACC_PUBLIC);
        let found = analyzer(&["com.acme.Service.*"]).visit(&service(), &restriction);
        assert_eq!(found.len(), 2);
        assert!(!signatures(&found).contains(&"com.acme.Service.internalHelper()"));
    }

    #[test]
    fn test_excluded_class_yields_nothing() {
        let mut restriction = Restriction::new();
        restriction.add_exclusion("com.acme.*");
        assert!(analyzer(&["com.acme.Service.*"]).visit(&service(), &restriction).is_empty());
    }

    #[test]
    fn test_implausible_prefix_skipped() {
        assert!(analyzer(&["org.other.*"]).visit(&service(), &Restriction::new()).is_empty());
    }

    #[test]
    fn test_inherited_method_reported_on_declaring_type() {
        let derived = CodeEntity::new("com.acme.Derived")
            .with_method(MethodInfo::new("run", ACC_PUBLIC))
            .with_visible_method(MethodInfo::new("run", ACC_PUBLIC))
            .with_visible_method(MethodInfo::new("close", ACC_PUBLIC).inherited_from("com.acme.Base"));

        let found = analyzer(&["com.acme.*"]).visit(&derived, &Restriction::new());
        assert_eq!(found.len(), 2);
        assert!(found.contains(&FlatScopeEntity::new("com.acme.Base", "com.acme.Base.close()")));
        assert!(found.contains(&FlatScopeEntity::new("com.acme.Derived", "com.acme.Derived.run()")));
    }
}
