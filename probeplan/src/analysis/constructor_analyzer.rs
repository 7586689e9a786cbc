//! Constructor scope: every constructor of the matching classes.

use probeplan_common::{CodeEntity, CONSTRUCTOR_NAME};
use std::collections::BTreeSet;

use super::{is_member_excluded, FlatScopeEntity, ScopeAnalyzer};
use crate::description::Restriction;
use crate::pattern::pattern_matches;

#[derive(Debug, Clone)]
pub struct ConstructorScopeAnalyzer {
    class_patterns: BTreeSet<String>,
}

impl ConstructorScopeAnalyzer {
    #[must_use]
    pub fn new(class_patterns: BTreeSet<String>) -> Self {
        Self { class_patterns }
    }
}

impl ScopeAnalyzer for ConstructorScopeAnalyzer {
    fn visit(&self, entity: &CodeEntity, restriction: &Restriction) -> BTreeSet<FlatScopeEntity> {
        let mut found = BTreeSet::new();
        if restriction.is_excluded(&entity.name)
            || !self.class_patterns.iter().any(|p| pattern_matches(&entity.name, p))
        {
            return found;
        }

        for constructor in &entity.constructors {
            let signature = constructor.signature(&entity.name);
            if is_member_excluded(restriction, &entity.name, CONSTRUCTOR_NAME, &signature, constructor.modifiers) {
                continue;
            }
            found.insert(FlatScopeEntity::new(entity.name.clone(), signature));
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probeplan_common::{ConstructorInfo, ACC_PRIVATE, ACC_PUBLIC};

    fn repo() -> CodeEntity {
        CodeEntity::new("com.acme.Repo")
            .with_constructor(ConstructorInfo::new(ACC_PUBLIC))
            .with_constructor(ConstructorInfo::new(ACC_PRIVATE).with_parameter("java.lang.String"))
    }

    #[test]
    fn test_all_constructors_of_matching_class() {
        let analyzer = ConstructorScopeAnalyzer::new(BTreeSet::from(["com.acme.*".to_string()]));
        let found = analyzer.visit(&repo(), &Restriction::new());
        let signatures: Vec<_> = found.iter().map(|e| e.signature.as_str()).collect();
        assert_eq!(signatures, vec!["com.acme.Repo.<init>()", "com.acme.Repo.<init>(java.lang.String)"]);
    }

    #[test]
    fn test_non_matching_class() {
        let analyzer = ConstructorScopeAnalyzer::new(BTreeSet::from(["com.acme.Other".to_string()]));
        assert!(analyzer.visit(&repo(), &Restriction::new()).is_empty());
    }

    #[test]
    fn test_modifier_restriction_applies_to_constructors() {
        let analyzer = ConstructorScopeAnalyzer::new(BTreeSet::from(["com.acme.Repo".to_string()]));
        let mut restriction = Restriction::new();
        restriction.add_modifier(ACC_PUBLIC);
        let found = analyzer.visit(&repo(), &restriction);
        assert_eq!(found.len(), 1);
        assert!(found.contains(&FlatScopeEntity::new("com.acme.Repo", "com.acme.Repo.<init>()")));
    }
}
