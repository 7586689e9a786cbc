//! Annotation scope: methods marked by annotations inside marked classes.
//!
//! Custom and API scopes are commonly expressed this way: an API is "every
//! method carrying `@Path` inside a class carrying `@Resource`".

use probeplan_common::CodeEntity;
use std::collections::{BTreeMap, BTreeSet};

use super::{is_member_excluded, FlatScopeEntity, ScopeAnalyzer};
use crate::description::Restriction;
use crate::pattern::pattern_matches;

/// Two-level marker match: class annotation pattern → method annotation patterns.
#[derive(Debug, Clone, Default)]
pub struct AnnotationScopeAnalyzer {
    markers: BTreeMap<String, BTreeSet<String>>,
}

impl AnnotationScopeAnalyzer {
    #[must_use]
    pub fn new(markers: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { markers }
    }

    /// Add a method marker under a class marker.
    #[must_use]
    pub fn with_marker(mut self, class_marker: impl Into<String>, method_marker: impl Into<String>) -> Self {
        self.markers.entry(class_marker.into()).or_default().insert(method_marker.into());
        self
    }
}

fn any_matches<'a>(annotations: impl IntoIterator<Item = &'a String>, pattern: &str) -> bool {
    annotations.into_iter().any(|a| pattern_matches(a, pattern))
}

impl ScopeAnalyzer for AnnotationScopeAnalyzer {
    fn visit(&self, entity: &CodeEntity, restriction: &Restriction) -> BTreeSet<FlatScopeEntity> {
        let mut found = BTreeSet::new();
        if restriction.is_excluded(&entity.name) {
            return found;
        }

        for (class_marker, method_markers) in &self.markers {
            if !any_matches(&entity.annotations, class_marker) {
                continue;
            }

            for method in entity.all_methods() {
                if method.is_abstract() || method.is_native() {
                    continue;
                }
                if !method_markers.iter().any(|m| any_matches(&method.annotations, m)) {
                    continue;
                }

                let signature = method.signature(&entity.name);
                let declaring = method.declaring_type(&entity.name);
                if is_member_excluded(restriction, declaring, &method.name, &signature, method.modifiers) {
                    continue;
                }
                found.insert(FlatScopeEntity::new(declaring, signature));
            }
        }

        found
    }
}
