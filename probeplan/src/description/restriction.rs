//! Inclusion/exclusion restrictions with modifier masks.
//!
//! A [`Restriction`] narrows the set of entities a scope may touch. The
//! effective restriction of an entity is the union of its local restriction
//! and the description's global one (see [`Restriction::combine`]).

use probeplan_common::{modifiers_to_string, METHOD_MODIFIERS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::pattern::pattern_matches;

/// Namespaces every restriction excludes from the start.
///
/// Covers the managed runtime, the bytecode library used by the transformer
/// and the agent's own utility namespace. Weaving any of these would make
/// probes instrument themselves.
pub const DEFAULT_EXCLUSIONS: &[&str] =
    &["java.*", "javax.*", "sun.*", "jdk.*", "javassist.*", "probeplan.runtime.*"];

/// Inclusion/exclusion pattern sets plus a required-modifier mask.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RestrictionRepr")]
pub struct Restriction {
    inclusions: BTreeSet<String>,
    exclusions: BTreeSet<String>,
    modifiers: u32,
}

/// Wire shape; the default denylist is merged back in on deserialization.
#[derive(Deserialize)]
struct RestrictionRepr {
    #[serde(default)]
    inclusions: BTreeSet<String>,
    #[serde(default)]
    exclusions: BTreeSet<String>,
    #[serde(default)]
    modifiers: u32,
}

impl From<RestrictionRepr> for Restriction {
    fn from(repr: RestrictionRepr) -> Self {
        let mut restriction = Restriction::new();
        restriction.inclusions = repr.inclusions;
        restriction.exclusions.extend(repr.exclusions);
        restriction.add_modifier(repr.modifiers);
        restriction
    }
}

impl Restriction {
    /// Create a restriction pre-seeded with [`DEFAULT_EXCLUSIONS`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            inclusions: BTreeSet::new(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| (*s).to_string()).collect(),
            modifiers: 0,
        }
    }

    /// Effective restriction: union of both pattern sets, OR of both masks.
    #[must_use]
    pub fn combine(local: &Restriction, global: &Restriction) -> Restriction {
        let mut combined = local.clone();
        combined.inclusions.extend(global.inclusions.iter().cloned());
        combined.exclusions.extend(global.exclusions.iter().cloned());
        combined.modifiers |= global.modifiers;
        combined
    }

    pub fn add_inclusion(&mut self, pattern: impl Into<String>) {
        self.inclusions.insert(pattern.into());
    }

    pub fn add_exclusion(&mut self, pattern: impl Into<String>) {
        self.exclusions.insert(pattern.into());
    }

    /// OR the method-legal part of `modifier` into the required mask.
    ///
    /// Flags that cannot appear on a method are dropped.
    pub fn add_modifier(&mut self, modifier: u32) {
        self.modifiers |= modifier & METHOD_MODIFIERS;
    }

    #[must_use]
    pub fn inclusions(&self) -> &BTreeSet<String> {
        &self.inclusions
    }

    #[must_use]
    pub fn exclusions(&self) -> &BTreeSet<String> {
        &self.exclusions
    }

    #[must_use]
    pub fn modifiers(&self) -> u32 {
        self.modifiers
    }

    /// Is the fully qualified `name` excluded?
    ///
    /// Without inclusions, a name is excluded iff an exclusion matches. With
    /// inclusions, it must match an inclusion and no exclusion: exclusions
    /// always win.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        if !self.inclusions.is_empty() && !self.inclusions.iter().any(|p| pattern_matches(name, p)) {
            return true;
        }
        self.matches_exclusion(name)
    }

    /// Exclusion-only test, ignoring inclusions.
    ///
    /// Used for member names, which inclusion patterns written for types
    /// would otherwise reject.
    #[must_use]
    pub fn matches_exclusion(&self, name: &str) -> bool {
        self.exclusions.iter().any(|p| pattern_matches(name, p))
    }

    /// An entity is excluded unless it carries every required modifier flag.
    #[must_use]
    pub fn is_modifier_excluded(&self, bits: u32) -> bool {
        bits & self.modifiers != self.modifiers
    }

    #[must_use]
    pub fn has_modifier_restrictions(&self) -> bool {
        self.modifiers != 0
    }

    /// True if nothing beyond the default denylist is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inclusions.is_empty() && self.modifiers == 0 && self.custom_exclusions().next().is_none()
    }

    fn custom_exclusions(&self) -> impl Iterator<Item = &String> {
        self.exclusions.iter().filter(|e| !DEFAULT_EXCLUSIONS.contains(&e.as_str()))
    }
}

impl Default for Restriction {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.inclusions.iter().map(|i| format!("+{i}")).collect();
        if self.modifiers != 0 {
            parts.push(format!("+\"{}\" methods", modifiers_to_string(self.modifiers)));
        }
        parts.extend(self.custom_exclusions().map(|e| format!("-{e}")));
        f.write_str(&parts.join(", "))
    }
}
