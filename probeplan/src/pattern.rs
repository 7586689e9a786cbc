//! Wildcard pattern matching for type and member names.
//!
//! Patterns are literal text with `*` wildcards. Matching is deliberately
//! simple and allocation-free:
//!
//! - A pattern without `*` matches only the identical string.
//! - Otherwise the pattern is split at `*` and each literal segment is
//!   located left-to-right at its leftmost occurrence in the remaining
//!   subject (no backtracking).
//! - The first segment must sit at position 0 unless the pattern starts
//!   with `*`.
//! - The subject must be fully consumed unless the pattern ends with `*`.
//!
//! Consecutive wildcards (`**`) carry no special meaning; they behave like a
//! single `*`.
//!
//! # Examples
//!
//! ```
//! use probeplan::pattern::pattern_matches;
//!
//! assert!(pattern_matches("com.acme.Service.doWork()", "com.acme.Service.*"));
//! assert!(pattern_matches("a.x.b", "a.*.b"));
//! assert!(!pattern_matches("a.b", "a.*.b"));
//! ```

const WILDCARD: char = '*';

/// Returns true if `subject` matches `pattern`.
#[must_use]
pub fn pattern_matches(subject: &str, pattern: &str) -> bool {
    if !pattern.contains(WILDCARD) {
        return subject == pattern;
    }

    let mut segments: Vec<&str> = pattern.split(WILDCARD).collect();
    // Trailing wildcards only relax the full-consumption rule below
    while segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }

    // `None` once the subject has been consumed completely
    let mut remaining = Some(subject);

    for (i, segment) in segments.iter().enumerate() {
        let Some(rest) = remaining else {
            return false;
        };
        if segment.is_empty() {
            continue;
        }

        match rest.find(segment) {
            Some(index) if i > 0 || index == 0 => {
                let tail = &rest[index + segment.len()..];
                remaining = if tail.is_empty() { None } else { Some(tail) };
            }
            _ => return false,
        }
    }

    pattern.ends_with(WILDCARD) || remaining.is_none()
}

/// Cheap plausibility check: could members of type `type_name` match `pattern`?
///
/// True if the pattern starts with the type name, or if the pattern contains
/// a wildcard and the type name starts with the literal text in front of the
/// first `*`.
#[must_use]
pub fn pattern_prefix_matches(type_name: &str, pattern: &str) -> bool {
    if pattern.starts_with(type_name) {
        return true;
    }

    pattern
        .find(WILDCARD)
        .is_some_and(|index| type_name.starts_with(&pattern[..index]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern_requires_equality() {
        for (subject, pattern) in [
            ("com.acme.Foo", "com.acme.Foo"),
            ("com.acme.Foo", "com.acme.Fo"),
            ("com.acme.Fo", "com.acme.Foo"),
            ("", ""),
            ("x", ""),
        ] {
            assert_eq!(pattern_matches(subject, pattern), subject == pattern, "{subject} / {pattern}");
        }
    }

    #[test]
    fn test_inner_wildcard() {
        assert!(pattern_matches("a.x.b", "a.*.b"));
        assert!(!pattern_matches("a.b", "a.*.b"));
        assert!(!pattern_matches("a.x.b.c", "a.*.b"));
    }

    #[test]
    fn test_first_segment_anchored_at_start() {
        assert!(!pattern_matches("org.com.acme.Foo", "com.acme.*"));
        assert!(pattern_matches("org.com.acme.Foo", "*com.acme.*"));
    }

    #[test]
    fn test_trailing_wildcard_accepts_exact_prefix() {
        assert!(pattern_matches("com.acme.", "com.acme.*"));
        assert!(pattern_matches("com.acme.Foo", "com.acme.*"));
    }

    #[test]
    fn test_leading_wildcard_requires_full_consumption() {
        assert!(pattern_matches("com.acme.FooService", "*Service"));
        assert!(!pattern_matches("com.acme.ServiceImpl", "*Service"));
    }

    #[test]
    fn test_segments_use_leftmost_occurrence() {
        // ".b" is found at its first occurrence; the trailing ".y.b" is left over
        assert!(!pattern_matches("x.b.y.b", "*.b"));
        assert!(pattern_matches("x.b.y.b", "*.b*"));
    }

    #[test]
    fn test_lone_and_double_wildcards() {
        assert!(pattern_matches("anything", "*"));
        assert!(pattern_matches("", "*"));
        assert!(pattern_matches("a.x.b", "a.**.b"));
        assert!(pattern_matches("com.acme.Foo", "com.**"));
    }

    #[test]
    fn test_method_signature_patterns() {
        assert!(pattern_matches("com.acme.Service.doWork()", "com.acme.Service.*"));
        assert!(pattern_matches(
            "com.acme.Service.save(java.lang.String,int)",
            "com.acme.*.save(*)"
        ));
        assert!(!pattern_matches("com.acme.Service.load()", "com.acme.*.save(*)"));
    }

    #[test]
    fn test_prefix_match() {
        assert!(pattern_prefix_matches("com.acme.Service", "com.acme.Service.doWork()"));
        assert!(pattern_prefix_matches("com.acme.Service", "com.acme.*"));
        assert!(pattern_prefix_matches("com.acme.Service", "*.doWork()"));
        assert!(!pattern_prefix_matches("org.other.Baz", "com.acme.*"));
        assert!(!pattern_prefix_matches("com.acme.Other", "com.acme.Service.doWork()"));
    }
}
