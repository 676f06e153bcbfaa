//! Total order over opaque version strings.

use std::cmp::Ordering;

/// Compare two version strings lexicographically.
///
/// This is plain string ordering, not semantic versioning: `"2"` sorts
/// *after* `"10"`. Callers supplying numeric versions should zero-pad if
/// strict numeric ordering is required.
pub fn compare(candidate: &str, canonical: &str) -> Ordering {
    candidate.cmp(canonical)
}

/// Whether `candidate` should replace `canonical`.
///
/// Ties favor the candidate, so re-declaring the same version is
/// idempotent and picks up schema edits made under an unbumped version.
pub fn is_newer_or_equal(candidate: &str, canonical: &str) -> bool {
    compare(candidate, canonical) != Ordering::Less
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert_eq!(compare("1.0.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare("1.0.1", "1.0.0"), Ordering::Greater);
        assert_eq!(compare("1.0.0", "2025.103.109"), Ordering::Less);
        assert_eq!(compare("2025.123.109", "2025.103.109"), Ordering::Greater);
    }

    #[test]
    fn test_tie_favors_candidate() {
        assert!(is_newer_or_equal("1.0.0", "1.0.0"));
        assert!(is_newer_or_equal("1.0.1", "1.0.0"));
        assert!(!is_newer_or_equal("0.9.0", "1.0.0"));
    }

    #[test]
    fn test_lexicographic_limitation() {
        // Documented: "2" > "10" under string ordering.
        assert_eq!(compare("2", "10"), Ordering::Greater);
        assert_eq!(compare("02", "10"), Ordering::Less);
    }
}
