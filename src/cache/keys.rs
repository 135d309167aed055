//! Cache key definitions.
//!
//! Defines `LookupKind` for the cached lookups and the store key derivation.

use sha2::{Digest, Sha256};

use crate::domain::query::QueryParams;

/// How quickly the data behind a lookup goes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolatilityClass {
    /// Long-lived catalog data (course lists).
    Catalog,
    /// Frequently changing schedule data (lessons).
    Schedule,
}

/// A cached lookup, naming its key namespace and volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Courses,
    Lessons,
}

impl LookupKind {
    pub fn namespace(self) -> &'static str {
        match self {
            LookupKind::Courses => "courses",
            LookupKind::Lessons => "lessons",
        }
    }

    pub fn volatility(self) -> VolatilityClass {
        match self {
            LookupKind::Courses => VolatilityClass::Catalog,
            LookupKind::Lessons => VolatilityClass::Schedule,
        }
    }
}

// ============================================================================
// Key derivation
// ============================================================================

/// Derive the store key for a lookup.
///
/// `namespace:denomination` when there are no parameters, otherwise
/// `namespace:denomination:<fingerprint>`.
pub fn cache_key(kind: LookupKind, denomination: &str, params: &QueryParams) -> String {
    let denomination = denomination.trim().to_lowercase();
    if params.is_empty() {
        format!("{}:{denomination}", kind.namespace())
    } else {
        format!(
            "{}:{denomination}:{}",
            kind.namespace(),
            fingerprint(params)
        )
    }
}

/// Stable hex SHA-256 over the sorted pairs, each key and value length-prefixed.
pub fn fingerprint(params: &QueryParams) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in params.iter() {
        // Length-prefixed so `a=bc` and `ab=c` never collide.
        hasher.update((key.len() as u64).to_be_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparameterized_key_is_namespace_and_denomination() {
        let key = cache_key(LookupKind::Courses, "UNICAM", &QueryParams::new());
        assert_eq!(key, "courses:unicam");
    }

    #[test]
    fn parameterized_key_carries_fingerprint() {
        let params = QueryParams::from_pairs([("course_id", "L-31"), ("course_year", "2")]);
        let key = cache_key(LookupKind::Lessons, "unicam", &params);
        assert_eq!(key, format!("lessons:unicam:{}", fingerprint(&params)));
        assert_eq!(fingerprint(&params).len(), 64);
    }

    #[test]
    fn semantically_equal_queries_share_a_key() {
        let a = QueryParams::from_pairs([("course_id", "L-31"), ("course_year", "2")]);
        let b = QueryParams::from_pairs([("Course_Year", "2"), ("COURSE_ID", "L-31")]);
        assert_eq!(
            cache_key(LookupKind::Lessons, "unicam", &a),
            cache_key(LookupKind::Lessons, "unicam", &b)
        );
    }

    #[test]
    fn different_queries_produce_different_keys() {
        let a = QueryParams::from_pairs([("course_year", "1")]);
        let b = QueryParams::from_pairs([("course_year", "2")]);
        assert_ne!(fingerprint(&a), fingerprint(&b));

        let split_a = QueryParams::from_pairs([("a", "bc")]);
        let split_b = QueryParams::from_pairs([("ab", "c")]);
        assert_ne!(fingerprint(&split_a), fingerprint(&split_b));
    }

    #[test]
    fn volatility_follows_lookup_kind() {
        assert_eq!(LookupKind::Courses.volatility(), VolatilityClass::Catalog);
        assert_eq!(LookupKind::Lessons.volatility(), VolatilityClass::Schedule);
    }
}
