//! Normalized lookup parameters.

use std::collections::BTreeMap;

use serde::Serialize;

/// Query parameters with canonical keys.
///
/// Keys are trimmed and lower-cased and kept sorted; values are stored verbatim. Two inputs
/// carrying the same pairs in any order (or with differently cased keys) compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw pairs. When two raw keys normalize to the same key, the raw key that
    /// sorts last wins, independent of input order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut raw: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        raw.sort();

        let mut params = BTreeMap::new();
        for (key, value) in raw {
            let key = normalize_key(&key);
            if key.is_empty() {
                continue;
            }
            params.insert(key, value);
        }
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&normalize_key(key)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}
