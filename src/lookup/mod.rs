//! Read-through access to the intake service's lookup endpoint.

pub mod cache;
pub mod client;

use thiserror::Error;

pub use cache::LookupCache;
pub use client::LookupClient;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("lookup response has no `list` array")]
    MissingList,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid lookup response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build an order-independent cache key: `k1:v1:k2:v2` with keys sorted.
pub fn make_cache_key(params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .iter()
        .map(|(key, value)| format!("{key}:{value}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_sorts_parameters() {
        assert_eq!(make_cache_key(&[("b", "2"), ("a", "1")]), "a:1:b:2");
        assert_eq!(
            make_cache_key(&[("a", "1"), ("b", "2")]),
            make_cache_key(&[("b", "2"), ("a", "1")])
        );
    }

    #[test]
    fn cache_key_for_fixed_lookups() {
        assert_eq!(
            make_cache_key(&[("field", "gov_agency"), ("dependentOnValue", "Federal")]),
            "dependentOnValue:Federal:field:gov_agency"
        );
        assert_eq!(make_cache_key(&[("field", "gov_agency_type")]), "field:gov_agency_type");
        assert_eq!(make_cache_key(&[]), "");
    }
}
