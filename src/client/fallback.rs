//! Fallback synthesis: structurally valid placeholder responses.
//!
//! When the upstream cannot be reached, callers still receive a body shaped
//! like the endpoint's real response, with a `"fallback": true` marker so UX
//! code can distinguish "no results" from "service degraded".

use serde_json::{json, Value};

/// Endpoint shape, resolved once per request and matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackShape {
    /// `search/...` endpoints: a paged, empty result set.
    SearchPerson,
    /// `person/{id}/movie_credits`-shaped endpoints: empty cast and crew.
    MovieCredits,
    /// Single-resource `person/{id}` endpoints: an anonymous actor.
    PersonDetails,
    /// Anything else: an explicit service-unavailable body.
    Default,
}

impl FallbackShape {
    /// Classifies an endpoint path.
    pub fn resolve(endpoint: &str) -> Self {
        let path = endpoint.trim_matches('/');
        if path.starts_with("search/") {
            FallbackShape::SearchPerson
        } else if path.ends_with("/movie_credits") {
            FallbackShape::MovieCredits
        } else if is_person_details(path) {
            FallbackShape::PersonDetails
        } else {
            FallbackShape::Default
        }
    }

    /// Produces the placeholder body for this shape. Every shape carries the
    /// `"fallback": true` marker.
    pub fn synthesize(&self) -> Value {
        match self {
            FallbackShape::SearchPerson => json!({
                "results": [],
                "total_results": 0,
                "total_pages": 0,
                "page": 1,
                "fallback": true,
            }),
            FallbackShape::MovieCredits => json!({
                "cast": [],
                "crew": [],
                "id": 0,
                "fallback": true,
            }),
            FallbackShape::PersonDetails => json!({
                "id": 0,
                "name": "Unknown Actor",
                "biography": "",
                "profile_path": null,
                "known_for_department": "Acting",
                "fallback": true,
            }),
            FallbackShape::Default => json!({
                "error": "Service temporarily unavailable",
                "fallback": true,
            }),
        }
    }
}

/// `person/{id}` with a purely numeric identifier and nothing after it.
fn is_person_details(path: &str) -> bool {
    match path.strip_prefix("person/") {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Whether `response` is synthesized placeholder data rather than a genuine
/// upstream payload.
pub fn is_fallback(response: &Value) -> bool {
    response
        .get("fallback")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
