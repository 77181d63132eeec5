//! Stub bearer-token user identification (spec.md §6).
//!
//! The core neither issues nor verifies tokens: the `Authorization: Bearer
//! <token>` header's token is taken verbatim as the caller's `user_id`.
//! Authentication is optional in dev mode, so every extractor here falls
//! back to `"anonymous"` rather than rejecting the request.

use axum::http::HeaderMap;

const ANONYMOUS_USER: &str = "anonymous";

/// Extracts the caller's `user_id` from an `Authorization: Bearer <token>`
/// header, or `"anonymous"` if absent/malformed.
pub fn user_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_token_as_user_id() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer alice"));
        assert_eq!(user_id_from_headers(&headers), "alice");
    }

    #[test]
    fn missing_header_is_anonymous() {
        assert_eq!(user_id_from_headers(&HeaderMap::new()), ANONYMOUS_USER);
    }

    #[test]
    fn non_bearer_scheme_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(user_id_from_headers(&headers), ANONYMOUS_USER);
    }
}
