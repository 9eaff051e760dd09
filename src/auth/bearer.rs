/// Bearer token extraction from the `Authorization` header

use actix_web::http::header::{HeaderMap, AUTHORIZATION};

use crate::error::BearerError;

const BEARER_PREFIX: &str = "Bearer ";

/// Return the token following the exact, case-sensitive `"Bearer "` prefix.
pub fn extract_bearer(authorization_header: Option<&str>) -> Result<&str, BearerError> {
    let header = authorization_header.ok_or(BearerError::MissingHeader)?;
    header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(BearerError::MalformedScheme)
}

/// Raw `Authorization` header value, if present.
///
/// A value that is not visible ASCII counts as a malformed scheme.
pub fn authorization_header(headers: &HeaderMap) -> Result<Option<&str>, BearerError> {
    headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| BearerError::MalformedScheme))
        .transpose()
}

/// Read the bearer token from request headers.
pub fn bearer_from_headers(headers: &HeaderMap) -> Result<&str, BearerError> {
    extract_bearer(authorization_header(headers)?)
}
