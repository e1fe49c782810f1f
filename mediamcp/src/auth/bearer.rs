use axum::http::{HeaderMap, header::AUTHORIZATION};

use crate::errors::{Error, Result};
use crate::types::AuthToken;

/// Pull the bearer token out of the `Authorization` header. Purely structural, no I/O.
pub fn extract_bearer(headers: &HeaderMap) -> Result<AuthToken> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::unauthorized("Missing Authorization header"))?;

    let value = header
        .to_str()
        .map_err(|_| Error::unauthorized("Authorization header is not valid UTF-8"))?;

    let token = value
        .trim()
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::unauthorized("Authorization header must use the Bearer scheme"))?
        .trim();

    if token.is_empty() {
        return Err(Error::unauthorized("Empty authorization token"));
    }

    Ok(AuthToken::new(token))
}
