//! Access-token expiry checks.
//!
//! The token is a JWT. Only the `exp` claim of the payload is read; the
//! signature is the service's business.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    exp: i64,
}

/// Expiry instant encoded in the token, if it can be read.
#[must_use]
pub fn expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}

/// A token whose expiry cannot be read counts as expired.
#[must_use]
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    expiry(token).is_none_or(|exp| exp <= now)
}

#[must_use]
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}
