//! Read-only peek into JWT claims. No signature check; only used for display.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::helpers::time::from_unix;

#[derive(Debug, Deserialize)]
struct ExpClaim {
    exp: Option<i64>,
}

/// Expiry of a JWT access token, `None` for opaque tokens.
pub fn peek_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: ExpClaim = serde_json::from_slice(&decoded).ok()?;
    from_unix(claims.exp?)
}
