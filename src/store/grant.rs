use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::store::credentials::CredentialPair;

/// Token payload returned by login, register and refresh.
///
/// Accepted at the top level of the body or under an envelope's `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
}

/// Body of the refresh and logout calls.
#[derive(Debug, Serialize)]
pub struct RefreshTokenBody<'a> {
    pub refresh_token: &'a str,
}

impl TokenGrant {
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        let payload = match value.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => value,
        };
        serde_json::from_value(payload)
    }

    /// Pair to store after a refresh. Without rotation the previous refresh token is kept.
    pub fn into_pair(self, previous_refresh: &str) -> CredentialPair {
        let refresh_token = match self.refresh_token.filter(|t| !t.is_empty()) {
            Some(rotated) => rotated,
            None => {
                debug!("refresh token not rotated, keeping the previous one");
                previous_refresh.to_owned()
            }
        };
        CredentialPair::new(self.access_token, refresh_token)
    }

    /// Pair to store after login/register, which must issue both tokens.
    pub fn into_session(self) -> Option<CredentialPair> {
        let refresh = self.refresh_token.filter(|t| !t.is_empty())?;
        Some(CredentialPair::new(self.access_token, refresh))
    }
}
