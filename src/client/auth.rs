use serde::Serialize;
use tracing::{info, warn};

use crate::client::api_client::ApiClient;
use crate::coordinator::SessionEvent;
use crate::error::ClientError;
use crate::request::{ApiRequest, ApiResponse};
use crate::store::grant::{RefreshTokenBody, TokenGrant};
use crate::store::CredentialPair;

impl ApiClient {
    /// Posts `credentials` to the login endpoint and stores the issued pair.
    pub async fn login<T: Serialize + ?Sized>(&self, credentials: &T) -> Result<CredentialPair, ClientError> {
        let path = self.inner.paths.login_path.clone();
        self.establish(&path, credentials).await
    }

    pub async fn register<T: Serialize + ?Sized>(&self, account: &T) -> Result<CredentialPair, ClientError> {
        let path = self.inner.paths.register_path.clone();
        self.establish(&path, account).await
    }

    // a 401 here means bad credentials, never a refresh
    async fn establish<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<CredentialPair, ClientError> {
        let request = ApiRequest::post(path).json(body)?;
        let response = self.execute(&request, None).await?;
        if !response.status.is_success() {
            return Err(ClientError::Status { response });
        }

        let pair = TokenGrant::from_body(&response.body)
            .map_err(|e| ClientError::InvalidGrant(e.to_string()))?
            .into_session()
            .ok_or_else(|| ClientError::InvalidGrant("both access_token and refresh_token are required".to_owned()))?;

        self.inner.coordinator.with_new_session(|| {
            self.inner.store.replace(pair.clone());
            self.inner.terminator.rearm();
        });
        self.inner.terminator.publish(SessionEvent::Established);
        info!("session established via {}", path);
        Ok(pair)
    }

    /// Best-effort remote logout, then local clearing regardless of the outcome.
    ///
    /// Returns the logout response when the backend answered with success.
    pub async fn logout(&self) -> Option<ApiResponse> {
        let remote = match self.inner.store.get_refresh() {
            Some(refresh_token) => self.remote_logout(&refresh_token).await,
            None => None,
        };

        self.inner.coordinator.with_new_session(|| {
            self.inner.store.clear();
            self.inner.terminator.disarm();
        });
        self.inner.terminator.publish(SessionEvent::LoggedOut);
        info!("logged out");
        remote
    }

    async fn remote_logout(&self, refresh_token: &str) -> Option<ApiResponse> {
        let request = match ApiRequest::post(self.inner.paths.logout_path.as_str())
            .json(&RefreshTokenBody { refresh_token })
        {
            Ok(request) => request,
            Err(e) => {
                warn!("building logout request failed: {}", e);
                return None;
            }
        };
        let access = self.inner.store.get_access();
        match self.execute(&request, access.as_deref()).await {
            Ok(response) if response.status.is_success() => Some(response),
            Ok(response) => {
                warn!("remote logout answered {}, clearing locally anyway", response.status);
                None
            }
            Err(e) => {
                warn!("remote logout failed: {}, clearing locally anyway", e);
                None
            }
        }
    }
}
