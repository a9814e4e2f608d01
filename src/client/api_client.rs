use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use http::header::{HeaderValue, AUTHORIZATION};
use http::StatusCode;
use reqwest::Client;
use tokio::sync::broadcast::Receiver;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::types::{AuthPaths, ServiceConfig};
use crate::coordinator::{RefreshCoordinator, SessionEvent, SessionTerminator};
use crate::error::ClientError;
use crate::observability::metrics::{
    get_metrics, OUTCOME_HTTP_ERROR, OUTCOME_SESSION_EXPIRED, OUTCOME_SUCCESS, OUTCOME_TRANSPORT_ERROR,
};
use crate::request::{ApiRequest, ApiResponse, Attempt};
use crate::store::CredentialStore;
use crate::utils::constants::BEARER_PREFIX;

/// Authenticated API client: attaches the bearer token, recovers from a
/// first 401 through the [`RefreshCoordinator`] and replays once.
///
/// Cheap to clone; clones share credentials and refresh state. Separately
/// built clients are fully isolated from each other.
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) paths: AuthPaths,
    pub(crate) store: CredentialStore,
    pub(crate) terminator: SessionTerminator,
    pub(crate) coordinator: RefreshCoordinator,
}

pub struct ApiClientBuilder {
    base_url: String,
    paths: AuthPaths,
    timeout: Option<Duration>,
    store: Option<CredentialStore>,
    http: Option<Client>,
}

impl ApiClientBuilder {
    pub fn auth_paths(mut self, paths: AuthPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(mut self, store: CredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Reuse an existing reqwest client; `timeout` is then ignored.
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<ApiClient, ClientError> {
        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };
        let base_url = self.base_url.trim_end_matches('/').to_owned();
        let store = self.store.unwrap_or_else(CredentialStore::in_memory);
        let terminator = SessionTerminator::new(store.clone());
        let coordinator = RefreshCoordinator::new(
            http.clone(),
            &base_url,
            &self.paths.refresh_path,
            store.clone(),
            terminator.clone(),
        );

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                paths: self.paths,
                store,
                terminator,
                coordinator,
            }),
        })
    }
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            paths: AuthPaths::default(),
            timeout: None,
            store: None,
            http: None,
        }
    }

    pub fn from_config(cfg: &ServiceConfig) -> Result<Self> {
        let store = CredentialStore::from_config(&cfg.store).context("opening credential store")?;
        let mut builder = ApiClient::builder(cfg.api.base_url.as_str())
            .auth_paths(cfg.api.auth.clone())
            .store(store);
        if let Some(timeout_ms) = cfg.api.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder.build().context("building http client")?;
        info!("api client ready for {}", client.base_url());
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn terminator(&self) -> &SessionTerminator {
        &self.inner.terminator
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    /// Session lifecycle events (`Terminated` means: back to sign-in).
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.inner.terminator.subscribe()
    }

    /// Sends `request` with the current access token.
    ///
    /// A first 401 is recovered by refresh + one replay with the new token.
    /// Any other failure, or a 401 on the replay, comes back unchanged.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let metrics = get_metrics();
        let start = Instant::now();
        let method = request.method.as_str();

        let result = self.dispatch(Attempt::original(request)).await;

        let outcome = match &result {
            Ok(_) => OUTCOME_SUCCESS,
            Err(ClientError::SessionExpired(_)) => OUTCOME_SESSION_EXPIRED,
            Err(ClientError::Status { .. }) => OUTCOME_HTTP_ERROR,
            Err(_) => OUTCOME_TRANSPORT_ERROR,
        };
        metrics.requests.with_label_values(&[method, outcome]).inc();
        metrics
            .request_duration
            .with_label_values(&[method])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn dispatch(&self, mut attempt: Attempt<'_>) -> Result<ApiResponse, ClientError> {
        let request = attempt.request();
        let mut access = self.inner.store.get_access();

        loop {
            let response = self.execute(request, access.as_deref()).await?;
            if response.status.is_success() {
                return Ok(response);
            }
            if response.status != StatusCode::UNAUTHORIZED {
                return Err(ClientError::Status { response });
            }

            get_metrics().unauthorized.with_label_values(&[attempt.label()]).inc();

            if self.inner.coordinator.is_refresh_call(request) {
                warn!("{}: refresh endpoint rejected the call, terminating session", request.describe());
                self.inner.terminator.terminate();
                return Err(ClientError::Status { response });
            }

            let Some(retry) = attempt.retry() else {
                debug!("{}: 401 on replay, giving up", request.describe());
                return Err(ClientError::Status { response });
            };

            let fresh = self
                .inner
                .coordinator
                .recover(request, access.as_deref())
                .await
                .map_err(ClientError::SessionExpired)?;

            debug!("{}: replaying with refreshed token", request.describe());
            get_metrics().replays.inc();
            attempt = retry;
            access = Some(fresh);
        }
    }

    /// One HTTP round trip, no auth recovery.
    pub(crate) async fn execute(
        &self,
        request: &ApiRequest,
        access: Option<&str>,
    ) -> Result<ApiResponse, ClientError> {
        let url = request.url(&self.inner.base_url);
        let mut headers = request.headers.clone();
        headers.remove(AUTHORIZATION);
        if let Some(access) = access {
            let value = HeaderValue::from_str(&format!("{}{}", BEARER_PREFIX, access))
                .map_err(|_| ClientError::InvalidRequest("access token is not a valid header value".to_owned()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        Ok(ApiResponse::from_reqwest(response).await?)
    }
}
