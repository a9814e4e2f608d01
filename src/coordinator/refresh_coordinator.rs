//! Single-flight token refresh.
//!
//! The first 401 observed while idle starts exactly one refresh call on a
//! detached task; every 401 observed until that call settles parks a
//! [`PendingRequest`] in a FIFO queue. Settling stores the new pair (or
//! terminates the session) before the queue is drained, so nobody replays
//! with a token that is not stored yet.
//!
//! Login and logout bump the session epoch. A refresh started under an older
//! epoch never writes the store nor terminates when it settles.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use http::Method;
use reqwest::Client;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::coordinator::pending::{PendingRequest, RefreshOutcome};
use crate::coordinator::terminator::SessionTerminator;
use crate::error::RefreshError;
use crate::observability::metrics::{
    get_metrics, OUTCOME_INTERRUPTED, OUTCOME_MALFORMED, OUTCOME_REJECTED, OUTCOME_SKIPPED,
    OUTCOME_SUCCESS, OUTCOME_SUPERSEDED, OUTCOME_TRANSPORT_ERROR,
};
use crate::request::ApiRequest;
use crate::store::grant::{RefreshTokenBody, TokenGrant};
use crate::store::{CredentialPair, CredentialStore};
use crate::utils::lock::MutexExt;

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    http: Client,
    base_url: String,
    refresh_path: String,
    refresh_route: String,
    store: CredentialStore,
    terminator: SessionTerminator,
    state: Mutex<RefreshState>,
}

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<PendingRequest>,
    next_id: u64,
    epoch: u64,
}

enum Admission {
    Ready(String),
    Wait(oneshot::Receiver<RefreshOutcome>),
    Fail(RefreshError),
}

impl RefreshCoordinator {
    pub fn new(
        http: Client,
        base_url: &str,
        refresh_path: &str,
        store: CredentialStore,
        terminator: SessionTerminator,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let refresh_route = ApiRequest::post(refresh_path).route(&base_url);
        Self {
            inner: Arc::new(CoordinatorInner {
                http,
                base_url,
                refresh_path: refresh_path.to_owned(),
                refresh_route,
                store,
                terminator,
                state: Mutex::new(RefreshState::default()),
            }),
        }
    }

    /// Whether `request` is a call of the refresh endpoint itself (`POST` on its route).
    pub fn is_refresh_call(&self, request: &ApiRequest) -> bool {
        request.method == Method::POST && request.route(&self.inner.base_url) == self.inner.refresh_route
    }

    /// Runs `change` (a login or logout writing the store) as the start of a
    /// new session. A refresh still in flight is left to settle on its own but
    /// will not touch the store or the terminator afterwards.
    pub(crate) fn with_new_session<R>(&self, change: impl FnOnce() -> R) -> R {
        let mut state = self.inner.state.lock_or_recover();
        state.epoch += 1;
        if state.refreshing {
            debug!("session changed while a refresh is in flight, its result will be discarded");
        }
        change()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock_or_recover().refreshing
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state.lock_or_recover().queue.len()
    }

    /// Descriptors of the parked requests, in drain order.
    pub fn queued(&self) -> Vec<String> {
        self.inner
            .state
            .lock_or_recover()
            .queue
            .iter()
            .map(|pending| pending.descriptor.clone())
            .collect()
    }

    /// Access token to replay `request` with, after it got a first 401 while
    /// sent with `sent_with`.
    ///
    /// Suspends until the in-flight refresh settles. Dropping the returned
    /// future while parked is fine, the drain skips the abandoned slot.
    pub async fn recover(
        &self,
        request: &ApiRequest,
        sent_with: Option<&str>,
    ) -> Result<String, RefreshError> {
        match self.admit(request, sent_with) {
            Admission::Ready(access) => Ok(access),
            Admission::Fail(err) => Err(err),
            Admission::Wait(receiver) => receiver.await.unwrap_or(Err(RefreshError::Interrupted)),
        }
    }

    // check-and-set of `refreshing` and the enqueue happen under one lock
    fn admit(&self, request: &ApiRequest, sent_with: Option<&str>) -> Admission {
        let mut state = self.inner.state.lock_or_recover();

        if !state.refreshing {
            match self.inner.store.get() {
                Some(pair) if sent_with != Some(pair.access_token.as_str()) => {
                    // a refresh settled after this request left
                    debug!("{}: credentials changed since send, replaying without refresh", request.describe());
                    return Admission::Ready(pair.access_token);
                }
                Some(pair) => {
                    state.refreshing = true;
                    info!("{}: access token rejected, starting refresh", request.describe());
                    tokio::spawn(self.clone().run_refresh(pair.refresh_token, state.epoch));
                }
                None => {
                    drop(state);
                    warn!("{}: access token rejected and no refresh token stored", request.describe());
                    get_metrics().refresh_calls.with_label_values(&[OUTCOME_SKIPPED]).inc();
                    self.inner.terminator.terminate();
                    return Admission::Fail(RefreshError::MissingRefreshToken);
                }
            }
        }

        let id = state.next_id;
        state.next_id += 1;
        let (pending, receiver) = PendingRequest::new(id, request.describe());
        state.queue.push_back(pending);

        let metrics = get_metrics();
        metrics.queued_requests.inc();
        metrics.queue_depth.inc();
        debug!("{}: parked as #{} behind refresh, queue length {}", request.describe(), id, state.queue.len());

        Admission::Wait(receiver)
    }

    async fn run_refresh(self, refresh_token: String, epoch: u64) {
        let guard = SettleGuard::arm(self.clone(), epoch);
        let start = Instant::now();

        let outcome = self.call_refresh_endpoint(&refresh_token).await;
        get_metrics().refresh_duration.observe(start.elapsed().as_secs_f64());

        guard.disarm();
        self.settle(epoch, outcome);
    }

    async fn call_refresh_endpoint(&self, refresh_token: &str) -> Result<CredentialPair, RefreshError> {
        let url = ApiRequest::post(self.inner.refresh_path.as_str()).url(&self.inner.base_url);
        let response = self
            .inner
            .http
            .post(url)
            .json(&RefreshTokenBody { refresh_token })
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected { status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;
        let grant = TokenGrant::from_body(&body)
            .map_err(|e| RefreshError::MalformedGrant(e.to_string()))?;
        if grant.access_token.is_empty() {
            return Err(RefreshError::MalformedGrant("empty access_token".to_owned()));
        }
        Ok(grant.into_pair(refresh_token))
    }

    /// Stores or terminates, then releases the whole queue with one outcome.
    ///
    /// The state lock is held while the store is written, so a concurrent
    /// login or logout lands either fully before or fully after this.
    fn settle(&self, epoch: u64, outcome: Result<CredentialPair, RefreshError>) {
        let metrics = get_metrics();

        let mut state = self.inner.state.lock_or_recover();
        let resolution: RefreshOutcome = if state.epoch != epoch {
            metrics.refresh_calls.with_label_values(&[OUTCOME_SUPERSEDED]).inc();
            info!("session changed during refresh, discarding its result");
            // whatever the new session holds, if anything
            self.inner.store.get_access().ok_or(RefreshError::Superseded)
        } else {
            match outcome {
                Ok(pair) => {
                    metrics.refresh_calls.with_label_values(&[OUTCOME_SUCCESS]).inc();
                    let access = pair.access_token.clone();
                    self.inner.store.replace(pair);
                    self.inner.terminator.rearm();
                    info!("refresh succeeded");
                    Ok(access)
                }
                Err(err) => {
                    let label = match &err {
                        RefreshError::Rejected { .. } => OUTCOME_REJECTED,
                        RefreshError::Transport(_) => OUTCOME_TRANSPORT_ERROR,
                        RefreshError::Interrupted => OUTCOME_INTERRUPTED,
                        RefreshError::Superseded => OUTCOME_SUPERSEDED,
                        RefreshError::MalformedGrant(_) | RefreshError::MissingRefreshToken => OUTCOME_MALFORMED,
                    };
                    metrics.refresh_calls.with_label_values(&[label]).inc();
                    warn!("refresh failed: {}", err);
                    // an interrupted call says nothing about the stored credentials
                    if err != RefreshError::Interrupted {
                        self.inner.terminator.terminate();
                    }
                    Err(err)
                }
            }
        };

        state.refreshing = false;
        let drained = std::mem::take(&mut state.queue);
        drop(state);
        metrics.queue_depth.sub(drained.len() as i64);

        let total = drained.len();
        let mut abandoned = 0;
        for pending in drained {
            let id = pending.id;
            if !pending.resolve(resolution.clone()) {
                abandoned += 1;
                debug!("pending request #{} was cancelled before the refresh settled", id);
            }
        }
        info!("refresh settled, released {} queued requests ({} cancelled)", total, abandoned);
    }
}

/// Settles the queue as interrupted if the refresh task is dropped mid-call,
/// so `refreshing` can never stay set with nobody left to clear it.
struct SettleGuard {
    coordinator: Option<RefreshCoordinator>,
    epoch: u64,
}

impl SettleGuard {
    fn arm(coordinator: RefreshCoordinator, epoch: u64) -> Self {
        Self { coordinator: Some(coordinator), epoch }
    }

    fn disarm(mut self) {
        self.coordinator = None;
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if let Some(coordinator) = self.coordinator.take() {
            warn!("refresh task dropped before settling");
            coordinator.settle(self.epoch, Err(RefreshError::Interrupted));
        }
    }
}
