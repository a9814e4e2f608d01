// shared backend double and helpers for the client tests
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{any, get, post};
use axum::Json;
use serde_json::Value;
use tokio::time::{sleep, Instant};

use crate::client::ApiClient;

pub const STALE_ACCESS: &str = "access-stale";
pub const FRESH_ACCESS: &str = "access-fresh";
pub const REFRESH_TOKEN: &str = "refresh-1";
pub const ROTATED_REFRESH_TOKEN: &str = "refresh-2";
pub const LOGIN_ACCESS: &str = "access-login";
pub const LOGIN_REFRESH: &str = "refresh-login";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// Polls `condition` every few milliseconds, panics after 5 seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        sleep(Duration::from_millis(5)).await;
    }
}

/// Client against `addr`, holding a stale access token and a valid refresh token.
pub fn stale_client(addr: SocketAddr) -> ApiClient {
    let client = ApiClient::builder(format!("http://{}", addr))
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client");
    client.store().set(STALE_ACCESS, REFRESH_TOKEN);
    client
}

/// Fake API: `/items/{id}` accepts only access tokens the backend issued,
/// `/auth/refresh` hands out `FRESH_ACCESS` for `REFRESH_TOKEN`,
/// `/auth/login` hands out `LOGIN_ACCESS` / `LOGIN_REFRESH`.
#[derive(Clone)]
pub struct Backend {
    refresh_calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
    valid_access: Arc<Mutex<Vec<String>>>,
    refresh_status: StatusCode,
    refresh_delay: Duration,
    rotate: bool,
}

impl Backend {
    pub fn new() -> Self {
        Self {
            refresh_calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
            valid_access: Arc::new(Mutex::new(Vec::new())),
            refresh_status: StatusCode::OK,
            refresh_delay: Duration::from_millis(200),
            rotate: false,
        }
    }

    pub fn refresh_status(mut self, status: StatusCode) -> Self {
        self.refresh_status = status;
        self
    }

    pub fn refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn rotating(mut self) -> Self {
        self.rotate = true;
        self
    }

    pub async fn spawn(&self) -> (JoinHandle<()>, SocketAddr) {
        let router = Router::new()
            .route("/items/{id}", any(items))
            .route("/always-401", get(always_unauthorized))
            .route("/broken", get(broken))
            .route("/open", get(open))
            .route("/auth/refresh", post(refresh))
            .route("/auth/login", post(login))
            .with_state(self.clone());
        spawn_axum(router).await
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Authorization headers seen on `path`, in arrival order.
    pub fn authorizations(&self, path: &str) -> Vec<Option<String>> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, auth)| auth.clone())
            .collect()
    }

    /// Calls under `prefix` that carried `Bearer <access>`.
    pub fn calls_with(&self, prefix: &str, access: &str) -> usize {
        let expected = format!("Bearer {}", access);
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, auth)| p.starts_with(prefix) && auth.as_deref() == Some(expected.as_str()))
            .count()
    }

    fn record(&self, path: String, headers: &HeaderMap) -> Option<String> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.seen.lock().unwrap().push((path, auth.clone()));
        auth
    }

    fn accepts(&self, auth: Option<&str>) -> bool {
        let Some(auth) = auth else { return false };
        self.valid_access
            .lock()
            .unwrap()
            .iter()
            .any(|valid| auth == format!("Bearer {}", valid))
    }

    fn issue(&self, access: &str) {
        self.valid_access.lock().unwrap().push(access.to_owned());
    }
}

async fn items(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let auth = backend.record(format!("/items/{}", id), &headers);
    if backend.accepts(auth.as_deref()) {
        (StatusCode::OK, Json(json!({"success": true, "data": {"id": id}})))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"success": false, "message": "token expired"})))
    }
}

async fn always_unauthorized(State(backend): State<Backend>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    backend.record("/always-401".to_owned(), &headers);
    (StatusCode::UNAUTHORIZED, Json(json!({"success": false, "message": "forbidden resource"})))
}

async fn broken(State(backend): State<Backend>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    backend.record("/broken".to_owned(), &headers);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"success": false, "message": "boom"})))
}

async fn open(State(backend): State<Backend>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    backend.record("/open".to_owned(), &headers);
    (StatusCode::OK, Json(json!({"success": true})))
}

async fn refresh(State(backend): State<Backend>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    sleep(backend.refresh_delay).await;

    let presented = body["refresh_token"].as_str().unwrap_or_default();
    if backend.refresh_status != StatusCode::OK {
        return (backend.refresh_status, Json(json!({"success": false, "message": "refresh unavailable"})));
    }
    if presented != REFRESH_TOKEN {
        return (StatusCode::UNAUTHORIZED, Json(json!({"success": false, "message": "invalid refresh token"})));
    }

    backend.issue(FRESH_ACCESS);
    let body = if backend.rotate {
        json!({"access_token": FRESH_ACCESS, "refresh_token": ROTATED_REFRESH_TOKEN})
    } else {
        json!({"access_token": FRESH_ACCESS})
    };
    (StatusCode::OK, Json(body))
}

async fn login(State(backend): State<Backend>) -> Json<Value> {
    backend.issue(LOGIN_ACCESS);
    Json(json!({"success": true, "data": {"access_token": LOGIN_ACCESS, "refresh_token": LOGIN_REFRESH}}))
}

pub fn build_reqwest_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}
