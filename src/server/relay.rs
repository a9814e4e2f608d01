use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use http::header::{self, HeaderName};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::helpers::jwt::peek_expiry;
use crate::helpers::time::remaining_seconds;
use crate::request::{ApiRequest, ApiResponse};
use crate::server::server::AppState;
use crate::utils::constants::RELAY_PREFIX;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// never forwarded in either direction
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route(&format!("{}/{{*path}}", RELAY_PREFIX), any(relay_request))
        .route("/session", get(session_status))
}

/// Forwards one request to the API through the shared client.
async fn relay_request(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let forwarded = path_and_query
        .strip_prefix(RELAY_PREFIX)
        .unwrap_or(path_and_query)
        .to_owned();

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return envelope_error(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()),
    };

    let mut request = ApiRequest::new(parts.method, forwarded);
    request.headers = strip_headers(parts.headers, true);
    if !body.is_empty() {
        request.body = Some(body.to_vec());
    }
    debug!("relay: {}", request.describe());

    match state.client.send(&request).await {
        Ok(response) | Err(ClientError::Status { response }) => into_response(response),
        Err(ClientError::SessionExpired(err)) => {
            envelope_error(StatusCode::UNAUTHORIZED, format!("session expired: {}", err))
        }
        Err(ClientError::InvalidRequest(msg)) => envelope_error(StatusCode::BAD_REQUEST, msg),
        Err(e) => {
            warn!("relay: {} failed: {}", request.describe(), e);
            envelope_error(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn session_status(State(state): State<AppState>) -> Response {
    let access = state.client.store().get_access();
    let expires_at = access.as_deref().and_then(peek_expiry);
    Json(json!({
        "success": true,
        "data": {
            "established": access.is_some(),
            "access_expires_at": expires_at.map(|at| at.to_rfc3339()),
            "expires_in_seconds": expires_at.map(|at| remaining_seconds(&at)),
        }
    }))
    .into_response()
}

fn into_response(response: ApiResponse) -> Response {
    let headers = strip_headers(response.headers, false);
    (response.status, headers, response.body).into_response()
}

/// Drops hop-by-hop headers; inbound requests also lose `Authorization`,
/// the relay attaches its own.
fn strip_headers(mut headers: HeaderMap, inbound: bool) -> HeaderMap {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    if inbound {
        headers.remove(header::AUTHORIZATION);
    }
    headers
}

fn envelope_error(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}
