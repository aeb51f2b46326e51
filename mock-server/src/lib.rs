//! Mock identity service used to exercise the pooled client over real HTTP.
//!
//! Routes:
//! - `ANY /echo` — reflects method, query, headers, and body as JSON.
//! - `ANY /status/{code}` — responds with the given status code.
//! - `GET /slow/{ms}` — sleeps before answering, to hold connections open.
//! - `POST /oauth/token` — issues tokens for the test client or password grant.
//! - `GET /oauth/me` — protected resource requiring a bearer token.
//!
//! Every request bumps a hit counter so tests can assert that no I/O happened.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";
pub const USERNAME: &str = "user@example.com";
pub const PASSWORD: &str = "hunter2";
pub const USER_ID: u64 = 42;

/// Shared request counter.
#[derive(Clone, Debug, Default)]
pub struct MockState {
    hits: Arc<AtomicUsize>,
}

impl MockState {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// What `/echo` saw.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub fn app() -> Router {
    router(MockState::default())
}

pub fn router(state: MockState) -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/slow/{ms}", get(slow))
        .route("/oauth/token", post(token))
        .route("/oauth/me", get(me))
        .layer(middleware::from_fn_with_state(state.clone(), count_hits))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, MockState::default()).await
}

pub async fn run_with_state(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

async fn count_hits(State(state): State<MockState>, request: Request, next: Next) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    tracing::debug!(method = %request.method(), uri = %request.uri(), "mock request");
    next.run(request).await
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Echo> {
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: header_map(&headers),
        body,
    })
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {}", status.as_u16()))
}

async fn slow(Path(ms): Path<u64>) -> String {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    format!("slept {ms}ms")
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

/// Token request parameters, from either a JSON object or a form body.
fn token_params(content_type: &str, body: &str) -> BTreeMap<String, String> {
    if content_type.starts_with("application/json") {
        let fields: BTreeMap<String, Value> = serde_json::from_str(body).unwrap_or_default();
        return fields
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();
    }
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn oauth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({ "error": error, "error_description": description })),
    )
        .into_response()
}

async fn token(headers: HeaderMap, body: String) -> Response {
    let content_type = content_type(&headers);
    let params = token_params(&content_type, &body);
    let param = |name: &str| params.get(name).map(String::as_str);

    let refresh_token = match param("grant_type") {
        Some("client_credentials") => {
            if param("client_id") != Some(CLIENT_ID) || param("client_secret") != Some(CLIENT_SECRET) {
                return oauth_error(StatusCode::UNAUTHORIZED, "invalid_client", "unknown client credentials");
            }
            None
        }
        Some("password") => {
            if param("username") != Some(USERNAME) || param("password") != Some(PASSWORD) {
                return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "bad username or password");
            }
            Some(Uuid::new_v4().to_string())
        }
        Some(_) => {
            return oauth_error(StatusCode::BAD_REQUEST, "unsupported_grant_type", "grant type not supported")
        }
        None => return oauth_error(StatusCode::BAD_REQUEST, "invalid_request", "missing grant_type"),
    };

    Json(json!({
        "access_token": Uuid::new_v4().to_string(),
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": refresh_token,
        "scope": param("scope").unwrap_or("default"),
        "user_id": USER_ID,
        "request_content_type": content_type,
    }))
    .into_response()
}

async fn me(headers: HeaderMap) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty());
    match bearer {
        Some(_) => Json(json!({ "user_id": USER_ID, "email": USERNAME })).into_response(),
        None => oauth_error(StatusCode::UNAUTHORIZED, "invalid_token", "missing bearer token"),
    }
}
