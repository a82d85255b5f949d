//! Recording fake of the Customer.io track and app APIs.
//!
//! # Design
//! Every request, whatever its path, is recorded (method, raw encoded path,
//! headers, body) and answered 200, so tests can assert exactly what a
//! client put on the wire. Two knobs change the answer:
//!
//! - `reject_with` / `redirect_to` answer every request with a fixed status
//!   (and `Location` for redirects);
//! - a `PUT /customers/{id}` whose body carries `fail_count` gets its
//!   connection dropped mid-response until that id has been attempted more
//!   than `fail_count` times. The per-id counters live here, not in the
//!   client.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use serde::Serialize;
use tokio::net::TcpListener;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordedRequest {
    pub method: String,
    /// Path exactly as received, percent-encoding intact.
    pub path: String,
    /// Lower-cased header names; repeated headers joined with ", ".
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Body parsed as JSON; `Null` when empty or not JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Fixed answer overriding normal handling.
#[derive(Debug, Clone)]
struct Rejection {
    status: u16,
    body: String,
    location: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockState {
    requests: Mutex<Vec<RecordedRequest>>,
    attempts: Mutex<HashMap<String, u64>>,
    rejection: Mutex<Option<Rejection>>,
}

pub type SharedState = Arc<MockState>;

impl MockState {
    pub fn shared() -> SharedState {
        Arc::new(Self::default())
    }

    /// Snapshot of everything received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Requests whose path ends with `suffix`.
    pub fn requests_to(&self, suffix: &str) -> Vec<RecordedRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.path.ends_with(suffix))
            .cloned()
            .collect()
    }

    /// Attempts counted for a flaky customer id.
    pub fn attempts(&self, id: &str) -> u64 {
        lock(&self.attempts).get(id).copied().unwrap_or(0)
    }

    /// Answer every following request with `status` and `body`.
    pub fn reject_with(&self, status: u16, body: impl Into<String>) {
        *lock(&self.rejection) = Some(Rejection {
            status,
            body: body.into(),
            location: None,
        });
    }

    /// Answer every following request with a redirect to `location`.
    pub fn redirect_to(&self, status: u16, location: impl Into<String>) {
        *lock(&self.rejection) = Some(Rejection {
            status,
            body: String::new(),
            location: Some(location.into()),
        });
    }

    pub fn accept_all(&self) {
        *lock(&self.rejection) = None;
    }

    pub fn clear(&self) {
        lock(&self.requests).clear();
        lock(&self.attempts).clear();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn app(state: SharedState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

pub async fn run(listener: TcpListener, state: SharedState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn handle(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers: collect_headers(&headers),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    tracing::debug!(method = %recorded.method, path = %recorded.path, "request");
    lock(&state.requests).push(recorded.clone());

    let rejection = lock(&state.rejection).clone();
    if let Some(rejection) = rejection {
        let status = StatusCode::from_u16(rejection.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, rejection.body).into_response();
        if let Some(location) = rejection.location.and_then(|l| l.parse().ok()) {
            response.headers_mut().insert(header::LOCATION, location);
        }
        return response;
    }

    if method == Method::PUT {
        if let Some(id) = flaky_customer_id(&recorded.path) {
            let fail_count = recorded.json().get("fail_count").and_then(|v| v.as_u64());
            if let Some(fail_count) = fail_count {
                if should_fail(&state, id, fail_count) {
                    tracing::debug!(id, "dropping connection");
                    return dropped_connection();
                }
            }
        }
    }

    if recorded.path.starts_with("/v1/send/") {
        let count = lock(&state.requests).len();
        let body = serde_json::json!({ "delivery_id": format!("mock-{count}"), "queued_at": count });
        return (StatusCode::OK, body.to_string()).into_response();
    }

    (StatusCode::OK, "{}").into_response()
}

/// A response whose body fails on first poll, so hyper aborts the
/// connection before a complete response reaches the client.
fn dropped_connection() -> Response {
    let failing = futures::stream::once(async {
        Err::<Bytes, io::Error>(io::Error::new(io::ErrorKind::ConnectionReset, "flaky customer"))
    });
    Response::new(Body::from_stream(failing))
}

/// Counts an attempt for `id` and reports whether it should fail: the
/// first `fail_count + 1` attempts fail.
fn should_fail(state: &MockState, id: &str, fail_count: u64) -> bool {
    let mut attempts = lock(&state.attempts);
    let processed = attempts.get(id).copied().unwrap_or(0);
    if processed > fail_count {
        return false;
    }
    attempts.insert(id.to_string(), processed + 1);
    true
}

/// `id` of a `.../customers/{id}` path.
fn flaky_customer_id(path: &str) -> Option<&str> {
    let (prefix, id) = path.rsplit_once('/')?;
    (prefix.ends_with("/customers") && !id.is_empty()).then_some(id)
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
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
