use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, MockState};
use tower::ServiceExt;

fn redirect_location(response: &axum::response::Response) -> Option<&str> {
    response.headers().get(http::header::LOCATION)?.to_str().ok()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes: bytes::Bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::AUTHORIZATION, "Basic c2l0ZTprZXk=")
        .body(body.to_string())
        .unwrap()
}

// --- recording ---

#[tokio::test]
async fn records_method_path_headers_and_body() {
    let state = MockState::shared();
    let resp = app(state.clone())
        .oneshot(json_request("PUT", "/api/v1/customers/1%2F", r#"{"email":"a@b.c"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let recorded = state.last_request().unwrap();
    assert_eq!(recorded.method, "PUT");
    assert_eq!(recorded.path, "/api/v1/customers/1%2F");
    assert_eq!(recorded.header("content-type"), Some("application/json"));
    assert_eq!(recorded.header("authorization"), Some("Basic c2l0ZTprZXk="));
    assert_eq!(recorded.json()["email"], "a@b.c");
}

#[tokio::test]
async fn any_path_is_accepted() {
    let state = MockState::shared();
    for (method, path) in [
        ("POST", "/api/v1/customers/1/events"),
        ("DELETE", "/api/v1/customers/1/devices/d1"),
        ("POST", "/api/v1/merge_customers"),
        ("GET", "/v1/collections"),
    ] {
        let resp = app(state.clone())
            .oneshot(json_request(method, path, "{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{method} {path}");
    }
    assert_eq!(state.requests().len(), 4);
    assert_eq!(state.requests_to("/merge_customers").len(), 1);
}

#[tokio::test]
async fn send_endpoints_return_delivery_id() {
    let state = MockState::shared();
    let resp = app(state)
        .oneshot(json_request("POST", "/v1/send/email", r#"{"transactional_message_id":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert!(body["delivery_id"].as_str().unwrap().starts_with("mock-"));
}

// --- rejection ---

#[tokio::test]
async fn reject_with_overrides_every_response() {
    let state = MockState::shared();
    state.reject_with(401, "unauthorized");
    let resp = app(state.clone())
        .oneshot(json_request("POST", "/api/v1/customers/1/events", "{}"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(resp).await, "unauthorized");

    state.accept_all();
    let resp = app(state)
        .oneshot(json_request("POST", "/api/v1/customers/1/events", "{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn redirect_to_sets_location() {
    let state = MockState::shared();
    state.redirect_to(302, "/elsewhere");
    let resp = app(state.clone())
        .oneshot(json_request("POST", "/api/v1/customers/1/events", "{}"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(redirect_location(&resp), Some("/elsewhere"));
    assert_eq!(state.requests().len(), 1);
}

// --- flaky identify ---

#[tokio::test]
async fn put_with_fail_count_drops_until_count_exceeded() {
    let state = MockState::shared();

    for _ in 0..3 {
        let resp = app(state.clone())
            .oneshot(json_request("PUT", "/api/v1/customers/9", r#"{"fail_count":2}"#))
            .await
            .unwrap();
        assert!(resp.into_body().collect().await.is_err(), "body must fail mid-stream");
    }
    assert_eq!(state.attempts("9"), 3);

    let resp = app(state.clone())
        .oneshot(json_request("PUT", "/api/v1/customers/9", r#"{"fail_count":2}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn put_without_fail_count_succeeds() {
    let state = MockState::shared();
    let resp = app(state.clone())
        .oneshot(json_request("PUT", "/api/v1/customers/9", r#"{"email":"x@y.z"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(state.attempts("9"), 0);
}

#[tokio::test]
async fn clear_forgets_requests_and_attempts() {
    let state = MockState::shared();
    app(state.clone())
        .oneshot(json_request("PUT", "/api/v1/customers/3", r#"{"fail_count":0}"#))
        .await
        .unwrap();
    assert_eq!(state.attempts("3"), 1);

    state.clear();
    assert!(state.requests().is_empty());
    assert_eq!(state.attempts("3"), 0);
}
