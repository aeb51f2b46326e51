use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, router, Echo, MockState, CLIENT_ID, CLIENT_SECRET, PASSWORD, USERNAME};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn form_request(uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body.to_string())
        .unwrap()
}

fn json_request(uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reflects_query_and_headers() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/echo?a=1&b=x+y")
                .header("X-Trace", "abc")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "DELETE");
    assert_eq!(echo.path, "/echo");
    assert_eq!(echo.query.as_deref(), Some("a=1&b=x+y"));
    assert_eq!(echo.headers["x-trace"], "abc");
}

#[tokio::test]
async fn echo_reflects_body() {
    let resp = app().oneshot(form_request("/echo", "k=v")).await.unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.body, "k=v");
    assert_eq!(echo.headers["content-type"], "application/x-www-form-urlencoded");
    assert!(echo.query.is_none());
}

// --- status ---

#[tokio::test]
async fn status_route_returns_requested_code() {
    let resp = app()
        .oneshot(Request::builder().uri("/status/418").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body_bytes(resp).await, "status 418");
}

// --- oauth ---

#[tokio::test]
async fn client_credentials_token_is_issued() {
    let body = format!("grant_type=client_credentials&client_id={CLIENT_ID}&client_secret={CLIENT_SECRET}&scope=read");
    let resp = app().oneshot(form_request("/oauth/token", &body)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let token: Value = body_json(resp).await;
    assert!(!token["access_token"].as_str().unwrap().is_empty());
    assert_eq!(token["scope"], "read");
    assert!(token["refresh_token"].is_null());
    assert_eq!(token["request_content_type"], "application/x-www-form-urlencoded");
}

#[tokio::test]
async fn password_grant_accepts_json_body() {
    let body = serde_json::json!({
        "grant_type": "password",
        "username": USERNAME,
        "password": PASSWORD,
    })
    .to_string();
    let resp = app().oneshot(json_request("/oauth/token", &body)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let token: Value = body_json(resp).await;
    assert!(token["refresh_token"].is_string());
    assert_eq!(token["scope"], "default");
}

#[tokio::test]
async fn wrong_secret_is_invalid_client() {
    let body = format!("grant_type=client_credentials&client_id={CLIENT_ID}&client_secret=nope");
    let resp = app().oneshot(form_request("/oauth/token", &body)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err: Value = body_json(resp).await;
    assert_eq!(err["error"], "invalid_client");
}

#[tokio::test]
async fn unknown_grant_type_is_rejected() {
    let resp = app()
        .oneshot(form_request("/oauth/token", "grant_type=magic"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: Value = body_json(resp).await;
    assert_eq!(err["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn me_requires_bearer_token() {
    let resp = app()
        .oneshot(Request::builder().uri("/oauth/me").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/oauth/me")
                .header(http::header::AUTHORIZATION, "Bearer t0k")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = body_json(resp).await;
    assert_eq!(me["email"], USERNAME);
}

// --- hit counter ---

#[tokio::test]
async fn every_request_is_counted() {
    use tower::Service;

    let state = MockState::default();
    let mut app = router(state.clone()).into_service();
    assert_eq!(state.hits(), 0);

    for uri in ["/echo", "/status/500", "/status/204"] {
        ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(Request::builder().uri(uri).body(String::new()).unwrap())
            .await
            .unwrap();
    }

    assert_eq!(state.hits(), 3);
}
