/// HTTP-level tests for the check-pin endpoint
/// Drives the router in-process against mocked KRA endpoints
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use kra_pin_relay::config::{Config, Credentials};
use kra_pin_relay::handlers::{app, rate_limited_lookup_routes, router, AppState};
use kra_pin_relay::relay::LookupRelay;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{any, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn state_for(mock_server: &MockServer, lookup_timeout: Duration) -> Arc<AppState> {
    let config = Config {
        port: 0,
        credentials: Credentials::new("test_key", "test_secret"),
        token_url: format!(
            "{}/v1/token/generate?grant_type=client_credentials",
            mock_server.uri()
        ),
        lookup_url: format!("{}/checker/v1/pin", mock_server.uri()),
        token_timeout: Duration::from_secs(2),
        lookup_timeout,
    };
    let relay = LookupRelay::from_config(&config).unwrap();
    Arc::new(AppState { relay })
}

fn app_for(mock_server: &MockServer, lookup_timeout: Duration) -> axum::Router {
    router(state_for(mock_server, lookup_timeout))
}

async fn mount_token(mock_server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/v1/token/generate"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"access_token": "tok"})))
        .mount(mock_server)
        .await;
}

async fn post_json(app: axum::Router, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/check-pin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let mock_server = MockServer::start().await;
    let app = app_for(&mock_server, Duration::from_secs(2));

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_found_returns_success_payload() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 200).await;
    Mock::given(method("POST"))
        .and(path("/checker/v1/pin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ResponseCode": "30000",
            "TaxpayerPIN": "A123",
            "TaxpayerName": "Jane Doe",
            "StationName": "Nairobi"
        })))
        .mount(&mock_server)
        .await;

    let app = app_for(&mock_server, Duration::from_secs(2));
    let (status, body) =
        post_json(app, r#"{"TaxpayerID":"12345678","TaxpayerType":"KE"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["idNumber"], json!("12345678"));
    assert_eq!(body["data"]["pin"], json!("A123"));
    assert_eq!(body["data"]["taxpayer_name"], json!("Jane Doe"));
    assert_eq!(body["data"]["pin_status"], json!("Active"));
    assert_eq!(body["data"]["itax_status"], json!("Registered"));
    assert_eq!(body["data"]["StationName"], json!("Nairobi"));
}

#[tokio::test]
async fn test_not_found_is_200_with_success_false() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 200).await;
    Mock::given(method("POST"))
        .and(path("/checker/v1/pin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ResponseCode": "40001"})))
        .mount(&mock_server)
        .await;

    let app = app_for(&mock_server, Duration::from_secs(2));
    let (status, body) = post_json(app, r#"{"TaxpayerID":"000","TaxpayerType":"KE"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Not Found"));
    assert_eq!(body["idNumber"], json!("000"));
    assert!(body["message"].as_str().unwrap().contains("000"));
}

#[tokio::test]
async fn test_missing_fields_is_400() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = app_for(&mock_server, Duration::from_secs(2));
    let (status, body) = post_json(app, r#"{"TaxpayerID":"12345678"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": "Missing required fields: TaxpayerID and TaxpayerType are required"})
    );
}

#[tokio::test]
async fn test_unreadable_body_is_400_json() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = app_for(&mock_server, Duration::from_secs(2));
    let (status, body) = post_json(app.clone(), "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/api/check-pin")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("TaxpayerID=1"))
        .unwrap();
    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_failure_is_401() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 401).await;

    let app = app_for(&mock_server, Duration::from_secs(2));
    let (status, body) =
        post_json(app, r#"{"TaxpayerID":"12345678","TaxpayerType":"KE"}"#).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Authentication failed"));
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_timeout_is_504() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 200).await;
    Mock::given(method("POST"))
        .and(path("/checker/v1/pin"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let app = app_for(&mock_server, Duration::from_millis(300));
    let (status, body) =
        post_json(app, r#"{"TaxpayerID":"12345678","TaxpayerType":"KE"}"#).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], json!("Request timeout"));
}

#[tokio::test]
async fn test_upstream_404_is_soft_error() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 200).await;
    Mock::given(method("POST"))
        .and(path("/checker/v1/pin"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let app = app_for(&mock_server, Duration::from_secs(2));
    let (status, body) =
        post_json(app, r#"{"TaxpayerID":"12345678","TaxpayerType":"KE"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": "Not Found",
            "message": "invalid identifier: 12345678",
            "idNumber": "12345678"
        })
    );
}

#[tokio::test]
async fn test_upstream_error_string_is_passed_through() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 200).await;
    Mock::given(method("POST"))
        .and(path("/checker/v1/pin"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Maintenance",
            "message": "Back at 10:00"
        })))
        .mount(&mock_server)
        .await;

    let app = app_for(&mock_server, Duration::from_secs(2));
    let (status, body) =
        post_json(app, r#"{"TaxpayerID":"12345678","TaxpayerType":"KE"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": "Maintenance",
            "message": "Back at 10:00",
            "idNumber": "12345678"
        })
    );
}

#[tokio::test]
async fn test_upstream_404_error_string_replaces_label() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 200).await;
    Mock::given(method("POST"))
        .and(path("/checker/v1/pin"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Invalid PIN"})))
        .mount(&mock_server)
        .await;

    let app = app_for(&mock_server, Duration::from_secs(2));
    let (status, body) = post_json(app, r#"{"TaxpayerID":"000","TaxpayerType":"KE"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], json!("Invalid PIN"));
    assert_eq!(body["message"], json!("invalid identifier: 000"));
}

#[tokio::test]
async fn test_numeric_taxpayer_id_is_forwarded_as_text() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server, 200).await;
    Mock::given(method("POST"))
        .and(path("/checker/v1/pin"))
        .and(body_json(json!({"TaxpayerID": "12345678", "TaxpayerType": "KE"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ResponseCode": "30000",
            "TaxpayerPIN": "A123"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = app_for(&mock_server, Duration::from_secs(2));
    let (status, body) = post_json(app, r#"{"TaxpayerID":12345678,"TaxpayerType":"KE"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["idNumber"], json!("12345678"));
    assert_eq!(body["data"]["pin"], json!("A123"));
}

#[tokio::test]
async fn test_oversized_body_is_413_json() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    let app = app_for(&mock_server, Duration::from_secs(2));

    let padding = "x".repeat(70 * 1024);
    let oversized = format!(
        r#"{{"TaxpayerID":"12345678","TaxpayerType":"KE","note":"{}"}}"#,
        padding
    );

    // Declared length is refused by the body limit layer before the handler runs.
    let request = Request::builder()
        .method("POST")
        .uri("/api/check-pin")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, oversized.len())
        .body(Body::from(oversized.clone()))
        .unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], json!("Payload Too Large"));
    assert!(body["message"].is_string());

    // Without a declared length the limit trips while the body is read.
    let (status, body) = post_json(app, &oversized).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], json!("Payload Too Large"));
}

#[tokio::test]
async fn test_rate_limited_lookup_is_429_json() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let lookup = rate_limited_lookup_routes(Duration::from_secs(60), 1).unwrap();
    let app = app(state_for(&mock_server, Duration::from_secs(2)), lookup);

    let request = || {
        Request::builder()
            .method("POST")
            .uri("/api/check-pin")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(r#"{"TaxpayerID":"12345678"}"#))
            .unwrap()
    };

    let (status, _) = send(app.clone(), request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], json!("Too Many Requests"));
    assert!(body["message"].is_string());

    // Health is outside the limiter.
    let health = Request::builder()
        .uri("/health")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app, health).await;
    assert_eq!(status, StatusCode::OK);
}
