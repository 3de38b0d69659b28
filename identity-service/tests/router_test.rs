mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{json_body, TestApp, IDENTITY_PROVIDER};
use tower::util::ServiceExt;

#[tokio::test]
async fn health_reports_providers_and_active_key() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "identity-service-test");
    assert_eq!(body["identity_providers"], serde_json::json!([IDENTITY_PROVIDER]));
    assert_eq!(
        body["checks"]["signing_key"].as_str(),
        app.state.signer.provider().active_key_id().as_deref()
    );
}

#[tokio::test]
async fn jwks_publishes_active_key() {
    let app = TestApp::spawn().await;

    let response = app.get("/.well-known/jwks.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["cache-control"]
        .to_str()
        .unwrap()
        .contains("max-age"));

    let body = json_body(response).await;
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kty"], "RSA");
    assert_eq!(keys[0]["alg"], "RS256");
    assert_eq!(keys[0]["use"], "sig");
    assert_eq!(
        keys[0]["kid"].as_str(),
        app.state.signer.provider().active_key_id().as_deref()
    );
    assert!(keys[0].get("d").is_none());
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-7");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn unknown_identity_provider_callback_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/oauth2/v1/authorize/callback/unknown?state=abc&code=x")
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
