//! Authorization round trip through the HTTP surface: authorize, external
//! provider callback, then a redirect to the client or to consent.

mod common;

use axum::http::StatusCode;
use common::*;
use identity_service::models::{AuthorizationGrant, CodeChallengeMode, CorrelationId};
use identity_service::provider::ProviderStrategy;
use identity_service::services::ChallengeRepository;

/// Starts a round trip and returns the provider `state` and nonce.
async fn start(app: &TestApp, scope: &str, keychain: Option<&str>) -> (String, String) {
    let response = app.authorize(scope, keychain).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let params = query_of(&location(&response));
    let correlation_id: CorrelationId = params["state"].parse().unwrap();
    let challenge = app
        .store
        .get_by_correlation_id(correlation_id)
        .await
        .unwrap()
        .expect("challenge was stored");

    (params["state"].clone(), challenge.idp.nonce)
}

fn id_token(nonce: &str) -> String {
    unsigned_token(&[("nonce", nonce), ("oid", USER_OBJECT_ID)])
}

#[tokio::test]
async fn authorize_redirects_to_identity_provider_with_pkce() {
    let app = TestApp::spawn().await;

    let response = app.authorize("openid", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["cache-control"], "no-store");
    let location = location(&response);
    assert!(location.starts_with("https://acme.example/authorize?"));

    let params = query_of(&location);
    assert_eq!(params["client_id"], "ozone-at-acme");
    assert_eq!(params["response_type"], "code id_token");
    assert_eq!(params["response_mode"], "query");
    assert_eq!(params["scope"], "openid");
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(
        params["redirect_uri"],
        format!("{}/callback/acme", AUTHORIZE_URI)
    );

    let correlation_id: CorrelationId = params["state"].parse().unwrap();
    let challenge = app
        .store
        .get_by_correlation_id(correlation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(params["nonce"], challenge.idp.nonce);
    assert_eq!(
        params["code_challenge"],
        CodeChallengeMode::S256.create_challenge(&challenge.idp.code_verifier)
    );
    assert_eq!(challenge.client.state, CLIENT_STATE);
}

#[tokio::test]
async fn existing_grant_redirects_to_client_with_code() {
    let app = TestApp::spawn().await;
    app.store.insert_grant(AuthorizationGrant::new(
        app.directory.user.id.clone(),
        app.directory.application.id,
        vec![app.directory.read.clone()],
    ));

    let (state, nonce) = start(&app, "openid files.read", None).await;
    let response = app.callback(&state, &id_token(&nonce)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with(CLIENT_REDIRECT_URI));

    let params = query_of(&location);
    let codes = app.store.authorization_codes();
    assert_eq!(codes.len(), 1);
    assert_eq!(params["code"], codes[0].code);
    assert_eq!(params["state"], CLIENT_STATE);
    assert_eq!(codes[0].idp_refresh_token, "idp-refresh-token");
    assert_eq!(codes[0].identity, app.directory.user.id);
}

#[tokio::test]
async fn missing_grant_redirects_to_consent() {
    let app = TestApp::spawn().await;

    let (state, nonce) = start(&app, "openid files.read", Some("documents:read")).await;
    let response = app.callback(&state, &id_token(&nonce)).await;

    let location = location(&response);
    assert!(location.starts_with(CONSENT_URI));

    let params = query_of(&location);
    assert_eq!(params["client_name"], "Documents");
    assert_eq!(params["client_description"], "Stores your documents");
    assert_eq!(params["username"], "ada");
    assert_eq!(params["redirect_uri"], CLIENT_REDIRECT_URI);
    assert_eq!(params["state"], CLIENT_STATE);
    assert_eq!(params["code"], app.store.authorization_codes()[0].code);

    let scopes: serde_json::Value = serde_json::from_str(&params["scopes"]).unwrap();
    assert_eq!(
        scopes,
        serde_json::json!([
            { "name": "Read documents", "description": "Read every document" },
            { "name": "Sign in", "description": "Sign you in" },
            { "name": "Read files", "description": "Read your files" }
        ])
    );
}

#[tokio::test]
async fn insufficient_grant_redirects_to_consent() {
    let app = TestApp::spawn().await;
    app.store.insert_grant(AuthorizationGrant::new(
        app.directory.user.id.clone(),
        app.directory.application.id,
        Vec::new(),
    ));

    let (state, nonce) = start(&app, "files.read", None).await;
    let response = app.callback(&state, &id_token(&nonce)).await;

    assert!(location(&response).starts_with(CONSENT_URI));
}

#[tokio::test]
async fn codes_are_fresh_for_every_round_trip() {
    let app = TestApp::spawn().await;

    let mut codes = Vec::new();
    for _ in 0..2 {
        let (state, nonce) = start(&app, "openid", None).await;
        let response = app.callback(&state, &id_token(&nonce)).await;
        codes.push(query_of(&location(&response))["code"].clone());
    }

    assert_ne!(codes[0], codes[1]);
}

#[tokio::test]
async fn replayed_callback_redirects_with_error() {
    let app = TestApp::spawn().await;

    let (state, nonce) = start(&app, "openid", None).await;
    let first = app.callback(&state, &id_token(&nonce)).await;
    assert!(query_of(&location(&first)).contains_key("code"));

    let replay = app.callback(&state, &id_token(&nonce)).await;

    assert_eq!(replay.status(), StatusCode::FOUND);
    let location = location(&replay);
    assert!(location.starts_with(CLIENT_REDIRECT_URI));
    let params = query_of(&location);
    assert_eq!(params["error"], "ExternalAuthenticationChallengeExpired");
    assert!(!params.contains_key("code"));
    assert_eq!(app.store.authorization_codes().len(), 1);
    assert_eq!(app.tokens.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn nonce_mismatch_redirects_to_client_with_error() {
    let app = TestApp::spawn().await;

    let (state, _) = start(&app, "openid", None).await;
    let response = app.callback(&state, &id_token("replayed-nonce")).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with(CLIENT_REDIRECT_URI));

    let params = query_of(&location);
    assert_eq!(params["error"], "ExternalIdentityProviderIdTokenInvalidNonce");
    assert_eq!(params["state"], CLIENT_STATE);
    assert!(app.store.authorization_codes().is_empty());
    assert!(app.tokens.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn expired_challenge_redirects_with_error() {
    let app = TestApp::spawn().await;

    let (state, nonce) = start(&app, "openid", None).await;
    app.clock.advance(chrono::Duration::minutes(5) + chrono::Duration::seconds(1));
    let response = app.callback(&state, &id_token(&nonce)).await;

    assert_eq!(
        query_of(&location(&response))["error"],
        "ExternalAuthenticationChallengeExpired"
    );
}

#[tokio::test]
async fn provider_error_is_forwarded_to_client() {
    let app = TestApp::spawn().await;

    let (state, _) = start(&app, "openid", None).await;
    let response = app
        .get(&format!(
            "/oauth2/v1/authorize/callback/acme?state={}&error=access_denied&error_description=User+cancelled",
            state
        ))
        .await;

    let params = query_of(&location(&response));
    assert_eq!(params["error"], "ExternalIdentityProviderAuthenticationFailed");
    assert!(params["error_description"].contains("User cancelled"));
}

#[tokio::test]
async fn access_token_for_another_user_is_rejected() {
    let app = TestApp::spawn_with(
        StubTokenClient::issuing("someone-else", Some("idp-refresh-token")),
        ProviderStrategy::generic("acme.example", CodeChallengeMode::S256),
    )
    .await;

    let (state, nonce) = start(&app, "openid", None).await;
    let response = app.callback(&state, &id_token(&nonce)).await;

    assert_eq!(
        query_of(&location(&response))["error"],
        "ExternalIdentityProviderAccessTokenObjectIdDidNotMatchIdToken"
    );
}

#[tokio::test]
async fn missing_refresh_token_is_rejected() {
    let app = TestApp::spawn_with(
        StubTokenClient::issuing(USER_OBJECT_ID, None),
        ProviderStrategy::generic("acme.example", CodeChallengeMode::S256),
    )
    .await;

    let (state, nonce) = start(&app, "openid", None).await;
    let response = app.callback(&state, &id_token(&nonce)).await;

    assert_eq!(
        query_of(&location(&response))["error"],
        "ExternalIdentityProviderInvalidRefreshToken"
    );
}

#[tokio::test]
async fn token_exchange_sends_pkce_verifier() {
    let app = TestApp::spawn().await;

    let (state, nonce) = start(&app, "openid", None).await;
    let correlation_id: CorrelationId = state.parse().unwrap();
    let challenge = app
        .store
        .get_by_correlation_id(correlation_id)
        .await
        .unwrap()
        .unwrap();
    app.callback(&state, &id_token(&nonce)).await;

    let requests = app.tokens.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].code, "idp-code");
    assert_eq!(requests[0].grant_type, "authorization_code");
    assert_eq!(requests[0].client_id, "ozone-at-acme");
    assert_eq!(
        requests[0].code_verifier.as_deref(),
        Some(challenge.idp.code_verifier.as_str())
    );
    assert_eq!(requests[0].redirect_uri, format!("{}/callback/acme", AUTHORIZE_URI));
}

#[tokio::test]
async fn unheld_keychain_action_is_rejected_at_callback() {
    let app = TestApp::spawn().await;

    let (state, nonce) = start(&app, "openid", Some("documents:write")).await;
    let response = app.callback(&state, &id_token(&nonce)).await;

    let params = query_of(&location(&response));
    assert_eq!(params["error"], "UnauthorizedServiceAction");
    assert!(params["error_description"].contains("documents:write"));
}

#[tokio::test]
async fn unknown_callback_state_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .callback(&CorrelationId::new().to_string(), &id_token("nonce"))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn standard_oidc_parameters_from_client_are_ignored() {
    let app = TestApp::spawn().await;

    let response = app
        .authorize_with(
            "openid",
            None,
            &[("nonce", "client-nonce"), ("ui_locales", "en"), ("max_age", "0")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with("https://acme.example/authorize?"));
    let params = query_of(&location);
    assert_ne!(params["nonce"], "client-nonce");
    assert!(!params.contains_key("ui_locales"));
    assert_eq!(app.store.challenge_count(), 1);
}

#[tokio::test]
async fn external_provider_parameters_are_forwarded() {
    let app = TestApp::spawn_with(
        StubTokenClient::issuing(USER_OBJECT_ID, Some("idp-refresh-token")),
        ProviderStrategy::msal("login.example", "contoso"),
    )
    .await;

    let response = app
        .authorize_with(
            "openid",
            None,
            &[("external_provider_parameters", r#"{"prompt":"login"}"#)],
        )
        .await;

    let location = location(&response);
    assert!(location.starts_with("https://login.example/contoso/oauth2/v2.0/authorize?"));
    assert_eq!(query_of(&location)["prompt"], "login");
}

#[tokio::test]
async fn unsupported_external_provider_parameter_redirects_error_to_client() {
    let app = TestApp::spawn().await;

    let response = app
        .authorize_with(
            "openid",
            None,
            &[("external_provider_parameters", r#"{"prompt":"login"}"#)],
        )
        .await;

    let location = location(&response);
    assert!(location.starts_with(CLIENT_REDIRECT_URI));
    assert_eq!(
        query_of(&location)["error"],
        "Identity.InvalidAuthenticationParameter"
    );
    assert_eq!(app.store.challenge_count(), 0);
}

#[tokio::test]
async fn invalid_authorize_request_redirects_error_to_client() {
    let app = TestApp::spawn().await;

    let response = app
        .get(&format!(
            "/oauth2/v1/authorize?identity_provider=acme&client_id=not-a-uuid&redirect_uri={}&state=1234&scope=openid&code_challenge=x&code_challenge_method=S256",
            urlencoding::encode(CLIENT_REDIRECT_URI)
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let params = query_of(&location(&response));
    assert_eq!(params["error"], "Identity.InvalidClientId");
    assert_eq!(params["state"], "1234");
    assert_eq!(app.store.challenge_count(), 0);
}

#[tokio::test]
async fn unknown_scope_redirects_error_to_client() {
    let app = TestApp::spawn().await;

    let response = app.authorize("openid billing:invoices.read", None).await;

    let location = location(&response);
    assert!(location.starts_with(CLIENT_REDIRECT_URI));
    assert_eq!(query_of(&location)["error"], "InvalidAuthorizationScope");
}

#[tokio::test]
async fn authorize_without_usable_redirect_is_bad_request() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/oauth2/v1/authorize?identity_provider=acme&redirect_uri=%2Fcallback")
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Identity.InvalidClientId"));
}
