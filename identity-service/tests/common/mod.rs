//! Shared fixtures for identity-service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use chrono::Utc;
use identity_service::{
    build_router,
    config::{
        AuthorizationConfig, Environment, IdentityConfig, ProvidersConfig, SigningConfig,
    },
    jwt::{JwtPayload, JwtSegment},
    models::{CodeChallengeMode, OzoneUser, ServiceAction, ServiceApplication, UserIdentifier},
    oauth::{OAuthTokenClient, OAuthTokenResponse, TokenExchangeRequest},
    provider::{
        AuthenticationProviderCollection, OAuthAuthenticationProvider, OAuthProviderOptions,
        ProviderContext, ProviderStrategy,
    },
    services::{FixedClock, IdentityError, InMemoryIdentityStore},
    signing::{LocalKeyVault, SigningKeyProvider, TokenSigner},
    AppState,
};
use once_cell::sync::Lazy;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tower::util::ServiceExt;
use url::Url;

pub const IDENTITY_PROVIDER: &str = "acme";
pub const CLIENT_REDIRECT_URI: &str = "https://client.example/callback";
pub const CLIENT_STATE: &str = "1234";
pub const USER_OBJECT_ID: &str = "3f1c2a9e-oid";
pub const AUTHORIZE_URI: &str = "https://ozone.example/oauth2/v1/authorize";
pub const CONSENT_URI: &str = "https://ozone.example/consent";
pub const SIGNING_KEY_NAME: &str = "ozone-token-signing";

pub static SIGNING_KEY: Lazy<RsaPrivateKey> = Lazy::new(|| {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("Failed to generate test key")
});

/// Writes the shared test key to a PEM file, the way keys are deployed.
pub fn signing_key_file() -> NamedTempFile {
    let pem = SIGNING_KEY
        .to_pkcs8_pem(LineEnding::LF)
        .expect("Failed to encode test key");
    let mut file = NamedTempFile::new().expect("Failed to create key file");
    file.write_all(pem.as_bytes()).expect("Failed to write key file");
    file
}

pub fn test_config() -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "identity-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        allowed_origins: vec!["https://client.example".to_string()],
        authorization: AuthorizationConfig {
            authorize_uri: AUTHORIZE_URI.to_string(),
            consent_uri: CONSENT_URI.to_string(),
        },
        providers: ProvidersConfig::default(),
        signing: SigningConfig {
            key_name: SIGNING_KEY_NAME.to_string(),
            key_paths: Vec::new(),
            key_ttl_days: 90,
        },
    }
}

/// A three segment token whose signature is never checked.
pub fn unsigned_token(claims: &[(&str, &str)]) -> String {
    let mut header = JwtSegment::new();
    header.set("alg", "RS256");
    header.set("typ", "JWT");
    let mut payload = JwtPayload::new();
    for (key, value) in claims {
        payload.segment_mut().set(key, *value);
    }
    format!(
        "{}.{}.c2lnbmF0dXJl",
        header.to_base64_encoded().expect("header encodes"),
        payload.segment().to_base64_encoded().expect("payload encodes")
    )
}

pub fn query_of(location: &str) -> HashMap<String, String> {
    Url::parse(location)
        .expect("location is absolute")
        .query_pairs()
        .into_owned()
        .collect()
}

/// Token endpoint double: returns a fixed response and records requests.
pub struct StubTokenClient {
    pub response: Mutex<Result<OAuthTokenResponse, String>>,
    pub requests: Mutex<Vec<TokenExchangeRequest>>,
}

impl StubTokenClient {
    pub fn issuing(access_object_id: &str, refresh_token: Option<&str>) -> Self {
        Self {
            response: Mutex::new(Ok(OAuthTokenResponse {
                access_token: unsigned_token(&[("oid", access_object_id)]),
                token_type: Some("Bearer".to_string()),
                refresh_token: refresh_token.map(str::to_string),
                id_token: None,
                expires_in: Some(3600),
                scope: Some("openid".to_string()),
            })),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(body: &str) -> Self {
        Self {
            response: Mutex::new(Err(body.to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl OAuthTokenClient for StubTokenClient {
    async fn exchange_code(
        &self,
        _token_endpoint: &str,
        request: &TokenExchangeRequest,
    ) -> Result<OAuthTokenResponse, IdentityError> {
        self.requests.lock().unwrap().push(request.clone());
        self.response
            .lock()
            .unwrap()
            .clone()
            .map_err(IdentityError::ExternalIdentityProvider)
    }
}

/// The documents service with one global and one action backed scope, and
/// a user holding the read action.
pub struct Directory {
    pub application: ServiceApplication,
    pub read: ServiceAction,
    pub write: ServiceAction,
    pub user: OzoneUser,
}

pub fn directory() -> Directory {
    let mut application =
        ServiceApplication::new("Documents", "Stores your documents", "documents").unwrap();
    application
        .create_global_scope("openid", "Sign in", "Sign you in")
        .unwrap();
    let read = application
        .create_service_action("read", "Read documents", "Read every document")
        .unwrap();
    let write = application
        .create_service_action("write", "Write documents", "Change every document")
        .unwrap();
    application
        .create_scope("files.read", "Read files", "Read your files", vec![read.clone()])
        .unwrap();

    let mut user = OzoneUser::new(
        UserIdentifier::new(IDENTITY_PROVIDER, USER_OBJECT_ID).unwrap(),
        "ada",
        "Ada Lovelace",
    );
    user.add_service_action(read.clone());

    Directory {
        application,
        read,
        write,
        user,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryIdentityStore>,
    pub clock: Arc<FixedClock>,
    pub tokens: Arc<StubTokenClient>,
    pub directory: Directory,
    _key_file: NamedTempFile,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(
            StubTokenClient::issuing(USER_OBJECT_ID, Some("idp-refresh-token")),
            ProviderStrategy::generic("acme.example", CodeChallengeMode::S256),
        )
        .await
    }

    pub async fn spawn_with(tokens: StubTokenClient, strategy: ProviderStrategy) -> Self {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let key_file = signing_key_file();

        let vault = Arc::new(LocalKeyVault::new(clock.clone()));
        vault
            .import_pem_file(SIGNING_KEY_NAME, key_file.path())
            .expect("Failed to import signing key");
        let key_provider = Arc::new(SigningKeyProvider::new(vault, SIGNING_KEY_NAME, clock.clone()));
        key_provider
            .refresh_active_cryptography_client()
            .await
            .expect("Failed to activate signing key");

        let directory = directory();
        let store = Arc::new(InMemoryIdentityStore::new());
        store.add_service_application(directory.application.clone());
        store.add_user(directory.user.clone());

        let tokens = Arc::new(tokens);
        let context = ProviderContext::in_memory(store.clone(), tokens.clone(), clock.clone());
        let providers = AuthenticationProviderCollection::new().with_provider(Arc::new(
            OAuthAuthenticationProvider::new(
                OAuthProviderOptions {
                    identity_provider: IDENTITY_PROVIDER.to_string(),
                    client_id: "ozone-at-acme".to_string(),
                    client_secret: "acme-secret".to_string(),
                    authorize_uri: AUTHORIZE_URI.to_string(),
                    consent_uri: CONSENT_URI.to_string(),
                },
                strategy,
                context,
            ),
        ));

        let state = AppState::new(test_config(), providers, TokenSigner::new(key_provider));
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            store,
            clock,
            tokens,
            directory,
            _key_file: key_file,
        }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// `GET /oauth2/v1/authorize` for the documents client.
    pub async fn authorize(&self, scope: &str, keychain: Option<&str>) -> Response<Body> {
        self.authorize_with(scope, keychain, &[]).await
    }

    /// As [`TestApp::authorize`], with extra query parameters appended.
    pub async fn authorize_with(
        &self,
        scope: &str,
        keychain: Option<&str>,
        extra: &[(&str, &str)],
    ) -> Response<Body> {
        let client_id = self.directory.application.id.to_string();
        let code_challenge = CodeChallengeMode::S256.create_challenge("client-verifier");
        let mut params = vec![
            ("identity_provider", IDENTITY_PROVIDER),
            ("client_id", client_id.as_str()),
            ("redirect_uri", CLIENT_REDIRECT_URI),
            ("response_type", "code"),
            ("scope", scope),
            ("state", CLIENT_STATE),
            ("code_challenge", code_challenge.as_str()),
            ("code_challenge_method", "S256"),
        ];
        if let Some(keychain) = keychain {
            params.push(("keychain", keychain));
        }
        params.extend_from_slice(extra);
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();

        self.get(&format!("/oauth2/v1/authorize?{}", query)).await
    }

    /// `GET /oauth2/v1/authorize/callback/acme` with the given id token.
    pub async fn callback(&self, state: &str, id_token: &str) -> Response<Body> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs([("state", state), ("code", "idp-code"), ("id_token", id_token)])
            .finish();

        self.get(&format!(
            "/oauth2/v1/authorize/callback/{}?{}",
            IDENTITY_PROVIDER, query
        ))
        .await
    }
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .expect("response has a location")
        .to_str()
        .unwrap()
        .to_string()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
