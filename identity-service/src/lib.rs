pub mod authorization;
pub mod commands;
pub mod config;
pub mod descriptor;
pub mod handlers;
pub mod jwt;
pub mod models;
pub mod oauth;
pub mod provider;
pub mod services;
pub mod signing;

use service_core::axum::{middleware::from_fn, routing::get, Router};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::commands::{AuthorizeCommandHandler, ExternalAuthorizationCallbackCommandHandler};
use crate::config::IdentityConfig;
use crate::provider::AuthenticationProviderCollection;
use crate::signing::TokenSigner;
use service_core::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub providers: AuthenticationProviderCollection,
    pub authorize: AuthorizeCommandHandler,
    pub callback: ExternalAuthorizationCallbackCommandHandler,
    pub signer: TokenSigner,
}

impl AppState {
    pub fn new(
        config: IdentityConfig,
        providers: AuthenticationProviderCollection,
        signer: TokenSigner,
    ) -> Self {
        Self {
            config,
            authorize: AuthorizeCommandHandler::new(providers.clone()),
            callback: ExternalAuthorizationCallbackCommandHandler::new(providers.clone()),
            providers,
            signer,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/.well-known/jwks.json", get(handlers::well_known::jwks))
        .route("/oauth2/v1/authorize", get(handlers::authorize::authorize))
        .route(
            "/oauth2/v1/authorize/callback/:identity_provider",
            get(handlers::callback::authorize_callback),
        )
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .allowed_origins
                        .iter()
                        .filter_map(|o| {
                            o.parse::<service_core::axum::http::HeaderValue>()
                                .map_err(|e| {
                                    tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                                })
                                .ok()
                        })
                        .collect::<Vec<service_core::axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    service_core::axum::http::Method::GET,
                    service_core::axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    service_core::axum::http::header::AUTHORIZATION,
                    service_core::axum::http::header::CONTENT_TYPE,
                ]),
        );

    Ok(app)
}

/// Service health check. Healthy once a signing key is active.
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<service_core::axum::Json<serde_json::Value>, AppError> {
    let key_provider = state.signer.provider();
    let active_key = match key_provider.active_key_id() {
        Some(kid) => kid,
        None => key_provider
            .refresh_active_cryptography_client()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Signing key health check failed");
                AppError::from(e)
            })?,
    };

    Ok(service_core::axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "identity_providers": state.providers.names(),
        "checks": {
            "signing_key": active_key
        }
    })))
}
