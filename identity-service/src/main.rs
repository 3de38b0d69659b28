use identity_service::{
    build_router,
    config::{Environment, IdentityConfig, SigningConfig},
    models::{EnterpriseApplication, OzoneUser, UserIdentifier},
    oauth::HttpOAuthTokenClient,
    provider::{
        AuthenticationProviderCollection, OAuthAuthenticationProvider, OAuthProviderOptions,
        ProviderContext, ProviderStrategy,
    },
    services::{Clock, InMemoryIdentityStore, SystemClock},
    signing::{LocalKeyVault, SigningKeyProvider, TokenSigner},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

const GENERATED_KEY_BITS: usize = 2048;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = IdentityConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Signing keys
    let vault = Arc::new(LocalKeyVault::new(clock.clone()));
    load_signing_keys(&vault, &config.signing, clock.as_ref())?;
    let key_provider = Arc::new(SigningKeyProvider::new(
        vault,
        &config.signing.key_name,
        clock.clone(),
    ));
    let kid = key_provider.refresh_active_cryptography_client().await?;
    tracing::info!(kid = %kid, "Signing key provider initialized");
    let signer = TokenSigner::new(key_provider);

    // Identity providers
    let store = Arc::new(InMemoryIdentityStore::new());
    let context = ProviderContext::in_memory(
        store.clone(),
        Arc::new(HttpOAuthTokenClient::default()),
        clock,
    );
    let providers = build_providers(&config, &context);
    if providers.names().is_empty() {
        tracing::warn!("No identity providers configured - authorization requests will be rejected");
    }

    if config.environment == Environment::Dev {
        seed_development_data(&store, &providers)?;
    }

    let state = AppState::new(config.clone(), providers, signer);
    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Imports the configured PEM keys in order, so the last one becomes the
/// current version. Generates an ephemeral key when none is configured.
fn load_signing_keys(
    vault: &LocalKeyVault,
    signing: &SigningConfig,
    clock: &dyn Clock,
) -> Result<(), AppError> {
    if signing.key_paths.is_empty() {
        tracing::warn!(key = %signing.key_name, "No signing keys configured, generating an ephemeral key");
        vault.generate_rsa_key(&signing.key_name, GENERATED_KEY_BITS)?;
        return Ok(());
    }

    let expires_on = signing.key_expiry(clock.now())?;
    for path in &signing.key_paths {
        let key_id = vault.import_pem_file(&signing.key_name, Path::new(path))?;
        vault.set_expiry(&key_id, expires_on);
    }
    Ok(())
}

fn build_providers(
    config: &IdentityConfig,
    context: &ProviderContext,
) -> AuthenticationProviderCollection {
    let mut providers = AuthenticationProviderCollection::new();

    if let Some(msal) = &config.providers.msal {
        providers.register(Arc::new(OAuthAuthenticationProvider::new(
            OAuthProviderOptions {
                identity_provider: "msal".to_string(),
                client_id: msal.client_id.clone(),
                client_secret: msal.client_secret.clone(),
                authorize_uri: config.authorization.authorize_uri.clone(),
                consent_uri: config.authorization.consent_uri.clone(),
            },
            ProviderStrategy::msal(&msal.instance, &msal.tenant_id),
            context.clone(),
        )));
    }

    if let Some(oauth) = &config.providers.oauth {
        providers.register(Arc::new(OAuthAuthenticationProvider::new(
            OAuthProviderOptions {
                identity_provider: oauth.name.clone(),
                client_id: oauth.client_id.clone(),
                client_secret: oauth.client_secret.clone(),
                authorize_uri: config.authorization.authorize_uri.clone(),
                consent_uri: config.authorization.consent_uri.clone(),
            },
            ProviderStrategy::generic(&oauth.instance, oauth.code_challenge_method),
            context.clone(),
        )));
    }

    providers
}

/// Registers a demo application and one administrator per identity
/// provider, so the flow can be exercised locally.
fn seed_development_data(
    store: &InMemoryIdentityStore,
    providers: &AuthenticationProviderCollection,
) -> Result<(), AppError> {
    let mut application = EnterpriseApplication::create("ozone-demo", "Local development client")?;
    let service = &mut application.service_application;
    service.create_global_scope("openid", "Sign in", "Sign you in with your account")?;
    let read = service.create_service_action("documents.read", "Read documents", "")?;
    service.create_scope(
        "documents",
        "Documents",
        "Read your documents",
        vec![read.clone()],
    )?;

    for identity_provider in providers.names() {
        let mut user = OzoneUser::new(
            UserIdentifier::new(identity_provider, "developer")?,
            "developer",
            "Local Developer",
        );
        if let Some(role) = application.role("Application Administrator") {
            user.add_role(role.clone());
        }
        user.add_service_action(read.clone());
        store.add_user(user);
    }

    tracing::info!(
        client_id = %application.service_application.id,
        namespace = %application.service_application.service_namespace,
        "Seeded development client application"
    );
    store.add_service_application(application.service_application);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
