//! OAuth/OIDC authentication against an external identity provider.
//!
//! One generic flow; the provider specific bits come from a
//! [`ProviderStrategy`].

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::{
    append_fragment, append_query, AuthenticationProvider, AuthorizationRequest,
    ExternalAuthenticationCallback, ProviderStrategy, RedirectTicket,
};
use crate::authorization::{AuthorizationKeyChain, AuthorizationScopes};
use crate::descriptor::IdentityDescriptor;
use crate::jwt::Jwt;
use crate::models::{
    AuthorizationCode, ExternalAuthenticationChallenge, IdentityProviderRoundTrip, OzoneUser,
    ResponseMode, Scope, ServiceAction, ServiceApplication, UserIdentifier,
};
use crate::oauth::{OAuthTokenClient, TokenExchangeRequest};
use crate::services::{
    ChallengeRepository, Clock, GrantRepository, IdentityError, InMemoryIdentityStore,
    RandomBlobGenerator, ServiceApplicationRepository, UnitOfWork, UnitOfWorkFactory,
    UserRepository,
};

const CODE_VERIFIER_SIZE_IN_BYTES: usize = 64;
const NONCE_SIZE_IN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct OAuthProviderOptions {
    pub identity_provider: String,
    pub client_id: String,
    pub client_secret: String,
    /// Public URI of this server's authorize endpoint, e.g.
    /// `https://identity.example/oauth2/v1/authorize`.
    pub authorize_uri: String,
    /// Page that asks the user to consent to the client's request.
    pub consent_uri: String,
}

/// Collaborators shared by every provider.
#[derive(Clone)]
pub struct ProviderContext {
    pub challenges: Arc<dyn ChallengeRepository>,
    pub grants: Arc<dyn GrantRepository>,
    pub users: Arc<dyn UserRepository>,
    pub applications: Arc<dyn ServiceApplicationRepository>,
    pub unit_of_work: Arc<dyn UnitOfWorkFactory>,
    pub token_client: Arc<dyn OAuthTokenClient>,
    pub clock: Arc<dyn Clock>,
}

impl ProviderContext {
    /// Every repository backed by the same in-memory store.
    pub fn in_memory(
        store: Arc<InMemoryIdentityStore>,
        token_client: Arc<dyn OAuthTokenClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            challenges: store.clone(),
            grants: store.clone(),
            users: store.clone(),
            applications: store.clone(),
            unit_of_work: store,
            token_client,
            clock,
        }
    }
}

#[derive(Debug, Serialize)]
struct ConsentItem<'a> {
    name: &'a str,
    description: &'a str,
}

pub struct OAuthAuthenticationProvider {
    options: OAuthProviderOptions,
    strategy: ProviderStrategy,
    context: ProviderContext,
}

impl OAuthAuthenticationProvider {
    pub fn new(
        options: OAuthProviderOptions,
        strategy: ProviderStrategy,
        context: ProviderContext,
    ) -> Self {
        Self {
            options,
            strategy,
            context,
        }
    }

    pub fn strategy(&self) -> &ProviderStrategy {
        &self.strategy
    }

    /// Where the external provider sends the browser back to.
    pub fn callback_uri(&self) -> String {
        format!(
            "{}/callback/{}",
            self.options.authorize_uri.trim_end_matches('/'),
            self.options.identity_provider
        )
    }

    fn authorization_uri(
        &self,
        challenge: &ExternalAuthenticationChallenge,
        parameters: &HashMap<String, String>,
    ) -> String {
        let callback_uri = self.callback_uri();
        let state = challenge.idp_state();
        let mut query: Vec<(&str, &str)> = vec![
            ("client_id", self.options.client_id.as_str()),
            ("response_mode", "query"),
            ("response_type", "code id_token"),
            ("redirect_uri", callback_uri.as_str()),
            ("scope", self.strategy.scopes()),
            ("state", state.as_str()),
            ("nonce", challenge.idp.nonce.as_str()),
            ("code_challenge", challenge.idp.code_challenge.as_str()),
            ("code_challenge_method", challenge.idp.code_challenge_mode.as_str()),
        ];

        let mut extra: Vec<(&String, &String)> = parameters.iter().collect();
        extra.sort();
        query.extend(extra.into_iter().map(|(k, v)| (k.as_str(), v.as_str())));

        append_query(&self.strategy.authorize_endpoint(), &query)
    }

    async fn load_application(&self, id: Uuid) -> Result<ServiceApplication, IdentityError> {
        self.context
            .applications
            .get_service_application(id)
            .await?
            .ok_or_else(|| IdentityError::ServiceApplicationNotFound(id.to_string()))
    }

    /// Looks `descriptor` up as given, then qualified with the client's
    /// namespace when it has none.
    async fn lookup<T, F, Fut>(
        &self,
        application: &ServiceApplication,
        descriptor: &IdentityDescriptor,
        find: F,
    ) -> Result<Option<T>, IdentityError>
    where
        F: Fn(IdentityDescriptor) -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<Option<T>>>,
    {
        if let Some(found) = find(descriptor.clone()).await? {
            return Ok(Some(found));
        }
        if descriptor.namespace().is_some() {
            return Ok(None);
        }
        let qualified =
            IdentityDescriptor::create(descriptor.name(), Some(&application.service_namespace))?;
        Ok(find(qualified).await?)
    }

    async fn resolve_scopes(
        &self,
        application: &ServiceApplication,
        requested: &AuthorizationScopes,
    ) -> Result<Vec<Scope>, IdentityError> {
        let mut scopes = Vec::with_capacity(requested.len());
        for descriptor in requested.iter() {
            let scope = self
                .lookup(application, descriptor, |d| async move {
                    self.context.applications.find_scope(&d).await
                })
                .await?
                .ok_or_else(|| IdentityError::InvalidAuthorizationScope(descriptor.descriptor()))?;

            if !application.is_allowed_to_request_scope(&scope) {
                return Err(IdentityError::UnauthorizedScopeRequest(descriptor.descriptor()));
            }
            scopes.push(scope);
        }
        Ok(scopes)
    }

    async fn resolve_keychain(
        &self,
        application: &ServiceApplication,
        requested: &AuthorizationKeyChain,
    ) -> Result<Vec<ServiceAction>, IdentityError> {
        let mut actions = Vec::with_capacity(requested.len());
        for descriptor in requested.iter() {
            let action = self
                .lookup(application, descriptor, |d| async move {
                    self.context.applications.find_service_action(&d).await
                })
                .await?
                .ok_or_else(|| IdentityError::InvalidKeyChainAction(descriptor.descriptor()))?;

            if !application.is_allowed_to_request_action(&action) {
                return Err(IdentityError::UnauthorizedServiceActionRequest(
                    descriptor.descriptor(),
                ));
            }
            actions.push(action);
        }
        Ok(actions)
    }

    fn check_callback_error(callback: &ExternalAuthenticationCallback) -> Result<(), IdentityError> {
        match (&callback.error, &callback.error_description) {
            (None, None) => Ok(()),
            (error, description) => Err(IdentityError::AuthenticationFailed(
                description
                    .clone()
                    .or_else(|| error.clone())
                    .unwrap_or_default(),
            )),
        }
    }

    /// Parses the id token and checks its nonce. The signature is not
    /// checked; the token only identifies the user, and the access token
    /// obtained with PKCE must name the same user.
    fn read_id_token(
        callback: &ExternalAuthenticationCallback,
        challenge: &ExternalAuthenticationChallenge,
    ) -> Result<String, IdentityError> {
        let raw = callback
            .id_token
            .as_deref()
            .ok_or(IdentityError::InvalidIdToken)?;
        let token = Jwt::parse(raw).map_err(|_| IdentityError::InvalidIdToken)?;

        let nonce = token.payload().nonce().ok().flatten().unwrap_or_default();
        let expected = challenge.idp.nonce.as_bytes();
        if !bool::from(nonce.as_bytes().ct_eq(expected)) {
            return Err(IdentityError::InvalidNonce);
        }

        token
            .payload()
            .object_id()
            .ok()
            .flatten()
            .ok_or(IdentityError::InvalidIdToken)
    }

    fn check_access_token(access_token: &str, user: &OzoneUser) -> Result<(), IdentityError> {
        let token = Jwt::parse(access_token).map_err(|_| IdentityError::InvalidAccessToken)?;
        let object_id = token
            .payload()
            .object_id()
            .ok()
            .flatten()
            .ok_or(IdentityError::InvalidAccessToken)?;

        if bool::from(object_id.as_bytes().ct_eq(user.id.user_id.as_bytes())) {
            Ok(())
        } else {
            Err(IdentityError::AccessTokenObjectIdMismatch {
                access_token: object_id,
                id_token: user.id.user_id.clone(),
            })
        }
    }

    /// A challenge answers one callback only; a replay is treated as expired.
    async fn consume(&self, challenge: &ExternalAuthenticationChallenge) -> Result<(), IdentityError> {
        if challenge.is_consumed() {
            return Err(IdentityError::ChallengeExpired(
                challenge.correlation_id().to_string(),
            ));
        }

        let mut work = self.context.unit_of_work.begin();
        work.consume_challenge(challenge.correlation_id(), self.context.clock.now());
        work.commit().await?;
        Ok(())
    }

    async fn authenticate(
        &self,
        callback: &ExternalAuthenticationCallback,
        challenge: &ExternalAuthenticationChallenge,
    ) -> Result<RedirectTicket, IdentityError> {
        let now = self.context.clock.now();
        if challenge.is_expired(now) {
            return Err(IdentityError::ChallengeExpired(
                challenge.correlation_id().to_string(),
            ));
        }

        Self::check_callback_error(callback)?;

        let object_id = Self::read_id_token(callback, challenge)?;
        let user_id = UserIdentifier::new(self.name(), &object_id)?;
        let user = self
            .context
            .users
            .get_user_identity(&user_id)
            .await?
            .ok_or_else(|| IdentityError::UserNotFound(user_id.to_string()))?;

        let application = self
            .load_application(challenge.client.client_application_id)
            .await?;
        let scopes = self
            .resolve_scopes(&application, &challenge.client.scopes)
            .await?;
        let actions = self
            .resolve_keychain(&application, &challenge.client.keychain)
            .await?;

        user.has_permission_for_scopes(&scopes)?;
        user.has_permission_for_actions(&actions)?;

        let code = callback
            .code
            .as_deref()
            .ok_or_else(|| IdentityError::InvalidAuthenticationParameter("code".to_string()))?;
        let request = TokenExchangeRequest::authorization_code(
            &self.options.client_id,
            &self.options.client_secret,
            code,
            &self.callback_uri(),
            Some(&challenge.idp.code_verifier),
        );
        let tokens = self
            .context
            .token_client
            .exchange_code(&self.strategy.token_endpoint(), &request)
            .await?;

        let refresh_token = tokens
            .refresh_token
            .filter(|token| !token.is_empty())
            .ok_or(IdentityError::InvalidRefreshToken)?;
        Self::check_access_token(&tokens.access_token, &user)?;

        let authorization_code =
            AuthorizationCode::issue(challenge, user.id.clone(), refresh_token, now);
        let mut work = self.context.unit_of_work.begin();
        work.add_authorization_code(authorization_code.clone());
        work.commit().await?;

        let mut requested: Vec<ServiceAction> = Vec::new();
        for action in scopes
            .iter()
            .flat_map(|scope| scope.service_actions.iter())
            .chain(actions.iter())
        {
            if !requested.iter().any(|a| a.id == action.id) {
                requested.push(action.clone());
            }
        }

        let has_grant = self
            .context
            .grants
            .get_grant(&user.id, application.id)
            .await?
            .map_or(false, |grant| grant.has_granted_for_actions(&requested));

        if has_grant {
            tracing::info!(user = %user.id, client = %application.id, "Existing grant covers request");
            Ok(self.client_redirect(challenge, &authorization_code))
        } else {
            tracing::info!(user = %user.id, client = %application.id, "Consent required");
            self.consent_redirect(challenge, &authorization_code, &application, &user, &scopes, &actions)
        }
    }

    fn client_redirect(
        &self,
        challenge: &ExternalAuthenticationChallenge,
        code: &AuthorizationCode,
    ) -> RedirectTicket {
        let params = [
            ("code", code.code.as_str()),
            ("state", challenge.client.state.as_str()),
        ];
        let location = match challenge.client.response_mode {
            ResponseMode::Query => append_query(&code.redirect_uri, &params),
            ResponseMode::Fragment => append_fragment(&code.redirect_uri, &params),
        };
        RedirectTicket::to(location)
    }

    fn consent_redirect(
        &self,
        challenge: &ExternalAuthenticationChallenge,
        code: &AuthorizationCode,
        application: &ServiceApplication,
        user: &OzoneUser,
        scopes: &[Scope],
        actions: &[ServiceAction],
    ) -> Result<RedirectTicket, IdentityError> {
        let items: Vec<ConsentItem<'_>> = actions
            .iter()
            .map(|a| ConsentItem {
                name: &a.display_name,
                description: &a.description,
            })
            .chain(scopes.iter().map(|s| ConsentItem {
                name: &s.display_name,
                description: &s.description,
            }))
            .collect();
        let serialized =
            serde_json::to_string(&items).map_err(|e| anyhow!("Failed to serialize scopes: {}", e))?;

        let location = append_query(
            &self.options.consent_uri,
            &[
                ("client_name", application.name.as_str()),
                ("client_description", application.description.as_str()),
                ("username", user.username.as_str()),
                ("code", code.code.as_str()),
                ("scopes", serialized.as_str()),
                ("redirect_uri", code.redirect_uri.as_str()),
                ("state", challenge.client.state.as_str()),
            ],
        );
        Ok(RedirectTicket::to(location))
    }
}

#[async_trait]
impl AuthenticationProvider for OAuthAuthenticationProvider {
    fn name(&self) -> &str {
        &self.options.identity_provider
    }

    #[tracing::instrument(
        skip(self, request),
        fields(
            identity_provider = %self.options.identity_provider,
            correlation_id = %request.client.correlation_id,
        )
    )]
    async fn create_authorization_ticket(
        &self,
        request: AuthorizationRequest,
    ) -> Result<RedirectTicket, IdentityError> {
        self.strategy.validate_parameters(&request.parameters)?;

        let application = self
            .load_application(request.client.client_application_id)
            .await?;
        self.resolve_scopes(&application, &request.client.scopes)
            .await?;
        self.resolve_keychain(&application, &request.client.keychain)
            .await?;

        let mode = self.strategy.code_challenge_mode();
        let code_verifier = RandomBlobGenerator::generate_url_safe(CODE_VERIFIER_SIZE_IN_BYTES);
        let round_trip = IdentityProviderRoundTrip {
            identity_provider: self.options.identity_provider.clone(),
            code_challenge: mode.create_challenge(&code_verifier),
            code_verifier,
            code_challenge_mode: mode,
            nonce: RandomBlobGenerator::generate_url_safe(NONCE_SIZE_IN_BYTES),
        };
        let challenge =
            ExternalAuthenticationChallenge::new(request.client, round_trip, self.context.clock.now());
        let location = self.authorization_uri(&challenge, &request.parameters);

        let mut work = self.context.unit_of_work.begin();
        work.add_challenge(challenge);
        work.commit().await?;

        tracing::info!("Authentication challenge created");
        Ok(RedirectTicket::to(location))
    }

    #[tracing::instrument(
        skip(self, callback),
        fields(identity_provider = %self.options.identity_provider, correlation_id = %callback.state)
    )]
    async fn handle_authentication_callback(
        &self,
        callback: ExternalAuthenticationCallback,
    ) -> Result<RedirectTicket, IdentityError> {
        let challenge = self
            .context
            .challenges
            .get_by_correlation_id(callback.state)
            .await?
            .filter(|challenge| challenge.idp.identity_provider == self.name())
            .ok_or_else(|| IdentityError::ChallengeNotFound(callback.state.to_string()))?;

        let outcome = match self.consume(&challenge).await {
            Ok(()) => self.authenticate(&callback, &challenge).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(ticket) => Ok(ticket),
            Err(IdentityError::Internal(e)) => Err(IdentityError::Internal(e)),
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "Authentication callback failed");
                Ok(RedirectTicket::from_error(
                    &challenge.client.redirect_uri,
                    &challenge.client.state,
                    &e,
                ))
            }
        }
    }
}
