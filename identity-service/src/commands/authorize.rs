use serde::Deserialize;
use std::collections::HashMap;
use url::Url;
use uuid::Uuid;

use crate::authorization::{AuthorizationKeyChain, AuthorizationScopes};
use crate::models::{ClientAuthorizationRequest, CodeChallengeMode, CorrelationId, ResponseMode};
use crate::provider::{AuthenticationProviderCollection, AuthorizationRequest, RedirectTicket};
use crate::services::IdentityError;

/// Query of `GET /oauth2/v1/authorize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeCommand {
    #[serde(default)]
    pub identity_provider: Option<String>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub response_mode: Option<String>,
    /// Accepted for OAuth compatibility, the flow always issues a code.
    #[serde(default)]
    pub response_type: Option<String>,
    #[serde(default)]
    pub scope: String,
    #[serde(default, alias = "key_chain")]
    pub keychain: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub code_challenge: String,
    #[serde(default)]
    pub code_challenge_method: String,
    /// JSON object of parameters meant for the external provider, e.g.
    /// `{"prompt":"login"}`. Other unknown query keys are ignored.
    #[serde(default)]
    pub external_provider_parameters: Option<String>,
}

impl AuthorizeCommand {
    /// The client redirect URI, if errors can be sent back to it.
    pub fn error_redirect_uri(&self) -> Option<&str> {
        parse_redirect_uri(&self.redirect_uri).ok().map(|_| self.redirect_uri.as_str())
    }

    pub fn provider_parameters(&self) -> Result<HashMap<String, String>, IdentityError> {
        match self.external_provider_parameters.as_deref().map(str::trim) {
            None | Some("") => Ok(HashMap::new()),
            Some(raw) => serde_json::from_str(raw).map_err(|_| {
                IdentityError::InvalidAuthenticationParameter(
                    "external_provider_parameters".to_string(),
                )
            }),
        }
    }
}

fn parse_redirect_uri(raw: &str) -> Result<Url, IdentityError> {
    Url::parse(raw)
        .ok()
        .filter(|url| url.has_host())
        .ok_or_else(|| IdentityError::InvalidAuthenticationParameter("redirect_uri".to_string()))
}

#[derive(Clone)]
pub struct AuthorizeCommandHandler {
    providers: AuthenticationProviderCollection,
}

impl AuthorizeCommandHandler {
    pub fn new(providers: AuthenticationProviderCollection) -> Self {
        Self { providers }
    }

    #[tracing::instrument(
        skip(self, command),
        fields(identity_provider = ?command.identity_provider, client_id = %command.client_id)
    )]
    pub async fn handle(&self, command: AuthorizeCommand) -> Result<RedirectTicket, IdentityError> {
        let provider = self
            .providers
            .get_provider(command.identity_provider.as_deref())?;

        let client_application_id = Uuid::parse_str(command.client_id.trim())
            .map_err(|_| IdentityError::InvalidClientId(command.client_id.clone()))?;
        parse_redirect_uri(&command.redirect_uri)?;

        if command.code_challenge.is_empty() {
            return Err(IdentityError::InvalidAuthenticationParameter(
                "code_challenge".to_string(),
            ));
        }
        let code_challenge_mode: CodeChallengeMode = command.code_challenge_method.parse()?;
        let response_mode = match command.response_mode.as_deref() {
            None | Some("") => ResponseMode::default(),
            Some(mode) => mode.parse()?,
        };

        let scopes = AuthorizationScopes::create_from(&command.scope)?;
        let keychain =
            AuthorizationKeyChain::create_from(command.keychain.as_deref().unwrap_or_default())?;
        let parameters = command.provider_parameters()?;

        let client = ClientAuthorizationRequest {
            client_application_id,
            redirect_uri: command.redirect_uri,
            response_mode,
            scopes,
            keychain,
            state: command.state,
            code_challenge: command.code_challenge,
            code_challenge_mode,
            correlation_id: CorrelationId::new(),
        };

        provider
            .create_authorization_ticket(AuthorizationRequest {
                identity_provider: provider.name().to_string(),
                client,
                parameters,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AuthenticationProvider, ExternalAuthenticationCallback};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recording {
        requests: Mutex<Vec<AuthorizationRequest>>,
    }

    #[async_trait]
    impl AuthenticationProvider for Recording {
        fn name(&self) -> &str {
            "acme"
        }

        async fn create_authorization_ticket(
            &self,
            request: AuthorizationRequest,
        ) -> Result<RedirectTicket, IdentityError> {
            self.requests.lock().unwrap().push(request);
            Ok(RedirectTicket::to("https://acme.example/authorize".to_string()))
        }

        async fn handle_authentication_callback(
            &self,
            _callback: ExternalAuthenticationCallback,
        ) -> Result<RedirectTicket, IdentityError> {
            unreachable!()
        }
    }

    fn handler() -> (AuthorizeCommandHandler, Arc<Recording>) {
        let recording = Arc::new(Recording::default());
        let providers = AuthenticationProviderCollection::new().with_provider(recording.clone());
        (AuthorizeCommandHandler::new(providers), recording)
    }

    fn command() -> AuthorizeCommand {
        AuthorizeCommand {
            identity_provider: Some("acme".to_string()),
            client_id: Uuid::new_v4().to_string(),
            redirect_uri: "https://client.example/cb".to_string(),
            scope: "openid documents:read".to_string(),
            keychain: Some("documents:write".to_string()),
            state: "1234".to_string(),
            code_challenge: "challenge".to_string(),
            code_challenge_method: "S256".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn routes_parsed_request_to_provider() {
        let (handler, recording) = handler();
        let mut command = command();
        command.response_mode = Some("fragment".to_string());
        command.external_provider_parameters = Some(r#"{"prompt":"login"}"#.to_string());

        let ticket = handler.handle(command).await.unwrap();
        assert_eq!(ticket.location, "https://acme.example/authorize");

        let requests = recording.requests.lock().unwrap();
        let client = &requests[0].client;
        assert_eq!(client.response_mode, ResponseMode::Fragment);
        assert_eq!(client.scopes.len(), 2);
        assert_eq!(client.keychain.namespace(), Some("documents"));
        assert_eq!(client.state, "1234");
        assert_eq!(requests[0].parameters["prompt"], "login");
    }

    #[tokio::test]
    async fn rejects_unknown_provider() {
        let (handler, _) = handler();
        let mut command = command();
        command.identity_provider = Some("google".to_string());

        let err = handler.handle(command).await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidIdentityProvider(ref p) if p == "google"));
    }

    #[tokio::test]
    async fn rejects_malformed_request_values() {
        let (handler, recording) = handler();

        let mut bad_client = command();
        bad_client.client_id = "not-a-uuid".to_string();
        let mut bad_mode = command();
        bad_mode.code_challenge_method = "plain".to_string();
        let mut bad_keychain = command();
        bad_keychain.keychain = Some("documents:read billing:read".to_string());

        let codes: Vec<&str> = [
            handler.handle(bad_client).await,
            handler.handle(bad_mode).await,
            handler.handle(bad_keychain).await,
        ]
        .iter()
        .map(|r| r.as_ref().unwrap_err().code())
        .collect();

        assert_eq!(
            codes,
            vec![
                "Identity.InvalidClientId",
                "InvalidCodeChallengeMode",
                "Identity.MultipleServiceScopesInKeyChain"
            ]
        );
        assert!(recording.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_provider_parameters_are_rejected() {
        let (handler, recording) = handler();
        let mut command = command();
        command.external_provider_parameters = Some("prompt=login".to_string());

        let err = handler.handle(command).await.unwrap_err();
        assert!(matches!(
            err,
            IdentityError::InvalidAuthenticationParameter(ref p) if p == "external_provider_parameters"
        ));
        assert!(recording.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn relative_redirect_uri_cannot_receive_errors() {
        let mut command = command();
        assert_eq!(command.error_redirect_uri(), Some("https://client.example/cb"));

        command.redirect_uri = "/cb".to_string();
        assert_eq!(command.error_redirect_uri(), None);
    }

    #[test]
    fn unknown_query_keys_are_not_provider_parameters() {
        let command: AuthorizeCommand = serde_json::from_value(serde_json::json!({
            "identity_provider": "msal",
            "client_id": "c",
            "key_chain": "documents:read",
            "nonce": "client-nonce",
            "ui_locales": "en",
            "external_provider_parameters": "{\"login_hint\":\"ada@contoso.example\"}"
        }))
        .unwrap();

        assert_eq!(command.keychain.as_deref(), Some("documents:read"));
        let parameters = command.provider_parameters().unwrap();
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters["login_hint"], "ada@contoso.example");
    }
}
