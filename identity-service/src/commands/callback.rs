use serde::Deserialize;

use crate::models::CorrelationId;
use crate::provider::{
    AuthenticationProviderCollection, ExternalAuthenticationCallback, RedirectTicket,
};
use crate::services::IdentityError;

/// Query of `GET /oauth2/v1/authorize/callback/{provider}`. The provider
/// name comes from the path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalAuthorizationCallbackCommand {
    #[serde(skip)]
    pub identity_provider: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Clone)]
pub struct ExternalAuthorizationCallbackCommandHandler {
    providers: AuthenticationProviderCollection,
}

impl ExternalAuthorizationCallbackCommandHandler {
    pub fn new(providers: AuthenticationProviderCollection) -> Self {
        Self { providers }
    }

    #[tracing::instrument(skip(self, command), fields(identity_provider = %command.identity_provider))]
    pub async fn handle(
        &self,
        command: ExternalAuthorizationCallbackCommand,
    ) -> Result<RedirectTicket, IdentityError> {
        let provider = self
            .providers
            .get_provider(Some(&command.identity_provider))?;

        let state: CorrelationId = command
            .state
            .as_deref()
            .ok_or(IdentityError::InvalidCallbackState)?
            .parse()?;

        provider
            .handle_authentication_callback(ExternalAuthenticationCallback {
                state,
                code: command.code,
                id_token: command.id_token,
                error: command.error,
                error_description: command.error_description,
            })
            .await
    }
}
