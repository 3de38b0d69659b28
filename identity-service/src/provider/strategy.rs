use std::collections::HashMap;

use crate::models::CodeChallengeMode;
use crate::services::IdentityError;

const MSAL_ENDPOINT_PATH: &str = "oauth2/v2.0";
const MSAL_SCOPES: &str = "openid offline_access User.Read";
const MSAL_PARAMETERS: [&str; 3] = ["prompt", "login_hint", "domain_hint"];
const DEFAULT_SCOPES: &str = "openid";

/// The provider specific parts of the OAuth flow: where the provider lives,
/// which scopes it is asked for, and which extra parameters it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStrategy {
    endpoint: String,
    scopes: String,
    code_challenge_mode: CodeChallengeMode,
    allowed_parameters: Vec<String>,
}

impl ProviderStrategy {
    /// Microsoft identity platform, `https://{instance}/{tenant}/oauth2/v2.0`.
    pub fn msal(instance: &str, tenant_id: &str) -> Self {
        Self {
            endpoint: format!(
                "https://{}/{}/{}",
                instance.trim_end_matches('/'),
                tenant_id,
                MSAL_ENDPOINT_PATH
            ),
            scopes: MSAL_SCOPES.to_string(),
            code_challenge_mode: CodeChallengeMode::S256,
            allowed_parameters: MSAL_PARAMETERS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Plain OAuth provider at `https://{instance}`.
    pub fn generic(instance: &str, code_challenge_mode: CodeChallengeMode) -> Self {
        Self {
            endpoint: format!("https://{}", instance.trim_end_matches('/')),
            scopes: DEFAULT_SCOPES.to_string(),
            code_challenge_mode,
            allowed_parameters: Vec::new(),
        }
    }

    /// Overrides the endpoint base, e.g. to point at a local mock server.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_scopes(mut self, scopes: &str) -> Self {
        self.scopes = scopes.to_string();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/authorize", self.endpoint)
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/token", self.endpoint)
    }

    pub fn scopes(&self) -> &str {
        &self.scopes
    }

    pub fn code_challenge_mode(&self) -> CodeChallengeMode {
        self.code_challenge_mode
    }

    /// Fails on the first parameter the provider does not accept.
    pub fn validate_parameters(
        &self,
        parameters: &HashMap<String, String>,
    ) -> Result<(), IdentityError> {
        let mut keys: Vec<&String> = parameters.keys().collect();
        keys.sort();

        match keys
            .into_iter()
            .find(|key| !self.allowed_parameters.iter().any(|allowed| allowed == *key))
        {
            Some(key) => Err(IdentityError::InvalidAuthenticationParameter(key.clone())),
            None => Ok(()),
        }
    }
}
