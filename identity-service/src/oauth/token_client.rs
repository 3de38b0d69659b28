//! Token exchange against an external provider's token endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::services::IdentityError;

pub const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";

/// Form body of an authorization code exchange.
#[derive(Debug, Clone, Serialize)]
pub struct TokenExchangeRequest {
    pub client_id: String,
    pub client_secret: String,
    pub code: String,
    pub grant_type: String,
    pub redirect_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
}

impl TokenExchangeRequest {
    pub fn authorization_code(
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            code: code.to_string(),
            grant_type: AUTHORIZATION_CODE_GRANT.to_string(),
            redirect_uri: redirect_uri.to_string(),
            code_verifier: code_verifier.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[async_trait]
pub trait OAuthTokenClient: Send + Sync {
    async fn exchange_code(
        &self,
        token_endpoint: &str,
        request: &TokenExchangeRequest,
    ) -> Result<OAuthTokenResponse, IdentityError>;
}

#[derive(Clone, Default)]
pub struct HttpOAuthTokenClient {
    client: reqwest::Client,
}

impl HttpOAuthTokenClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OAuthTokenClient for HttpOAuthTokenClient {
    #[tracing::instrument(skip(self, request), fields(client_id = %request.client_id))]
    async fn exchange_code(
        &self,
        token_endpoint: &str,
        request: &TokenExchangeRequest,
    ) -> Result<OAuthTokenResponse, IdentityError> {
        let response = self
            .client
            .post(token_endpoint)
            .form(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Token endpoint unreachable");
                IdentityError::ExternalIdentityProvider(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Token exchange rejected");
            return Err(IdentityError::ExternalIdentityProvider(body));
        }

        response.json::<OAuthTokenResponse>().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse token response");
            IdentityError::ExternalIdentityProvider(format!("Invalid token response: {}", e))
        })
    }
}
