//! External authentication providers and the redirect tickets they produce.

pub mod collection;
pub mod oauth;
pub mod strategy;

use async_trait::async_trait;
use std::collections::HashMap;
use url::{form_urlencoded, Url};

use crate::models::{ClientAuthorizationRequest, CorrelationId};
use crate::services::IdentityError;

pub use collection::AuthenticationProviderCollection;
pub use oauth::{OAuthAuthenticationProvider, OAuthProviderOptions, ProviderContext};
pub use strategy::ProviderStrategy;

/// A parsed authorization request routed to one provider.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub identity_provider: String,
    pub client: ClientAuthorizationRequest,
    /// Provider specific parameters, validated by the provider.
    pub parameters: HashMap<String, String>,
}

/// What the external provider sent back to the callback endpoint.
#[derive(Debug, Clone)]
pub struct ExternalAuthenticationCallback {
    pub state: CorrelationId,
    pub code: Option<String>,
    pub id_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketError {
    pub code: String,
    pub message: String,
}

/// Where to send the browser next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTicket {
    pub location: String,
    pub error: Option<TicketError>,
}

impl RedirectTicket {
    pub fn to(location: String) -> Self {
        Self {
            location,
            error: None,
        }
    }

    /// Redirect back to the client carrying `state`, `error` and
    /// `error_description` in the query.
    pub fn from_error(redirect_uri: &str, state: &str, error: &IdentityError) -> Self {
        let message = error.to_string();
        let location = append_query(
            redirect_uri,
            &[
                ("state", state),
                ("error", error.code()),
                ("error_description", message.as_str()),
            ],
        );

        Self {
            location,
            error: Some(TicketError {
                code: error.code().to_string(),
                message,
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Identity provider name, e.g. `msal`.
    fn name(&self) -> &str;

    async fn create_authorization_ticket(
        &self,
        request: AuthorizationRequest,
    ) -> Result<RedirectTicket, IdentityError>;

    async fn handle_authentication_callback(
        &self,
        callback: ExternalAuthenticationCallback,
    ) -> Result<RedirectTicket, IdentityError>;
}

fn encode_pairs(params: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// Appends `params` to the query of `uri`, keeping any existing query.
pub(crate) fn append_query(uri: &str, params: &[(&str, &str)]) -> String {
    match Url::parse(uri) {
        Ok(mut url) => {
            url.query_pairs_mut().extend_pairs(params.iter());
            url.into()
        }
        Err(_) => {
            let separator = if uri.contains('?') { '&' } else { '?' };
            format!("{}{}{}", uri, separator, encode_pairs(params))
        }
    }
}

/// Replaces the fragment of `uri` with the encoded `params`.
pub(crate) fn append_fragment(uri: &str, params: &[(&str, &str)]) -> String {
    let encoded = encode_pairs(params);
    match Url::parse(uri) {
        Ok(mut url) => {
            url.set_fragment(Some(&encoded));
            url.into()
        }
        Err(_) => format!("{}#{}", uri.split('#').next().unwrap_or(uri), encoded),
    }
}
