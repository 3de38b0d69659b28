//! External authentication challenge - the server side state of one
//! in-flight authorization round trip to an external identity provider.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CodeChallengeMode, CorrelationId, ResponseMode};
use crate::authorization::{AuthorizationKeyChain, AuthorizationScopes};

const CHALLENGE_LIFETIME_MINUTES: i64 = 5;

/// What the client asked for in its authorization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAuthorizationRequest {
    pub client_application_id: Uuid,
    pub redirect_uri: String,
    pub response_mode: ResponseMode,
    pub scopes: AuthorizationScopes,
    pub keychain: AuthorizationKeyChain,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_mode: CodeChallengeMode,
    pub correlation_id: CorrelationId,
}

/// The PKCE pair and nonce used for the round trip to the external provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProviderRoundTrip {
    pub identity_provider: String,
    pub code_verifier: String,
    pub code_challenge: String,
    pub code_challenge_mode: CodeChallengeMode,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalAuthenticationChallenge {
    pub id: Uuid,
    pub client: ClientAuthorizationRequest,
    pub idp: IdentityProviderRoundTrip,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set once a callback has used the challenge.
    #[serde(default)]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl ExternalAuthenticationChallenge {
    pub fn new(
        client: ClientAuthorizationRequest,
        idp: IdentityProviderRoundTrip,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
            idp,
            created_at: now,
            expires_at: now + Duration::minutes(CHALLENGE_LIFETIME_MINUTES),
            consumed_at: None,
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.client.correlation_id
    }

    /// The `state` sent to the external provider.
    pub fn idp_state(&self) -> String {
        self.client.correlation_id.to_string()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    /// Returns false when the challenge was already used.
    pub fn consume(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_consumed() {
            return false;
        }
        self.consumed_at = Some(at);
        true
    }
}
