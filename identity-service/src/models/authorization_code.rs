//! Authorization code model - the internal code issued after a successful
//! external authentication.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthorizationGrant, CodeChallengeMode, CorrelationId, ExternalAuthenticationChallenge, UserIdentifier};
use crate::authorization::{AuthorizationKeyChain, AuthorizationScopes};
use crate::services::RandomBlobGenerator;

const AUTHORIZATION_CODE_SIZE_IN_BYTES: usize = 128;
const AUTHORIZATION_CODE_LIFETIME_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub id: Uuid,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub redirect_uri: String,
    pub scopes: AuthorizationScopes,
    pub keychain: AuthorizationKeyChain,
    pub identity: UserIdentifier,
    pub client_application_id: Uuid,
    pub correlation_id: CorrelationId,
    pub identity_provider: String,
    /// Refresh token of the external provider, kept for later token refreshes.
    pub idp_refresh_token: String,
    pub code_challenge: String,
    pub code_challenge_mode: CodeChallengeMode,
    /// Set once the user consented.
    pub grant_id: Option<Uuid>,
}

impl AuthorizationCode {
    /// Issues a fresh code for a completed challenge.
    pub fn issue(
        challenge: &ExternalAuthenticationChallenge,
        identity: UserIdentifier,
        idp_refresh_token: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: RandomBlobGenerator::generate_string(AUTHORIZATION_CODE_SIZE_IN_BYTES),
            created_at: now,
            expires_at: now + Duration::minutes(AUTHORIZATION_CODE_LIFETIME_MINUTES),
            redirect_uri: challenge.client.redirect_uri.clone(),
            scopes: challenge.client.scopes.clone(),
            keychain: challenge.client.keychain.clone(),
            identity,
            client_application_id: challenge.client.client_application_id,
            correlation_id: challenge.correlation_id(),
            identity_provider: challenge.idp.identity_provider.clone(),
            idp_refresh_token,
            code_challenge: challenge.client.code_challenge.clone(),
            code_challenge_mode: challenge.client.code_challenge_mode,
            grant_id: None,
        }
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn consent(&mut self, grant: &AuthorizationGrant) {
        self.grant_id = Some(grant.id);
    }

    /// Checks the client's PKCE verifier against the stored challenge.
    pub fn verify_code_verifier(&self, code_verifier: &str) -> bool {
        self.code_challenge_mode
            .verify(code_verifier, &self.code_challenge)
    }
}
