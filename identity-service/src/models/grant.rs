//! Authorization grant model - a user's consent for a client to use a set of
//! service actions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{RefreshToken, ServiceAction, UserIdentifier};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub id: Uuid,
    pub user_id: UserIdentifier,
    pub service_application_id: Uuid,
    pub service_actions: Vec<ServiceAction>,
    pub refresh_tokens: Vec<RefreshToken>,
    pub is_revoked: bool,
}

impl AuthorizationGrant {
    /// Create a new grant of `service_actions` to a client on behalf of a user.
    pub fn new(
        user_id: UserIdentifier,
        service_application_id: Uuid,
        service_actions: Vec<ServiceAction>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            service_application_id,
            service_actions,
            refresh_tokens: Vec::new(),
            is_revoked: false,
        }
    }

    /// Widens the grant with actions it does not cover yet.
    pub fn extend(&mut self, actions: impl IntoIterator<Item = ServiceAction>) {
        for action in actions {
            if !self.has_grant_for_action(&action) {
                self.service_actions.push(action);
            }
        }
    }

    pub fn add_refresh_token(&mut self, token: RefreshToken) {
        self.refresh_tokens.push(token);
    }

    /// Revokes the grant together with every refresh token issued under it.
    pub fn revoke(&mut self) {
        self.is_revoked = true;
        for token in &mut self.refresh_tokens {
            token.revoke();
        }
    }

    pub fn has_grant_for_action(&self, action: &ServiceAction) -> bool {
        !self.is_revoked && self.service_actions.iter().any(|a| a.id == action.id)
    }

    /// Subset test by action identity.
    pub fn has_granted_for_actions(&self, actions: &[ServiceAction]) -> bool {
        !self.is_revoked && actions.iter().all(|a| self.has_grant_for_action(a))
    }
}
