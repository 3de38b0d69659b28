//! User model - a principal federated from an external identity provider,
//! and the permission checks evaluated against it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{OzoneRole, Scope, ServiceAction};
use crate::services::IdentityError;

/// `(identity provider, external user id)`, written `idp:userId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentifier {
    pub identity_provider: String,
    pub user_id: String,
}

impl UserIdentifier {
    pub fn new(identity_provider: &str, user_id: &str) -> Result<Self, IdentityError> {
        if identity_provider.trim().is_empty() || user_id.trim().is_empty() {
            return Err(IdentityError::InvalidUserIdentifier(format!(
                "{}:{}",
                identity_provider, user_id
            )));
        }
        Ok(Self {
            identity_provider: identity_provider.to_string(),
            user_id: user_id.to_string(),
        })
    }
}

impl fmt::Display for UserIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identity_provider, self.user_id)
    }
}

impl FromStr for UserIdentifier {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (idp, user_id) = s
            .split_once(':')
            .ok_or_else(|| IdentityError::InvalidUserIdentifier(s.to_string()))?;
        Self::new(idp, user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzoneUser {
    pub id: UserIdentifier,
    pub username: String,
    pub display_name: String,
    pub roles: Vec<OzoneRole>,
    /// Actions assigned to the user directly, outside of any role.
    pub service_actions: Vec<ServiceAction>,
}

impl OzoneUser {
    /// Create a new user without roles or actions.
    pub fn new(id: UserIdentifier, username: &str, display_name: &str) -> Self {
        Self {
            id,
            username: username.to_string(),
            display_name: display_name.to_string(),
            roles: Vec::new(),
            service_actions: Vec::new(),
        }
    }

    pub fn add_role(&mut self, role: OzoneRole) {
        if !self.roles.iter().any(|r| r.id == role.id) {
            self.roles.push(role);
        }
    }

    pub fn add_service_action(&mut self, action: ServiceAction) {
        if !self.service_actions.iter().any(|a| a.id == action.id) {
            self.service_actions.push(action);
        }
    }

    /// Every action the user holds for one service, direct or through roles.
    pub fn key_chain_for_service(&self, service_application_id: Uuid) -> Vec<ServiceAction> {
        let mut actions: Vec<ServiceAction> = Vec::new();
        let direct = self
            .service_actions
            .iter()
            .filter(|a| a.service_application_id == service_application_id);
        let from_roles = self
            .roles
            .iter()
            .filter(|r| r.service_application_id == service_application_id)
            .flat_map(|r| r.service_actions.iter());

        for action in direct.chain(from_roles) {
            if !actions.iter().any(|a| a.id == action.id) {
                actions.push(action.clone());
            }
        }
        actions
    }

    fn holds(&self, action: &ServiceAction) -> bool {
        self.service_actions.iter().any(|a| a.id == action.id)
            || self
                .roles
                .iter()
                .filter(|r| r.service_application_id == action.service_application_id)
                .any(|r| r.can_grant(action))
    }

    pub fn has_permission_for_action(&self, action: &ServiceAction) -> Result<(), IdentityError> {
        if self.holds(action) {
            Ok(())
        } else {
            Err(IdentityError::UnauthorizedServiceAction(
                action.descriptor.descriptor(),
            ))
        }
    }

    /// Fails with one error naming every action the user does not hold.
    pub fn has_permission_for_actions(&self, actions: &[ServiceAction]) -> Result<(), IdentityError> {
        let unauthorized: Vec<String> = actions
            .iter()
            .filter(|a| !self.holds(a))
            .map(|a| a.descriptor.descriptor())
            .collect();

        if unauthorized.is_empty() {
            Ok(())
        } else {
            Err(IdentityError::UnauthorizedServiceAction(unauthorized.join(", ")))
        }
    }

    /// Global scopes always pass; others require every implied action.
    pub fn has_permission_for_scope(&self, scope: &Scope) -> Result<(), IdentityError> {
        if scope.is_global || scope.service_actions.iter().all(|a| self.holds(a)) {
            Ok(())
        } else {
            Err(IdentityError::UnauthorizedScope(scope.descriptor.descriptor()))
        }
    }

    pub fn has_permission_for_scopes(&self, scopes: &[Scope]) -> Result<(), IdentityError> {
        scopes
            .iter()
            .try_for_each(|scope| self.has_permission_for_scope(scope))
    }
}
