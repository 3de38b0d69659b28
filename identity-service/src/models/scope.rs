//! Scope model - a grantable OAuth scope implying a set of service actions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ServiceAction;
use crate::descriptor::IdentityDescriptor;

/// OAuth scope owned by a service application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub id: Uuid,
    pub service_application_id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub descriptor: IdentityDescriptor,
    /// Global scopes (e.g. `openid`) can be requested by, and granted to, anyone.
    pub is_global: bool,
    pub service_actions: Vec<ServiceAction>,
}

impl Scope {
    /// Whether `action` is implied by this scope, by identity.
    pub fn implies(&self, action: &ServiceAction) -> bool {
        self.service_actions.iter().any(|a| a.id == action.id)
    }

    /// Adds an action to the scope unless it is already implied.
    pub fn add_service_action(&mut self, action: ServiceAction) {
        if !self.implies(&action) {
            self.service_actions.push(action);
        }
    }
}
