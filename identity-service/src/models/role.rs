//! Role model - a named bundle of service actions of one application.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ServiceAction, ServiceApplication};
use crate::services::IdentityError;

const ROLE_SERVICE_ACTION_PREFIX: &str = "Role: ";

/// Role owned by an application; grants its actions to the users holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzoneRole {
    pub id: Uuid,
    pub service_application_id: Uuid,
    pub name: String,
    pub description: String,
    pub service_actions: Vec<ServiceAction>,
    /// Synthetic action standing for "has this role".
    pub role_service_action: ServiceAction,
}

impl OzoneRole {
    /// Create a new role, registering its synthetic action on `application`.
    pub fn create(
        application: &mut ServiceApplication,
        name: &str,
        description: &str,
    ) -> Result<Self, IdentityError> {
        let display_name = format!("{}{}", ROLE_SERVICE_ACTION_PREFIX, name);
        let role_service_action =
            application.create_service_action(name, &display_name, description)?;

        Ok(Self {
            id: Uuid::new_v4(),
            service_application_id: application.id,
            name: name.to_string(),
            description: description.to_string(),
            service_actions: Vec::new(),
            role_service_action,
        })
    }

    pub fn add_service_action(&mut self, action: ServiceAction) {
        if !self.can_grant(&action) {
            self.service_actions.push(action);
        }
    }

    pub fn can_grant(&self, action: &ServiceAction) -> bool {
        self.service_actions.iter().any(|a| a.id == action.id)
    }
}
