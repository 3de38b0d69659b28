//! Enterprise application model - a service application with default
//! administration roles and actions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OzoneRole, ServiceApplication};
use crate::services::IdentityError;

const ADMINISTRATOR_ROLE: &str = "Application Administrator";
const ADMIN_ACTION: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterpriseApplication {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub service_application: ServiceApplication,
    pub roles: Vec<OzoneRole>,
}

impl EnterpriseApplication {
    /// Registers the application under a namespace derived from its name,
    /// with an administrator role and an `admin` action.
    pub fn create(name: &str, description: &str) -> Result<Self, IdentityError> {
        let service_application = ServiceApplication::new(name, description, name)?;
        let mut application = Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            service_application,
            roles: Vec::new(),
        };

        application.create_role(ADMINISTRATOR_ROLE, "")?;
        application.service_application.create_service_action(
            ADMIN_ACTION,
            ADMINISTRATOR_ROLE,
            "",
        )?;

        Ok(application)
    }

    pub fn create_role(&mut self, name: &str, description: &str) -> Result<OzoneRole, IdentityError> {
        let role = OzoneRole::create(&mut self.service_application, name, description)?;
        self.roles.push(role.clone());
        Ok(role)
    }

    pub fn role(&self, name: &str) -> Option<&OzoneRole> {
        self.roles.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_default_role_and_admin_action() {
        let app = EnterpriseApplication::create("Payroll", "Salaries").unwrap();

        assert_eq!(app.service_application.service_namespace, "Payroll");
        let role = app.role("Application Administrator").unwrap();
        assert_eq!(role.role_service_action.display_name, "Role: Application Administrator");
        assert_eq!(
            role.role_service_action.descriptor.descriptor(),
            "Payroll:Application-Administrator"
        );

        let descriptors: Vec<String> = app
            .service_application
            .actions
            .iter()
            .map(|a| a.descriptor.descriptor())
            .collect();
        assert_eq!(
            descriptors,
            vec!["Payroll:Application-Administrator", "Payroll:admin"]
        );
    }
}
