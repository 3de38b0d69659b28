//! Service action model - the atomic permission of a service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::IdentityDescriptor;

/// A single permission owned by a service application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAction {
    pub id: Uuid,
    pub service_application_id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub descriptor: IdentityDescriptor,
    pub is_enabled: bool,
}

impl ServiceAction {
    pub(crate) fn new(
        service_application_id: Uuid,
        descriptor: IdentityDescriptor,
        display_name: &str,
        description: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_application_id,
            name: descriptor.name().to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            descriptor,
            is_enabled: true,
        }
    }

    pub fn disable(&mut self) {
        self.is_enabled = false;
    }
}
