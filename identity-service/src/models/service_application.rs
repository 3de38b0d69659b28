//! Service application model - a registered client or resource service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Scope, ServiceAction};
use crate::descriptor::IdentityDescriptor;
use crate::services::IdentityError;

/// A registered service. Owns scopes and actions inside its namespace and may
/// be granted scopes of other services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceApplication {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub service_namespace: String,
    pub scopes: Vec<Scope>,
    pub actions: Vec<ServiceAction>,
    /// Scopes of other services this application may request.
    pub remote_scopes: Vec<Scope>,
}

impl ServiceApplication {
    /// Create a new service application in `namespace`.
    pub fn new(name: &str, description: &str, namespace: &str) -> Result<Self, IdentityError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            service_namespace: IdentityDescriptor::format_namespace(namespace)?,
            scopes: Vec::new(),
            actions: Vec::new(),
            remote_scopes: Vec::new(),
        })
    }

    pub fn create_service_action(
        &mut self,
        name: &str,
        display_name: &str,
        description: &str,
    ) -> Result<ServiceAction, IdentityError> {
        let descriptor = IdentityDescriptor::create(name, Some(&self.service_namespace))?;
        let action = ServiceAction::new(self.id, descriptor, display_name, description);
        self.actions.push(action.clone());
        Ok(action)
    }

    pub fn create_scope(
        &mut self,
        name: &str,
        display_name: &str,
        description: &str,
        service_actions: Vec<ServiceAction>,
    ) -> Result<Scope, IdentityError> {
        let descriptor = IdentityDescriptor::create(name, Some(&self.service_namespace))?;
        self.push_scope(descriptor, display_name, description, false, service_actions)
    }

    /// Creates a scope without namespace that every client may request.
    pub fn create_global_scope(
        &mut self,
        name: &str,
        display_name: &str,
        description: &str,
    ) -> Result<Scope, IdentityError> {
        let descriptor = IdentityDescriptor::create(name, None)?;
        self.push_scope(descriptor, display_name, description, true, Vec::new())
    }

    fn push_scope(
        &mut self,
        descriptor: IdentityDescriptor,
        display_name: &str,
        description: &str,
        is_global: bool,
        service_actions: Vec<ServiceAction>,
    ) -> Result<Scope, IdentityError> {
        let scope = Scope {
            id: Uuid::new_v4(),
            service_application_id: self.id,
            name: descriptor.name().to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            descriptor,
            is_global,
            service_actions,
        };
        self.scopes.push(scope.clone());
        Ok(scope)
    }

    /// Allows this application to request a scope owned by another service.
    pub fn grant_remote_scope(&mut self, scope: Scope) {
        if !self.remote_scopes.iter().any(|s| s.id == scope.id) {
            self.remote_scopes.push(scope);
        }
    }

    /// Moves the application, and every descriptor it owns, to `namespace`.
    pub fn update_service_namespace(&mut self, namespace: &str) -> Result<(), IdentityError> {
        let namespace = IdentityDescriptor::format_namespace(namespace)?;
        let owner = self.id;

        let requalify = |action: &mut ServiceAction| -> Result<(), IdentityError> {
            if action.service_application_id == owner {
                action.descriptor = IdentityDescriptor::create(&action.name, Some(&namespace))?;
            }
            Ok(())
        };

        for action in &mut self.actions {
            requalify(action)?;
        }
        for scope in &mut self.scopes {
            if !scope.is_global {
                scope.descriptor = IdentityDescriptor::create(&scope.name, Some(&namespace))?;
            }
            for action in &mut scope.service_actions {
                requalify(action)?;
            }
        }

        self.service_namespace = namespace;
        Ok(())
    }

    /// Own scopes followed by remotely granted ones.
    pub fn requestable_scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter().chain(self.remote_scopes.iter())
    }

    pub fn is_allowed_to_request_scope(&self, scope: &Scope) -> bool {
        scope.is_global || self.requestable_scopes().any(|s| s.id == scope.id)
    }

    pub fn is_allowed_to_request_action(&self, action: &ServiceAction) -> bool {
        self.actions.iter().any(|a| a.id == action.id)
            || self.remote_scopes.iter().any(|scope| scope.implies(action))
    }
}
