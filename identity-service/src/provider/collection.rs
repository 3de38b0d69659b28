use std::collections::HashMap;
use std::sync::Arc;

use super::AuthenticationProvider;
use crate::services::IdentityError;

/// Registered providers, keyed by identity provider name.
#[derive(Clone, Default)]
pub struct AuthenticationProviderCollection {
    providers: HashMap<String, Arc<dyn AuthenticationProvider>>,
}

impl AuthenticationProviderCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any provider already registered under the same name.
    pub fn register(&mut self, provider: Arc<dyn AuthenticationProvider>) {
        tracing::info!(identity_provider = provider.name(), "Registered authentication provider");
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn AuthenticationProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get_provider(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn AuthenticationProvider>, IdentityError> {
        let name = name.map(str::trim).unwrap_or_default();
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| IdentityError::InvalidIdentityProvider(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
