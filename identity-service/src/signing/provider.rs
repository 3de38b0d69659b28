//! Signing key provider - resolves keys from the KMS and keeps the active
//! signing key id current.

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{
    CryptographyClient, KeyId, KeyManagementClient, KeyVaultKey, SigningAlgorithm, SigningKey,
    SigningMetadata,
};
use crate::services::{Clock, IdentityError};

pub struct SigningKeyProvider {
    kms: Arc<dyn KeyManagementClient>,
    key_name: String,
    clock: Arc<dyn Clock>,
    active_key_id: ArcSwapOption<String>,
    keys: DashMap<String, KeyVaultKey>,
    clients: DashMap<String, Arc<dyn CryptographyClient>>,
    refresh_lock: Mutex<()>,
}

impl SigningKeyProvider {
    /// Create a new provider with no active key. Call
    /// [`refresh_active_cryptography_client`](Self::refresh_active_cryptography_client)
    /// before signing.
    pub fn new(kms: Arc<dyn KeyManagementClient>, key_name: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            kms,
            key_name: key_name.to_string(),
            clock,
            active_key_id: ArcSwapOption::empty(),
            keys: DashMap::new(),
            clients: DashMap::new(),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Lock-free read; may be stale while a refresh is running.
    pub fn active_key_id(&self) -> Option<String> {
        self.active_key_id.load_full().map(|kid| kid.as_ref().clone())
    }

    /// Fetches the current key version and makes it the active signing key.
    /// Refreshes are serialized; caches are only written once the KMS calls
    /// have succeeded.
    pub async fn refresh_active_cryptography_client(&self) -> Result<String, IdentityError> {
        let _guard = self.refresh_lock.lock().await;

        let key = self.kms.get_current_key(&self.key_name).await?;
        let kid = key.key_id().to_string();
        let client = self.kms.cryptography_client(&key).await?;

        self.keys.insert(kid.clone(), key);
        self.clients.insert(kid.clone(), client);
        self.active_key_id.store(Some(Arc::new(kid.clone())));

        tracing::info!(kid = %kid, key_name = %self.key_name, "Active signing key refreshed");
        Ok(kid)
    }

    async fn get_key(&self, kid: &str) -> Result<KeyVaultKey, IdentityError> {
        if let Some(key) = self.keys.get(kid) {
            return Ok(key.clone());
        }

        let key_id: KeyId = kid.parse()?;
        let key = self
            .kms
            .get_key(&key_id.name, &key_id.version)
            .await?
            .ok_or_else(|| IdentityError::SigningKeyNotFound(kid.to_string()))?;

        self.keys.insert(kid.to_string(), key.clone());
        Ok(key)
    }

    pub async fn get_cryptography_client(
        &self,
        kid: &str,
    ) -> Result<Arc<dyn CryptographyClient>, IdentityError> {
        if let Some(client) = self.clients.get(kid) {
            return Ok(Arc::clone(client.value()));
        }

        let key = self.get_key(kid).await?;
        let client = self.kms.cryptography_client(&key).await?;
        self.clients.insert(kid.to_string(), Arc::clone(&client));
        Ok(client)
    }

    pub async fn get_signing_metadata(&self, kid: &str) -> Result<SigningMetadata, IdentityError> {
        let key = self.get_key(kid).await?;
        Ok(SigningMetadata {
            key_id: kid.to_string(),
            algorithm: key.signing_algorithm()?,
        })
    }

    pub async fn get_signing_algorithm(&self, kid: &str) -> Result<SigningAlgorithm, IdentityError> {
        Ok(self.get_signing_metadata(kid).await?.algorithm)
    }

    /// Every enabled, unexpired key version across all key names.
    pub async fn get_active_keys(&self) -> Result<Vec<SigningKey>, IdentityError> {
        let now = self.clock.now();
        let mut signing_keys = Vec::new();

        for name in self.kms.list_key_names().await? {
            for properties in self.kms.list_key_versions(&name).await? {
                if !properties.is_active(now) {
                    continue;
                }
                let kid = properties.key_id().to_string();
                let key = self.get_key(&kid).await?;
                signing_keys.push(SigningKey::from_vault_key(&key)?);
            }
        }

        Ok(signing_keys)
    }
}
