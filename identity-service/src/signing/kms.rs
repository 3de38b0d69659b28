//! Key management service abstraction consumed by the key provider.

use async_trait::async_trait;
use std::sync::Arc;

use super::{KeyProperties, KeyVaultKey, SigningAlgorithm};

/// Sign/verify handle bound to one key version.
#[async_trait]
pub trait CryptographyClient: Send + Sync {
    /// Signs a precomputed digest, returning raw signature bytes.
    async fn sign(&self, algorithm: SigningAlgorithm, digest: &[u8]) -> anyhow::Result<Vec<u8>>;

    async fn verify(
        &self,
        algorithm: SigningAlgorithm,
        digest: &[u8],
        signature: &[u8],
    ) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait KeyManagementClient: Send + Sync {
    /// Latest version of the named key.
    async fn get_current_key(&self, name: &str) -> anyhow::Result<KeyVaultKey>;

    /// `Ok(None)` when the version does not exist.
    async fn get_key(&self, name: &str, version: &str) -> anyhow::Result<Option<KeyVaultKey>>;

    async fn list_key_names(&self) -> anyhow::Result<Vec<String>>;

    async fn list_key_versions(&self, name: &str) -> anyhow::Result<Vec<KeyProperties>>;

    async fn cryptography_client(
        &self,
        key: &KeyVaultKey,
    ) -> anyhow::Result<Arc<dyn CryptographyClient>>;
}
