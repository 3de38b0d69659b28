//! In-process key vault holding RSA keys, used in development and tests in
//! place of a cloud KMS.

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use dashmap::DashMap;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    CryptographyClient, KeyId, KeyManagementClient, KeyProperties, KeyVaultKey, SigningAlgorithm,
};
use crate::services::Clock;

struct LocalKeyVersion {
    properties: KeyProperties,
    private_key: RsaPrivateKey,
}

impl LocalKeyVersion {
    fn to_vault_key(&self) -> KeyVaultKey {
        let public_key = self.private_key.to_public_key();
        KeyVaultKey {
            properties: self.properties.clone(),
            key_type: "RSA".to_string(),
            n: Some(public_key.n().to_bytes_be()),
            e: Some(public_key.e().to_bytes_be()),
            crv: None,
            x: None,
            y: None,
        }
    }
}

pub struct LocalKeyVault {
    keys: DashMap<String, Vec<LocalKeyVersion>>,
    clock: Arc<dyn Clock>,
}

impl LocalKeyVault {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: DashMap::new(),
            clock,
        }
    }

    /// Adds `private_key` as the newest version of `name`.
    pub fn import_rsa_key(&self, name: &str, private_key: RsaPrivateKey) -> KeyId {
        let properties = KeyProperties {
            name: name.to_string(),
            version: Uuid::new_v4().simple().to_string(),
            enabled: true,
            created_on: self.clock.now(),
            expires_on: None,
        };
        let key_id = properties.key_id();

        self.keys
            .entry(name.to_string())
            .or_default()
            .push(LocalKeyVersion {
                properties,
                private_key,
            });

        tracing::info!(kid = %key_id, "Imported RSA key into local key vault");
        key_id
    }

    /// Accepts PKCS#8 or PKCS#1 PEM.
    pub fn import_pem(&self, name: &str, pem: &str) -> anyhow::Result<KeyId> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| anyhow!("Failed to parse RSA private key for '{}': {}", name, e))?;
        Ok(self.import_rsa_key(name, private_key))
    }

    pub fn import_pem_file(&self, name: &str, path: &Path) -> anyhow::Result<KeyId> {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read private key from {}", path.display()))?;
        self.import_pem(name, &pem)
    }

    pub fn generate_rsa_key(&self, name: &str, bits: usize) -> anyhow::Result<KeyId> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| anyhow!("Failed to generate RSA key: {}", e))?;
        Ok(self.import_rsa_key(name, private_key))
    }

    /// Returns false when the version does not exist.
    pub fn set_enabled(&self, key_id: &KeyId, enabled: bool) -> bool {
        self.update(key_id, |props| props.enabled = enabled)
    }

    pub fn set_expiry(&self, key_id: &KeyId, expires_on: chrono::DateTime<chrono::Utc>) -> bool {
        self.update(key_id, |props| props.expires_on = Some(expires_on))
    }

    fn update(&self, key_id: &KeyId, apply: impl FnOnce(&mut KeyProperties)) -> bool {
        let Some(mut versions) = self.keys.get_mut(&key_id.name) else {
            return false;
        };
        match versions
            .iter_mut()
            .find(|v| v.properties.version == key_id.version)
        {
            Some(version) => {
                apply(&mut version.properties);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl KeyManagementClient for LocalKeyVault {
    async fn get_current_key(&self, name: &str) -> anyhow::Result<KeyVaultKey> {
        let now = self.clock.now();
        let versions = self
            .keys
            .get(name)
            .ok_or_else(|| anyhow!("Key '{}' does not exist", name))?;
        versions
            .iter()
            .rev()
            .find(|v| v.properties.is_active(now))
            .map(LocalKeyVersion::to_vault_key)
            .ok_or_else(|| anyhow!("Key '{}' has no active version", name))
    }

    async fn get_key(&self, name: &str, version: &str) -> anyhow::Result<Option<KeyVaultKey>> {
        Ok(self.keys.get(name).and_then(|versions| {
            versions
                .iter()
                .find(|v| v.properties.version == version)
                .map(LocalKeyVersion::to_vault_key)
        }))
    }

    async fn list_key_names(&self) -> anyhow::Result<Vec<String>> {
        let mut names: Vec<String> = self.keys.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn list_key_versions(&self, name: &str) -> anyhow::Result<Vec<KeyProperties>> {
        Ok(self
            .keys
            .get(name)
            .map(|versions| versions.iter().map(|v| v.properties.clone()).collect())
            .unwrap_or_default())
    }

    async fn cryptography_client(
        &self,
        key: &KeyVaultKey,
    ) -> anyhow::Result<Arc<dyn CryptographyClient>> {
        let key_id = key.key_id();
        let versions = self
            .keys
            .get(&key_id.name)
            .ok_or_else(|| anyhow!("Key '{}' does not exist", key_id))?;
        let version = versions
            .iter()
            .find(|v| v.properties.version == key_id.version)
            .ok_or_else(|| anyhow!("Key '{}' does not exist", key_id))?;

        Ok(Arc::new(LocalCryptographyClient {
            private_key: version.private_key.clone(),
        }))
    }
}

/// Signs with PKCS#1 v1.5 over the supplied digest.
pub struct LocalCryptographyClient {
    private_key: RsaPrivateKey,
}

fn pkcs1v15(algorithm: SigningAlgorithm) -> anyhow::Result<Pkcs1v15Sign> {
    match algorithm {
        SigningAlgorithm::RS256 => Ok(Pkcs1v15Sign::new::<Sha256>()),
        SigningAlgorithm::RS384 => Ok(Pkcs1v15Sign::new::<Sha384>()),
        SigningAlgorithm::RS512 => Ok(Pkcs1v15Sign::new::<Sha512>()),
        other => bail!("Algorithm {} is not supported by RSA keys", other),
    }
}

#[async_trait]
impl CryptographyClient for LocalCryptographyClient {
    async fn sign(&self, algorithm: SigningAlgorithm, digest: &[u8]) -> anyhow::Result<Vec<u8>> {
        self.private_key
            .sign(pkcs1v15(algorithm)?, digest)
            .map_err(|e| anyhow!("RSA signing failed: {}", e))
    }

    async fn verify(
        &self,
        algorithm: SigningAlgorithm,
        digest: &[u8],
        signature: &[u8],
    ) -> anyhow::Result<bool> {
        let public_key = RsaPublicKey::from(&self.private_key);
        Ok(public_key
            .verify(pkcs1v15(algorithm)?, digest, signature)
            .is_ok())
    }
}
