//! Token signing against the local key vault, including key rotation and
//! the bounded refresh-and-retry loop.

mod common;

use anyhow::anyhow;
use async_trait::async_trait;
use common::{SIGNING_KEY, SIGNING_KEY_NAME};
use identity_service::jwt::{Jwt, JwtPayload};
use identity_service::services::{IdentityError, SystemClock};
use identity_service::signing::{
    CryptographyClient, KeyManagementClient, KeyProperties, KeyVaultKey, LocalKeyVault,
    SigningAlgorithm, SigningKey, SigningKeyProvider, TokenSigner, MAX_SIGNING_ATTEMPTS,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn vault() -> Arc<LocalKeyVault> {
    let vault = Arc::new(LocalKeyVault::new(Arc::new(SystemClock)));
    vault.import_rsa_key(SIGNING_KEY_NAME, SIGNING_KEY.clone());
    vault
}

fn token() -> Jwt {
    let mut payload = JwtPayload::new();
    payload.set_issuer("https://ozone.example");
    payload.set_subject("acme:3f1c2a9e-oid");
    payload.set_audience("documents");
    Jwt::new(payload)
}

async fn signer(kms: Arc<dyn KeyManagementClient>) -> TokenSigner {
    let provider = Arc::new(SigningKeyProvider::new(kms, SIGNING_KEY_NAME, Arc::new(SystemClock)));
    provider.refresh_active_cryptography_client().await.unwrap();
    TokenSigner::new(provider)
}

#[tokio::test]
async fn signed_token_verifies_after_parsing() {
    let signer = signer(vault()).await;

    let mut jwt = token();
    jwt.sign(&signer).await.unwrap();
    let serialized = jwt.to_serialized_token().unwrap();

    let parsed = Jwt::parse(&serialized).unwrap();
    let header = parsed.header().unwrap();
    assert_eq!(header.algorithm().unwrap(), SigningAlgorithm::RS256);
    assert_eq!(header.key_id().unwrap(), signer.provider().active_key_id());
    assert!(signer.verify(&parsed).await.is_ok());
}

#[tokio::test]
async fn tampered_payload_fails_verification() {
    let signer = signer(vault()).await;

    let mut jwt = token();
    jwt.sign(&signer).await.unwrap();
    let mut parsed = Jwt::parse(&jwt.to_serialized_token().unwrap()).unwrap();
    parsed.payload_mut().set_subject("acme:someone-else");

    let err = signer.verify(&parsed).await.unwrap_err();
    assert!(matches!(err, IdentityError::InvalidSignature));
}

#[tokio::test]
async fn rotated_keys_are_published_and_still_verify() {
    let vault = vault();
    let signer = signer(vault.clone()).await;
    let old_kid = signer.provider().active_key_id().unwrap();

    let mut before_rotation = token();
    before_rotation.sign(&signer).await.unwrap();

    vault.generate_rsa_key(SIGNING_KEY_NAME, 2048).unwrap();
    let new_kid = signer
        .provider()
        .refresh_active_cryptography_client()
        .await
        .unwrap();
    assert_ne!(old_kid, new_kid);

    let jwks = signer.get_signing_keys().await.unwrap();
    let kids: Vec<&str> = jwks.keys.iter().map(SigningKey::kid).collect();
    assert_eq!(kids, vec![old_kid.as_str(), new_kid.as_str()]);

    let parsed = Jwt::parse(&before_rotation.to_serialized_token().unwrap()).unwrap();
    assert!(signer.verify(&parsed).await.is_ok());
}

#[tokio::test]
async fn disabled_keys_are_not_published() {
    let vault = vault();
    let signer = signer(vault.clone()).await;
    let kid: identity_service::signing::KeyId =
        signer.provider().active_key_id().unwrap().parse().unwrap();

    vault.set_enabled(&kid, false);

    assert!(signer.get_signing_keys().await.unwrap().keys.is_empty());
}

/// Wraps the local vault, counts key refreshes and fails the first
/// `failures` signing calls.
struct FlakyKms {
    inner: Arc<LocalKeyVault>,
    current_key_calls: AtomicUsize,
    failures: Arc<AtomicUsize>,
}

impl FlakyKms {
    fn new(failures: usize) -> Self {
        Self {
            inner: vault(),
            current_key_calls: AtomicUsize::new(0),
            failures: Arc::new(AtomicUsize::new(failures)),
        }
    }

    /// Refreshes after the one done at startup.
    fn refreshes(&self) -> usize {
        self.current_key_calls.load(Ordering::SeqCst) - 1
    }
}

struct FlakyClient {
    inner: Arc<dyn CryptographyClient>,
    failures: Arc<AtomicUsize>,
}

#[async_trait]
impl CryptographyClient for FlakyClient {
    async fn sign(&self, algorithm: SigningAlgorithm, digest: &[u8]) -> anyhow::Result<Vec<u8>> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(anyhow!("key vault unavailable"));
        }
        self.inner.sign(algorithm, digest).await
    }

    async fn verify(
        &self,
        algorithm: SigningAlgorithm,
        digest: &[u8],
        signature: &[u8],
    ) -> anyhow::Result<bool> {
        self.inner.verify(algorithm, digest, signature).await
    }
}

#[async_trait]
impl KeyManagementClient for FlakyKms {
    async fn get_current_key(&self, name: &str) -> anyhow::Result<KeyVaultKey> {
        self.current_key_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_current_key(name).await
    }

    async fn get_key(&self, name: &str, version: &str) -> anyhow::Result<Option<KeyVaultKey>> {
        self.inner.get_key(name, version).await
    }

    async fn list_key_names(&self) -> anyhow::Result<Vec<String>> {
        self.inner.list_key_names().await
    }

    async fn list_key_versions(&self, name: &str) -> anyhow::Result<Vec<KeyProperties>> {
        self.inner.list_key_versions(name).await
    }

    async fn cryptography_client(
        &self,
        key: &KeyVaultKey,
    ) -> anyhow::Result<Arc<dyn CryptographyClient>> {
        Ok(Arc::new(FlakyClient {
            inner: self.inner.cryptography_client(key).await?,
            failures: self.failures.clone(),
        }))
    }
}

#[tokio::test]
async fn gives_up_after_three_refreshes() {
    let kms = Arc::new(FlakyKms::new(usize::MAX));
    let signer = signer(kms.clone()).await;

    let err = token().sign(&signer).await.unwrap_err();

    assert!(matches!(err, IdentityError::NoValidSigningKey));
    assert_eq!(kms.refreshes(), MAX_SIGNING_ATTEMPTS as usize);
    assert_eq!(kms.refreshes(), 3);
}

#[tokio::test]
async fn second_attempt_success_refreshes_once() {
    let kms = Arc::new(FlakyKms::new(1));
    let signer = signer(kms.clone()).await;

    let mut jwt = token();
    jwt.sign(&signer).await.unwrap();

    assert_eq!(kms.refreshes(), 1);
    let parsed = Jwt::parse(&jwt.to_serialized_token().unwrap()).unwrap();
    assert!(signer.verify(&parsed).await.is_ok());
}

#[tokio::test]
async fn first_attempt_success_does_not_refresh() {
    let kms = Arc::new(FlakyKms::new(0));
    let signer = signer(kms.clone()).await;

    token().sign(&signer).await.unwrap();

    assert_eq!(kms.refreshes(), 0);
}

#[tokio::test]
async fn signer_without_active_key_recovers_by_refreshing() {
    let kms: Arc<dyn KeyManagementClient> = vault();
    let provider = Arc::new(SigningKeyProvider::new(kms, SIGNING_KEY_NAME, Arc::new(SystemClock)));
    let signer = TokenSigner::new(provider);
    assert!(signer.provider().active_key_id().is_none());

    let mut jwt = token();
    jwt.sign(&signer).await.unwrap();

    assert!(signer.provider().active_key_id().is_some());
}

#[tokio::test]
async fn unsigned_token_cannot_be_serialized() {
    let err = token().to_serialized_token().unwrap_err();
    assert!(matches!(err, IdentityError::TokenNotSigned));
}
