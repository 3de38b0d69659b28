//! Token signer - signs and verifies JWTs against KMS-held keys.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::sync::Arc;

use super::{JsonWebKeySet, SigningKeyProvider};
use crate::jwt::Jwt;
use crate::services::IdentityError;

pub const MAX_SIGNING_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct TokenSigner {
    provider: Arc<SigningKeyProvider>,
}

impl TokenSigner {
    pub fn new(provider: Arc<SigningKeyProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &SigningKeyProvider {
        &self.provider
    }

    /// Signs with the active key and returns the base64url signature.
    ///
    /// A failed attempt refreshes the active key before the next one. After
    /// [`MAX_SIGNING_ATTEMPTS`] failures the error is permanent.
    pub async fn sign_as_base64(&self, token: &mut Jwt) -> Result<String, IdentityError> {
        for attempt in 1..=MAX_SIGNING_ATTEMPTS {
            let kid = self.provider.active_key_id();

            match self.try_sign(kid.as_deref(), token).await {
                Ok(signature) => return Ok(URL_SAFE_NO_PAD.encode(signature)),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        kid = kid.as_deref().unwrap_or("<none>"),
                        error = %e,
                        "Signing attempt failed, refreshing active key"
                    );
                    if let Err(refresh_error) =
                        self.provider.refresh_active_cryptography_client().await
                    {
                        tracing::warn!(attempt, error = %refresh_error, "Signing key refresh failed");
                    }
                }
            }
        }

        tracing::error!(
            attempts = MAX_SIGNING_ATTEMPTS,
            key_name = %self.provider.key_name(),
            "Giving up on signing"
        );
        Err(IdentityError::NoValidSigningKey)
    }

    async fn try_sign(&self, kid: Option<&str>, token: &mut Jwt) -> Result<Vec<u8>, IdentityError> {
        let kid = kid.ok_or(IdentityError::NoValidSigningKey)?;
        let metadata = self.provider.get_signing_metadata(kid).await?;
        let digest = token.to_signable_hash(&metadata)?;
        let client = self.provider.get_cryptography_client(kid).await?;
        Ok(client.sign(metadata.algorithm, &digest).await?)
    }

    /// Verifies against the key named by the token's `kid`. A signature that
    /// does not match is an [`IdentityError::InvalidSignature`].
    pub async fn verify(&self, token: &Jwt) -> Result<(), IdentityError> {
        let header = token.header().ok_or(IdentityError::InvalidJwtHeader)?;
        let kid = header
            .key_id()?
            .ok_or_else(|| IdentityError::MissingClaim("kid".to_string()))?;
        let signature = token.signature().ok_or(IdentityError::TokenNotSigned)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| IdentityError::InvalidSignature)?;

        let metadata = self.provider.get_signing_metadata(&kid).await?;
        let client = self.provider.get_cryptography_client(&kid).await?;

        let digest = metadata.algorithm.hash(token.signable_content()?.as_bytes());

        if client.verify(metadata.algorithm, &digest, &signature).await? {
            Ok(())
        } else {
            Err(IdentityError::InvalidSignature)
        }
    }

    pub async fn get_signing_keys(&self) -> Result<JsonWebKeySet, IdentityError> {
        Ok(JsonWebKeySet {
            keys: self.provider.get_active_keys().await?,
        })
    }
}
