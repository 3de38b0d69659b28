pub mod algorithm;
pub mod key;
pub mod kms;
pub mod local;
pub mod provider;
pub mod signer;

pub use algorithm::{SigningAlgorithm, SigningMetadata};
pub use key::{JsonWebKeySet, KeyId, KeyProperties, KeyVaultKey, SigningKey};
pub use kms::{CryptographyClient, KeyManagementClient};
pub use local::{LocalCryptographyClient, LocalKeyVault};
pub use provider::SigningKeyProvider;
pub use signer::{TokenSigner, MAX_SIGNING_ATTEMPTS};
