//! Key vault key model and its JWK projection.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::SigningAlgorithm;
use crate::services::IdentityError;

const KEY_ID_SEPARATOR: &str = "::";
const SIGNATURE_USE: &str = "sig";

/// `name::version` of one key version in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    pub name: String,
    pub version: String,
}

impl KeyId {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, KEY_ID_SEPARATOR, self.version)
    }
}

impl FromStr for KeyId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(KEY_ID_SEPARATOR) {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Self::new(name, version))
            }
            _ => Err(IdentityError::SigningKeyNotFound(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyProperties {
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub created_on: DateTime<Utc>,
    pub expires_on: Option<DateTime<Utc>>,
}

impl KeyProperties {
    pub fn key_id(&self) -> KeyId {
        KeyId::new(&self.name, &self.version)
    }

    /// Enabled and not past its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.expires_on.map_or(true, |expires| expires > now)
    }
}

/// Public half of a vault key, as returned by the KMS.
#[derive(Debug, Clone)]
pub struct KeyVaultKey {
    pub properties: KeyProperties,
    /// `RSA`, `RSA-HSM`, `EC`, `EC-HSM`, `oct`, ...
    pub key_type: String,
    pub n: Option<Vec<u8>>,
    pub e: Option<Vec<u8>>,
    pub crv: Option<String>,
    pub x: Option<Vec<u8>>,
    pub y: Option<Vec<u8>>,
}

impl KeyVaultKey {
    pub fn key_id(&self) -> KeyId {
        self.properties.key_id()
    }

    pub fn is_rsa(&self) -> bool {
        self.key_type.starts_with("RSA")
    }

    pub fn is_ec(&self) -> bool {
        self.key_type.starts_with("EC")
    }

    /// Derived from the key material: RSA modulus length, or EC coordinate
    /// length with the curve name as fallback.
    pub fn signing_algorithm(&self) -> Result<SigningAlgorithm, IdentityError> {
        let unsupported = || IdentityError::UnsupportedKeyType(self.key_type.clone());

        if self.is_rsa() {
            let modulus = self.n.as_deref().ok_or_else(unsupported)?;
            let significant = modulus.iter().skip_while(|b| **b == 0).count();
            SigningAlgorithm::for_rsa_modulus(significant)
        } else if self.is_ec() {
            match (&self.x, self.crv.as_deref()) {
                (Some(x), _) => SigningAlgorithm::for_ec_coordinate(x.len()),
                (None, Some(curve)) => SigningAlgorithm::for_curve(curve),
                (None, None) => Err(unsupported()),
            }
        } else {
            Err(unsupported())
        }
    }
}

/// JSON Web Key published for signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum SigningKey {
    #[serde(rename = "RSA")]
    Rsa {
        n: String,
        e: String,
        kid: String,
        #[serde(rename = "use")]
        key_use: String,
        alg: String,
    },
    #[serde(rename = "EC")]
    Ec {
        crv: String,
        x: String,
        y: String,
        kid: String,
        #[serde(rename = "use")]
        key_use: String,
        alg: String,
    },
}

impl SigningKey {
    pub fn from_vault_key(key: &KeyVaultKey) -> Result<Self, IdentityError> {
        let kid = key.key_id().to_string();
        let alg = key.signing_algorithm()?.as_str().to_string();
        let incomplete = || IdentityError::UnsupportedKeyType(format!("{} ({})", key.key_type, kid));

        if key.is_rsa() {
            let (n, e) = key.n.as_ref().zip(key.e.as_ref()).ok_or_else(incomplete)?;
            Ok(SigningKey::Rsa {
                n: URL_SAFE_NO_PAD.encode(n),
                e: URL_SAFE_NO_PAD.encode(e),
                kid,
                key_use: SIGNATURE_USE.to_string(),
                alg,
            })
        } else {
            let (x, y) = key.x.as_ref().zip(key.y.as_ref()).ok_or_else(incomplete)?;
            Ok(SigningKey::Ec {
                crv: key.crv.clone().unwrap_or_default(),
                x: URL_SAFE_NO_PAD.encode(x),
                y: URL_SAFE_NO_PAD.encode(y),
                kid,
                key_use: SIGNATURE_USE.to_string(),
                alg,
            })
        }
    }

    pub fn kid(&self) -> &str {
        match self {
            SigningKey::Rsa { kid, .. } | SigningKey::Ec { kid, .. } => kid,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<SigningKey>,
}
