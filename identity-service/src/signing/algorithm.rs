use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

use crate::services::IdentityError;

/// JWS algorithms a signing key can produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[default]
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    ES512,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::RS256 => "RS256",
            SigningAlgorithm::RS384 => "RS384",
            SigningAlgorithm::RS512 => "RS512",
            SigningAlgorithm::ES256 => "ES256",
            SigningAlgorithm::ES384 => "ES384",
            SigningAlgorithm::ES512 => "ES512",
        }
    }

    /// Digest of `data` with the hash function paired to this algorithm.
    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        match self {
            SigningAlgorithm::RS256 | SigningAlgorithm::ES256 => Sha256::digest(data).to_vec(),
            SigningAlgorithm::RS384 | SigningAlgorithm::ES384 => Sha384::digest(data).to_vec(),
            SigningAlgorithm::RS512 | SigningAlgorithm::ES512 => Sha512::digest(data).to_vec(),
        }
    }

    pub fn is_rsa(&self) -> bool {
        matches!(
            self,
            SigningAlgorithm::RS256 | SigningAlgorithm::RS384 | SigningAlgorithm::RS512
        )
    }

    /// RSA algorithm whose digest size matches the modulus length in bytes.
    pub fn for_rsa_modulus(modulus_len: usize) -> Result<Self, IdentityError> {
        match modulus_len {
            256 => Ok(SigningAlgorithm::RS256),
            384 => Ok(SigningAlgorithm::RS384),
            512 => Ok(SigningAlgorithm::RS512),
            other => Err(invalid_hash_size(other * 8)),
        }
    }

    /// ECDSA algorithm for the byte length of the public point's x coordinate.
    pub fn for_ec_coordinate(coordinate_len: usize) -> Result<Self, IdentityError> {
        match coordinate_len * 8 {
            256 => Ok(SigningAlgorithm::ES256),
            384 => Ok(SigningAlgorithm::ES384),
            512 => Ok(SigningAlgorithm::ES512),
            other => Err(invalid_hash_size(other)),
        }
    }

    /// ECDSA algorithm for a JWK curve name.
    pub fn for_curve(curve: &str) -> Result<Self, IdentityError> {
        match curve {
            "P-256" => Ok(SigningAlgorithm::ES256),
            "P-384" => Ok(SigningAlgorithm::ES384),
            "P-521" => Ok(SigningAlgorithm::ES512),
            other => Err(IdentityError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(SigningAlgorithm::RS256),
            "RS384" => Ok(SigningAlgorithm::RS384),
            "RS512" => Ok(SigningAlgorithm::RS512),
            "ES256" => Ok(SigningAlgorithm::ES256),
            "ES384" => Ok(SigningAlgorithm::ES384),
            "ES512" => Ok(SigningAlgorithm::ES512),
            other => Err(IdentityError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

fn invalid_hash_size(bits: usize) -> IdentityError {
    IdentityError::UnsupportedAlgorithm(format!(
        "invalid hash size {}, expected 256, 384 or 512",
        bits
    ))
}

/// Key id and algorithm written into a token header before hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningMetadata {
    pub key_id: String,
    pub algorithm: SigningAlgorithm,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_length_follows_algorithm() {
        assert_eq!(SigningAlgorithm::RS256.hash(b"x").len(), 32);
        assert_eq!(SigningAlgorithm::ES384.hash(b"x").len(), 48);
        assert_eq!(SigningAlgorithm::RS512.hash(b"x").len(), 64);
    }

    #[test]
    fn parses_names_and_curves() {
        assert_eq!("ES256".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::ES256);
        assert!("HS256".parse::<SigningAlgorithm>().is_err());
        assert_eq!(SigningAlgorithm::for_curve("P-521").unwrap(), SigningAlgorithm::ES512);
        assert_eq!(SigningAlgorithm::default(), SigningAlgorithm::RS256);
    }

    #[test]
    fn derives_algorithm_from_key_size() {
        assert_eq!(SigningAlgorithm::for_rsa_modulus(256).unwrap(), SigningAlgorithm::RS256);
        assert_eq!(SigningAlgorithm::for_rsa_modulus(384).unwrap(), SigningAlgorithm::RS384);
        assert_eq!(SigningAlgorithm::for_rsa_modulus(512).unwrap(), SigningAlgorithm::RS512);
        assert!(SigningAlgorithm::for_rsa_modulus(128).is_err());

        assert_eq!(SigningAlgorithm::for_ec_coordinate(32).unwrap(), SigningAlgorithm::ES256);
        assert_eq!(SigningAlgorithm::for_ec_coordinate(48).unwrap(), SigningAlgorithm::ES384);
        assert!(SigningAlgorithm::for_ec_coordinate(66).is_err());
    }
}
