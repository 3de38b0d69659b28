use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

use crate::services::IdentityError;

/// PKCE transformation applied to a code verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeChallengeMode {
    S256,
    S512,
}

impl CodeChallengeMode {
    /// `base64url(hash(verifier))`
    pub fn create_challenge(&self, code_verifier: &str) -> String {
        let digest = match self {
            CodeChallengeMode::S256 => Sha256::digest(code_verifier.as_bytes()).to_vec(),
            CodeChallengeMode::S512 => Sha512::digest(code_verifier.as_bytes()).to_vec(),
        };
        URL_SAFE_NO_PAD.encode(digest)
    }

    pub fn verify(&self, code_verifier: &str, code_challenge: &str) -> bool {
        let expected = self.create_challenge(code_verifier);
        expected.as_bytes().ct_eq(code_challenge.as_bytes()).into()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeChallengeMode::S256 => "S256",
            CodeChallengeMode::S512 => "S512",
        }
    }
}

impl fmt::Display for CodeChallengeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeChallengeMode {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S256" => Ok(CodeChallengeMode::S256),
            "S512" => Ok(CodeChallengeMode::S512),
            other => Err(IdentityError::InvalidCodeChallengeMode(other.to_string())),
        }
    }
}
