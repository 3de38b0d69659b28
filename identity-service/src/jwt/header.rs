use super::JwtSegment;
use crate::services::IdentityError;
use crate::signing::{SigningAlgorithm, SigningMetadata};

const TYPE: &str = "typ";
const KEY_ID: &str = "kid";
const ALGORITHM: &str = "alg";
const JWT_TYPE: &str = "JWT";

#[derive(Debug, Clone, PartialEq)]
pub struct JwtHeader {
    segment: JwtSegment,
}

impl JwtHeader {
    pub fn new(metadata: &SigningMetadata) -> Self {
        let mut segment = JwtSegment::new();
        segment.set(TYPE, JWT_TYPE);
        segment.set(KEY_ID, metadata.key_id.as_str());
        segment.set(ALGORITHM, metadata.algorithm.as_str());
        Self { segment }
    }

    pub fn from_segment(segment: JwtSegment) -> Self {
        Self { segment }
    }

    pub fn token_type(&self) -> Result<Option<String>, IdentityError> {
        self.segment.get_optional_entry(TYPE)
    }

    pub fn key_id(&self) -> Result<Option<String>, IdentityError> {
        self.segment.get_optional_entry(KEY_ID)
    }

    /// Declared algorithm, `RS256` when absent.
    pub fn algorithm(&self) -> Result<SigningAlgorithm, IdentityError> {
        self.segment
            .get_optional_entry_format(ALGORITHM, |raw| raw.parse::<SigningAlgorithm>())
            .map(Option::unwrap_or_default)
    }

    pub fn segment(&self) -> &JwtSegment {
        &self.segment
    }
}
