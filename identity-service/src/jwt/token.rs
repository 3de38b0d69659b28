use super::{JwtHeader, JwtPayload, JwtSegment};
use crate::services::IdentityError;
use crate::signing::{SigningMetadata, TokenSigner};

const SEGMENT_SEPARATOR: char = '.';
const SEGMENT_COUNT: usize = 3;

/// A token as `(header?, payload, signature?)`. The header is written when
/// the token is hashed for signing.
#[derive(Debug, Clone, PartialEq)]
pub struct Jwt {
    header: Option<JwtHeader>,
    payload: JwtPayload,
    signature: Option<String>,
}

impl Jwt {
    pub fn new(payload: JwtPayload) -> Self {
        Self {
            header: None,
            payload,
            signature: None,
        }
    }

    /// Parses `header.payload.signature`. Never panics on malformed input.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        if raw.trim().is_empty() {
            return Err(IdentityError::MalformedJwt("JWT is empty".to_string()));
        }

        let segments: Vec<&str> = raw.split(SEGMENT_SEPARATOR).collect();
        if segments.len() != SEGMENT_COUNT {
            return Err(IdentityError::MalformedJwt(format!(
                "Encoded jwt has {} segments but expected {}",
                segments.len(),
                SEGMENT_COUNT
            )));
        }

        let header = JwtSegment::from_base64_encoded(segments[0])
            .map_err(|_| IdentityError::InvalidJwtHeader)?;
        let payload = JwtSegment::from_base64_encoded(segments[1])
            .map_err(|_| IdentityError::InvalidJwtPayload)?;

        let signature = segments[2];
        if signature.is_empty() {
            return Err(IdentityError::MalformedJwt("JWT signature is empty".to_string()));
        }

        Ok(Self {
            header: Some(JwtHeader::from_segment(header)),
            payload: JwtPayload::from_segment(payload),
            signature: Some(signature.to_string()),
        })
    }

    pub fn header(&self) -> Option<&JwtHeader> {
        self.header.as_ref()
    }

    pub fn payload(&self) -> &JwtPayload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut JwtPayload {
        &mut self.payload
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// `base64url(header).base64url(payload)`
    pub fn signable_content(&self) -> Result<String, IdentityError> {
        let header = self.header.as_ref().ok_or(IdentityError::InvalidJwtHeader)?;
        Ok(format!(
            "{}{}{}",
            header.segment().to_base64_encoded()?,
            SEGMENT_SEPARATOR,
            self.payload.segment().to_base64_encoded()?
        ))
    }

    /// Overwrites the header from `metadata` and hashes the signable content
    /// with the algorithm's digest.
    pub fn to_signable_hash(&mut self, metadata: &SigningMetadata) -> Result<Vec<u8>, IdentityError> {
        self.header = Some(JwtHeader::new(metadata));
        let content = self.signable_content()?;
        Ok(metadata.algorithm.hash(content.as_bytes()))
    }

    pub async fn sign(&mut self, signer: &TokenSigner) -> Result<(), IdentityError> {
        let signature = signer.sign_as_base64(self).await?;
        self.signature = Some(signature);
        Ok(())
    }

    pub fn to_serialized_token(&self) -> Result<String, IdentityError> {
        let signature = self.signature.as_ref().ok_or(IdentityError::TokenNotSigned)?;
        Ok(format!(
            "{}{}{}",
            self.signable_content()?,
            SEGMENT_SEPARATOR,
            signature
        ))
    }
}
