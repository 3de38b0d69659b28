use chrono::{DateTime, Utc};

use super::JwtSegment;
use crate::authorization::{AuthorizationKeyChain, AuthorizationScopes};
use crate::services::IdentityError;

const ISSUER: &str = "iss";
const AUDIENCE: &str = "aud";
const CLIENT_ID: &str = "client_id";
const SUBJECT: &str = "sub";
const ISSUED_AT: &str = "iat";
const NOT_BEFORE: &str = "nbf";
const EXPIRES: &str = "exp";
const OBJECT_ID: &str = "oid";
const VERSION: &str = "ver";
const SCOPES: &str = "scp";
const KEYCHAIN: &str = "keychain";
const REFRESH_TOKEN_ID: &str = "rti";
const NONCE: &str = "nonce";

pub const TOKEN_VERSION: &str = "1.0";

/// Token claims with typed accessors for the registered and internal claims.
#[derive(Debug, Clone, PartialEq)]
pub struct JwtPayload {
    segment: JwtSegment,
}

impl Default for JwtPayload {
    fn default() -> Self {
        Self::new()
    }
}

impl JwtPayload {
    /// Create a new payload for an internally issued token.
    pub fn new() -> Self {
        let mut segment = JwtSegment::new();
        segment.set(VERSION, TOKEN_VERSION);
        Self { segment }
    }

    pub fn from_segment(segment: JwtSegment) -> Self {
        Self { segment }
    }

    pub fn segment(&self) -> &JwtSegment {
        &self.segment
    }

    pub fn segment_mut(&mut self) -> &mut JwtSegment {
        &mut self.segment
    }

    pub fn issuer(&self) -> Result<Option<String>, IdentityError> {
        self.segment.get_optional_entry(ISSUER)
    }

    pub fn set_issuer(&mut self, issuer: &str) {
        self.segment.set(ISSUER, issuer);
    }

    pub fn audience(&self) -> Result<Option<String>, IdentityError> {
        self.segment.get_optional_entry(AUDIENCE)
    }

    pub fn set_audience(&mut self, audience: &str) {
        self.segment.set(AUDIENCE, audience);
    }

    pub fn client_id(&self) -> Result<Option<String>, IdentityError> {
        self.segment.get_optional_entry(CLIENT_ID)
    }

    pub fn set_client_id(&mut self, client_id: &str) {
        self.segment.set(CLIENT_ID, client_id);
    }

    pub fn subject(&self) -> Result<Option<String>, IdentityError> {
        self.segment.get_optional_entry(SUBJECT)
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.segment.set(SUBJECT, subject);
    }

    pub fn issued_at(&self) -> Result<Option<DateTime<Utc>>, IdentityError> {
        self.segment.get_optional_entry(ISSUED_AT)
    }

    pub fn set_issued_at(&mut self, at: DateTime<Utc>) {
        self.segment.set(ISSUED_AT, at);
    }

    pub fn not_before(&self) -> Result<Option<DateTime<Utc>>, IdentityError> {
        self.segment.get_optional_entry(NOT_BEFORE)
    }

    pub fn set_not_before(&mut self, at: DateTime<Utc>) {
        self.segment.set(NOT_BEFORE, at);
    }

    pub fn expires(&self) -> Result<Option<DateTime<Utc>>, IdentityError> {
        self.segment.get_optional_entry(EXPIRES)
    }

    pub fn set_expires(&mut self, at: DateTime<Utc>) {
        self.segment.set(EXPIRES, at);
    }

    /// Object id of the principal in the external identity provider.
    pub fn object_id(&self) -> Result<Option<String>, IdentityError> {
        self.segment.get_optional_entry(OBJECT_ID)
    }

    pub fn set_object_id(&mut self, object_id: &str) {
        self.segment.set(OBJECT_ID, object_id);
    }

    pub fn version(&self) -> Result<Option<String>, IdentityError> {
        self.segment.get_optional_entry(VERSION)
    }

    pub fn scopes(&self) -> Result<Option<AuthorizationScopes>, IdentityError> {
        self.segment
            .get_optional_entry_format(SCOPES, AuthorizationScopes::create_from)
    }

    pub fn set_scopes(&mut self, scopes: &AuthorizationScopes) {
        self.segment.set(SCOPES, scopes.to_string());
    }

    pub fn keychain(&self) -> Result<Option<AuthorizationKeyChain>, IdentityError> {
        self.segment
            .get_optional_entry_format(KEYCHAIN, AuthorizationKeyChain::create_from)
    }

    pub fn set_keychain(&mut self, keychain: &AuthorizationKeyChain) {
        self.segment.set(KEYCHAIN, keychain.to_string());
    }

    pub fn refresh_token_id(&self) -> Result<Option<String>, IdentityError> {
        self.segment.get_optional_entry(REFRESH_TOKEN_ID)
    }

    pub fn set_refresh_token_id(&mut self, id: &str) {
        self.segment.set(REFRESH_TOKEN_ID, id);
    }

    /// Nonce echoed back in id tokens of the external provider.
    pub fn nonce(&self) -> Result<Option<String>, IdentityError> {
        self.segment.get_optional_entry(NONCE)
    }

    pub fn set_nonce(&mut self, nonce: &str) {
        self.segment.set(NONCE, nonce);
    }
}
