//! Refresh token model - opaque, revocable, time boxed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::RandomBlobGenerator;

const REFRESH_TOKEN_SIZE_IN_BYTES: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
}

impl RefreshToken {
    /// Create a new refresh token valid for `lifetime` from `now`.
    pub fn new(now: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: RandomBlobGenerator::generate_string(REFRESH_TOKEN_SIZE_IN_BYTES),
            created_at: now,
            expires_at: now + lifetime,
            is_revoked: false,
        }
    }

    pub fn revoke(&mut self) {
        self.is_revoked = true;
    }

    /// Revoked tokens count as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_revoked || now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_at_lifetime_or_on_revoke() {
        let now = Utc::now();
        let mut token = RefreshToken::new(now, Duration::days(1));

        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::days(1)));

        token.revoke();
        assert!(token.is_expired(now));
    }
}
