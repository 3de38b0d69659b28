//! Persistence seams consumed by the authorization flow.
//!
//! Repositories only read. Writes are staged on a [`UnitOfWork`] started
//! per request and become visible when it is committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::descriptor::IdentityDescriptor;
use crate::models::{
    AuthorizationCode, AuthorizationGrant, CorrelationId, ExternalAuthenticationChallenge,
    OzoneUser, RefreshToken, Scope, ServiceAction, ServiceApplication, UserIdentifier,
};

#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    async fn get_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> anyhow::Result<Option<ExternalAuthenticationChallenge>>;
}

#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// The grant a user gave to one client application, if any.
    async fn get_grant(
        &self,
        user_id: &UserIdentifier,
        client_application_id: Uuid,
    ) -> anyhow::Result<Option<AuthorizationGrant>>;
    async fn get_authorization_code(&self, code: &str) -> anyhow::Result<Option<AuthorizationCode>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user_identity(&self, id: &UserIdentifier) -> anyhow::Result<Option<OzoneUser>>;
}

#[async_trait]
pub trait ServiceApplicationRepository: Send + Sync {
    async fn get_service_application(&self, id: Uuid) -> anyhow::Result<Option<ServiceApplication>>;
    async fn find_scope(&self, descriptor: &IdentityDescriptor) -> anyhow::Result<Option<Scope>>;
    async fn find_service_action(
        &self,
        descriptor: &IdentityDescriptor,
    ) -> anyhow::Result<Option<ServiceAction>>;
}

/// Writes of one request. Dropping it without committing discards them.
#[async_trait]
pub trait UnitOfWork: Send {
    fn add_challenge(&mut self, challenge: ExternalAuthenticationChallenge);
    /// Marks the challenge used. Committing fails when it already was.
    fn consume_challenge(&mut self, correlation_id: CorrelationId, at: DateTime<Utc>);
    fn add_grant(&mut self, grant: AuthorizationGrant);
    fn add_authorization_code(&mut self, code: AuthorizationCode);
    fn add_refresh_token(&mut self, grant_id: Uuid, token: RefreshToken);

    /// Applies every staged write. When some of them fail the others are
    /// still applied and the first failure is returned.
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
}

pub trait UnitOfWorkFactory: Send + Sync {
    fn begin(&self) -> Box<dyn UnitOfWork + '_>;
}
