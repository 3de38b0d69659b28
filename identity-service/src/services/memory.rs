//! In-memory store implementing every repository seam. Used by the dev
//! binary and the tests.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use super::repository::{
    ChallengeRepository, GrantRepository, ServiceApplicationRepository, UnitOfWork,
    UnitOfWorkFactory, UserRepository,
};
use crate::descriptor::IdentityDescriptor;
use crate::models::{
    AuthorizationCode, AuthorizationGrant, CorrelationId, ExternalAuthenticationChallenge,
    OzoneUser, RefreshToken, Scope, ServiceAction, ServiceApplication, UserIdentifier,
};

enum PendingChange {
    Challenge(ExternalAuthenticationChallenge),
    ConsumeChallenge(CorrelationId, DateTime<Utc>),
    Grant(AuthorizationGrant),
    Code(AuthorizationCode),
    RefreshToken(Uuid, RefreshToken),
}

#[derive(Default)]
pub struct InMemoryIdentityStore {
    challenges: DashMap<CorrelationId, ExternalAuthenticationChallenge>,
    grants: DashMap<Uuid, AuthorizationGrant>,
    codes: DashMap<String, AuthorizationCode>,
    users: DashMap<UserIdentifier, OzoneUser>,
    applications: DashMap<Uuid, ServiceApplication>,
    commits: AtomicUsize,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: OzoneUser) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn add_service_application(&self, application: ServiceApplication) {
        self.applications.insert(application.id, application);
    }

    /// Stores a grant immediately, outside of any unit of work.
    pub fn insert_grant(&self, grant: AuthorizationGrant) {
        self.grants.insert(grant.id, grant);
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn authorization_codes(&self) -> Vec<AuthorizationCode> {
        self.codes.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn challenge_count(&self) -> usize {
        self.challenges.len()
    }

    fn apply(&self, change: PendingChange) -> anyhow::Result<()> {
        match change {
            PendingChange::Challenge(challenge) => {
                self.challenges.insert(challenge.correlation_id(), challenge);
            }
            PendingChange::ConsumeChallenge(correlation_id, at) => {
                let mut challenge = self
                    .challenges
                    .get_mut(&correlation_id)
                    .ok_or_else(|| anyhow!("Challenge {} not found", correlation_id))?;
                if !challenge.consume(at) {
                    return Err(anyhow!("Challenge {} was already used", correlation_id));
                }
            }
            PendingChange::Grant(grant) => {
                self.grants.insert(grant.id, grant);
            }
            PendingChange::Code(code) => {
                self.codes.insert(code.code.clone(), code);
            }
            PendingChange::RefreshToken(grant_id, token) => {
                let mut grant = self
                    .grants
                    .get_mut(&grant_id)
                    .ok_or_else(|| anyhow!("Grant {} not found", grant_id))?;
                grant.add_refresh_token(token);
            }
        }
        Ok(())
    }
}

/// Changes staged by one request against the in-memory store.
pub struct InMemoryUnitOfWork<'a> {
    store: &'a InMemoryIdentityStore,
    changes: Vec<PendingChange>,
}

impl UnitOfWorkFactory for InMemoryIdentityStore {
    fn begin(&self) -> Box<dyn UnitOfWork + '_> {
        Box::new(InMemoryUnitOfWork {
            store: self,
            changes: Vec::new(),
        })
    }
}

#[async_trait]
impl<'a> UnitOfWork for InMemoryUnitOfWork<'a> {
    fn add_challenge(&mut self, challenge: ExternalAuthenticationChallenge) {
        self.changes.push(PendingChange::Challenge(challenge));
    }

    fn consume_challenge(&mut self, correlation_id: CorrelationId, at: DateTime<Utc>) {
        self.changes
            .push(PendingChange::ConsumeChallenge(correlation_id, at));
    }

    fn add_grant(&mut self, grant: AuthorizationGrant) {
        self.changes.push(PendingChange::Grant(grant));
    }

    fn add_authorization_code(&mut self, code: AuthorizationCode) {
        self.changes.push(PendingChange::Code(code));
    }

    fn add_refresh_token(&mut self, grant_id: Uuid, token: RefreshToken) {
        self.changes.push(PendingChange::RefreshToken(grant_id, token));
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let store = self.store;
        let staged = self.changes.len();

        let mut first_error = None;
        for change in self.changes {
            if let Err(e) = store.apply(change) {
                tracing::warn!(error = %e, "Staged change could not be applied");
                first_error.get_or_insert(e);
            }
        }

        store.commits.fetch_add(1, Ordering::SeqCst);
        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::debug!(changes = staged, "Unit of work committed");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ChallengeRepository for InMemoryIdentityStore {
    async fn get_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> anyhow::Result<Option<ExternalAuthenticationChallenge>> {
        Ok(self
            .challenges
            .get(&correlation_id)
            .map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl GrantRepository for InMemoryIdentityStore {
    async fn get_grant(
        &self,
        user_id: &UserIdentifier,
        client_application_id: Uuid,
    ) -> anyhow::Result<Option<AuthorizationGrant>> {
        Ok(self
            .grants
            .iter()
            .find(|entry| {
                let grant = entry.value();
                &grant.user_id == user_id
                    && grant.service_application_id == client_application_id
                    && !grant.is_revoked
            })
            .map(|entry| entry.value().clone()))
    }

    async fn get_authorization_code(&self, code: &str) -> anyhow::Result<Option<AuthorizationCode>> {
        Ok(self.codes.get(code).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl UserRepository for InMemoryIdentityStore {
    async fn get_user_identity(&self, id: &UserIdentifier) -> anyhow::Result<Option<OzoneUser>> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl ServiceApplicationRepository for InMemoryIdentityStore {
    async fn get_service_application(&self, id: Uuid) -> anyhow::Result<Option<ServiceApplication>> {
        Ok(self.applications.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_scope(&self, descriptor: &IdentityDescriptor) -> anyhow::Result<Option<Scope>> {
        Ok(self.applications.iter().find_map(|entry| {
            entry
                .value()
                .scopes
                .iter()
                .find(|scope| &scope.descriptor == descriptor)
                .cloned()
        }))
    }

    async fn find_service_action(
        &self,
        descriptor: &IdentityDescriptor,
    ) -> anyhow::Result<Option<ServiceAction>> {
        Ok(self.applications.iter().find_map(|entry| {
            entry
                .value()
                .actions
                .iter()
                .find(|action| &action.descriptor == descriptor)
                .cloned()
        }))
    }
}
