//! The account service: hosted identity plus the local profile row.

use std::sync::Arc;

use uuid::Uuid;

use common::error::{AppError, Res};
use db::{
    dtos::profile::{NewProfile, ProfilePatch},
    models::profile::UserProfile,
    store::RecordStore,
};

use crate::provider::{AuthSession, AuthUser, IdentityProvider, UserMetadata};

/// Account operations consumed by the session manager. Both collaborators
/// are injected so tests can substitute fakes.
pub struct AccountStore<P, R> {
    provider: Arc<P>,
    records: Arc<R>,
}

impl<P, R> Clone for AccountStore<P, R> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            records: Arc::clone(&self.records),
        }
    }
}

impl<P: IdentityProvider, R: RecordStore> AccountStore<P, R> {
    pub fn new(provider: Arc<P>, records: Arc<R>) -> Self {
        Self { provider, records }
    }

    /// Registers the identity and creates the matching profile row with the
    /// free-tier defaults. Profile creation happens exactly once, here. An
    /// identity whose profile insert failed is reported as a partial
    /// failure so it can be reconciled, not as a clean rejection.
    pub async fn create_account(
        &self,
        email: String,
        password: String,
        full_name: Option<String>,
    ) -> Res<UserProfile> {
        let email = email.trim().to_lowercase();
        let user = self
            .provider
            .sign_up(
                email,
                password,
                UserMetadata {
                    full_name: full_name.clone(),
                },
            )
            .await?;

        let profile = self
            .records
            .insert_profile(NewProfile {
                id: user.id,
                email: user.email,
                full_name,
            })
            .await
            .map_err(|err| {
                AppError::partial(
                    "create_account",
                    format!(
                        "identity {} created but profile insert failed: {}",
                        user.id, err
                    ),
                )
            })?;

        log::info!("account created for {}", profile.id);
        Ok(profile)
    }

    pub async fn authenticate(&self, email: String, password: String) -> Res<AuthSession> {
        self.provider
            .sign_in_with_password(email.trim().to_lowercase(), password)
            .await
    }

    pub async fn get_profile(&self, account_id: Uuid) -> Res<UserProfile> {
        self.records.get_profile(account_id).await
    }

    pub async fn update_profile(&self, account_id: Uuid, patch: ProfilePatch) -> Res<UserProfile> {
        self.records.update_profile(account_id, patch).await
    }

    pub async fn end_session(&self, access_token: String) -> Res<()> {
        self.provider.sign_out(access_token).await
    }

    /// Resolves the identity behind a stored token.
    pub async fn current_user(&self, access_token: String) -> Res<Option<AuthUser>> {
        self.provider.get_user(access_token).await
    }
}
