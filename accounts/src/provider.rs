//! The [`IdentityProvider`] seam over the hosted auth service.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::error::Res;

/// Identity as reported by the auth service. Distinct from the profile row:
/// this is credential-side data only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Free-form data attached to the identity at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
}

/// A signed-in session as issued by the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

/// Credential and session operations delegated to the external identity
/// provider. Implemented by the hosted REST adapter and by the in-memory
/// fake used in tests.
pub trait IdentityProvider: Send + Sync {
    /// Registers a new identity. The provider owns credential storage and
    /// email uniqueness.
    fn sign_up(
        &self,
        email: String,
        password: String,
        metadata: UserMetadata,
    ) -> impl Future<Output = Res<AuthUser>> + Send + '_;

    fn sign_in_with_password(
        &self,
        email: String,
        password: String,
    ) -> impl Future<Output = Res<AuthSession>> + Send + '_;

    /// Revokes the session behind `access_token`.
    fn sign_out(&self, access_token: String) -> impl Future<Output = Res<()>> + Send + '_;

    /// Resolves the identity behind a token; `None` when the token is
    /// unknown, expired, or revoked.
    fn get_user(
        &self,
        access_token: String,
    ) -> impl Future<Output = Res<Option<AuthUser>>> + Send + '_;
}
