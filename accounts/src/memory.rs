//! In-memory [`IdentityProvider`] — the substitutable fake used by tests
//! and local development.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

use common::error::{AppError, Res};

use crate::provider::{AuthSession, AuthUser, IdentityProvider, UserMetadata};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone)]
struct StoredAccount {
    id: Uuid,
    password: String,
    metadata: UserMetadata,
}

/// Accounts keyed by lowercased email. Issued tokens are unsigned JWTs so
/// `common::token::peek_claims` works against this fake exactly as it does
/// against the hosted service.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    accounts: DashMap<String, StoredAccount>,
    sessions: DashMap<String, Uuid>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a token with an explicit expiry; lets tests fabricate an
    /// already-expired session.
    pub fn issue_token(user_id: Uuid, email: &str, expires_at: DateTime<Utc>) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = serde_json::json!({
            "sub": user_id,
            "email": email,
            "exp": expires_at.timestamp(),
        });
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.")
    }

    fn auth_user(account: &StoredAccount, email: &str) -> AuthUser {
        AuthUser {
            id: account.id,
            email: email.to_string(),
            user_metadata: account.metadata.clone(),
        }
    }

    fn open_session(&self, account: &StoredAccount, email: &str) -> AuthSession {
        let token = Self::issue_token(account.id, email, Utc::now() + Duration::hours(1));
        self.sessions.insert(token.clone(), account.id);
        AuthSession {
            access_token: token,
            user: Self::auth_user(account, email),
        }
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_up(
        &self,
        email: String,
        password: String,
        metadata: UserMetadata,
    ) -> Res<AuthUser> {
        let email = email.trim().to_lowercase();
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Auth(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        match self.accounts.entry(email.clone()) {
            Entry::Occupied(_) => Err(AppError::Auth("User already registered".to_string())),
            Entry::Vacant(slot) => {
                let account = StoredAccount {
                    id: Uuid::new_v4(),
                    password,
                    metadata,
                };
                let user = Self::auth_user(&account, &email);
                slot.insert(account);
                Ok(user)
            }
        }
    }

    async fn sign_in_with_password(&self, email: String, password: String) -> Res<AuthSession> {
        let email = email.trim().to_lowercase();
        let account = self
            .accounts
            .get(&email)
            .ok_or_else(|| AppError::Auth("Invalid login credentials".to_string()))?;
        if account.password != password {
            return Err(AppError::Auth("Invalid login credentials".to_string()));
        }
        Ok(self.open_session(account.value(), &email))
    }

    async fn sign_out(&self, access_token: String) -> Res<()> {
        self.sessions.remove(&access_token);
        Ok(())
    }

    async fn get_user(&self, access_token: String) -> Res<Option<AuthUser>> {
        let Some(user_id) = self.sessions.get(&access_token).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self
            .accounts
            .iter()
            .find(|entry| entry.value().id == user_id)
            .map(|entry| Self::auth_user(entry.value(), entry.key())))
    }
}
