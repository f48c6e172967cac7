//! The session manager: owns the current-session lifecycle and exposes the
//! resolved entitlement to the rest of the application.

use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use accounts::{AccountStore, provider::IdentityProvider};
use common::{
    error::{AppError, Res},
    token,
};
use db::{
    dtos::profile::ProfilePatch,
    models::{
        profile::{SubscriptionTier, UserProfile},
        subscription::SubscriptionRecord,
    },
    store::RecordStore,
};
use ledger::SubscriptionLedger;

use crate::state::{AuthEvent, SessionState};

const DEFAULT_PAYMENT_METHOD: &str = "credit_card";

struct SessionBackend<P, R> {
    accounts: AccountStore<P, R>,
    ledger: SubscriptionLedger<R>,
}

/// Single-session state machine: `Loading` → `Unauthenticated` or
/// `Authenticated`, and back to `Unauthenticated` on sign-out or session
/// invalidation. State lives in a watch channel so the presentation layer
/// can follow transitions without polling.
pub struct SessionManager<P, R> {
    backend: Option<SessionBackend<P, R>>,
    state: watch::Sender<SessionState>,
    access_token: Mutex<Option<String>>,
    // Monotonic sign-in attempt counter; see `begin_attempt`.
    attempt: AtomicU64,
}

impl<P: IdentityProvider, R: RecordStore> SessionManager<P, R> {
    pub fn new(accounts: AccountStore<P, R>, ledger: SubscriptionLedger<R>) -> Self {
        Self::build(Some(SessionBackend { accounts, ledger }))
    }

    /// For deployments whose backend settings are absent: starts directly
    /// in `Unauthenticated { config_missing: true }` and every operation
    /// short-circuits with a configuration error, without any network
    /// attempt.
    pub fn unconfigured() -> Self {
        Self::build(None)
    }

    fn build(backend: Option<SessionBackend<P, R>>) -> Self {
        let initial = match backend {
            Some(_) => SessionState::Loading,
            None => {
                log::warn!("backend not configured; identity operations are disabled");
                SessionState::Unauthenticated {
                    config_missing: true,
                }
            }
        };
        let (state, _) = watch::channel(initial);
        Self {
            backend,
            state,
            access_token: Mutex::new(None),
            attempt: AtomicU64::new(0),
        }
    }

    fn backend(&self) -> Res<&SessionBackend<P, R>> {
        self.backend.as_ref().ok_or_else(|| {
            AppError::Configuration("SERVICE_URL and SERVICE_KEY are not set".to_string())
        })
    }

    /// Current snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Follow state transitions (sign-in, sign-out, entitlement changes).
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Resolves the stored session, if any, moving out of `Loading`.
    ///
    /// The token's expiry is peeked locally first; a dead or malformed
    /// token lands in `Unauthenticated` without a network round trip.
    pub async fn restore(&self, stored_token: Option<String>) -> Res<()> {
        let backend = self.backend()?;

        let Some(token) = stored_token else {
            self.set_unauthenticated();
            return Ok(());
        };

        let claims = match token::peek_claims(&token) {
            Ok(claims) => claims,
            Err(_) => {
                self.set_unauthenticated();
                return Ok(());
            }
        };
        if claims.is_expired(Utc::now()) {
            log::debug!("stored session for {} has expired", claims.sub);
            self.set_unauthenticated();
            return Ok(());
        }

        match backend.accounts.current_user(token.clone()).await {
            Ok(Some(user)) => {
                *self.access_token.lock().unwrap() = Some(token);
                self.load_profile(user.id).await
            }
            Ok(None) => {
                self.set_unauthenticated();
                Ok(())
            }
            Err(err) => {
                // A failed restore must not leave the UI stuck on Loading.
                self.set_unauthenticated();
                Err(err)
            }
        }
    }

    /// Authenticates and loads the profile + entitlement.
    ///
    /// When several attempts overlap, only the most recently initiated one
    /// may write session state; earlier responses are discarded.
    pub async fn sign_in(&self, email: String, password: String) -> Res<()> {
        let backend = self.backend()?;
        let attempt = self.begin_attempt();

        let session = backend.accounts.authenticate(email, password).await?;
        if self.is_stale(attempt) {
            log::debug!("discarding stale sign-in response for {}", session.user.id);
            return Ok(());
        }

        self.open_session(session.access_token, session.user.id)
            .await
    }

    /// Creates the account (identity + free-tier profile) and signs in.
    pub async fn sign_up(
        &self,
        email: String,
        password: String,
        full_name: Option<String>,
    ) -> Res<()> {
        let backend = self.backend()?;
        let attempt = self.begin_attempt();

        backend
            .accounts
            .create_account(email.clone(), password.clone(), full_name)
            .await?;
        let session = backend.accounts.authenticate(email, password).await?;
        if self.is_stale(attempt) {
            return Ok(());
        }

        self.open_session(session.access_token, session.user.id)
            .await
    }

    /// Signs out. Local teardown is unconditional and infallible: the
    /// in-memory session never stays authenticated against the user's
    /// intent, even when the revocation call fails.
    pub async fn sign_out(&self) {
        let token = self.teardown_local_session();

        if let (Some(backend), Some(token)) = (self.backend.as_ref(), token) {
            if let Err(err) = backend.accounts.end_session(token).await {
                log::warn!("remote sign-out failed: {}", err);
            }
        }
    }

    /// Refetches the profile and recomputes the entitlement. A session the
    /// provider no longer recognizes tears down locally.
    pub async fn refresh(&self) -> Res<()> {
        let backend = self.backend()?;
        let token = self.access_token.lock().unwrap().clone();
        let Some(token) = token else {
            self.set_unauthenticated();
            return Ok(());
        };

        match backend.accounts.current_user(token).await? {
            Some(user) => self.load_profile(user.id).await,
            None => {
                self.teardown_local_session();
                Ok(())
            }
        }
    }

    /// External session-change notifications from the identity provider.
    pub async fn handle_auth_event(&self, event: AuthEvent) -> Res<()> {
        match event {
            AuthEvent::SignedIn | AuthEvent::TokenRefreshed => self.refresh().await,
            AuthEvent::SignedOut => {
                self.teardown_local_session();
                Ok(())
            }
        }
    }

    // ── Profile & subscription operations ─────────────────────────────────

    /// Edits the signed-in profile and refreshes the entitlement from the
    /// result.
    pub async fn update_profile(&self, patch: ProfilePatch) -> Res<UserProfile> {
        let backend = self.backend()?;
        let user_id = self.authenticated_user()?;
        let profile = backend.accounts.update_profile(user_id, patch).await?;
        self.apply_profile(profile.clone());
        Ok(profile)
    }

    /// Opens a premium subscription for the signed-in user. The ledger
    /// write, including its profile-cache sync, completes before the
    /// entitlement refresh runs, so the new access is visible immediately.
    pub async fn subscribe_premium(
        &self,
        payment_method: Option<String>,
    ) -> Res<SubscriptionRecord> {
        let backend = self.backend()?;
        let user_id = self.authenticated_user()?;
        let record = backend
            .ledger
            .create_subscription(
                user_id,
                SubscriptionTier::Premium,
                payment_method.unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            )
            .await?;
        self.load_profile(user_id).await?;
        Ok(record)
    }

    /// Cancels the signed-in user's subscription; access is revoked
    /// immediately, not at period end.
    pub async fn cancel_premium(&self) -> Res<()> {
        let backend = self.backend()?;
        let user_id = self.authenticated_user()?;
        backend.ledger.cancel_subscription(user_id).await?;
        self.load_profile(user_id).await
    }

    pub async fn subscription_history(&self) -> Res<Vec<SubscriptionRecord>> {
        let backend = self.backend()?;
        let user_id = self.authenticated_user()?;
        backend.ledger.list_history(user_id).await
    }

    // ── Internals ─────────────────────────────────────────────────────────

    async fn open_session(&self, access_token: String, user_id: Uuid) -> Res<()> {
        *self.access_token.lock().unwrap() = Some(access_token);
        if let Err(err) = self.load_profile(user_id).await {
            // A token without a session is self-contradictory; tear down.
            self.teardown_local_session();
            return Err(err);
        }
        Ok(())
    }

    async fn load_profile(&self, user_id: Uuid) -> Res<()> {
        let backend = self.backend()?;
        let profile = backend.accounts.get_profile(user_id).await?;
        self.apply_profile(profile);
        Ok(())
    }

    fn apply_profile(&self, profile: UserProfile) {
        let has_premium = entitlement::has_premium_access(&profile);
        self.state.send_replace(SessionState::Authenticated {
            profile,
            has_premium,
        });
    }

    fn authenticated_user(&self) -> Res<Uuid> {
        match &*self.state.borrow() {
            SessionState::Authenticated { profile, .. } => Ok(profile.id),
            _ => Err(AppError::Auth("No active session".to_string())),
        }
    }

    fn set_unauthenticated(&self) {
        self.state.send_replace(SessionState::Unauthenticated {
            config_missing: false,
        });
    }

    fn teardown_local_session(&self) -> Option<String> {
        // Bumping the counter also invalidates any in-flight attempt.
        self.attempt.fetch_add(1, Ordering::SeqCst);
        let token = self.access_token.lock().unwrap().take();
        self.set_unauthenticated();
        token
    }

    fn begin_attempt(&self) -> u64 {
        self.attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_stale(&self, attempt: u64) -> bool {
        self.attempt.load(Ordering::SeqCst) != attempt
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use accounts::{
        memory::MemoryIdentityProvider,
        provider::{AuthSession, AuthUser, UserMetadata},
    };
    use db::memory::MemoryRecordStore;

    use super::*;

    const PASSWORD: &str = "plantio2024";

    struct Fixture {
        provider: Arc<MemoryIdentityProvider>,
        records: Arc<MemoryRecordStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                provider: Arc::new(MemoryIdentityProvider::new()),
                records: Arc::new(MemoryRecordStore::new()),
            }
        }

        fn accounts(&self) -> AccountStore<MemoryIdentityProvider, MemoryRecordStore> {
            AccountStore::new(Arc::clone(&self.provider), Arc::clone(&self.records))
        }

        fn manager(&self) -> SessionManager<MemoryIdentityProvider, MemoryRecordStore> {
            SessionManager::new(
                self.accounts(),
                SubscriptionLedger::new(Arc::clone(&self.records)),
            )
        }
    }

    #[tokio::test]
    async fn unconfigured_backend_short_circuits() {
        let manager = SessionManager::<MemoryIdentityProvider, MemoryRecordStore>::unconfigured();
        assert_eq!(
            manager.state(),
            SessionState::Unauthenticated {
                config_missing: true
            }
        );

        let err = manager
            .sign_in("farmer@test.com".to_string(), PASSWORD.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        let err = manager.restore(None).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn starts_loading_and_restores_to_unauthenticated() {
        let fixture = Fixture::new();
        let manager = fixture.manager();
        assert_eq!(manager.state(), SessionState::Loading);

        manager.restore(None).await.unwrap();
        assert_eq!(
            manager.state(),
            SessionState::Unauthenticated {
                config_missing: false
            }
        );
    }

    #[tokio::test]
    async fn sign_up_lands_on_the_free_tier() {
        let fixture = Fixture::new();
        let manager = fixture.manager();

        manager
            .sign_up(
                "farmer@test.com".to_string(),
                PASSWORD.to_string(),
                Some("Maria Silva".to_string()),
            )
            .await
            .unwrap();

        let state = manager.state();
        assert!(state.is_authenticated());
        assert!(!state.has_premium());
        assert_eq!(state.profile().unwrap().email, "farmer@test.com");
    }

    #[tokio::test]
    async fn subscribing_grants_premium_until_period_end() {
        let fixture = Fixture::new();
        let manager = fixture.manager();
        manager
            .sign_up("farmer@test.com".to_string(), PASSWORD.to_string(), None)
            .await
            .unwrap();

        let record = manager.subscribe_premium(None).await.unwrap();

        let state = manager.state();
        assert!(state.has_premium());
        let profile = state.profile().unwrap();
        assert_eq!(profile.subscription.expires_at, Some(record.end_date));
        assert_eq!(record.payment_method.as_deref(), Some("credit_card"));

        let history = manager.subscription_history().await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn cancelling_revokes_access_immediately() {
        let fixture = Fixture::new();
        let manager = fixture.manager();
        manager
            .sign_up("farmer@test.com".to_string(), PASSWORD.to_string(), None)
            .await
            .unwrap();
        manager.subscribe_premium(None).await.unwrap();

        manager.cancel_premium().await.unwrap();

        let state = manager.state();
        assert!(state.is_authenticated());
        assert!(!state.has_premium());
        // the stamp is still in the future; status decides
        let profile = state.profile().unwrap();
        assert!(profile.subscription.expires_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn watchers_follow_entitlement_transitions() {
        let fixture = Fixture::new();
        let manager = fixture.manager();
        let mut watcher = manager.subscribe();

        manager
            .sign_up("farmer@test.com".to_string(), PASSWORD.to_string(), None)
            .await
            .unwrap();
        watcher.changed().await.unwrap();
        assert!(watcher.borrow_and_update().is_authenticated());

        manager.subscribe_premium(None).await.unwrap();
        watcher.changed().await.unwrap();
        assert!(watcher.borrow_and_update().has_premium());
    }

    struct FlakySignOut {
        inner: Arc<MemoryIdentityProvider>,
    }

    impl IdentityProvider for FlakySignOut {
        async fn sign_up(
            &self,
            email: String,
            password: String,
            metadata: UserMetadata,
        ) -> Res<AuthUser> {
            self.inner.sign_up(email, password, metadata).await
        }
        async fn sign_in_with_password(&self, email: String, password: String) -> Res<AuthSession> {
            self.inner.sign_in_with_password(email, password).await
        }
        async fn sign_out(&self, _access_token: String) -> Res<()> {
            Err(AppError::Transient("network unreachable".to_string()))
        }
        async fn get_user(&self, access_token: String) -> Res<Option<AuthUser>> {
            self.inner.get_user(access_token).await
        }
    }

    #[tokio::test]
    async fn sign_out_clears_local_state_even_when_revocation_fails() {
        let fixture = Fixture::new();
        let provider = Arc::new(FlakySignOut {
            inner: Arc::clone(&fixture.provider),
        });
        let accounts = AccountStore::new(provider, Arc::clone(&fixture.records));
        let manager = SessionManager::new(
            accounts,
            SubscriptionLedger::new(Arc::clone(&fixture.records)),
        );

        manager
            .sign_up("farmer@test.com".to_string(), PASSWORD.to_string(), None)
            .await
            .unwrap();
        assert!(manager.state().is_authenticated());

        manager.sign_out().await;
        assert_eq!(
            manager.state(),
            SessionState::Unauthenticated {
                config_missing: false
            }
        );
    }

    struct DelayedSignIn {
        inner: Arc<MemoryIdentityProvider>,
        slow_email: String,
        delay: StdDuration,
    }

    impl IdentityProvider for DelayedSignIn {
        async fn sign_up(
            &self,
            email: String,
            password: String,
            metadata: UserMetadata,
        ) -> Res<AuthUser> {
            self.inner.sign_up(email, password, metadata).await
        }
        async fn sign_in_with_password(&self, email: String, password: String) -> Res<AuthSession> {
            if email == self.slow_email {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.sign_in_with_password(email, password).await
        }
        async fn sign_out(&self, access_token: String) -> Res<()> {
            self.inner.sign_out(access_token).await
        }
        async fn get_user(&self, access_token: String) -> Res<Option<AuthUser>> {
            self.inner.get_user(access_token).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_latest_sign_in_attempt_wins() {
        let fixture = Fixture::new();
        let setup = fixture.accounts();
        setup
            .create_account("slow@test.com".to_string(), PASSWORD.to_string(), None)
            .await
            .unwrap();
        setup
            .create_account("fast@test.com".to_string(), PASSWORD.to_string(), None)
            .await
            .unwrap();

        let provider = Arc::new(DelayedSignIn {
            inner: Arc::clone(&fixture.provider),
            slow_email: "slow@test.com".to_string(),
            delay: StdDuration::from_secs(5),
        });
        let accounts = AccountStore::new(provider, Arc::clone(&fixture.records));
        let manager = SessionManager::new(
            accounts,
            SubscriptionLedger::new(Arc::clone(&fixture.records)),
        );

        let slow = manager.sign_in("slow@test.com".to_string(), PASSWORD.to_string());
        let fast = async {
            tokio::time::sleep(StdDuration::from_secs(1)).await;
            manager
                .sign_in("fast@test.com".to_string(), PASSWORD.to_string())
                .await
        };
        let (slow_result, fast_result) = tokio::join!(slow, fast);
        slow_result.unwrap();
        fast_result.unwrap();

        // the slow response arrived last but was initiated first: discarded
        assert_eq!(manager.state().profile().unwrap().email, "fast@test.com");
    }

    #[tokio::test]
    async fn restore_rejects_an_expired_token_locally() {
        let fixture = Fixture::new();
        let profile = fixture
            .accounts()
            .create_account("farmer@test.com".to_string(), PASSWORD.to_string(), None)
            .await
            .unwrap();
        let manager = fixture.manager();

        let dead_token = MemoryIdentityProvider::issue_token(
            profile.id,
            &profile.email,
            Utc::now() - Duration::hours(2),
        );
        manager.restore(Some(dead_token)).await.unwrap();
        assert_eq!(
            manager.state(),
            SessionState::Unauthenticated {
                config_missing: false
            }
        );
    }

    #[tokio::test]
    async fn restore_resumes_a_live_session() {
        let fixture = Fixture::new();
        let setup = fixture.accounts();
        setup
            .create_account("farmer@test.com".to_string(), PASSWORD.to_string(), None)
            .await
            .unwrap();
        let session = setup
            .authenticate("farmer@test.com".to_string(), PASSWORD.to_string())
            .await
            .unwrap();

        let manager = fixture.manager();
        manager.restore(Some(session.access_token)).await.unwrap();
        assert!(manager.state().is_authenticated());
    }

    #[tokio::test]
    async fn provider_reported_sign_out_tears_down() {
        let fixture = Fixture::new();
        let manager = fixture.manager();
        manager
            .sign_up("farmer@test.com".to_string(), PASSWORD.to_string(), None)
            .await
            .unwrap();

        manager.handle_auth_event(AuthEvent::SignedOut).await.unwrap();
        assert_eq!(
            manager.state(),
            SessionState::Unauthenticated {
                config_missing: false
            }
        );
    }

    #[tokio::test]
    async fn editing_the_profile_updates_session_state() {
        let fixture = Fixture::new();
        let manager = fixture.manager();
        manager
            .sign_up("farmer@test.com".to_string(), PASSWORD.to_string(), None)
            .await
            .unwrap();

        manager
            .update_profile(ProfilePatch {
                location: Some("Rio Verde, GO".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(
            manager.state().profile().unwrap().location.as_deref(),
            Some("Rio Verde, GO")
        );
    }

    #[tokio::test]
    async fn authentication_without_a_profile_row_tears_down() {
        let fixture = Fixture::new();
        // identity exists but its profile row was never created
        fixture
            .provider
            .sign_up(
                "ghost@test.com".to_string(),
                PASSWORD.to_string(),
                UserMetadata::default(),
            )
            .await
            .unwrap();
        let manager = fixture.manager();

        let err = manager
            .sign_in("ghost@test.com".to_string(), PASSWORD.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(
            manager.state(),
            SessionState::Unauthenticated {
                config_missing: false
            }
        );
    }
}
