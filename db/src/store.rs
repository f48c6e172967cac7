//! The [`RecordStore`] trait — the persistence seam of the core.
//!
//! Implemented by the Postgres adapter ([`crate::pg`]) and by the in-memory
//! backend ([`crate::memory`]) used in tests. Higher layers depend on this
//! abstraction, never on a concrete backend.

use std::future::Future;

use uuid::Uuid;

use common::error::Res;

use crate::{
    dtos::{
        profile::{NewProfile, ProfilePatch},
        subscription::NewSubscription,
    },
    models::{
        profile::{SubscriptionCache, UserProfile},
        subscription::SubscriptionRecord,
    },
};

/// Keyed access to the two logical tables this core owns: `profiles` (keyed
/// by account id) and `subscriptions` (keyed by generated id, indexed by
/// user and status).
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait RecordStore: Send + Sync {
    // ── Profiles ──────────────────────────────────────────────────────────

    /// Persists the profile row for a freshly created account with the
    /// free-tier defaults. Fails if a profile already exists for the id.
    fn insert_profile(
        &self,
        profile: NewProfile,
    ) -> impl Future<Output = Res<UserProfile>> + Send + '_;

    /// Fetches a profile; an absent row is a `NotFound` error.
    fn get_profile(&self, id: Uuid) -> impl Future<Output = Res<UserProfile>> + Send + '_;

    /// Merges the provided fields into the profile and stamps `updated_at`.
    fn update_profile(
        &self,
        id: Uuid,
        patch: ProfilePatch,
    ) -> impl Future<Output = Res<UserProfile>> + Send + '_;

    /// Overwrites the profile's denormalized subscription cache and stamps
    /// `updated_at`. This is the ledger's profile-sync step.
    fn set_subscription_cache(
        &self,
        id: Uuid,
        cache: SubscriptionCache,
    ) -> impl Future<Output = Res<UserProfile>> + Send + '_;

    // ── Subscriptions ─────────────────────────────────────────────────────

    /// Appends a new billing-period record with `status = active`.
    fn insert_subscription(
        &self,
        subscription: NewSubscription,
    ) -> impl Future<Output = Res<SubscriptionRecord>> + Send + '_;

    /// The record with `status = active` for the user, if any.
    fn active_subscription(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Res<Option<SubscriptionRecord>>> + Send + '_;

    /// Flips every active record for the user to `canceled`; returns how
    /// many were flipped.
    fn cancel_active_subscriptions(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Res<u64>> + Send + '_;

    /// Full billing history for the user, newest first.
    fn list_subscriptions(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Res<Vec<SubscriptionRecord>>> + Send + '_;
}
