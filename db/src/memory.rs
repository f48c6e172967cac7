//! In-memory [`RecordStore`] — the substitutable fake used by tests.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use common::error::{AppError, Res};

use crate::{
    dtos::{
        profile::{NewProfile, ProfilePatch},
        subscription::NewSubscription,
    },
    models::{
        profile::{SubscriptionCache, UserProfile},
        subscription::{RecordStatus, SubscriptionRecord},
    },
    store::RecordStore,
};

/// Mirrors the semantics of the Postgres adapter: absent profiles are
/// `NotFound`, duplicate inserts fail, mutations stamp `updated_at`.
#[derive(Default)]
pub struct MemoryRecordStore {
    profiles: DashMap<Uuid, UserProfile>,
    subscriptions: DashMap<Uuid, SubscriptionRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    async fn insert_profile(&self, profile: NewProfile) -> Res<UserProfile> {
        if self.profiles.contains_key(&profile.id) {
            return Err(AppError::Transient(format!(
                "profile {} already exists",
                profile.id
            )));
        }
        let now = Utc::now();
        let stored = UserProfile {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            location: None,
            subscription: SubscriptionCache::free(),
            created_at: now,
            updated_at: now,
        };
        self.profiles.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_profile(&self, id: Uuid) -> Res<UserProfile> {
        self.profiles
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("profile {id}")))
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Res<UserProfile> {
        let mut entry = self
            .profiles
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("profile {id}")))?;
        if let Some(full_name) = patch.full_name {
            entry.full_name = Some(full_name);
        }
        if let Some(location) = patch.location {
            entry.location = Some(location);
        }
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }

    async fn set_subscription_cache(&self, id: Uuid, cache: SubscriptionCache) -> Res<UserProfile> {
        let mut entry = self
            .profiles
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("profile {id}")))?;
        entry.subscription = cache;
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }

    async fn insert_subscription(&self, subscription: NewSubscription) -> Res<SubscriptionRecord> {
        let record = SubscriptionRecord {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            status: RecordStatus::Active,
            plan: subscription.plan,
            price: subscription.price,
            payment_method: subscription.payment_method,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            created_at: Utc::now(),
        };
        self.subscriptions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn active_subscription(&self, user_id: Uuid) -> Res<Option<SubscriptionRecord>> {
        Ok(self
            .subscriptions
            .iter()
            .find(|entry| entry.user_id == user_id && entry.status == RecordStatus::Active)
            .map(|entry| entry.value().clone()))
    }

    async fn cancel_active_subscriptions(&self, user_id: Uuid) -> Res<u64> {
        let mut flipped = 0;
        for mut entry in self.subscriptions.iter_mut() {
            if entry.user_id == user_id && entry.status == RecordStatus::Active {
                entry.status = RecordStatus::Canceled;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn list_subscriptions(&self, user_id: Uuid) -> Res<Vec<SubscriptionRecord>> {
        let mut records: Vec<SubscriptionRecord> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::models::profile::{SubscriptionState, SubscriptionTier};

    fn new_profile() -> NewProfile {
        NewProfile {
            id: Uuid::new_v4(),
            email: "farmer@test.com".to_string(),
            full_name: Some("Maria Silva".to_string()),
        }
    }

    #[tokio::test]
    async fn fresh_profiles_start_on_the_free_tier() {
        let store = MemoryRecordStore::new();
        let profile = store.insert_profile(new_profile()).await.unwrap();

        assert_eq!(profile.subscription.tier, SubscriptionTier::Free);
        assert_eq!(profile.subscription.state, SubscriptionState::Active);
        assert!(profile.subscription.expires_at.is_none());
    }

    #[tokio::test]
    async fn duplicate_profile_insert_fails() {
        let store = MemoryRecordStore::new();
        let profile = new_profile();
        store.insert_profile(profile.clone()).await.unwrap();

        assert!(store.insert_profile(profile).await.is_err());
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let store = MemoryRecordStore::new();
        let err = store.get_profile(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn patch_merges_fields_and_bumps_updated_at() {
        let store = MemoryRecordStore::new();
        let created = store.insert_profile(new_profile()).await.unwrap();

        let patch = ProfilePatch {
            location: Some("Chapadão do Sul, MS".to_string()),
            ..Default::default()
        };
        let updated = store.update_profile(created.id, patch).await.unwrap();

        assert_eq!(updated.location.as_deref(), Some("Chapadão do Sul, MS"));
        assert_eq!(updated.full_name, created.full_name);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn history_is_listed_newest_first() {
        let store = MemoryRecordStore::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        for months_ago in [3i64, 1, 2] {
            let start = now - Duration::days(30 * months_ago);
            store
                .insert_subscription(NewSubscription {
                    user_id,
                    plan: SubscriptionTier::Premium,
                    price: 14.90,
                    payment_method: Some("credit_card".to_string()),
                    start_date: start,
                    end_date: start + Duration::days(30),
                })
                .await
                .unwrap();
        }

        let history = store.list_subscriptions(user_id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].start_date > history[1].start_date);
        assert!(history[1].start_date > history[2].start_date);
    }

    #[tokio::test]
    async fn cancel_flips_only_active_records() {
        let store = MemoryRecordStore::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        store
            .insert_subscription(NewSubscription {
                user_id,
                plan: SubscriptionTier::Premium,
                price: 14.90,
                payment_method: None,
                start_date: now,
                end_date: now + Duration::days(30),
            })
            .await
            .unwrap();

        assert_eq!(store.cancel_active_subscriptions(user_id).await.unwrap(), 1);
        assert_eq!(store.cancel_active_subscriptions(user_id).await.unwrap(), 0);
        assert!(
            store
                .active_subscription(user_id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
