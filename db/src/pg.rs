//! Postgres implementation of [`RecordStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use common::error::{AppError, Res};

use crate::{
    dtos::{
        profile::{NewProfile, ProfilePatch},
        subscription::NewSubscription,
    },
    models::{
        profile::{SubscriptionCache, UserProfile},
        subscription::SubscriptionRecord,
    },
    store::RecordStore,
};

const PROFILE_COLUMNS: &str = "id, email, full_name, location, subscription_tier, \
     subscription_state, subscription_expires_at, created_at, updated_at";

const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, status, plan, price, payment_method, start_date, end_date, created_at";

/// A record store backed by the shared Postgres pool from [`crate::setup`].
///
/// Cloning is cheap; the pool is reference-counted.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: Arc<PgPool>,
}

impl PgRecordStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

// Rows come back string-typed and are normalized into the canonical model
// here; unparseable values indicate a corrupt row and surface as transient.
#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    email: String,
    full_name: Option<String>,
    location: Option<String>,
    subscription_tier: String,
    subscription_state: String,
    subscription_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> Res<Self> {
        Ok(UserProfile {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            location: row.location,
            subscription: SubscriptionCache {
                tier: row.subscription_tier.parse().map_err(AppError::Transient)?,
                state: row
                    .subscription_state
                    .parse()
                    .map_err(AppError::Transient)?,
                expires_at: row.subscription_expires_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    status: String,
    plan: String,
    price: f64,
    payment_method: Option<String>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = AppError;

    fn try_from(row: SubscriptionRow) -> Res<Self> {
        Ok(SubscriptionRecord {
            id: row.id,
            user_id: row.user_id,
            status: row.status.parse().map_err(AppError::Transient)?,
            plan: row.plan.parse().map_err(AppError::Transient)?,
            price: row.price,
            payment_method: row.payment_method,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
        })
    }
}

impl RecordStore for PgRecordStore {
    async fn insert_profile(&self, profile: NewProfile) -> Res<UserProfile> {
        let sql = format!(
            "INSERT INTO profiles (id, email, full_name) VALUES ($1, $2, $3) \
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(profile.id)
            .bind(profile.email)
            .bind(profile.full_name)
            .fetch_one(&*self.pool)
            .await?;
        row.try_into()
    }

    async fn get_profile(&self, id: Uuid) -> Res<UserProfile> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(id)
            .fetch_one(&*self.pool)
            .await?;
        row.try_into()
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> Res<UserProfile> {
        let sql = format!(
            "UPDATE profiles SET \
                 full_name = COALESCE($2, full_name), \
                 location = COALESCE($3, location), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(id)
            .bind(patch.full_name)
            .bind(patch.location)
            .fetch_one(&*self.pool)
            .await?;
        row.try_into()
    }

    async fn set_subscription_cache(&self, id: Uuid, cache: SubscriptionCache) -> Res<UserProfile> {
        let sql = format!(
            "UPDATE profiles SET \
                 subscription_tier = $2, \
                 subscription_state = $3, \
                 subscription_expires_at = $4, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(id)
            .bind(cache.tier.as_str())
            .bind(cache.state.as_str())
            .bind(cache.expires_at)
            .fetch_one(&*self.pool)
            .await?;
        row.try_into()
    }

    async fn insert_subscription(&self, subscription: NewSubscription) -> Res<SubscriptionRecord> {
        let sql = format!(
            "INSERT INTO subscriptions \
                 (user_id, status, plan, price, payment_method, start_date, end_date) \
             VALUES ($1, 'active', $2, $3, $4, $5, $6) \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(subscription.user_id)
            .bind(subscription.plan.as_str())
            .bind(subscription.price)
            .bind(subscription.payment_method)
            .bind(subscription.start_date)
            .bind(subscription.end_date)
            .fetch_one(&*self.pool)
            .await?;
        row.try_into()
    }

    async fn active_subscription(&self, user_id: Uuid) -> Res<Option<SubscriptionRecord>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 AND status = 'active'"
        );
        let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(user_id)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn cancel_active_subscriptions(&self, user_id: Uuid) -> Res<u64> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = 'canceled' \
             WHERE user_id = $1 AND status = 'active'",
        )
        .bind(user_id)
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_subscriptions(&self, user_id: Uuid) -> Res<Vec<SubscriptionRecord>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 \
             ORDER BY start_date DESC"
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(user_id)
            .fetch_all(&*self.pool)
            .await?;
        rows.into_iter().map(SubscriptionRecord::try_from).collect()
    }
}
