//! The subscription ledger: the append-only history of billing periods.
//!
//! The profile's subscription fields are a denormalized cache of this
//! history; every mutation here resyncs the cache in the same call so a
//! subsequent profile fetch reflects the new state. A cache write that
//! fails after the ledger write succeeded leaves the two out of step and is
//! reported as a partial failure, never as a clean one.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use uuid::Uuid;

use common::error::{AppError, Res};
use db::{
    dtos::subscription::NewSubscription,
    models::{
        profile::{SubscriptionCache, SubscriptionState, SubscriptionTier},
        subscription::SubscriptionRecord,
    },
    store::RecordStore,
};

/// Monthly price of the premium plan, in BRL.
pub const PREMIUM_MONTHLY_PRICE: f64 = 14.90;

fn plan_price(plan: SubscriptionTier) -> f64 {
    match plan {
        SubscriptionTier::Free => 0.0,
        SubscriptionTier::Premium => PREMIUM_MONTHLY_PRICE,
    }
}

fn one_month_after(start: DateTime<Utc>) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(1))
        .expect("valid timestamp")
}

pub struct SubscriptionLedger<R> {
    records: Arc<R>,
}

impl<R> Clone for SubscriptionLedger<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<R: RecordStore> SubscriptionLedger<R> {
    pub fn new(records: Arc<R>) -> Self {
        Self { records }
    }

    /// Opens a one-calendar-month billing period for the user and syncs the
    /// profile cache to it.
    ///
    /// Any still-active period is superseded first, so at most one record
    /// per user is ever `active`.
    pub async fn create_subscription(
        &self,
        user_id: Uuid,
        plan: SubscriptionTier,
        payment_method: String,
    ) -> Res<SubscriptionRecord> {
        let superseded = self.records.cancel_active_subscriptions(user_id).await?;
        if superseded > 0 {
            log::info!(
                "superseded {} active subscription(s) for {}",
                superseded,
                user_id
            );
        }

        let start_date = Utc::now();
        let record = self
            .records
            .insert_subscription(NewSubscription {
                user_id,
                plan,
                price: plan_price(plan),
                payment_method: Some(payment_method),
                start_date,
                end_date: one_month_after(start_date),
            })
            .await?;

        self.records
            .set_subscription_cache(
                user_id,
                SubscriptionCache {
                    tier: plan,
                    state: SubscriptionState::Active,
                    expires_at: Some(record.end_date),
                },
            )
            .await
            .map_err(|err| {
                AppError::partial(
                    "create_subscription",
                    format!(
                        "subscription {} recorded but profile sync failed: {}",
                        record.id, err
                    ),
                )
            })?;

        log::info!("subscription {} opened for {}", record.id, user_id);
        Ok(record)
    }

    /// Flips the user's active period to `canceled` and drops the profile
    /// cache back to the free tier.
    ///
    /// Idempotent: with no active period this still succeeds, and the cache
    /// is rewritten to free regardless in case it had gone stale. The
    /// expiry stamp is kept as-is; access is decided status-first, so an
    /// unexpired stamp no longer grants anything.
    pub async fn cancel_subscription(&self, user_id: Uuid) -> Res<()> {
        let flipped = self.records.cancel_active_subscriptions(user_id).await?;
        if flipped == 0 {
            log::debug!("no active subscription for {}; cancel is a no-op", user_id);
        }

        let partial = |err: AppError| {
            AppError::partial(
                "cancel_subscription",
                format!(
                    "{} record(s) canceled but profile sync failed: {}",
                    flipped, err
                ),
            )
        };

        let profile = self.records.get_profile(user_id).await.map_err(partial)?;
        self.records
            .set_subscription_cache(
                user_id,
                SubscriptionCache {
                    tier: SubscriptionTier::Free,
                    state: SubscriptionState::Cancelled,
                    expires_at: profile.subscription.expires_at,
                },
            )
            .await
            .map_err(partial)?;

        Ok(())
    }

    /// The user's billing history, newest first.
    pub async fn list_history(&self, user_id: Uuid) -> Res<Vec<SubscriptionRecord>> {
        self.records.list_subscriptions(user_id).await
    }
}
