use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::profile::SubscriptionTier;

/// A new billing period to append to the ledger. The stored record always
/// starts out `active`.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan: SubscriptionTier,
    pub price: f64,
    pub payment_method: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}
