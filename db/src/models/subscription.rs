use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::SubscriptionTier;

/// Status of one billing-period record in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Canceled,
    Expired,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Canceled => "canceled",
            RecordStatus::Expired => "expired",
        }
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RecordStatus::Active),
            "canceled" => Ok(RecordStatus::Canceled),
            "expired" => Ok(RecordStatus::Expired),
            other => Err(format!("unrecognized record status: {other}")),
        }
    }
}

/// One billing period. History is additive: records are never deleted and
/// `end_date` is never extended — renewal appends a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: RecordStatus,
    pub plan: SubscriptionTier,
    /// Informational only, not validated here.
    pub price: f64,
    pub payment_method: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
