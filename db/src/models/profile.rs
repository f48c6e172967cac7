use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entitlement tier. Doubles as the `plan` of a subscription record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
        }
    }
}

impl std::str::FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionTier::Free),
            "premium" => Ok(SubscriptionTier::Premium),
            other => Err(format!("unrecognized subscription tier: {other}")),
        }
    }
}

/// Lifecycle state of the profile's subscription cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Active,
    Inactive,
    Cancelled,
}

impl SubscriptionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionState::Active => "active",
            SubscriptionState::Inactive => "inactive",
            SubscriptionState::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for SubscriptionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionState::Active),
            "inactive" => Ok(SubscriptionState::Inactive),
            "cancelled" => Ok(SubscriptionState::Cancelled),
            other => Err(format!("unrecognized subscription state: {other}")),
        }
    }
}

/// Denormalized view of the user's current subscription, cached on the
/// profile. The subscription ledger is the source of truth; every adapter
/// normalizes into this shape at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionCache {
    pub tier: SubscriptionTier,
    pub state: SubscriptionState,
    /// When set, premium access lapses at this instant even while the
    /// cached state still says active. Absent means a non-expiring grant.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubscriptionCache {
    /// The cache every profile starts with.
    pub fn free() -> Self {
        SubscriptionCache {
            tier: SubscriptionTier::Free,
            state: SubscriptionState::Active,
            expires_at: None,
        }
    }
}

/// Durable per-user record. Credentials live with the identity provider;
/// this row carries display data and the subscription cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    /// Login identifier, stored lowercased.
    pub email: String,
    pub full_name: Option<String>,
    /// Free-text region descriptor, user-editable at any time.
    pub location: Option<String>,
    pub subscription: SubscriptionCache,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
