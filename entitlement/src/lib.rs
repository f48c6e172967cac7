//! Premium-access evaluation.
//!
//! Pure decision functions: entitlement is recomputed from the profile
//! snapshot and the clock on every check, never cached. The cached status
//! fields can go stale between billing cycles without any write occurring,
//! so the expiry stamp is compared against wall-clock time at query time.

use chrono::{DateTime, Utc};

use db::models::profile::{SubscriptionState, SubscriptionTier, UserProfile};

/// Whether `profile` is entitled to premium features at `now`.
///
/// Decision order matters: a cancelled or downgraded subscription denies
/// access even while its expiry stamp is still in the future, and a missing
/// stamp on an otherwise premium profile is a non-expiring grant.
pub fn has_premium_access_at(profile: &UserProfile, now: DateTime<Utc>) -> bool {
    let subscription = &profile.subscription;
    if subscription.tier != SubscriptionTier::Premium {
        return false;
    }
    if subscription.state != SubscriptionState::Active {
        return false;
    }
    match subscription.expires_at {
        None => true,
        Some(expires_at) => expires_at > now,
    }
}

/// [`has_premium_access_at`] against the current wall-clock time.
pub fn has_premium_access(profile: &UserProfile) -> bool {
    has_premium_access_at(profile, Utc::now())
}
