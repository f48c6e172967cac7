use uuid::Uuid;

/// Profile row created exactly once, at account creation. Subscription
/// fields start at the free-tier defaults.
#[derive(Debug, Clone)]
pub struct NewProfile {
    /// Account id assigned by the identity provider.
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

/// Fields a user may edit on their own profile. `None` leaves the stored
/// value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub location: Option<String>,
}
