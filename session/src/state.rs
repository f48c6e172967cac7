use db::models::profile::UserProfile;

/// Point-in-time view of the session, as exposed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// The stored session is still being resolved.
    Loading,
    /// No session. `config_missing` distinguishes a backend that is
    /// unreachable by design from an ordinary signed-out state, so the UI
    /// can show a setup warning instead of a login form.
    Unauthenticated { config_missing: bool },
    /// Signed in, with the entitlement computed from the freshest profile.
    Authenticated {
        profile: UserProfile,
        has_premium: bool,
    },
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn has_premium(&self) -> bool {
        matches!(
            self,
            SessionState::Authenticated {
                has_premium: true,
                ..
            }
        )
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated { profile, .. } => Some(profile),
            _ => None,
        }
    }
}

/// Session-change notifications reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    TokenRefreshed,
    SignedOut,
}
