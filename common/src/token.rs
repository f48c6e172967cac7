use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, Res};

/// Claims carried by a provider-issued access token.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessClaims {
    /// Account id the token was issued for.
    pub sub: Uuid,
    pub email: Option<String>,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

impl AccessClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }
}

/// Decodes the claims segment of an access token without verifying the
/// signature. The signing secret never leaves the hosted service, so this
/// client can only inspect the payload; authorization decisions stay with
/// the backend.
pub fn peek_claims(token: &str) -> Res<AccessClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AppError::Auth("Malformed access token".to_string()))?;
    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AppError::Auth("Malformed access token".to_string()))?;
    serde_json::from_slice(&raw).map_err(|_| AppError::Auth("Malformed access token".to_string()))
}
