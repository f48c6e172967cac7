//! reqwest adapter for the hosted identity service.

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use common::{
    env_config::BackendConfig,
    error::{AppError, Res},
};

use crate::provider::{AuthSession, AuthUser, IdentityProvider, UserMetadata};

/// Client for the hosted auth endpoints (`/auth/v1/...`). Every request
/// carries the service key; session-scoped calls add a bearer token.
#[derive(Clone)]
pub struct HostedIdentityProvider {
    http: reqwest::Client,
    base_url: Url,
    service_key: String,
}

// The service is not consistent about its error shape; both observed
// variants are accepted.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "msg", alias = "error_description")]
    message: Option<String>,
}

impl HostedIdentityProvider {
    pub fn new(config: &BackendConfig) -> Res<Self> {
        let base_url = Url::parse(&config.service_url)
            .map_err(|e| AppError::Configuration(format!("invalid service URL: {}", e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            service_key: config.service_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Res<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Configuration(format!("invalid service URL: {}", e)))
    }

    /// Turns a non-success response into the error taxonomy: client errors
    /// are rejections of the attempted action, everything else is transient.
    async fn rejection(response: reqwest::Response) -> AppError {
        let status = response.status();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| format!("auth service returned {}", status));

        if status.is_client_error() {
            AppError::Auth(message)
        } else {
            AppError::Transient(message)
        }
    }
}

impl IdentityProvider for HostedIdentityProvider {
    async fn sign_up(
        &self,
        email: String,
        password: String,
        metadata: UserMetadata,
    ) -> Res<AuthUser> {
        let response = self
            .http
            .post(self.endpoint("auth/v1/signup")?)
            .header("apikey", self.service_key.as_str())
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json::<AuthUser>().await?)
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn sign_in_with_password(&self, email: String, password: String) -> Res<AuthSession> {
        let response = self
            .http
            .post(self.endpoint("auth/v1/token?grant_type=password")?)
            .header("apikey", self.service_key.as_str())
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json::<AuthSession>().await?)
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn sign_out(&self, access_token: String) -> Res<()> {
        let response = self
            .http
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", self.service_key.as_str())
            .bearer_auth(&access_token)
            .send()
            .await?;

        // Revoking an already-dead token still counts as signed out.
        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn get_user(&self, access_token: String) -> Res<Option<AuthUser>> {
        let response = self
            .http
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", self.service_key.as_str())
            .bearer_auth(&access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(Some(response.json::<AuthUser>().await?))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Ok(None)
        } else {
            Err(Self::rejection(response).await)
        }
    }
}
