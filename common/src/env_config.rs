use std::{env, sync::Arc};

#[derive(Clone, Debug)]
/// Configuration for the AgroVista core.
///
/// Holds everything the embedding application needs to wire the backend
/// collaborators: the hosted service settings, the optional direct database
/// connection for the record store, and logging preferences.
pub struct Config {
    /// "development" or "production".
    pub environment: String,
    /// Hosted backend settings. `None` means the service URL or key is
    /// missing (or still a scaffolding placeholder) and the system runs in
    /// not-configured mode: identity and record operations short-circuit
    /// with a configuration error instead of attempting network calls.
    pub backend: Option<BackendConfig>,
    /// Direct Postgres connection string for the record store adapter.
    pub database_url: Option<String>,
    /// Whether log output is mirrored to stdout.
    pub console_logging_enabled: bool,
    /// Optional log file path.
    pub log_file: Option<String>,
}

#[derive(Clone, Debug)]
/// Connection settings for the hosted identity/record service.
pub struct BackendConfig {
    /// Base URL of the hosted service.
    pub service_url: String,
    /// API key sent with every request to the service.
    pub service_key: String,
}

impl BackendConfig {
    /// Validates raw settings. Returns `None` when either value is absent,
    /// empty, or a scaffolding placeholder; callers treat that as
    /// "not configured" rather than as an error.
    pub fn from_parts(service_url: Option<String>, service_key: Option<String>) -> Option<Self> {
        let service_url = service_url?;
        let service_key = service_key?;
        if service_url.is_empty() || service_key.is_empty() {
            return None;
        }
        if service_url.contains("placeholder") || service_key.contains("placeholder") {
            return None;
        }
        Some(BackendConfig {
            service_url,
            service_key,
        })
    }
}

impl Config {
    /// Reads configuration from environment variables (and `.env`, if one is
    /// present).
    ///
    /// Unlike the remaining settings, `SERVICE_URL` and `SERVICE_KEY` are
    /// allowed to be missing: their absence degrades the system to
    /// not-configured mode instead of aborting startup.
    ///
    /// Environment variables:
    /// - `SERVICE_URL`, `SERVICE_KEY`: hosted backend settings.
    /// - `DATABASE_URL`: Postgres connection for the record store.
    /// - `ENVIRONMENT`: "development" (default) or "production".
    /// - `ENABLE_CONSOLE_LOGGING`: defaults to true.
    /// - `LOG_FILE`: optional log file path.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        let backend = BackendConfig::from_parts(
            env::var("SERVICE_URL").ok(),
            env::var("SERVICE_KEY").ok(),
        );

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            backend,
            database_url: env::var("DATABASE_URL").ok(),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            log_file: env::var("LOG_FILE").ok(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_mean_not_configured() {
        assert!(BackendConfig::from_parts(None, None).is_none());
        assert!(BackendConfig::from_parts(Some("https://api.test".into()), None).is_none());
        assert!(BackendConfig::from_parts(None, Some("key".into())).is_none());
    }

    #[test]
    fn placeholder_settings_mean_not_configured() {
        assert!(
            BackendConfig::from_parts(
                Some("https://placeholder.example.com".into()),
                Some("real-key".into()),
            )
            .is_none()
        );
        assert!(
            BackendConfig::from_parts(
                Some("https://api.test".into()),
                Some("placeholder-key".into()),
            )
            .is_none()
        );
        assert!(BackendConfig::from_parts(Some("".into()), Some("key".into())).is_none());
    }

    #[test]
    fn real_settings_are_accepted() {
        let backend = BackendConfig::from_parts(
            Some("https://backend.agrovista.app".into()),
            Some("service-key-123".into()),
        )
        .unwrap();
        assert_eq!(backend.service_url, "https://backend.agrovista.app");
        assert_eq!(backend.service_key, "service-key-123");
    }
}
