use thiserror::Error;

pub type Res<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// Required backend settings are absent. Never retried automatically.
    #[error("Backend not configured: {0}")]
    Configuration(String),

    /// Rejected credentials or account data. Surfaced verbatim to the user.
    #[error("{0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Network or backend failure on an otherwise valid request. The caller
    /// may retry at its own discretion.
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// A multi-step operation completed its first write but failed a later
    /// one, leaving the backend inconsistent until reconciled.
    #[error("Partial failure in {operation}: {detail}")]
    Partial {
        operation: &'static str,
        detail: String,
    },
}

impl AppError {
    pub fn partial(operation: &'static str, detail: impl ToString) -> Self {
        AppError::Partial {
            operation,
            detail: detail.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }

    /// Translates the error into banner text for the user. Internal detail
    /// goes to the log, never to the screen.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Configuration(_) => {
                "Backend is not configured. Set SERVICE_URL and SERVICE_KEY to enable accounts."
                    .to_string()
            }
            AppError::Auth(message) => message.clone(),
            AppError::NotFound(detail) => {
                log::error!("Missing record: {}", detail);
                "The requested record could not be found.".to_string()
            }
            AppError::Transient(detail) => {
                log::error!("Transient backend error: {}", detail);
                "Connection to the backend failed. Please try again.".to_string()
            }
            AppError::Partial { operation, detail } => {
                log::error!("Partial failure in {}: {}", operation, detail);
                format!(
                    "The {} operation did not fully complete. Contact support if the problem persists.",
                    operation
                )
            }
        }
    }
}

// Collaborator errors are normalized at this single conversion point; raw
// sqlx/reqwest values never travel past this crate.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("no matching row".to_string()),
            other => AppError::Transient(format!("database: {}", other)),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::Transient(format!("request: {}", error))
    }
}
