//! Error types for Cmscast

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CmscastError>;

#[derive(Error, Debug)]
pub enum CmscastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("A dispatch run is already in progress")]
    DispatchInProgress,
}

impl CmscastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CmscastError::InvalidInput(_) => 3,
            CmscastError::InvalidSchedule(_) => 3,
            CmscastError::NotFound(_) => 3,
            CmscastError::Platform(PlatformError::Authentication(_)) => 2,
            CmscastError::Platform(_) => 1,
            CmscastError::Config(_) => 1,
            CmscastError::Database(_) => 1,
            CmscastError::DispatchInProgress => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Errors reported by platform clients.
///
/// Every client maps transport failures and platform error bodies into one
/// of these variants so the orchestrator never inspects platform formats.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Platform API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Uniform `{code, message, details}` view of a platform failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl PlatformError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            PlatformError::Authentication(_) => "AUTH_ERROR",
            PlatformError::Validation(_) => "VALIDATION_ERROR",
            PlatformError::Posting(_) => "PUBLISH_ERROR",
            PlatformError::Network(_) => "NETWORK_ERROR",
            PlatformError::Timeout(_) => "TIMEOUT_ERROR",
            PlatformError::RateLimit(_) => "RATE_LIMITED",
            PlatformError::Api { .. } => "PLATFORM_ERROR",
            PlatformError::NotImplemented(_) => "NOT_IMPLEMENTED",
        }
    }

    pub fn normalize(&self) -> NormalizedError {
        let (message, details) = match self {
            PlatformError::Api {
                message, details, ..
            } => (message.clone(), details.clone()),
            PlatformError::Authentication(m)
            | PlatformError::Validation(m)
            | PlatformError::Posting(m)
            | PlatformError::Network(m)
            | PlatformError::Timeout(m)
            | PlatformError::RateLimit(m)
            | PlatformError::NotImplemented(m) => (m.clone(), None),
        };

        NormalizedError {
            code: self.code().to_string(),
            message,
            details,
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Network failures, timeouts, rate limits and 5xx responses are
    /// transient. Authentication, validation and 4xx rejections are not.
    pub fn is_transient(&self) -> bool {
        match self {
            PlatformError::Network(_) | PlatformError::Timeout(_) | PlatformError::RateLimit(_) => {
                true
            }
            PlatformError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether a dispatch attempt that hit this error should end the post.
    ///
    /// A malformed payload or a platform without a publishing backend will
    /// fail identically on every attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlatformError::Validation(_) | PlatformError::NotImplemented(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = CmscastError::InvalidInput("Content is not published".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_invalid_schedule() {
        let error = CmscastError::InvalidSchedule("not-a-date".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = CmscastError::Platform(PlatformError::Authentication(
            "Token expired".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_errors() {
        let error = CmscastError::Platform(PlatformError::Network("refused".to_string()));
        assert_eq!(error.exit_code(), 1);

        let error = CmscastError::Config(ConfigError::MissingField("database.path".to_string()));
        assert_eq!(error.exit_code(), 1);

        assert_eq!(CmscastError::DispatchInProgress.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting() {
        let error = CmscastError::Platform(PlatformError::Validation(
            "Text exceeds 3000 characters".to_string(),
        ));
        assert_eq!(
            format!("{}", error),
            "Platform error: Content validation failed: Text exceeds 3000 characters"
        );

        let error = CmscastError::Config(ConfigError::InvalidValue {
            field: "scheduling.retry_delay".to_string(),
            reason: "expected a duration".to_string(),
        });
        assert_eq!(
            format!("{}", error),
            "Configuration error: Invalid value for scheduling.retry_delay: expected a duration"
        );
    }

    #[test]
    fn test_error_conversion_from_db_error() {
        let db_error = DbError::Corrupt("bad status".to_string());
        let error: CmscastError = db_error.into();

        match error {
            CmscastError::Database(_) => {}
            _ => panic!("Expected CmscastError::Database"),
        }
    }

    #[test]
    fn test_platform_error_codes() {
        assert_eq!(PlatformError::Network("x".into()).code(), "NETWORK_ERROR");
        assert_eq!(PlatformError::Timeout("x".into()).code(), "TIMEOUT_ERROR");
        assert_eq!(PlatformError::Authentication("x".into()).code(), "AUTH_ERROR");
        assert_eq!(PlatformError::RateLimit("x".into()).code(), "RATE_LIMITED");
        assert_eq!(PlatformError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(PlatformError::Posting("x".into()).code(), "PUBLISH_ERROR");
        assert_eq!(
            PlatformError::NotImplemented("x".into()).code(),
            "NOT_IMPLEMENTED"
        );
        assert_eq!(
            PlatformError::Api {
                status: 400,
                message: "x".into(),
                details: None
            }
            .code(),
            "PLATFORM_ERROR"
        );
    }

    #[test]
    fn test_normalize_keeps_api_details() {
        let error = PlatformError::Api {
            status: 400,
            message: "Invalid parameter".to_string(),
            details: Some(serde_json::json!({"code": 100})),
        };

        let normalized = error.normalize();
        assert_eq!(normalized.code, "PLATFORM_ERROR");
        assert_eq!(normalized.message, "Invalid parameter");
        assert_eq!(normalized.details, Some(serde_json::json!({"code": 100})));
    }

    #[test]
    fn test_normalize_serializes_without_empty_details() {
        let normalized = PlatformError::Timeout("after 30s".to_string()).normalize();
        let json = serde_json::to_string(&normalized).unwrap();
        assert_eq!(json, r#"{"code":"TIMEOUT_ERROR","message":"after 30s"}"#);
    }

    #[test]
    fn test_transient_classification() {
        assert!(PlatformError::Network("x".into()).is_transient());
        assert!(PlatformError::Timeout("x".into()).is_transient());
        assert!(PlatformError::RateLimit("x".into()).is_transient());
        assert!(PlatformError::Api {
            status: 503,
            message: "x".into(),
            details: None
        }
        .is_transient());

        assert!(!PlatformError::Authentication("x".into()).is_transient());
        assert!(!PlatformError::Api {
            status: 403,
            message: "x".into(),
            details: None
        }
        .is_transient());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(PlatformError::Validation("x".into()).is_terminal());
        assert!(PlatformError::NotImplemented("x".into()).is_terminal());
        assert!(!PlatformError::Authentication("x".into()).is_terminal());
        assert!(!PlatformError::Network("x".into()).is_terminal());
    }
}
