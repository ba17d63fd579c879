//! Error types for Autocast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AutocastError>;

#[derive(Error, Debug)]
pub enum AutocastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lead is not replyable: {0}")]
    NotReplyable(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("{0}")]
    Critical(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AutocastError {
    /// Process exit status for binaries reporting this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AutocastError::InvalidInput(_) => 3,
            AutocastError::Platform(PlatformError::CredentialExpired(_))
            | AutocastError::Platform(PlatformError::RefreshFailed(_)) => 2,
            AutocastError::Platform(_) => 1,
            AutocastError::Config(_) => 1,
            AutocastError::Database(_) => 1,
            AutocastError::NotFound(_)
            | AutocastError::NotReplyable(_)
            | AutocastError::Upstream(_)
            | AutocastError::Critical(_) => 1,
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

    #[error("Corrupt column {column}: {reason}")]
    Corrupt { column: String, reason: String },
}

/// Failures raised by platform adapters and the credential manager.
///
/// Cloneable so publish/reply results can carry the tagged error as a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("Credential expired: {0}")]
    CredentialExpired(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Media upload failed: {0}")]
    Media(String),

    #[error("{platform} API returned {status}: {message}")]
    Upstream {
        platform: String,
        status: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),
}

impl PlatformError {
    /// True when the user must reconnect the account before the platform works again
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            PlatformError::CredentialExpired(_) | PlatformError::RefreshFailed(_)
        )
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(error: reqwest::Error) -> Self {
        PlatformError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = AutocastError::InvalidInput("Unknown platform".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_credential_errors() {
        let expired = AutocastError::Platform(PlatformError::CredentialExpired(
            "twitter".to_string(),
        ));
        let refresh = AutocastError::Platform(PlatformError::RefreshFailed("twitter".to_string()));
        assert_eq!(expired.exit_code(), 2);
        assert_eq!(refresh.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_errors() {
        let unsupported = AutocastError::Platform(PlatformError::UnsupportedOperation(
            "LinkedIn replies".to_string(),
        ));
        assert_eq!(unsupported.exit_code(), 1);
        assert_eq!(AutocastError::NotFound("project".to_string()).exit_code(), 1);
        assert_eq!(
            AutocastError::Critical("Project not found".to_string()).exit_code(),
            1
        );
        let config = AutocastError::Config(ConfigError::MissingField("database.path".to_string()));
        assert_eq!(config.exit_code(), 1);
    }

    #[test]
    fn test_upstream_error_formatting() {
        let error = PlatformError::Upstream {
            platform: "LinkedIn".to_string(),
            status: 422,
            message: "invalid author".to_string(),
        };
        assert_eq!(error.to_string(), "LinkedIn API returned 422: invalid author");
    }

    #[test]
    fn test_error_message_formatting_platform() {
        let error = AutocastError::Platform(PlatformError::NotConnected(
            "No connected twitter account".to_string(),
        ));
        assert_eq!(
            error.to_string(),
            "Platform error: Not connected: No connected twitter account"
        );
    }

    #[test]
    fn test_critical_message_is_unwrapped() {
        let error = AutocastError::Critical("Project not found".to_string());
        assert_eq!(error.to_string(), "Project not found");
    }

    #[test]
    fn test_requires_reconnect() {
        assert!(PlatformError::CredentialExpired("x".to_string()).requires_reconnect());
        assert!(PlatformError::RefreshFailed("x".to_string()).requires_reconnect());
        assert!(!PlatformError::Network("x".to_string()).requires_reconnect());
    }

    #[test]
    fn test_error_conversion_from_platform_error() {
        let platform_error = PlatformError::Media("upload slot".to_string());
        let error: AutocastError = platform_error.into();
        match error {
            AutocastError::Platform(PlatformError::Media(_)) => {}
            _ => panic!("Expected AutocastError::Platform"),
        }
    }

    #[test]
    fn test_mock_can_replay_platform_errors() {
        let scripted = PlatformError::Media("LinkedIn asset rejected".to_string());
        let replayed = scripted.clone();
        assert_eq!(replayed, scripted);
    }
}
