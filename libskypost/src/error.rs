//! Error types for Skypost

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkypostError>;

#[derive(Error, Debug)]
pub enum SkypostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SkypostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SkypostError::InvalidInput(_) => 3,
            SkypostError::Platform(PlatformError::Authentication(_)) => 2,
            SkypostError::Platform(PlatformError::CredentialsMissing) => 2,
            SkypostError::Platform(PlatformError::Status { status: 401, .. }) => 2,
            SkypostError::Platform(_) => 1,
            SkypostError::Config(_) => 1,
            SkypostError::Database(_) => 1,
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
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Bluesky credentials not set")]
    CredentialsMissing,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{context} failed with status code {status}")]
    Status { context: String, status: u16 },

    #[error("Posting failed: {0}")]
    Posting(String),
}
