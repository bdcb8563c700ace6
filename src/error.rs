use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid username '{0}'")]
    InvalidUsername(String),

    #[error("Invalid delay range for {kind}: {min_ms}ms..{max_ms}ms")]
    InvalidDelayRange {
        kind: &'static str,
        min_ms: u64,
        max_ms: u64,
    },

    #[error("retry.max_attempts must be at least 1")]
    NoAttempts,

    #[error("page_size must be at least 1")]
    EmptyPage,

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Session variable '{0}' is not set")]
    MissingSession(String),
}

/// Failures reported by a relationship client.
///
/// The classification drives retries: `Network` and `Timeout` are transient,
/// `Rejected` means the remote is already in the requested state, and `Fatal`
/// ends the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote declined mutation: {0}")]
    Rejected(String),

    #[error("Fatal remote error: {0}")]
    Fatal(String),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Timeout(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ClientError::Network(format!("timeout: {}", err));
        }
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                ClientError::Fatal(format!("HTTP {}", status))
            }
            _ => ClientError::Network(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("A bulk run is already in progress")]
    AlreadyRunning,
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to write run journal '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
