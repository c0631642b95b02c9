//! Error handling for the application

use thiserror::Error;

/// Marketplace fetch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limited by marketplace API")]
    RateLimited,

    #[error("Marketplace API unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Malformed API response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Transient errors are retried with backoff; everything else fails the batch at once.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout(_) | FetchError::RateLimited | FetchError::Unavailable(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Unavailable(err.to_string())
        }
    }
}

/// Social channel delivery errors
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Channel unreachable: {0}")]
    Unreachable(String),

    #[error("Credentials rejected: {0}")]
    AuthRejected(String),

    #[error("Channel API error: {0}")]
    ApiError(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Unreachable(err.to_string())
    }
}

/// Baseline persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("State file {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },

    #[error("Unsupported state file version {0}")]
    UnsupportedVersion(u32),

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Catalog loading errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog file not found: {0}")]
    NotFound(String),

    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Catalog {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Catalog contains no ASINs")]
    Empty,
}

/// Configuration errors, always raised before any network call
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Run-level error, any of which ends the run in the `Failed` state
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Marketplace API unreachable for every batch: {0}")]
    FetchUnavailable(FetchError),
}
