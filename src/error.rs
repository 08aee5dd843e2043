//! Error types for Offline Lessons
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by domain (network, storage, configuration) so callers
//! can decide what to surface, what to retry and what to absorb.
//!
//! ## Error Categories
//!
//! ### Network (ProgressiveFetcher)
//! - Non-success HTTP status → `NetworkFetch`
//! - Connection drops, DNS failures, timeouts → `Network`, `Http`
//!
//! ### Auxiliary assets (subtitles, thumbnails)
//! - Any fetch or cache failure → `AuxiliaryFetch`. These are logged at the
//!   point of failure and never returned from a download.
//!
//! ### Storage (BlobCache, MetadataStore)
//! - Store cannot be opened, transaction aborted → `Storage`, `Database`, `Io`
//! - Schema setup → `MigrationFailed`
//!
//! ### Quota
//! - Only produced by the explicit pre-flight check → `InsufficientSpace`

use thiserror::Error;

/// Result type alias using our OfflineError type
pub type Result<T> = std::result::Result<T, OfflineError>;

/// Main error type for the offline sync engine
#[derive(Error, Debug)]
pub enum OfflineError {
    // ===== Network Errors =====

    /// Server answered with a non-success status code
    #[error("Request to {url} failed with HTTP status {status}")]
    NetworkFetch {
        /// HTTP status code returned by the server
        status: u16,
        /// Locator that was requested
        url: String,
    },

    /// Network connectivity error
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    /// Best-effort asset (subtitle or thumbnail) could not be fetched or cached
    #[error("Auxiliary asset {url} skipped: {reason}")]
    AuxiliaryFetch { url: String, reason: String },

    /// Locator is not a valid absolute URL
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    // ===== Storage Errors =====

    /// Underlying store unreachable or transaction aborted
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Stored record could not be decoded
    #[error("Corrupt record {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// Not enough local storage for the requested download
    #[error("Insufficient storage: need {need} bytes, {have} bytes available")]
    InsufficientSpace { need: u64, have: u64 },

    // ===== Configuration/State Errors =====

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== General Errors =====

    /// Operation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<url::ParseError> for OfflineError {
    fn from(err: url::ParseError) -> Self {
        OfflineError::InvalidLocator(err.to_string())
    }
}


// Helper methods for creating common errors
impl OfflineError {
    /// Create a Storage error with a message
    pub fn storage<S: Into<String>>(message: S) -> Self {
        OfflineError::Storage(message.into())
    }

    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        OfflineError::InvalidInput(message.into())
    }

    /// Create a Network error
    pub fn network_error<S: Into<String>>(message: S, is_transient: bool) -> Self {
        OfflineError::Network {
            message: message.into(),
            is_transient,
        }
    }

    /// Create an AuxiliaryFetch error from whatever went wrong with the asset
    pub fn auxiliary<S: Into<String>>(url: S, cause: &OfflineError) -> Self {
        OfflineError::AuxiliaryFetch {
            url: url.into(),
            reason: cause.to_string(),
        }
    }

    /// HTTP status code, if this error carries one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            OfflineError::NetworkFetch { status, .. } => Some(*status),
            OfflineError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if error is retryable
    ///
    /// Returns `true` for transient network failures and 5xx/429 responses.
    /// Storage errors are never retried automatically.
    pub fn is_retryable(&self) -> bool {
        match self {
            OfflineError::Network { is_transient, .. } => *is_transient,
            OfflineError::NetworkFetch { status, .. } => *status >= 500 || *status == 429,
            OfflineError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if error came from the network layer
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            OfflineError::NetworkFetch { .. }
                | OfflineError::Network { .. }
                | OfflineError::Http(_)
        )
    }

    /// Check if error came from one of the local stores
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            OfflineError::Storage(_)
                | OfflineError::MigrationFailed(_)
                | OfflineError::CorruptRecord { .. }
                | OfflineError::Database(_)
                | OfflineError::Io(_)
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            OfflineError::NetworkFetch { status: 404, .. } => {
                "This lesson is no longer available on the server.".to_string()
            }
            OfflineError::NetworkFetch { status, .. } => {
                format!("The server refused the download (HTTP {}). Please try again later.", status)
            }
            OfflineError::Network { .. } | OfflineError::Http(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            OfflineError::InsufficientSpace { need, have } => {
                format!(
                    "Not enough storage. Need {} MB, but only {} MB available.",
                    need / 1_000_000,
                    have / 1_000_000
                )
            }
            OfflineError::Cancelled => "Download cancelled.".to_string(),
            _ if self.is_storage_error() => {
                "Offline storage is unavailable. Try clearing downloads or restarting the app.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_and_retryable() {
        let not_found = OfflineError::NetworkFetch {
            status: 404,
            url: "https://x/v.mp4".to_string(),
        };
        assert_eq!(not_found.status_code(), Some(404));
        assert!(!not_found.is_retryable());
        assert!(not_found.is_network_error());

        let unavailable = OfflineError::NetworkFetch {
            status: 503,
            url: "https://x/v.mp4".to_string(),
        };
        assert!(unavailable.is_retryable());
        assert!(OfflineError::network_error("reset", true).is_retryable());
        assert!(!OfflineError::storage("locked").is_retryable());
    }

    #[test]
    fn test_auxiliary_wraps_cause() {
        let cause = OfflineError::NetworkFetch {
            status: 500,
            url: "https://x/v.vtt".to_string(),
        };
        let err = OfflineError::auxiliary("https://x/v.vtt", &cause);
        assert!(err.to_string().contains("HTTP status 500"));
        assert!(!err.is_network_error());
    }

    #[test]
    fn test_user_message() {
        let err = OfflineError::InsufficientSpace {
            need: 5_000_000,
            have: 1_000_000,
        };
        assert!(err.user_message().contains("Need 5 MB"));
        assert!(OfflineError::storage("x").user_message().contains("Offline storage"));
    }
}
