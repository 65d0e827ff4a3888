//! Error types for the gett crate.

use thiserror::Error;

/// Errors that can occur when interacting with Ge.tt.
#[derive(Error, Debug)]
pub enum GettError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Share not found: {0}")]
    ShareNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Share has been removed: {0}")]
    ShareRemoved(String),

    #[error("Quota exceeded: {file} needs {needed} bytes, {available} bytes left")]
    QuotaExceeded {
        file: String,
        needed: u64,
        available: u64,
    },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse response JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid URL or share name: {0}")]
    InvalidUrlOrId(String),
}

/// Result type alias for GettError.
pub type Result<T> = std::result::Result<T, GettError>;
