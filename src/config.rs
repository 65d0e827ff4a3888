//! Client configuration.

use std::time::Duration;

/// Default Ge.tt API origin.
pub const DEFAULT_BASE_URL: &str = "https://open.ge.tt";

/// Per-request timeout applied to the underlying HTTP client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for a [`GettClient`](crate::GettClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// How long before the recorded expiry a session is already treated as
    /// expired. Zero means the token is used right up to its expiry instant.
    pub refresh_margin: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
            refresh_margin: Duration::ZERO,
        }
    }
}

impl ClientConfig {
    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.base_url = value.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, value: Duration) -> Self {
        self.timeout = value;
        self
    }

    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.user_agent = value.into();
        self
    }

    pub fn refresh_margin(mut self, value: Duration) -> Self {
        self.refresh_margin = value;
        self
    }
}

/// User agent advertising the library name and version.
pub fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible) {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}
