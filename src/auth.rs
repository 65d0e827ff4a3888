//! Session management: login, expiry tracking and silent refresh.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{GettError, Result};
use crate::models::{AuthResponse, UserInfo};
use crate::request::Dispatcher;

/// Login endpoint, used for both credential and refresh-token logins.
pub const LOGIN_PATH: &str = "/1/users/login";

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Serialize)]
struct CredentialsLogin<'a> {
    apikey: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshLogin<'a> {
    refreshtoken: &'a str,
}

/// Token pair with its expiry instant.
#[derive(Clone)]
struct Session {
    access_token: String,
    refresh_token: String,
    expires_at: SystemTime,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Observable state of a [`SessionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Valid,
    Expired,
}

/// Owns the session of one client and renews it on demand.
pub struct SessionManager {
    dispatcher: Dispatcher,
    login_url: String,
    clock: Arc<dyn Clock>,
    refresh_margin: Duration,
    session: Option<Session>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("login_url", &self.login_url)
            .field("refresh_margin", &self.refresh_margin)
            .field("session", &self.session)
            .finish()
    }
}

impl SessionManager {
    pub fn new(
        dispatcher: Dispatcher,
        base_url: &str,
        clock: Arc<dyn Clock>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            dispatcher,
            login_url: format!("{}{}", base_url, LOGIN_PATH),
            clock,
            refresh_margin,
            session: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.session {
            None => SessionState::Unauthenticated,
            Some(session) if self.has_expired(session) => SessionState::Expired,
            Some(_) => SessionState::Valid,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// An unauthenticated manager counts as expired.
    pub fn is_expired(&self) -> bool {
        self.state() != SessionState::Valid
    }

    /// Instant after which the current access token is no longer valid.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.session.as_ref().map(|s| s.expires_at)
    }

    pub(crate) fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }

    fn has_expired(&self, session: &Session) -> bool {
        // Expired once the expiry instant is no longer strictly in the future.
        match self.clock.now().checked_add(self.refresh_margin) {
            Some(threshold) => session.expires_at <= threshold,
            None => true,
        }
    }

    /// Log in with an API key and account credentials.
    ///
    /// On failure the current session, if any, is left untouched.
    pub async fn authenticate(
        &mut self,
        api_key: &str,
        email: &str,
        password: &str,
    ) -> Result<UserInfo> {
        debug!(email, url = %self.login_url, "authenticating user");
        let body = CredentialsLogin {
            apikey: api_key,
            email,
            password,
        };
        let response = self
            .dispatcher
            .post(&self.login_url, Some(&body), &[])
            .await?
            .ok_or_else(|| {
                GettError::AuthenticationFailed(format!(
                    "unable to authenticate user {}, check the password and the API key",
                    email
                ))
            })?;
        self.store(&response)
    }

    /// Log in again using the stored refresh token.
    async fn refresh(&mut self) -> Result<UserInfo> {
        let refresh_token = match &self.session {
            Some(session) => session.refresh_token.clone(),
            None => {
                return Err(GettError::NotAuthenticated(
                    "cannot refresh a session that was never established".to_string(),
                ))
            }
        };
        debug!("refreshing expired session");
        let body = RefreshLogin {
            refreshtoken: &refresh_token,
        };
        let response = self
            .dispatcher
            .post(&self.login_url, Some(&body), &[])
            .await?
            .ok_or_else(|| {
                GettError::AuthenticationFailed(
                    "refresh token was rejected by the server".to_string(),
                )
            })?;
        self.store(&response)
    }

    fn store(&mut self, body: &str) -> Result<UserInfo> {
        let auth: AuthResponse = serde_json::from_str(body).map_err(|e| {
            GettError::AuthenticationFailed(format!("malformed login response: {}", e))
        })?;
        let expires_at = self
            .clock
            .now()
            .checked_add(Duration::from_secs(auth.expires))
            .ok_or_else(|| {
                GettError::AuthenticationFailed(format!(
                    "login response expiry out of range: {} seconds",
                    auth.expires
                ))
            })?;
        self.session = Some(Session {
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
            expires_at,
        });
        info!(user = %auth.user.full_name, expires_in = auth.expires, "authenticated");
        Ok(auth.user)
    }

    /// Whether an authenticated request may proceed, refreshing the session
    /// first if it has expired. Never fails: a failed refresh reports `false`.
    pub async fn ensure_usable(&mut self) -> bool {
        match self.state() {
            SessionState::Unauthenticated => {
                error!("an authenticated session is required, call authenticate first");
                false
            }
            SessionState::Valid => true,
            SessionState::Expired => match self.refresh().await {
                Ok(_) => true,
                Err(e) => {
                    error!(error = %e, "unable to re-authenticate the current user");
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn manager() -> SessionManager {
        let dispatcher = Dispatcher::new(&ClientConfig::default()).unwrap();
        SessionManager::new(
            dispatcher,
            "http://127.0.0.1:9",
            Arc::new(SystemClock),
            Duration::ZERO,
        )
    }

    #[test]
    fn test_credentials_body_serialization() {
        let body = CredentialsLogin {
            apikey: "key",
            email: "me@example.com",
            password: "secret",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["apikey"], "key");
        assert_eq!(json["email"], "me@example.com");
        assert_eq!(json["password"], "secret");
    }

    #[test]
    fn test_new_manager_is_unauthenticated() {
        let m = manager();
        assert_eq!(m.state(), SessionState::Unauthenticated);
        assert!(!m.is_authenticated());
        assert!(m.is_expired());
        assert!(m.access_token().is_none());
    }

    #[test]
    fn test_store_sets_valid_session() {
        let mut m = manager();
        let body = r#"{
            "accesstoken": "a1",
            "refreshtoken": "r1",
            "expires": 3600,
            "user": {"userid": "u", "fullname": "U", "email": "u@x", "storage": {"used": 0, "limit": 10, "extra": 0}}
        }"#;
        let user = m.store(body).unwrap();
        assert_eq!(user.user_id, "u");
        assert_eq!(m.state(), SessionState::Valid);
        assert_eq!(m.access_token(), Some("a1"));
    }

    #[test]
    fn test_zero_lifetime_is_expired() {
        let mut m = manager();
        let body = r#"{
            "accesstoken": "a1",
            "refreshtoken": "r1",
            "expires": 0,
            "user": {"userid": "u", "storage": {}}
        }"#;
        m.store(body).unwrap();
        assert_eq!(m.state(), SessionState::Expired);
    }

    #[test]
    fn test_out_of_range_lifetime_is_rejected() {
        let mut m = manager();
        let body = r#"{
            "accesstoken": "a1",
            "refreshtoken": "r1",
            "expires": 18446744073709551615,
            "user": {"userid": "u", "storage": {}}
        }"#;
        let err = m.store(body).unwrap_err();
        assert!(matches!(err, GettError::AuthenticationFailed(_)));
        assert_eq!(m.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_huge_refresh_margin_counts_as_expired() {
        let dispatcher = Dispatcher::new(&ClientConfig::default()).unwrap();
        let mut m = SessionManager::new(
            dispatcher,
            "http://127.0.0.1:9",
            Arc::new(SystemClock),
            Duration::MAX,
        );
        let body = r#"{
            "accesstoken": "a1",
            "refreshtoken": "r1",
            "expires": 3600,
            "user": {"userid": "u", "storage": {}}
        }"#;
        m.store(body).unwrap();
        assert_eq!(m.state(), SessionState::Expired);
    }

    #[test]
    fn test_malformed_login_body_is_authentication_failure() {
        let mut m = manager();
        let err = m.store(r#"{"accesstoken": "a1"}"#).unwrap_err();
        assert!(matches!(err, GettError::AuthenticationFailed(_)));
        assert!(!m.is_authenticated());
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = Session {
            access_token: "top-secret-access".to_string(),
            refresh_token: "top-secret-refresh".to_string(),
            expires_at: SystemTime::now(),
        };
        let debug = format!("{:?}", session);
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_ensure_usable_without_session() {
        let mut m = manager();
        assert!(!m.ensure_usable().await);
    }
}
