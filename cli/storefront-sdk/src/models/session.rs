//! The local admin session.
//!
//! Authentication is a comparison against locally configured credentials.
//! A successful login persists an opaque token, whose mere presence
//! authenticates later sessions.

use thiserror::Error;
use tracing::debug;

use crate::providers::token_store::TokenStore;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// The credentials a login is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("failed to persist session token")]
    Persist(#[source] std::io::Error),
}

/// Authentication state backed by a [TokenStore].
#[derive(Debug)]
pub struct Session<S> {
    store: S,
    credentials: AdminCredentials,
    authenticated: bool,
    error: Option<String>,
}

impl<S: TokenStore> Session<S> {
    /// Restore the session from the token store.
    ///
    /// Any stored token authenticates, its content is not validated.
    /// An unreadable store starts an unauthenticated session.
    pub fn bootstrap(store: S, credentials: AdminCredentials) -> Self {
        let authenticated = match store.load() {
            Ok(token) => token.is_some(),
            Err(err) => {
                debug!(%err, "could not read session token");
                false
            },
        };
        debug!(authenticated, "bootstrapped session");

        Self {
            store,
            credentials,
            authenticated,
            error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Message of the last failed login.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Check the credentials and persist a new token on success.
    pub fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        if username != self.credentials.username || password != self.credentials.password {
            debug!(username, "rejected login");
            let err = SessionError::InvalidCredentials;
            self.authenticated = false;
            self.error = Some(err.to_string());
            return Err(err);
        }

        let token = generate_token();
        if let Err(err) = self.store.save(&token) {
            self.authenticated = false;
            self.error = Some(err.to_string());
            return Err(SessionError::Persist(err));
        }

        debug!(username, "logged in");
        self.authenticated = true;
        self.error = None;
        Ok(())
    }

    /// Remove the token and end the session.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.authenticated = false;
        self.error = None;
        self.store.remove().map_err(SessionError::Persist)?;
        debug!("logged out");
        Ok(())
    }
}

fn generate_token() -> String {
    format!("admin_token_{}", chrono::Utc::now().timestamp_millis())
}
