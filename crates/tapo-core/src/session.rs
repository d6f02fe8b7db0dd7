//! Per-device session state.
//!
//! A session moves through three stages:
//!
//! ```text
//! Unauthenticated --handshake--> Handshaken --login--> Authenticated
//!                                    ^                       |
//!                                    +---- session expired --+
//! ```
//!
//! Nothing ever moves a session back to `Unauthenticated`. A failed handshake
//! leaves the previous cipher and cookie in place.

use secrecy::{ExposeSecret, SecretString};

use crate::crypto::SessionCipher;

/// Lifecycle stage of a session, derived from [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// No cipher and no token.
    Unauthenticated,
    /// Cipher and cookie established, no token.
    Handshaken,
    /// Logged in; protected requests may be sent.
    Authenticated,
}

/// Mutable session data owned by exactly one device handle.
#[derive(Default)]
pub struct SessionState {
    cipher: Option<SessionCipher>,
    cookie: Option<String>,
    token: Option<SecretString>,
}

impl SessionState {
    /// Creates an unauthenticated session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current lifecycle stage.
    pub fn stage(&self) -> SessionStage {
        match (&self.cipher, &self.token) {
            (None, _) => SessionStage::Unauthenticated,
            (Some(_), None) => SessionStage::Handshaken,
            (Some(_), Some(_)) => SessionStage::Authenticated,
        }
    }

    /// Returns the session cipher, if a handshake has completed.
    pub fn cipher(&self) -> Option<&SessionCipher> {
        self.cipher.as_ref()
    }

    /// Returns the session cookie to send with every request.
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Returns the auth token, if logged in.
    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret())
    }

    /// Installs the result of a successful handshake.
    ///
    /// Replaces cipher and cookie together. Any token from a previous session
    /// is dropped since it belongs to the old cipher.
    pub(crate) fn complete_handshake(&mut self, cipher: SessionCipher, cookie: Option<String>) {
        self.cipher = Some(cipher);
        self.cookie = cookie;
        self.token = None;
    }

    /// Stores the token returned by a successful login.
    ///
    /// Ignored unless a cipher is present, so a token can never exist without
    /// one.
    pub(crate) fn complete_login(&mut self, token: String) -> bool {
        if self.cipher.is_none() {
            return false;
        }
        self.token = Some(SecretString::from(token));
        true
    }

    /// Clears the token after the device reported an expired session.
    ///
    /// The cipher and cookie are kept.
    pub(crate) fn expire(&mut self) {
        self.token = None;
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("stage", &self.stage())
            .field("cookie", &self.cookie.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
