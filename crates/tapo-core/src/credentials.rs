//! Credentials management for Tapo devices.
//!
//! Tapo devices authenticate with the TP-Link cloud account that owns them.
//! The account email and password never cross the wire as-is: the login
//! request carries a [`CredentialDigest`] instead.
//!
//! # Derivation
//!
//! - `username = base64(hex(sha1(email)))`
//! - `password = base64(password)`
//!
//! # Security
//!
//! Passwords are stored using [`SecretString`] from the `secrecy` crate to prevent
//! accidental logging or display. The Base64 password digest is trivially
//! reversible, so it is kept in a [`SecretString`] as well.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};

/// Credentials for authenticating with Tapo devices.
///
/// # Example
///
/// ```
/// use tapo_core::Credentials;
///
/// let creds = Credentials::new("user@example.com", "password123");
/// assert_eq!(creds.username, "user@example.com");
///
/// let digest = creds.digest();
/// assert_ne!(digest.username(), "user@example.com");
/// ```
#[derive(Clone)]
pub struct Credentials {
    /// The TP-Link account email address.
    pub username: String,
    /// The account password (protected from accidental logging).
    password: SecretString,
}

impl Credentials {
    /// Creates new credentials with the given email and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Returns `true` if either the username or the password is empty.
    ///
    /// Tapo devices always require a cloud account, so incomplete credentials
    /// can never log in.
    pub fn is_incomplete(&self) -> bool {
        self.username.is_empty() || self.password.expose_secret().is_empty()
    }

    /// Exposes the password.
    ///
    /// Only use this when the raw password is actually needed. Never log
    /// or display the returned value.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Derives the digest pair sent in the login request.
    pub fn digest(&self) -> CredentialDigest {
        let email_hash = hex::encode(Sha1::digest(self.username.as_bytes()));

        CredentialDigest {
            username: STANDARD.encode(email_hash),
            password: SecretString::from(STANDARD.encode(self.password.expose_secret())),
        }
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
    }
}

impl Eq for Credentials {}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// The encoded username/password pair carried by `login_device`.
#[derive(Clone)]
pub struct CredentialDigest {
    username: String,
    password: SecretString,
}

impl CredentialDigest {
    /// Base64 of the hex SHA-1 digest of the account email.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Base64 of the account password.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl fmt::Debug for CredentialDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialDigest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
