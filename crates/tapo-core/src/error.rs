//! Error types for tapo-core.
//!
//! Only [`Error::Device`] with the session-expired code is ever recovered
//! inside the library; every other variant is returned to the caller as-is.

use thiserror::Error;

/// Error type for tapo-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Key generation, RSA decryption or AES padding failure.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The device rejected the handshake or returned something unusable.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The device rejected the login request.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A protected request was issued before a successful login.
    #[error("not authenticated: login must succeed before sending requests")]
    NotAuthenticated,

    /// The device answered with a non-zero status code.
    #[error("device returned error code {code}")]
    Device {
        /// Raw status code reported by the device.
        code: i32,
    },

    /// Malformed or unexpected wire payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Base64 or JSON decoding failed on an otherwise successful response.
    #[error("decode error: {0}")]
    Decode(String),

    /// Connection to the device failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete within the configured timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Missing or invalid client configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns the raw device status code, if this error carries one.
    pub fn device_code(&self) -> Option<i32> {
        match self {
            Error::Device { code } => Some(*code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Decode(err.to_string())
    }
}
