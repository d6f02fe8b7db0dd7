//! Transport layer for communicating with Tapo devices.
//!
//! A transport performs exactly one HTTP round trip per call and knows
//! nothing about the payload beyond the outer JSON envelope. Session logic
//! (handshake, encryption, retries) lives in [`crate::Device`].
//!
//! - [`HttpTransport`]: HTTP/1.1 over a fresh TCP connection per request

pub mod http;

pub use http::HttpTransport;

use std::time::Duration;

use async_trait::async_trait;

use crate::{envelope::ResponseEnvelope, error::Error};

/// Default timeout for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default HTTP port of Tapo devices.
pub const DEFAULT_PORT: u16 = 80;

/// Decoded result of one POST.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// The outer JSON envelope.
    pub envelope: ResponseEnvelope,
    /// First `;`-delimited segment of the `Set-Cookie` header, if any.
    pub session_cookie: Option<String>,
}

/// Trait for device transports.
///
/// Implementations must not keep connections alive between calls: the
/// device binds sessions to the cookie, not to the connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POSTs a JSON body to `path` (including any query string) and decodes
    /// the response envelope.
    ///
    /// # Arguments
    ///
    /// * `path` - Request target, e.g. `/app` or `/app?token=...`
    /// * `body` - Serialized JSON request
    /// * `cookie` - Session cookie to send, if any
    async fn post(
        &self,
        path: &str,
        body: &[u8],
        cookie: Option<&str>,
    ) -> Result<TransportResponse, Error>;

    /// Returns the device host.
    fn host(&self) -> &str;

    /// Returns the device port.
    fn port(&self) -> u16;
}
