//! Wire-level JSON envelopes.
//!
//! Every exchange is a JSON object POSTed to `/app`:
//!
//! ```text
//! -> {"method":"handshake","params":{"key":"-----BEGIN PUBLIC KEY-----...","requestTimeMils":0}}
//! <- {"error_code":0,"result":{"key":"<base64 RSA ciphertext>"}}
//!
//! -> {"method":"securePassthrough","params":{"request":"<base64 AES ciphertext>"}}
//! <- {"error_code":0,"result":{"response":"<base64 AES ciphertext>"}}
//! ```
//!
//! The AES payloads are themselves a [`Request`] and an [`InnerResponse`].

use serde::{Deserialize, Serialize};

/// Method names understood by the device.
pub mod methods {
    /// RSA key exchange.
    pub const HANDSHAKE: &str = "handshake";
    /// Wrapper carrying an encrypted inner request.
    pub const SECURE_PASSTHROUGH: &str = "securePassthrough";
    /// Account login, returns the auth token.
    pub const LOGIN: &str = "login_device";
    /// Device status snapshot.
    pub const GET_DEVICE_INFO: &str = "get_device_info";
    /// Energy meter readings.
    pub const GET_ENERGY_USAGE: &str = "get_energy_usage";
    /// Usage totals per window.
    pub const GET_DEVICE_USAGE: &str = "get_device_usage";
    /// Property update (power state, etc.).
    pub const SET_DEVICE_INFO: &str = "set_device_info";
}

/// Status code the device returns when the session has expired.
pub const SESSION_EXPIRED: i32 = 9999;

/// A method call, used both in the clear (handshake) and encrypted.
#[derive(Debug, Clone, Serialize)]
pub struct Request<'a, P: Serialize> {
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

impl<'a, P: Serialize> Request<'a, P> {
    pub fn new(method: &'a str, params: Option<P>) -> Self {
        Self { method, params }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct HandshakeParams {
    pub key: String,
    #[serde(rename = "requestTimeMils")]
    pub request_time_mils: u64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PassthroughParams {
    pub request: String,
}

#[derive(Serialize)]
pub(crate) struct LoginParams<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResult {
    pub token: String,
}

/// Outer response envelope as decoded by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Device-reported status (0 = success).
    pub error_code: i32,
    /// Handshake key or encrypted response.
    #[serde(default)]
    pub result: Option<EnvelopeResult>,
}

/// Payload of the outer envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeResult {
    /// Base64 RSA-encrypted session secret (handshake only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Base64 AES-encrypted inner response (secure passthrough only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl ResponseEnvelope {
    /// The handshake key blob, if present.
    pub fn key(&self) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.key.as_deref())
    }

    /// The encrypted response blob, if present.
    pub fn response(&self) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.response.as_deref())
    }
}

/// Decrypted inner response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InnerResponse {
    pub error_code: i32,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}
