//! Protocol driver for a single Tapo device.
//!
//! A [`Device`] owns its session and its transport. Every public operation
//! takes `&mut self`, so one handle is driven by one caller at a time;
//! concurrent polling of many devices uses one handle per device.
//!
//! # Example
//!
//! ```no_run
//! use tapo_core::{Credentials, Device, DeviceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DeviceConfig::new("192.168.1.100", Credentials::new("me@example.com", "pw"));
//!     let mut device = Device::new(config);
//!     device.login().await?;
//!
//!     let status = device.get_status().await?;
//!     println!("{} is {}", status.nickname, if status.device_on { "on" } else { "off" });
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::{
    credentials::{CredentialDigest, Credentials},
    crypto::{CipherContext, KeyPair, SessionCipher},
    envelope::{
        HandshakeParams, InnerResponse, LoginParams, LoginResult, PassthroughParams, Request,
        SESSION_EXPIRED, methods,
    },
    error::Error,
    session::{SessionStage, SessionState},
    transport::{DEFAULT_TIMEOUT, HttpTransport, Transport},
};

/// Path of the device's JSON endpoint.
pub const APP_PATH: &str = "/app";

/// Environment variable holding the device address.
pub const ENV_HOST: &str = "TAPO_IP";
/// Environment variable holding the account email.
pub const ENV_EMAIL: &str = "TAPO_EMAIL";
/// Environment variable holding the account password.
pub const ENV_PASSWORD: &str = "TAPO_PASSWORD";

/// Configuration for connecting to a device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device address, `host` or `host:port`.
    pub host: String,
    /// Account credentials.
    pub credentials: Credentials,
    /// Timeout for each HTTP exchange.
    pub timeout: Duration,
}

impl DeviceConfig {
    /// Creates a new device configuration with the default timeout.
    pub fn new(host: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            credentials,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `TAPO_IP`, `TAPO_EMAIL` and `TAPO_PASSWORD`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let require = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::InvalidConfig(format!("{} is not set", key)))
        };

        let host = require(ENV_HOST)?;
        let email = require(ENV_EMAIL)?;
        let password = require(ENV_PASSWORD)?;
        Ok(Self::new(host, Credentials::new(email, password)))
    }
}

/// Outcome of one encrypted exchange.
enum Exchange {
    Done(Value),
    Expired,
}

/// Handle to one Tapo device.
pub struct Device {
    host: String,
    digest: CredentialDigest,
    session: SessionState,
    transport: Box<dyn Transport>,
}

impl Device {
    /// Creates a handle that talks HTTP to `config.host`.
    ///
    /// No network I/O happens until [`login`](Self::login) or
    /// [`handshake`](Self::handshake).
    pub fn new(config: DeviceConfig) -> Self {
        let transport = HttpTransport::new(&config.host, config.timeout);
        Self::with_transport(config, Box::new(transport))
    }

    /// Creates a handle using a custom transport.
    pub fn with_transport(config: DeviceConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            host: config.host,
            digest: config.credentials.digest(),
            session: SessionState::new(),
            transport,
        }
    }

    /// Returns the device address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the current session stage.
    pub fn stage(&self) -> SessionStage {
        self.session.stage()
    }

    /// Returns the session state.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Performs the RSA key exchange and installs a new session cipher.
    ///
    /// The new cipher and cookie replace the old ones only once the whole
    /// exchange has succeeded; on failure the session is left as it was.
    pub async fn handshake(&mut self) -> Result<(), Error> {
        let host = self.host.as_str();
        debug!(host, "Performing handshake");

        let key_pair = KeyPair::generate()?;
        let request = Request::new(
            methods::HANDSHAKE,
            Some(HandshakeParams {
                key: key_pair.public_key_pem()?,
                request_time_mils: 0,
            }),
        );
        let body = serde_json::to_vec(&request)?;

        let response = self.transport.post(APP_PATH, &body, None).await?;
        if response.envelope.error_code != 0 {
            return Err(Error::Handshake(format!(
                "device returned error code {}",
                response.envelope.error_code
            )));
        }

        let key = response
            .envelope
            .key()
            .ok_or_else(|| Error::Handshake("response carries no key".into()))?;
        let encrypted = STANDARD
            .decode(key)
            .map_err(|e| Error::Handshake(format!("key is not valid base64: {}", e)))?;
        let secret = key_pair
            .decrypt_session_secret(&encrypted)
            .map_err(|e| Error::Handshake(e.to_string()))?;
        let context =
            CipherContext::from_secret(&secret).map_err(|e| Error::Handshake(e.to_string()))?;

        if response.session_cookie.is_none() {
            warn!(host, "Handshake response set no session cookie");
        }
        self.session
            .complete_handshake(SessionCipher::new(context), response.session_cookie);

        debug!(host, "Handshake succeeded");
        Ok(())
    }

    /// Logs in with the configured credentials, handshaking first if needed.
    ///
    /// A rejection by the device is reported as [`Error::Auth`].
    pub async fn login(&mut self) -> Result<(), Error> {
        if self.session.cipher().is_none() {
            self.handshake().await?;
        }

        let params = self.login_params()?;
        let result = self.call(methods::LOGIN, params).await.map_err(login_error)?;
        self.store_token(result)
    }

    /// Sends `method` through the encrypted channel and decodes its result.
    ///
    /// If the device reports an expired session, the session is renewed
    /// (handshake and login) and the request is sent once more. A second
    /// expiry is returned as [`Error::Protocol`].
    pub async fn send_secure_request<P, R>(&mut self, method: &str, params: Option<P>) -> Result<R, Error>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = params.map(|p| serde_json::to_value(p)).transpose()?;
        let result = self.call(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| Error::Decode(format!("unexpected {} result: {}", method, e)))
    }

    /// Runs one request with at most one session renewal.
    async fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value, Error> {
        let mut renewed = false;

        loop {
            match self.exchange(method, params.as_ref()).await? {
                Exchange::Done(result) => return Ok(result),
                Exchange::Expired if renewed => {
                    return Err(Error::Protocol(format!(
                        "session expired again after renewal ({})",
                        method
                    )));
                }
                Exchange::Expired => {
                    let host = self.host.as_str();
                    debug!(host, method, "Session expired, renewing");
                    renewed = true;
                    self.session.expire();
                    self.handshake().await?;
                    if method != methods::LOGIN {
                        self.relogin().await?;
                    }
                }
            }
        }
    }

    /// Login during renewal; never renews again.
    async fn relogin(&mut self) -> Result<(), Error> {
        let params = self.login_params()?;
        match self.exchange(methods::LOGIN, params.as_ref()).await.map_err(login_error)? {
            Exchange::Done(result) => self.store_token(result),
            Exchange::Expired => Err(Error::Protocol(
                "session expired during re-login".into(),
            )),
        }
    }

    /// One encrypted round trip.
    async fn exchange(&self, method: &str, params: Option<&Value>) -> Result<Exchange, Error> {
        let cipher = self.session.cipher().ok_or(Error::NotAuthenticated)?;
        let token = self.session.token();
        if token.is_none() && method != methods::LOGIN {
            return Err(Error::NotAuthenticated);
        }

        let inner = serde_json::to_vec(&Request::new(method, params))?;
        let outer = Request::new(
            methods::SECURE_PASSTHROUGH,
            Some(PassthroughParams {
                request: STANDARD.encode(cipher.encrypt(&inner)),
            }),
        );
        let body = serde_json::to_vec(&outer)?;

        let path = request_path(token);

        let host = self.host.as_str();
        debug!(host, method, "Sending secure request");

        let response = self
            .transport
            .post(&path, &body, self.session.cookie())
            .await?;

        match response.envelope.error_code {
            0 => {}
            SESSION_EXPIRED => return Ok(Exchange::Expired),
            code => {
                debug!(host, method, code, "Device rejected request");
                return Err(Error::Device { code });
            }
        }

        let encoded = response
            .envelope
            .response()
            .ok_or_else(|| Error::Protocol("secure response carries no payload".into()))?;
        let decrypted = cipher.decrypt(&STANDARD.decode(encoded)?)?;
        let inner: InnerResponse = serde_json::from_slice(&decrypted)?;

        if inner.error_code != 0 {
            debug!(host, method, code = inner.error_code, "Device returned error");
            return Err(Error::Device {
                code: inner.error_code,
            });
        }

        Ok(Exchange::Done(inner.result.unwrap_or(Value::Null)))
    }

    fn login_params(&self) -> Result<Option<Value>, Error> {
        let params = LoginParams {
            username: self.digest.username(),
            password: self.digest.expose_password(),
        };
        Ok(Some(serde_json::to_value(params)?))
    }

    fn store_token(&mut self, result: Value) -> Result<(), Error> {
        let result: LoginResult = serde_json::from_value(result)
            .map_err(|e| Error::Auth(format!("login result has no token: {}", e)))?;
        if !self.session.complete_login(result.token) {
            return Err(Error::NotAuthenticated);
        }
        let host = self.host.as_str();
        debug!(host, "Login succeeded");
        Ok(())
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("host", &self.host)
            .field("transport", &format!("{}:{}", self.transport.host(), self.transport.port()))
            .field("session", &self.session)
            .finish()
    }
}

fn login_error(err: Error) -> Error {
    match err {
        Error::Device { code } => Error::Auth(format!("login rejected with error code {}", code)),
        other => other,
    }
}

/// Builds `/app` or `/app?token=<token>` with the token form-encoded.
fn request_path(token: Option<&str>) -> String {
    match token {
        Some(token) => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("token", token)
                .finish();
            format!("{}?{}", APP_PATH, query)
        }
        None => APP_PATH.to_string(),
    }
}
