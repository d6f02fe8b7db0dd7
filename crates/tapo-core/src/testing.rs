//! In-process fake Tapo device for driver tests.
//!
//! Plays the device side of the protocol for real: it RSA-encrypts a fresh
//! session secret for every handshake, hands out cookies and tokens, and
//! decrypts/encrypts passthrough payloads with AES. Behaviour can be scripted
//! per method, and every request is recorded.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rsa::{Pkcs1v15Encrypt, RsaPublicKey, pkcs8::DecodePublicKey, rand_core::OsRng};
use serde_json::{Value, json};

use crate::{
    credentials::Credentials,
    crypto::{CipherContext, SessionCipher},
    envelope::{EnvelopeResult, ResponseEnvelope, SESSION_EXPIRED, methods},
    error::Error,
    transport::{Transport, TransportResponse},
};

pub(crate) const EMAIL: &str = "user@example.com";
pub(crate) const PASSWORD: &str = "secret123";

/// Inner error code the device uses for rejected credentials.
pub(crate) const LOGIN_REJECTED: i32 = -1501;

/// One request as seen by the fake device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Recorded {
    pub path: String,
    pub cookie: Option<String>,
    /// Outer method for handshakes, inner method for passthrough calls.
    pub method: String,
    pub params: Value,
}

#[derive(Default)]
struct State {
    sessions: u8,
    cipher: Option<SessionCipher>,
    cookie: Option<String>,
    token: Option<String>,
    expired: HashMap<String, usize>,
    inner_errors: HashMap<String, i32>,
    outer_errors: HashMap<String, i32>,
    timeouts: HashMap<String, usize>,
    results: HashMap<String, Value>,
    handshake_reply: Option<ResponseEnvelope>,
    requests: Vec<Recorded>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeDevice {
    state: Arc<Mutex<State>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `result` object returned for `method`.
    pub fn set_result(&self, method: &str, result: Value) {
        self.lock().results.insert(method.to_string(), result);
    }

    /// Makes the next `times` calls of `method` answer with the
    /// session-expired status.
    pub fn expire_next(&self, method: &str, times: usize) {
        self.lock().expired.insert(method.to_string(), times);
    }

    /// Makes every call of `method` fail with an inner error code.
    pub fn fail_with(&self, method: &str, code: i32) {
        self.lock().inner_errors.insert(method.to_string(), code);
    }

    /// Makes every call of `method` fail with an outer envelope status.
    pub fn fail_outer(&self, method: &str, code: i32) {
        self.lock().outer_errors.insert(method.to_string(), code);
    }

    /// Makes the next `times` calls of `method` fail with a transport timeout.
    pub fn time_out_next(&self, method: &str, times: usize) {
        self.lock().timeouts.insert(method.to_string(), times);
    }

    /// Replaces the handshake answer with a canned envelope.
    pub fn reply_to_handshake(&self, envelope: ResponseEnvelope) {
        self.lock().handshake_reply = Some(envelope);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.lock().requests.clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.method).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn handshake(state: &mut State, params: &Value) -> TransportResponse {
        if let Some(envelope) = state.handshake_reply.clone() {
            return TransportResponse {
                envelope,
                session_cookie: None,
            };
        }

        let pem = params["key"].as_str().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(params["requestTimeMils"], 0);
        let public_key = RsaPublicKey::from_public_key_pem(pem).unwrap();

        state.sessions += 1;
        let secret = [state.sessions; 32];
        let encrypted = public_key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &secret)
            .unwrap();

        state.cipher = Some(SessionCipher::new(
            CipherContext::from_secret(&secret).unwrap(),
        ));
        let cookie = format!("TP_SESSIONID=S{}", state.sessions);
        state.cookie = Some(cookie.clone());
        state.token = None;

        TransportResponse {
            envelope: ResponseEnvelope {
                error_code: 0,
                result: Some(EnvelopeResult {
                    key: Some(STANDARD.encode(encrypted)),
                    response: None,
                }),
            },
            session_cookie: Some(cookie),
        }
    }

    fn passthrough(
        state: &mut State,
        path: &str,
        cookie: Option<&str>,
        params: &Value,
    ) -> Result<TransportResponse, Error> {
        let cipher = state.cipher.as_ref().unwrap();
        assert_eq!(cookie, state.cookie.as_deref(), "stale session cookie");

        let encrypted = STANDARD.decode(params["request"].as_str().unwrap()).unwrap();
        let inner: Value = serde_json::from_slice(&cipher.decrypt(&encrypted).unwrap()).unwrap();
        let method = inner["method"].as_str().unwrap().to_string();
        let inner_params = inner.get("params").cloned().unwrap_or(Value::Null);

        state.requests.push(Recorded {
            path: path.to_string(),
            cookie: cookie.map(str::to_string),
            method: method.clone(),
            params: inner_params.clone(),
        });

        if let Some(remaining) = state.timeouts.get_mut(&method) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Timeout(format!("{} timed out", method)));
            }
        }
        if let Some(remaining) = state.expired.get_mut(&method) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(outer_status(SESSION_EXPIRED));
            }
        }
        if let Some(&code) = state.outer_errors.get(&method) {
            return Ok(outer_status(code));
        }

        let reply = if let Some(code) = state.inner_errors.get(&method) {
            json!({"error_code": code})
        } else if method == methods::LOGIN {
            let expected = Credentials::new(EMAIL, PASSWORD).digest();
            if inner_params["username"] == expected.username()
                && inner_params["password"] == expected.expose_password()
            {
                let token = format!("T{}", state.sessions);
                state.token = Some(token.clone());
                json!({"error_code": 0, "result": {"token": token}})
            } else {
                json!({"error_code": LOGIN_REJECTED})
            }
        } else {
            let expected = format!("/app?token={}", state.token.as_deref().unwrap_or(""));
            assert_eq!(path, expected, "wrong token in request path");
            match state.results.get(&method) {
                Some(result) => json!({"error_code": 0, "result": result}),
                None => json!({"error_code": 0}),
            }
        };

        let cipher = state.cipher.as_ref().unwrap();
        let response = STANDARD.encode(cipher.encrypt(reply.to_string().as_bytes()));
        Ok(TransportResponse {
            envelope: ResponseEnvelope {
                error_code: 0,
                result: Some(EnvelopeResult {
                    key: None,
                    response: Some(response),
                }),
            },
            session_cookie: None,
        })
    }
}

/// An envelope carrying only an outer status code.
fn outer_status(code: i32) -> TransportResponse {
    TransportResponse {
        envelope: ResponseEnvelope {
            error_code: code,
            result: None,
        },
        session_cookie: None,
    }
}

#[async_trait]
impl Transport for FakeDevice {
    async fn post(
        &self,
        path: &str,
        body: &[u8],
        cookie: Option<&str>,
    ) -> Result<TransportResponse, Error> {
        let request: Value = serde_json::from_slice(body)?;
        let method = request["method"].as_str().unwrap_or_default();
        let params = &request["params"];

        let mut state = self.lock();
        match method {
            methods::HANDSHAKE => {
                assert_eq!(path, "/app");
                assert!(cookie.is_none());
                state.requests.push(Recorded {
                    path: path.to_string(),
                    cookie: None,
                    method: method.to_string(),
                    params: Value::Null,
                });
                Ok(Self::handshake(&mut state, params))
            }
            methods::SECURE_PASSTHROUGH => Self::passthrough(&mut state, path, cookie, params),
            other => Err(Error::Protocol(format!("unexpected outer method {}", other))),
        }
    }

    fn host(&self) -> &str {
        "fake"
    }

    fn port(&self) -> u16 {
        80
    }
}
