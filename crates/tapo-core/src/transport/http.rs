//! HTTP transport for Tapo devices.
//!
//! Tapo devices expose a small HTTP/1.1 server on port 80. Every request is
//! a JSON `POST /app`, and the device hands out its session cookie in a
//! `Set-Cookie` response header during the handshake.
//!
//! # Note on HTTP Implementation
//!
//! This implementation writes HTTP/1.1 by hand over a tokio [`TcpStream`],
//! in the same way as the other TP-Link transports: the embedded servers
//! are picky about header casing and connection reuse. Each call opens a new
//! connection, sends `Connection: close`, and reads the response until the
//! advertised `Content-Length` (or EOF).

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::{
    envelope::ResponseEnvelope,
    error::Error,
    transport::{DEFAULT_PORT, Transport, TransportResponse},
};

/// Transport using plain HTTP/1.1 POST requests.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tapo_core::transport::{HttpTransport, Transport};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let transport = HttpTransport::new("192.168.1.100", Duration::from_secs(2));
///     let response = transport
///         .post("/app", br#"{"method":"handshake","params":{}}"#, None)
///         .await?;
///     println!("error_code: {}", response.envelope.error_code);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    host: String,
    port: u16,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport for `address`, which may be `host` or `host:port`.
    pub fn new(address: &str, timeout: Duration) -> Self {
        let (host, port) = split_host_port(address);
        Self {
            host,
            port,
            timeout,
        }
    }

    /// Sends a raw HTTP POST request and returns status, body and cookie.
    async fn http_post(
        &self,
        path: &str,
        body: &[u8],
        cookie: Option<&str>,
    ) -> Result<(u16, Vec<u8>, Option<String>), Error> {
        let mut request = format!(
            "POST {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Accept: application/json\r\n\
             Connection: close\r\n",
            path,
            self.host_header(),
            body.len()
        );

        if let Some(cookie_value) = cookie {
            request.push_str(&format!("Cookie: {}\r\n", cookie_value));
        }

        request.push_str("\r\n");

        let addr = format!("{}:{}", self.host, self.port);
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::ConnectionFailed(format!("Connection to {} failed: {}", addr, e)))?;

        let mut full_request = request.into_bytes();
        full_request.extend_from_slice(body);

        stream.write_all(&full_request).await?;

        let mut response = Vec::with_capacity(1024);
        let mut buf = [0u8; 4096];

        loop {
            let n = stream.read(&mut buf).await?;

            if n == 0 {
                break;
            }

            response.extend_from_slice(&buf[..n]);

            if is_complete(&response) {
                break;
            }
        }

        parse_response(&response)
    }

    fn host_header(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        path: &str,
        body: &[u8],
        cookie: Option<&str>,
    ) -> Result<TransportResponse, Error> {
        debug!(host = %self.host, port = self.port, path, bytes = body.len(), "POST");

        let (status, body, session_cookie) = timeout(self.timeout, self.http_post(path, body, cookie))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "no response from {}:{} within {:?}",
                    self.host, self.port, self.timeout
                ))
            })??;

        if status != 200 {
            debug!(
                status,
                body = %String::from_utf8_lossy(&body),
                "Device returned non-200 status"
            );
            return Err(Error::Protocol(format!("HTTP status {}", status)));
        }

        let envelope: ResponseEnvelope = serde_json::from_slice(&body).map_err(|e| {
            Error::Protocol(format!("Response body is not a valid envelope: {}", e))
        })?;

        debug!(
            error_code = envelope.error_code,
            has_cookie = session_cookie.is_some(),
            "Received envelope"
        );

        Ok(TransportResponse {
            envelope,
            session_cookie,
        })
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }
}

/// Splits `host[:port]` (or `[v6]:port`), defaulting to port 80.
fn split_host_port(address: &str) -> (String, u16) {
    if let Some(rest) = address.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT);
            return (host.to_string(), port);
        }
    }

    match address.rsplit_once(':') {
        // A bare IPv6 address has more than one colon and no port.
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (address.to_string(), DEFAULT_PORT),
        },
        _ => (address.to_string(), DEFAULT_PORT),
    }
}

/// Returns true once headers and the full `Content-Length` body are buffered.
fn is_complete(data: &[u8]) -> bool {
    let Some(header_end) = find_header_end(data) else {
        return false;
    };
    let headers = String::from_utf8_lossy(&data[..header_end]);
    match parse_content_length(&headers) {
        Some(len) => data.len() >= header_end + 4 + len,
        // No length: read until the device closes the connection.
        None => false,
    }
}

fn parse_response(response: &[u8]) -> Result<(u16, Vec<u8>, Option<String>), Error> {
    let header_end = find_header_end(response)
        .ok_or_else(|| Error::Protocol("Invalid HTTP response: no header end".into()))?;

    let headers = String::from_utf8_lossy(&response[..header_end]);
    let body_start = header_end + 4;
    let mut body = response[body_start..].to_vec();
    if let Some(len) = parse_content_length(&headers) {
        body.truncate(len);
    }

    let status_code = parse_status_code(&headers)
        .ok_or_else(|| Error::Protocol("Invalid HTTP response: no status code".into()))?;

    Ok((status_code, body, parse_session_cookie(&headers)))
}

/// Find the position of "\r\n\r\n" in the response (end of headers).
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse the HTTP status code from the response headers.
fn parse_status_code(headers: &str) -> Option<u16> {
    headers
        .lines()
        .next()?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

/// Parse the Content-Length header value.
fn parse_content_length(headers: &str) -> Option<usize> {
    header_value(headers, "content-length")?.parse().ok()
}

/// Parse the session cookie from the first Set-Cookie header.
///
/// Only the first `;`-delimited segment is kept, e.g.
/// `TP_SESSIONID=ABC;TIMEOUT=1440` becomes `TP_SESSIONID=ABC`.
fn parse_session_cookie(headers: &str) -> Option<String> {
    let value = header_value(headers, "set-cookie")?;
    let cookie = value.split(';').next()?.trim();
    if cookie.is_empty() {
        None
    } else {
        Some(cookie.to_string())
    }
}

fn header_value<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim())
        } else {
            None
        }
    })
}
