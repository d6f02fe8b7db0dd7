//! Core library for communicating with TP-Link Tapo smart plugs over the
//! local network.
//!
//! # Overview
//!
//! Tapo devices speak JSON over HTTP on port 80. Before anything useful can
//! be sent, the client and device agree on a session key:
//!
//! 1. The client generates an ephemeral RSA-1024 key pair and POSTs the
//!    public key (`handshake`).
//! 2. The device answers with a 32-byte secret encrypted under that key and
//!    a session cookie. The secret becomes an AES-128-CBC key (first 16
//!    bytes) and IV (last 16 bytes).
//! 3. Every further request is encrypted with that cipher and wrapped in a
//!    `securePassthrough` envelope. The first one is `login_device`, which
//!    returns a token that is passed as a `token` query parameter from then on.
//!
//! When the device answers with status `9999` the session has expired; the
//! [`Device`] renews it once and retries.
//!
//! # Example
//!
//! ```no_run
//! use tapo_core::{Device, DeviceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut device = Device::new(DeviceConfig::from_env()?);
//!     device.login().await?;
//!
//!     let status = device.get_status().await?;
//!     if status.supports_energy_monitoring() {
//!         let energy = device.get_energy_usage().await?;
//!         println!("{}: {} mW", status.nickname, energy.current_power);
//!     }
//!     Ok(())
//! }
//! ```

pub mod credentials;
pub mod crypto;
pub mod device;
pub mod envelope;
pub mod error;
mod operations;
pub mod response;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use credentials::{CredentialDigest, Credentials};
pub use device::{Device, DeviceConfig};
pub use error::Error;
pub use response::{DeviceStatus, DeviceUsage, EnergyUsage, LocalTime, UsageWindows, supports_energy_monitoring};
pub use session::{SessionStage, SessionState};
pub use transport::{DEFAULT_TIMEOUT, HttpTransport, Transport, TransportResponse};

/// The version of the tapo-core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
