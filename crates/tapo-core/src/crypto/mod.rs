//! Cryptographic primitives for Tapo device communication.
//!
//! - [`handshake`]: ephemeral RSA key pair used to receive the session secret
//! - [`cipher`]: AES-128-CBC cipher wrapping every post-handshake message

pub mod cipher;
pub mod handshake;

pub use cipher::{CipherContext, SECRET_LEN, SessionCipher};
pub use handshake::{KeyPair, RSA_KEY_BITS};
