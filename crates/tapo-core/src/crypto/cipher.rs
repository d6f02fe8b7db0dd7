//! AES-128-CBC session cipher.
//!
//! The 32-byte secret delivered during the handshake is split into a 16-byte
//! key and a 16-byte IV. The IV is fixed for the lifetime of the session: the
//! device expects every message to be encrypted from the same IV, so the
//! cipher holds no per-message state.

use aes::{
    Aes128,
    cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7},
};

use crate::error::Error;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Length of the session secret delivered by the device.
pub const SECRET_LEN: usize = 32;

/// AES key length.
const KEY_LEN: usize = 16;

/// Key and IV for one session.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherContext {
    key: [u8; KEY_LEN],
    iv: [u8; 16],
}

impl CipherContext {
    /// Splits a 32-byte handshake secret into key (first half) and IV
    /// (second half).
    pub fn from_secret(secret: &[u8]) -> Result<Self, Error> {
        if secret.len() != SECRET_LEN {
            return Err(Error::Crypto(format!(
                "session secret has unexpected length: {} (expected {})",
                secret.len(),
                SECRET_LEN
            )));
        }

        let mut key = [0u8; KEY_LEN];
        let mut iv = [0u8; 16];
        key.copy_from_slice(&secret[..KEY_LEN]);
        iv.copy_from_slice(&secret[KEY_LEN..]);

        Ok(Self { key, iv })
    }
}

impl std::fmt::Debug for CipherContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherContext")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

/// Symmetric cipher wrapping every request and response of a session.
#[derive(Clone, Debug)]
pub struct SessionCipher {
    context: CipherContext,
}

impl SessionCipher {
    /// Creates a cipher from the session's key material.
    pub fn new(context: CipherContext) -> Self {
        Self { context }
    }

    /// Encrypts `plaintext` with PKCS#7 padding.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes128CbcEnc::new(&self.context.key.into(), &self.context.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Decrypts `ciphertext` and strips its PKCS#7 padding.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        Aes128CbcDec::new(&self.context.key.into(), &self.context.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::Crypto("AES decryption failed: invalid padding or length".into()))
    }
}
