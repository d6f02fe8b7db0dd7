//! RSA key exchange used by the handshake.
//!
//! The client generates an ephemeral RSA key pair for every handshake and
//! sends the public half to the device as a PEM string. The device answers
//! with a 32-byte session secret encrypted under that key using PKCS#1 v1.5
//! padding.

use rsa::{
    Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey,
    pkcs8::{EncodePublicKey, LineEnding},
    rand_core::OsRng,
};

use crate::{crypto::cipher::SECRET_LEN, error::Error};

/// Modulus size of the ephemeral handshake key.
pub const RSA_KEY_BITS: usize = 1024;

/// Ephemeral RSA key pair for one handshake.
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl KeyPair {
    /// Generates a new key pair from the operating system's CSPRNG.
    pub fn generate() -> Result<Self, Error> {
        Self::generate_with_bits(RSA_KEY_BITS)
    }

    /// Generates a key pair with a custom modulus size (at least 1024 bits).
    pub fn generate_with_bits(bits: usize) -> Result<Self, Error> {
        if bits < RSA_KEY_BITS {
            return Err(Error::Crypto(format!(
                "RSA key size {} is below the {}-bit minimum",
                bits, RSA_KEY_BITS
            )));
        }

        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| Error::Crypto(format!("RSA key generation failed: {}", e)))?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Encodes the public key as a `-----BEGIN PUBLIC KEY-----` PEM block.
    pub fn public_key_pem(&self) -> Result<String, Error> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::Crypto(format!("PEM encoding failed: {}", e)))
    }

    /// Decrypts the session secret delivered by the device.
    ///
    /// Fails unless the ciphertext decrypts under PKCS#1 v1.5 padding to
    /// exactly 32 bytes.
    pub fn decrypt_session_secret(&self, ciphertext: &[u8]) -> Result<[u8; SECRET_LEN], Error> {
        let plaintext = self
            .private_key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| Error::Crypto(format!("RSA decryption failed: {}", e)))?;

        plaintext.as_slice().try_into().map_err(|_| {
            Error::Crypto(format!(
                "session secret has unexpected length: {} (expected {})",
                plaintext.len(),
                SECRET_LEN
            ))
        })
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rsa::pkcs8::DecodePublicKey;

    use super::*;

    fn encrypt_for(pem: &str, data: &[u8]) -> Vec<u8> {
        let public_key = RsaPublicKey::from_public_key_pem(pem).unwrap();
        public_key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
            .unwrap()
    }

    #[test]
    fn test_public_key_pem_format() {
        let pair = KeyPair::generate().unwrap();
        let pem = pair.public_key_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
        assert!(pem.trim_end().ends_with("-----END PUBLIC KEY-----"));
        assert!(!pem.contains('\r'));
    }

    #[test]
    fn test_decrypt_session_secret() {
        let pair = KeyPair::generate().unwrap();
        let pem = pair.public_key_pem().unwrap();

        let secret: Vec<u8> = (0u8..32).collect();
        let ciphertext = encrypt_for(&pem, &secret);

        let decrypted = pair.decrypt_session_secret(&ciphertext).unwrap();
        assert_eq!(decrypted.as_slice(), secret.as_slice());
    }

    #[test]
    fn test_decrypt_rejects_wrong_length_secret() {
        let pair = KeyPair::generate().unwrap();
        let pem = pair.public_key_pem().unwrap();
        let ciphertext = encrypt_for(&pem, &[7u8; 16]);

        let err = pair.decrypt_session_secret(&ciphertext).unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let pair = KeyPair::generate().unwrap();
        let err = pair.decrypt_session_secret(&[0u8; 128]).unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[test]
    fn test_rejects_small_keys() {
        let err = KeyPair::generate_with_bits(512).unwrap_err();
        assert!(matches!(err, Error::Crypto(_)));
    }
}
