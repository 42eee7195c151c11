//! At-rest encryption for key material
//!
//! A password is stretched with PBKDF2-HMAC-SHA256 into a ChaCha20-Poly1305
//! key. The resulting [`EncryptedKey`] blob carries its own salt, nonce and
//! iteration count so it can be opened with only the password.

use crate::{Error, Result};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use hmac::Hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Encrypted secret with the parameters needed to decrypt it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKey {
    /// Encrypted secret bytes (with Poly1305 tag)
    pub ciphertext: Vec<u8>,
    /// Nonce used for encryption (12 bytes)
    pub nonce: [u8; 12],
    /// PBKDF2 salt (32 bytes)
    pub salt: [u8; 32],
    /// PBKDF2 iteration count
    pub iterations: u32,
    /// Creation timestamp
    pub created_at: i64,
    /// Version for future compatibility
    pub version: u32,
}

impl EncryptedKey {
    /// Current version of the encrypted blob format
    pub const CURRENT_VERSION: u32 = 1;

    /// Encrypt `plaintext` under a key derived from `password`
    pub fn seal(plaintext: &[u8], password: &str, iterations: u32) -> Result<Self> {
        if iterations == 0 {
            return Err(Error::Encryption("iteration count must be non-zero".into()));
        }
        let salt: [u8; 32] = rand::random();
        let key = derive_key(password.as_bytes(), &salt, iterations);
        let (nonce, ciphertext) = encrypt(&key, plaintext)?;

        Ok(Self {
            ciphertext,
            nonce,
            salt,
            iterations,
            created_at: chrono::Utc::now().timestamp(),
            version: Self::CURRENT_VERSION,
        })
    }

    /// Decrypt with `password`
    pub fn open(&self, password: &str) -> Result<Zeroizing<Vec<u8>>> {
        if self.version != Self::CURRENT_VERSION {
            return Err(Error::Encryption(format!(
                "unsupported blob version {}",
                self.version
            )));
        }
        let key = derive_key(password.as_bytes(), &self.salt, self.iterations);
        decrypt(&key, &self.nonce, &self.ciphertext)
    }

    /// Opaque bytes handed to secure storage
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Storage(format!("corrupt key blob: {}", e)))
    }
}

/// PBKDF2-HMAC-SHA256 into a 32-byte key
pub fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, key.as_mut_slice());
    key
}

/// Encrypt with a fresh random nonce, returning `(nonce, ciphertext)`
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<([u8; 12], Vec<u8>)> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let nonce_bytes: [u8; 12] = rand::random();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| Error::Encryption(e.to_string()))?;
    Ok((nonce_bytes, ciphertext))
}

pub fn decrypt(key: &[u8; 32], nonce: &[u8; 12], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| Error::Encryption("Decryption failed - invalid key or corrupted data".into()))
}
