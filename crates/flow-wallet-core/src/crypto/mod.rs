//! Curve and signature engine
//!
//! Pure primitives over P-256 and secp256k1 plus the hashing, derivation and
//! at-rest encryption they depend on. [`CryptoContext`] bundles them behind
//! one explicitly constructed value that key handles and the codec borrow.

pub mod cipher;
pub mod ecdsa;
pub mod hash;
pub mod hd;

pub use cipher::EncryptedKey;
pub use ecdsa::Signature;

use crate::config::WalletConfig;
use crate::types::{Curve, HashAlgo, PublicKeyHex};
use crate::Result;
use rand::rngs::OsRng;
use tracing::debug;
use zeroize::Zeroizing;

/// Default PBKDF2 iteration count for stored secrets
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// Cryptographic context passed by reference into keys and codecs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoContext {
    pbkdf2_iterations: u32,
}

impl CryptoContext {
    pub fn new(pbkdf2_iterations: u32) -> Self {
        debug!(pbkdf2_iterations, "Crypto context initialized");
        Self { pbkdf2_iterations }
    }

    pub fn from_config(config: &WalletConfig) -> Self {
        Self::new(config.pbkdf2_iterations)
    }

    pub fn pbkdf2_iterations(&self) -> u32 {
        self.pbkdf2_iterations
    }

    pub fn hash(&self, data: &[u8], algo: HashAlgo) -> [u8; 32] {
        hash::digest(data, algo)
    }

    /// Hash `message` with `hash_algo` then sign the digest
    pub fn sign(
        &self,
        message: &[u8],
        curve: Curve,
        hash_algo: HashAlgo,
        private_key: &[u8; 32],
    ) -> Result<Signature> {
        let digest = self.hash(message, hash_algo);
        ecdsa::sign_prehash(curve, private_key, &digest)
    }

    pub fn sign_digest(
        &self,
        digest: &[u8; 32],
        curve: Curve,
        private_key: &[u8; 32],
    ) -> Result<Signature> {
        ecdsa::sign_prehash(curve, private_key, digest)
    }

    pub fn verify(
        &self,
        signature: &[u8],
        digest: &[u8; 32],
        public_key: &PublicKeyHex,
        curve: Curve,
    ) -> Result<bool> {
        ecdsa::verify_prehash(curve, signature, digest, public_key)
    }

    pub fn recover_public_key(
        &self,
        signature: &[u8],
        digest: &[u8; 32],
        curve: Curve,
        recovery_id: u8,
    ) -> Result<PublicKeyHex> {
        ecdsa::recover_public_key(curve, signature, digest, recovery_id)
    }

    pub fn public_key(&self, curve: Curve, private_key: &[u8; 32]) -> Result<PublicKeyHex> {
        ecdsa::public_key(curve, private_key)
    }

    pub fn hd_derive(&self, seed: &[u8], path: &str, curve: Curve) -> Result<Zeroizing<[u8; 32]>> {
        hd::derive_private_key(seed, path, curve)
    }

    /// Fresh private key from the operating system's entropy source
    pub fn generate_private_key(&self, curve: Curve) -> Zeroizing<[u8; 32]> {
        ecdsa::generate_private_key(curve, &mut OsRng)
    }

    pub fn encrypt(&self, plaintext: &[u8], password: &str) -> Result<EncryptedKey> {
        EncryptedKey::seal(plaintext, password, self.pbkdf2_iterations)
    }

    pub fn decrypt(&self, blob: &EncryptedKey, password: &str) -> Result<Zeroizing<Vec<u8>>> {
        blob.open(password)
    }
}

impl Default for CryptoContext {
    fn default() -> Self {
        Self::new(DEFAULT_PBKDF2_ITERATIONS)
    }
}
