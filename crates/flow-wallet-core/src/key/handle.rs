//! Key handles
//!
//! A [`KeyHandle`] is the closed set of key sources the wallet signs with.
//! Every variant answers the same three questions (public key, private key,
//! sign) for a requested curve. Secret bytes live in [`Zeroizing`] buffers
//! owned by the handle; [`KeyHandle::wipe`] drops them in place so they are
//! overwritten before the call returns.

use crate::crypto::ecdsa::Signature;
use crate::crypto::hd::FLOW_DEFAULT_PATH;
use crate::crypto::{CryptoContext, EncryptedKey};
use crate::key::mnemonic;
use crate::key::storage::SecureStorage;
use crate::types::{Curve, HashAlgo, PublicKeyHex};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Variant tag of a [`KeyHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyType {
    SeedPhrase,
    RawPrivateKey,
    Passkey,
}

struct SeedSecret {
    mnemonic: Zeroizing<String>,
    passphrase: Zeroizing<String>,
    seed: Zeroizing<[u8; 64]>,
}

/// BIP39 mnemonic with an optional passphrase and a default derivation path
pub struct SeedPhraseKey {
    secret: Option<SeedSecret>,
    derivation_path: String,
}

/// Raw 32-byte private key bound to a single curve
pub struct RawPrivateKey {
    secret: Option<Zeroizing<[u8; 32]>>,
    curve: Curve,
}

/// WebAuthn credential reference; the private key never leaves the authenticator
#[derive(Clone, PartialEq, Eq)]
pub struct PasskeyHandle {
    credential_id: String,
    cached_public_key: Option<PublicKeyHex>,
}

/// A key of known provenance
pub enum KeyHandle {
    SeedPhrase(SeedPhraseKey),
    RawPrivateKey(RawPrivateKey),
    Passkey(PasskeyHandle),
}

impl SeedPhraseKey {
    fn secret(&self, operation: &'static str) -> Result<&SeedSecret> {
        self.secret
            .as_ref()
            .ok_or(Error::KeyNotInitialized { operation })
    }

    pub fn derivation_path(&self) -> &str {
        &self.derivation_path
    }
}

impl RawPrivateKey {
    pub fn curve(&self) -> Curve {
        self.curve
    }
}

impl PasskeyHandle {
    /// Base64url credential id
    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    pub fn cached_public_key(&self) -> Option<&PublicKeyHex> {
        self.cached_public_key.as_ref()
    }
}

impl KeyHandle {
    /// Import a mnemonic; `derivation_path` defaults to the Flow path
    pub fn from_mnemonic(
        phrase: &str,
        passphrase: &str,
        derivation_path: Option<&str>,
    ) -> Result<Self> {
        let derivation_path = derivation_path.unwrap_or(FLOW_DEFAULT_PATH);
        crate::crypto::hd::parse_path(derivation_path)?;
        let seed = mnemonic::mnemonic_to_seed(phrase, passphrase)?;
        let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");

        Ok(KeyHandle::SeedPhrase(SeedPhraseKey {
            secret: Some(SeedSecret {
                mnemonic: Zeroizing::new(normalized),
                passphrase: Zeroizing::new(passphrase.to_string()),
                seed,
            }),
            derivation_path: derivation_path.to_string(),
        }))
    }

    /// Create a fresh mnemonic of `strength` bits
    pub fn generate_seed_phrase(strength: usize) -> Result<Self> {
        let phrase = mnemonic::generate_mnemonic(strength)?;
        Self::from_mnemonic(&phrase, "", None)
    }

    /// Import a raw private key (32 bytes) for `curve`
    pub fn from_private_key(bytes: &[u8], curve: Curve) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(Error::InvalidKey {
                curve,
                reason: format!("private key must be 32 bytes, got {}", bytes.len()),
            });
        }
        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(bytes);
        // Rejects zero and out-of-range scalars
        crate::crypto::ecdsa::public_key(curve, &secret)?;
        Ok(KeyHandle::RawPrivateKey(RawPrivateKey {
            secret: Some(secret),
            curve,
        }))
    }

    /// Import a hex private key, with or without `0x`
    pub fn from_private_key_hex(hex_key: &str, curve: Curve) -> Result<Self> {
        let trimmed = hex_key.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(hex::decode(stripped)?);
        Self::from_private_key(&bytes, curve)
    }

    pub fn generate_private_key(ctx: &CryptoContext, curve: Curve) -> Self {
        KeyHandle::RawPrivateKey(RawPrivateKey {
            secret: Some(ctx.generate_private_key(curve)),
            curve,
        })
    }

    pub fn passkey(credential_id: impl Into<String>, cached_public_key: Option<PublicKeyHex>) -> Self {
        KeyHandle::Passkey(PasskeyHandle {
            credential_id: credential_id.into(),
            cached_public_key,
        })
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyHandle::SeedPhrase(_) => KeyType::SeedPhrase,
            KeyHandle::RawPrivateKey(_) => KeyType::RawPrivateKey,
            KeyHandle::Passkey(_) => KeyType::Passkey,
        }
    }

    pub fn as_passkey(&self) -> Option<&PasskeyHandle> {
        match self {
            KeyHandle::Passkey(passkey) => Some(passkey),
            _ => None,
        }
    }

    /// Whether the secret behind the handle is present
    pub fn is_available(&self) -> bool {
        match self {
            KeyHandle::SeedPhrase(key) => key.secret.is_some(),
            KeyHandle::RawPrivateKey(key) => key.secret.is_some(),
            KeyHandle::Passkey(_) => true,
        }
    }

    /// Record a recovered public key on a passkey handle
    pub fn set_cached_public_key(&mut self, public_key: PublicKeyHex) -> Result<()> {
        match self {
            KeyHandle::Passkey(passkey) => {
                passkey.cached_public_key = Some(public_key);
                Ok(())
            }
            _ => Err(Error::InvalidInput(
                "only passkey handles cache a public key".into(),
            )),
        }
    }

    /// Private key for `curve`
    ///
    /// `None` when this handle cannot produce one for `curve`: always for
    /// passkeys, and for raw keys created on the other curve.
    pub fn private_key(
        &self,
        ctx: &CryptoContext,
        curve: Curve,
        derivation_path: Option<&str>,
    ) -> Result<Option<Zeroizing<[u8; 32]>>> {
        match self {
            KeyHandle::SeedPhrase(key) => {
                let secret = key.secret("private_key")?;
                let path = derivation_path.unwrap_or(&key.derivation_path);
                ctx.hd_derive(secret.seed.as_slice(), path, curve).map(Some)
            }
            KeyHandle::RawPrivateKey(key) => {
                let secret = key
                    .secret
                    .as_ref()
                    .ok_or(Error::KeyNotInitialized {
                        operation: "private_key",
                    })?;
                if key.curve != curve {
                    return Ok(None);
                }
                Ok(Some(secret.clone()))
            }
            KeyHandle::Passkey(_) => Ok(None),
        }
    }

    /// Public key for `curve`
    ///
    /// Passkeys return the cached key, or `None` until recovery has run.
    pub fn public_key(
        &self,
        ctx: &CryptoContext,
        curve: Curve,
        derivation_path: Option<&str>,
    ) -> Result<Option<PublicKeyHex>> {
        if let KeyHandle::Passkey(passkey) = self {
            if curve != Curve::P256 {
                return Ok(None);
            }
            return Ok(passkey.cached_public_key.clone());
        }
        match self.private_key(ctx, curve, derivation_path)? {
            Some(private_key) => ctx.public_key(curve, &private_key).map(Some),
            None => Ok(None),
        }
    }

    /// Hash `data` with `hash_algo` and sign with the key for `curve`
    #[instrument(skip(self, ctx, data), fields(key_type = ?self.key_type()))]
    pub fn sign(
        &self,
        ctx: &CryptoContext,
        data: &[u8],
        curve: Curve,
        hash_algo: HashAlgo,
    ) -> Result<Signature> {
        self.sign_at(ctx, data, curve, hash_algo, None)
    }

    /// [`sign`](Self::sign) with an explicit derivation path
    pub fn sign_at(
        &self,
        ctx: &CryptoContext,
        data: &[u8],
        curve: Curve,
        hash_algo: HashAlgo,
        derivation_path: Option<&str>,
    ) -> Result<Signature> {
        if let KeyHandle::Passkey(_) = self {
            return Err(Error::KeyNotInitialized {
                operation: "sign (passkeys sign through the WebAuthn bridge)",
            });
        }
        let private_key = self
            .private_key(ctx, curve, derivation_path)?
            .ok_or(Error::UnsupportedCurve {
                curve,
                operation: "sign",
            })?;
        let signature = ctx.sign(data, curve, hash_algo, &private_key)?;
        debug!(%curve, %hash_algo, "Signed with local key");
        Ok(signature)
    }

    /// Sign a precomputed digest (EVM signing hashes)
    pub fn sign_digest_at(
        &self,
        ctx: &CryptoContext,
        digest: &[u8; 32],
        curve: Curve,
        derivation_path: Option<&str>,
    ) -> Result<Signature> {
        if let KeyHandle::Passkey(_) = self {
            return Err(Error::KeyNotInitialized {
                operation: "sign_digest",
            });
        }
        let private_key = self
            .private_key(ctx, curve, derivation_path)?
            .ok_or(Error::UnsupportedCurve {
                curve,
                operation: "sign_digest",
            })?;
        ctx.sign_digest(digest, curve, &private_key)
    }

    /// Drop the secret in place; later secret access fails with `KeyNotInitialized`
    pub fn wipe(&mut self) {
        match self {
            KeyHandle::SeedPhrase(key) => key.secret = None,
            KeyHandle::RawPrivateKey(key) => key.secret = None,
            KeyHandle::Passkey(_) => {}
        }
    }

    /// Encrypt the handle with `password` and persist it under `id`
    #[instrument(skip(self, ctx, storage, password))]
    pub async fn store(
        &self,
        ctx: &CryptoContext,
        storage: &dyn SecureStorage,
        id: &str,
        password: &str,
    ) -> Result<()> {
        let stored = self.to_stored()?;
        let plaintext = Zeroizing::new(serde_json::to_vec(&stored)?);
        let blob = ctx.encrypt(&plaintext, password)?;
        storage.store(id, &blob.to_bytes()?).await?;
        debug!(key_type = ?self.key_type(), "Key stored");
        Ok(())
    }

    /// Load and decrypt a handle stored with [`store`](Self::store)
    #[instrument(skip(ctx, storage, password))]
    pub async fn load(
        ctx: &CryptoContext,
        storage: &dyn SecureStorage,
        id: &str,
        password: &str,
    ) -> Result<Self> {
        let bytes = storage
            .retrieve(id)
            .await?
            .ok_or_else(|| Error::Storage(format!("no key stored under {}", id)))?;
        let blob = EncryptedKey::from_bytes(&bytes)?;
        let plaintext = ctx.decrypt(&blob, password)?;
        let stored: StoredKey = serde_json::from_slice(&plaintext)?;
        Self::from_stored(&stored)
    }

    /// Wipe the in-memory secret, then delete `id` from storage
    #[instrument(skip(self, storage))]
    pub async fn remove(&mut self, storage: &dyn SecureStorage, id: &str) -> Result<bool> {
        self.wipe();
        storage.remove(id).await
    }

    fn to_stored(&self) -> Result<StoredKey> {
        match self {
            KeyHandle::SeedPhrase(key) => {
                let secret = key.secret("store")?;
                Ok(StoredKey::SeedPhrase {
                    mnemonic: secret.mnemonic.to_string(),
                    passphrase: secret.passphrase.to_string(),
                    derivation_path: key.derivation_path.clone(),
                })
            }
            KeyHandle::RawPrivateKey(key) => {
                let secret = key
                    .secret
                    .as_ref()
                    .ok_or(Error::KeyNotInitialized { operation: "store" })?;
                Ok(StoredKey::RawPrivateKey {
                    private_key: hex::encode(secret.as_slice()),
                    curve: key.curve,
                })
            }
            KeyHandle::Passkey(passkey) => Ok(StoredKey::Passkey {
                credential_id: passkey.credential_id.clone(),
                public_key: passkey.cached_public_key.clone(),
            }),
        }
    }

    fn from_stored(stored: &StoredKey) -> Result<Self> {
        match stored {
            StoredKey::SeedPhrase {
                mnemonic,
                passphrase,
                derivation_path,
            } => Self::from_mnemonic(mnemonic, passphrase, Some(derivation_path)),
            StoredKey::RawPrivateKey { private_key, curve } => {
                Self::from_private_key_hex(private_key, *curve)
            }
            StoredKey::Passkey {
                credential_id,
                public_key,
            } => Ok(Self::passkey(credential_id.clone(), public_key.clone())),
        }
    }
}

impl Zeroize for KeyHandle {
    fn zeroize(&mut self) {
        self.wipe();
    }
}

/// Plaintext form encrypted into storage
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(tag = "type", rename_all = "camelCase")]
enum StoredKey {
    #[serde(rename_all = "camelCase")]
    SeedPhrase {
        mnemonic: String,
        passphrase: String,
        derivation_path: String,
    },
    #[serde(rename_all = "camelCase")]
    RawPrivateKey {
        private_key: String,
        #[zeroize(skip)]
        curve: Curve,
    },
    #[serde(rename_all = "camelCase")]
    Passkey {
        credential_id: String,
        #[zeroize(skip)]
        public_key: Option<PublicKeyHex>,
    },
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyHandle::SeedPhrase(key) => f
                .debug_struct("SeedPhrase")
                .field("derivation_path", &key.derivation_path)
                .field("available", &key.secret.is_some())
                .finish_non_exhaustive(),
            KeyHandle::RawPrivateKey(key) => f
                .debug_struct("RawPrivateKey")
                .field("curve", &key.curve)
                .field("available", &key.secret.is_some())
                .finish_non_exhaustive(),
            KeyHandle::Passkey(passkey) => fmt::Debug::fmt(passkey, f),
        }
    }
}

impl fmt::Debug for PasskeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Passkey")
            .field("credential_id", &self.credential_id)
            .field("cached_public_key", &self.cached_public_key)
            .finish()
    }
}
