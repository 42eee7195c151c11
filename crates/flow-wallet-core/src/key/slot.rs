//! Key slot: a handle plus its one-in-flight signing guard

use crate::crypto::CryptoContext;
use crate::crypto::ecdsa::Signature;
use crate::key::{KeyHandle, KeyType};
use crate::passkey::KeyConsistency;
use crate::types::{Curve, HashAlgo, PublicKeyHex};
use crate::{Error, Result};
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Shared home of the wallet's unlocked key
///
/// At most one signing operation holds the slot at a time; a second caller
/// gets [`Error::SignerBusy`] instead of queueing behind, so a passkey can
/// never raise two overlapping biometric prompts.
#[derive(Debug, Default)]
pub struct KeySlot {
    handle: RwLock<Option<KeyHandle>>,
    in_flight: Mutex<()>,
}

/// Proof that the caller owns the slot's signing turn
#[derive(Debug)]
pub struct SigningGuard<'a> {
    _turn: MutexGuard<'a, ()>,
}

impl KeySlot {
    pub fn new(handle: KeyHandle) -> Self {
        Self {
            handle: RwLock::new(Some(handle)),
            in_flight: Mutex::new(()),
        }
    }

    /// Slot with no key loaded
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_unlocked(&self) -> bool {
        self.handle
            .read()
            .as_ref()
            .is_some_and(KeyHandle::is_available)
    }

    pub fn key_type(&self) -> Option<KeyType> {
        self.handle.read().as_ref().map(KeyHandle::key_type)
    }

    /// Replace the held key; the previous one is wiped first
    pub fn unlock(&self, handle: KeyHandle) {
        let mut slot = self.handle.write();
        if let Some(previous) = slot.as_mut() {
            previous.wipe();
        }
        *slot = Some(handle);
    }

    /// Wipe and drop the held key before returning
    pub fn lock(&self) {
        let mut slot = self.handle.write();
        if let Some(handle) = slot.as_mut() {
            handle.wipe();
        }
        *slot = None;
        debug!("Key slot locked");
    }

    /// Claim the signing turn or fail with `SignerBusy`
    pub fn begin(&self, operation: &'static str) -> Result<SigningGuard<'_>> {
        let turn = self
            .in_flight
            .try_lock()
            .map_err(|_| Error::SignerBusy { operation })?;
        Ok(SigningGuard { _turn: turn })
    }

    /// Run `f` against the held key
    pub fn with_handle<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&KeyHandle) -> Result<R>,
    ) -> Result<R> {
        let slot = self.handle.read();
        let handle = slot.as_ref().ok_or(Error::KeyNotInitialized { operation })?;
        f(handle)
    }

    /// Run `f` with mutable access to the held key
    pub fn with_handle_mut<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut KeyHandle) -> Result<R>,
    ) -> Result<R> {
        let mut slot = self.handle.write();
        let handle = slot.as_mut().ok_or(Error::KeyNotInitialized { operation })?;
        f(handle)
    }

    /// Record a recovered key on the held passkey
    ///
    /// An empty cache takes the key and reports `NoCachedKey`. A different
    /// cached key is kept, logged and reported as `Mismatch`.
    pub fn cache_passkey_key(&self, public_key: &PublicKeyHex) -> Result<KeyConsistency> {
        self.with_handle_mut("cache_passkey_key", |handle| {
            let cached = handle
                .as_passkey()
                .ok_or(Error::KeyNotInitialized {
                    operation: "cache_passkey_key",
                })?
                .cached_public_key()
                .cloned();
            match cached {
                None => {
                    handle.set_cached_public_key(public_key.clone())?;
                    debug!(public_key = %public_key, "Cached recovered passkey key");
                    Ok(KeyConsistency::NoCachedKey)
                }
                Some(cached) if cached == *public_key => Ok(KeyConsistency::Matched),
                Some(cached) => {
                    warn!(
                        cached = %cached,
                        recovered = %public_key,
                        "Recovered passkey key differs from the cached key; cache kept"
                    );
                    Ok(KeyConsistency::Mismatch {
                        known: vec![cached],
                    })
                }
            }
        })
    }

    pub fn public_key(
        &self,
        ctx: &CryptoContext,
        curve: Curve,
        derivation_path: Option<&str>,
    ) -> Result<Option<PublicKeyHex>> {
        self.with_handle("public_key", |handle| {
            handle.public_key(ctx, curve, derivation_path)
        })
    }

    /// Sign under the slot's signing guard
    pub fn sign(
        &self,
        ctx: &CryptoContext,
        data: &[u8],
        curve: Curve,
        hash_algo: HashAlgo,
        derivation_path: Option<&str>,
    ) -> Result<Signature> {
        let _guard = self.begin("sign")?;
        self.with_handle("sign", |handle| {
            handle.sign_at(ctx, data, curve, hash_algo, derivation_path)
        })
    }

    pub fn sign_digest(
        &self,
        ctx: &CryptoContext,
        digest: &[u8; 32],
        curve: Curve,
        derivation_path: Option<&str>,
    ) -> Result<Signature> {
        let _guard = self.begin("sign_digest")?;
        self.with_handle("sign_digest", |handle| {
            handle.sign_digest_at(ctx, digest, curve, derivation_path)
        })
    }
}
