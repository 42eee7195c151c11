//! Public-key recovery from WebAuthn assertions
//!
//! An assertion carries a signature but no public key. ECDSA recovery over
//! the signed digest yields every key that could have produced it; for P-256
//! that is normally two keys (one per parity of the nonce point), and both
//! verify. Recovery therefore needs a hint to settle on one key: the cached
//! key for the credential, keys known on chain, or a second assertion from
//! the same credential.

use super::bridge::Assertion;
use crate::crypto::CryptoContext;
use crate::crypto::ecdsa::p256_signature_from_der;
use crate::key::KeySlot;
use crate::types::{Curve, HashAlgo, PublicKeyHex};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// How the recovered key relates to keys the caller already knew
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum KeyConsistency {
    /// A known key is among the recovered candidates
    Matched,
    /// No known key to compare against
    NoCachedKey,
    /// Known keys were supplied but none of them signed this assertion
    Mismatch { known: Vec<PublicKeyHex> },
}

/// What narrows the candidate set down to one key
#[derive(Debug, Clone, Copy)]
pub enum RecoveryHint<'a> {
    None,
    /// Cached or on-chain keys for the credential
    KnownKeys(&'a [PublicKeyHex]),
    /// Another assertion produced by the same credential
    SecondAssertion(&'a Assertion),
}

/// Outcome of a successful recovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredKey {
    pub public_key: PublicKeyHex,
    pub consistency: KeyConsistency,
}

/// `SHA256(authenticatorData ‖ SHA256(clientDataJSON))`
pub fn assertion_digest(
    ctx: &CryptoContext,
    authenticator_data: &[u8],
    client_data_json: &[u8],
) -> [u8; 32] {
    let client_data_hash = ctx.hash(client_data_json, HashAlgo::Sha2_256);
    let mut message = Vec::with_capacity(authenticator_data.len() + 32);
    message.extend_from_slice(authenticator_data);
    message.extend_from_slice(&client_data_hash);
    ctx.hash(&message, HashAlgo::Sha2_256)
}

/// Every distinct key that recovers from the assertion and verifies it
#[instrument(skip(ctx, assertion), fields(credential_id = %assertion.credential_id))]
pub fn recover_candidates(ctx: &CryptoContext, assertion: &Assertion) -> Result<Vec<PublicKeyHex>> {
    let digest = assertion_digest(
        ctx,
        &assertion.authenticator_data,
        &assertion.client_data_json,
    );
    let signature = p256_signature_from_der(&assertion.signature)?;

    let mut candidates: Vec<PublicKeyHex> = Vec::with_capacity(2);
    for recovery_id in 0u8..4 {
        let Ok(candidate) = ctx.recover_public_key(&signature, &digest, Curve::P256, recovery_id)
        else {
            continue;
        };
        if ctx.verify(&signature, &digest, &candidate, Curve::P256)? && !candidates.contains(&candidate)
        {
            candidates.push(candidate);
        }
    }

    debug!(candidates = candidates.len(), "Recovered passkey candidates");
    if candidates.is_empty() {
        return Err(Error::RecoveryFailed {
            reason: "no recovered key verifies the assertion signature".into(),
        });
    }
    Ok(candidates)
}

fn single(mut keys: Vec<PublicKeyHex>, consistency: KeyConsistency) -> Result<RecoveredKey> {
    match keys.len() {
        0 => Err(Error::RecoveryFailed {
            reason: "no candidate key survives the recovery hint".into(),
        }),
        1 => Ok(RecoveredKey {
            public_key: keys.remove(0),
            consistency,
        }),
        n => Err(Error::AmbiguousRecovery { candidates: n }),
    }
}

/// Compare recovered candidates with keys known for the credential
pub fn check_known_keys(candidates: &[PublicKeyHex], known: &[PublicKeyHex]) -> KeyConsistency {
    if known.is_empty() {
        return KeyConsistency::NoCachedKey;
    }
    if candidates.iter().any(|candidate| known.contains(candidate)) {
        return KeyConsistency::Matched;
    }
    warn!(
        known = known.len(),
        candidates = candidates.len(),
        "Recovered passkey key does not match the known key for this credential"
    );
    KeyConsistency::Mismatch {
        known: known.to_vec(),
    }
}

/// Recover the one public key that signed `assertion`
///
/// Zero surviving candidates is `RecoveryFailed`; more than one is
/// `AmbiguousRecovery`. A known-key mismatch is logged and recorded in
/// [`RecoveredKey::consistency`], and recovery then falls back to the
/// unfiltered candidates.
#[instrument(skip(ctx, assertion, hint), fields(credential_id = %assertion.credential_id))]
pub fn recover_public_key(
    ctx: &CryptoContext,
    assertion: &Assertion,
    hint: RecoveryHint<'_>,
) -> Result<RecoveredKey> {
    let candidates = recover_candidates(ctx, assertion)?;

    match hint {
        RecoveryHint::None => single(candidates, KeyConsistency::NoCachedKey),
        RecoveryHint::KnownKeys(known) => match check_known_keys(&candidates, known) {
            KeyConsistency::Matched => {
                let matching = candidates
                    .into_iter()
                    .filter(|candidate| known.contains(candidate))
                    .collect();
                single(matching, KeyConsistency::Matched)
            }
            consistency => single(candidates, consistency),
        },
        RecoveryHint::SecondAssertion(other) => {
            let others = recover_candidates(ctx, other)?;
            let shared = candidates
                .into_iter()
                .filter(|candidate| others.contains(candidate))
                .collect();
            single(shared, KeyConsistency::NoCachedKey)
        }
    }
}

/// Recover the signer of `assertion` and cache it on the passkey in `slot`
///
/// Without an explicit hint the cached key is the hint. The consistency of
/// the result is judged against the cached key: a different cached key is
/// kept and reported as `Mismatch`.
#[instrument(skip(ctx, slot, assertion, hint), fields(credential_id = %assertion.credential_id))]
pub fn recover_into_slot(
    ctx: &CryptoContext,
    slot: &KeySlot,
    assertion: &Assertion,
    hint: RecoveryHint<'_>,
) -> Result<RecoveredKey> {
    let cached = slot.with_handle("passkey_recover", |handle| {
        let passkey = handle.as_passkey().ok_or(Error::KeyNotInitialized {
            operation: "passkey_recover",
        })?;
        if passkey.credential_id() != assertion.credential_id {
            return Err(Error::WebAuthn(format!(
                "assertion from credential {} but the slot holds {}",
                assertion.credential_id,
                passkey.credential_id()
            )));
        }
        Ok(passkey.cached_public_key().cloned())
    })?;

    let known: Vec<PublicKeyHex> = cached.into_iter().collect();
    let hint = match hint {
        RecoveryHint::None if !known.is_empty() => RecoveryHint::KnownKeys(&known),
        other => other,
    };
    let mut recovered = recover_public_key(ctx, assertion, hint)?;
    recovered.consistency = slot.cache_passkey_key(&recovered.public_key)?;
    Ok(recovered)
}
