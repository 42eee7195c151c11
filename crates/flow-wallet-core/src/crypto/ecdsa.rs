//! ECDSA over P-256 and secp256k1
//!
//! All functions operate on 32-byte prehashed digests; hashing is the
//! caller's choice of [`HashAlgo`](crate::types::HashAlgo).

use crate::types::{Curve, PublicKeyHex};
use crate::{Error, Result};
use k256::ecdsa::RecoveryId;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// ECDSA signature (r, s) with the recovery id of the signer's key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// R component (32 bytes)
    pub r: [u8; 32],
    /// S component (32 bytes)
    pub s: [u8; 32],
    /// Recovery ID (0 or 1)
    pub recovery_id: u8,
}

impl Signature {
    /// Create a new signature
    pub fn new(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Self { r, s, recovery_id }
    }

    fn from_rs_bytes(bytes: &[u8], recovery_id: u8) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Self { r, s, recovery_id }
    }

    /// Convert to bytes (r || s), the Flow signature encoding
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }

    /// Get v value for pre-EIP-155 Ethereum signatures
    pub fn v(&self) -> u8 {
        self.recovery_id + 27
    }

    /// Get v value for EIP-155 replay-protected signatures
    pub fn eip155_v(&self, chain_id: u64) -> u64 {
        self.recovery_id as u64 + 35 + chain_id * 2
    }
}

fn invalid_key(curve: Curve, e: impl std::fmt::Display) -> Error {
    Error::InvalidKey {
        curve,
        reason: e.to_string(),
    }
}

fn check_signature_len(curve: Curve, signature: &[u8]) -> Result<()> {
    if signature.len() != 64 {
        return Err(invalid_key(
            curve,
            format!("signature must be 64 bytes, got {}", signature.len()),
        ));
    }
    Ok(())
}

/// Generate a fresh private key from the supplied entropy source
pub fn generate_private_key<R: RngCore + CryptoRng>(
    curve: Curve,
    rng: &mut R,
) -> Zeroizing<[u8; 32]> {
    let mut out = Zeroizing::new([0u8; 32]);
    match curve {
        Curve::P256 => {
            let key = p256::SecretKey::random(rng);
            out.copy_from_slice(&key.to_bytes());
        }
        Curve::Secp256k1 => {
            let key = k256::SecretKey::random(rng);
            out.copy_from_slice(&key.to_bytes());
        }
    }
    out
}

/// Uncompressed public key for a private key
pub fn public_key(curve: Curve, private_key: &[u8; 32]) -> Result<PublicKeyHex> {
    let encoded = match curve {
        Curve::P256 => {
            let key = p256::ecdsa::SigningKey::from_slice(private_key)
                .map_err(|e| invalid_key(curve, e))?;
            key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
        }
        Curve::Secp256k1 => {
            let key = k256::ecdsa::SigningKey::from_slice(private_key)
                .map_err(|e| invalid_key(curve, e))?;
            key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
        }
    };
    PublicKeyHex::from_bytes(&encoded)
}

/// Sign a 32-byte digest
///
/// secp256k1 signatures are low-S normalized by construction; P-256
/// signatures are normalized here so both curves emit canonical form.
pub fn sign_prehash(curve: Curve, private_key: &[u8; 32], digest: &[u8; 32]) -> Result<Signature> {
    match curve {
        Curve::P256 => {
            let key = p256::ecdsa::SigningKey::from_slice(private_key)
                .map_err(|e| invalid_key(curve, e))?;
            let signature: p256::ecdsa::Signature =
                key.sign_prehash(digest).map_err(|e| Error::InvalidInput(e.to_string()))?;
            let signature = signature.normalize_s().unwrap_or(signature);
            let bytes = signature.to_bytes();
            let recovery_id = p256_recovery_id(key.verifying_key(), digest, &signature)?;
            Ok(Signature::from_rs_bytes(&bytes, recovery_id))
        }
        Curve::Secp256k1 => {
            let key = k256::ecdsa::SigningKey::from_slice(private_key)
                .map_err(|e| invalid_key(curve, e))?;
            let (signature, recovery_id) = key
                .sign_prehash_recoverable(digest)
                .map_err(|e| Error::InvalidInput(e.to_string()))?;
            let bytes = signature.to_bytes();
            Ok(Signature::from_rs_bytes(&bytes, recovery_id.to_byte()))
        }
    }
}

fn p256_recovery_id(
    verifying_key: &p256::ecdsa::VerifyingKey,
    digest: &[u8; 32],
    signature: &p256::ecdsa::Signature,
) -> Result<u8> {
    for id in 0u8..2 {
        let Some(recovery_id) = RecoveryId::from_byte(id) else {
            continue;
        };
        if let Ok(recovered) =
            p256::ecdsa::VerifyingKey::recover_from_prehash(digest, signature, recovery_id)
            && &recovered == verifying_key
        {
            return Ok(id);
        }
    }
    Err(Error::RecoveryFailed {
        reason: "no recovery id reproduces the signing key".into(),
    })
}

/// Verify an `r‖s` signature over a 32-byte digest
///
/// Returns `Ok(false)` for a well-formed signature that does not verify;
/// malformed inputs are errors.
pub fn verify_prehash(
    curve: Curve,
    signature: &[u8],
    digest: &[u8; 32],
    public_key: &PublicKeyHex,
) -> Result<bool> {
    check_signature_len(curve, signature)?;
    let sec1 = public_key.to_sec1();
    match curve {
        Curve::P256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                .map_err(|e| invalid_key(curve, e))?;
            let signature =
                p256::ecdsa::Signature::from_slice(signature).map_err(|e| invalid_key(curve, e))?;
            Ok(key.verify_prehash(digest, &signature).is_ok())
        }
        Curve::Secp256k1 => {
            let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                .map_err(|e| invalid_key(curve, e))?;
            let signature =
                k256::ecdsa::Signature::from_slice(signature).map_err(|e| invalid_key(curve, e))?;
            Ok(key.verify_prehash(digest, &signature).is_ok())
        }
    }
}

/// Recover the signer's public key for one recovery id
pub fn recover_public_key(
    curve: Curve,
    signature: &[u8],
    digest: &[u8; 32],
    recovery_id: u8,
) -> Result<PublicKeyHex> {
    check_signature_len(curve, signature)?;
    let recovery_id = RecoveryId::from_byte(recovery_id).ok_or_else(|| Error::RecoveryFailed {
        reason: format!("recovery id {} out of range", recovery_id),
    })?;
    let failed = |e: k256::ecdsa::Error| Error::RecoveryFailed {
        reason: format!("{} recovery: {}", curve, e),
    };

    let encoded = match curve {
        Curve::P256 => {
            let signature =
                p256::ecdsa::Signature::from_slice(signature).map_err(|e| invalid_key(curve, e))?;
            let key = p256::ecdsa::VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
                .map_err(failed)?;
            key.to_encoded_point(false).as_bytes().to_vec()
        }
        Curve::Secp256k1 => {
            let signature =
                k256::ecdsa::Signature::from_slice(signature).map_err(|e| invalid_key(curve, e))?;
            let key = k256::ecdsa::VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
                .map_err(failed)?;
            key.to_encoded_point(false).as_bytes().to_vec()
        }
    };
    PublicKeyHex::from_bytes(&encoded)
}

/// Parse a DER-encoded P-256 signature into low-S `r‖s`
pub fn p256_signature_from_der(der: &[u8]) -> Result<[u8; 64]> {
    let signature = p256::ecdsa::Signature::from_der(der).map_err(|e| Error::RecoveryFailed {
        reason: format!("invalid DER signature: {}", e),
    })?;
    let signature = signature.normalize_s().unwrap_or(signature);
    let mut out = [0u8; 64];
    out.copy_from_slice(&signature.to_bytes());
    Ok(out)
}
