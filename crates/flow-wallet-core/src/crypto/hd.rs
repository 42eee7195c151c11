//! Hierarchical deterministic derivation (BIP32 / SLIP-0010)
//!
//! secp256k1 keys follow BIP32 with the `Bitcoin seed` master key; P-256
//! keys follow SLIP-0010 with the `Nist256p1 seed` master key. Both use the
//! SLIP-0010 retry rule when an intermediate scalar is out of range.

use crate::types::Curve;
use crate::{Error, Result};
use derivation_path::{ChildIndex, DerivationPath};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

type HmacSha512 = Hmac<Sha512>;

/// Offset added to hardened child indices
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Default Flow derivation path
pub const FLOW_DEFAULT_PATH: &str = "m/44'/539'/0'/0/0";

/// Default EVM derivation path
pub const EVM_DEFAULT_PATH: &str = "m/44'/60'/0'/0/0";

/// Curve operations needed by the derivation walk
trait HdCurve {
    const SEED_KEY: &'static [u8];

    /// Whether `bytes` is a scalar in `[1, n)`
    fn is_valid_scalar(bytes: &[u8; 32]) -> bool;

    /// `(parent + tweak) mod n`, or `None` if `tweak >= n` or the sum is zero
    fn add_scalars(parent: &[u8; 32], tweak: &[u8; 32]) -> Option<[u8; 32]>;

    /// Compressed SEC1 public point for a private scalar
    fn compressed_point(private_key: &[u8; 32]) -> Option<[u8; 33]>;
}

macro_rules! impl_hd_curve {
    ($marker:ident, $krate:ident, $seed:expr) => {
        struct $marker;

        impl HdCurve for $marker {
            const SEED_KEY: &'static [u8] = $seed;

            fn is_valid_scalar(bytes: &[u8; 32]) -> bool {
                $krate::SecretKey::from_slice(bytes).is_ok()
            }

            fn add_scalars(parent: &[u8; 32], tweak: &[u8; 32]) -> Option<[u8; 32]> {
                use $krate::elliptic_curve::{Field, PrimeField};

                let parent = Option::<$krate::Scalar>::from($krate::Scalar::from_repr(
                    $krate::FieldBytes::clone_from_slice(parent),
                ))?;
                let tweak = Option::<$krate::Scalar>::from($krate::Scalar::from_repr(
                    $krate::FieldBytes::clone_from_slice(tweak),
                ))?;
                let sum = parent + tweak;
                if bool::from(sum.is_zero()) {
                    return None;
                }
                let mut out = [0u8; 32];
                out.copy_from_slice(&sum.to_repr());
                Some(out)
            }

            fn compressed_point(private_key: &[u8; 32]) -> Option<[u8; 33]> {
                use $krate::elliptic_curve::sec1::ToEncodedPoint;

                let secret = $krate::SecretKey::from_slice(private_key).ok()?;
                let encoded = secret.public_key().to_encoded_point(true);
                let mut out = [0u8; 33];
                out.copy_from_slice(encoded.as_bytes());
                Some(out)
            }
        }
    };
}

impl_hd_curve!(Secp256k1Hd, k256, b"Bitcoin seed");
impl_hd_curve!(P256Hd, p256, b"Nist256p1 seed");

/// Extended private key: scalar plus chain code
struct ExtendedKey {
    key: Zeroizing<[u8; 32]>,
    chain_code: Zeroizing<[u8; 32]>,
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|e| Error::DerivationFailed {
        path: "m".into(),
        reason: e.to_string(),
    })?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn split(i: &[u8; 64]) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&i[..32]);
    right.copy_from_slice(&i[32..]);
    (left, right)
}

fn master_key<C: HdCurve>(seed: &[u8]) -> Result<ExtendedKey> {
    let mut i = hmac_sha512(C::SEED_KEY, &[seed])?;
    loop {
        let (key, chain_code) = split(&i);
        if C::is_valid_scalar(&key) {
            return Ok(ExtendedKey { key, chain_code });
        }
        let previous = i.clone();
        i = hmac_sha512(C::SEED_KEY, &[previous.as_slice()])?;
    }
}

fn child_key<C: HdCurve>(parent: &ExtendedKey, index: u32, path: &str) -> Result<ExtendedKey> {
    let hardened = index >= HARDENED_OFFSET;
    let index_bytes = index.to_be_bytes();

    let mut i = if hardened {
        hmac_sha512(
            parent.chain_code.as_slice(),
            &[&[0u8], parent.key.as_slice(), &index_bytes],
        )?
    } else {
        let point = C::compressed_point(&parent.key).ok_or_else(|| Error::DerivationFailed {
            path: path.to_string(),
            reason: "parent key is not a valid scalar".into(),
        })?;
        hmac_sha512(parent.chain_code.as_slice(), &[&point, &index_bytes])?
    };

    loop {
        let (tweak, chain_code) = split(&i);
        if let Some(child) = C::add_scalars(&parent.key, &tweak) {
            return Ok(ExtendedKey {
                key: Zeroizing::new(child),
                chain_code,
            });
        }
        // SLIP-0010: retry with 0x01 || IR || ser32(i)
        i = hmac_sha512(
            parent.chain_code.as_slice(),
            &[&[1u8], chain_code.as_slice(), &index_bytes],
        )?;
    }
}

fn derive_with<C: HdCurve>(
    seed: &[u8],
    path: &DerivationPath,
    display: &str,
) -> Result<Zeroizing<[u8; 32]>> {
    let mut current = master_key::<C>(seed)?;
    for child in path.path() {
        let index = match child {
            ChildIndex::Normal(idx) => *idx,
            ChildIndex::Hardened(idx) => idx.checked_add(HARDENED_OFFSET).ok_or_else(|| {
                Error::DerivationFailed {
                    path: display.to_string(),
                    reason: format!("hardened index {} out of range", idx),
                }
            })?,
        };
        current = child_key::<C>(&current, index, display)?;
    }
    Ok(current.key)
}

/// Parse a textual derivation path such as `m/44'/539'/0'/0/0`
pub fn parse_path(path: &str) -> Result<DerivationPath> {
    path.parse().map_err(|e| Error::DerivationFailed {
        path: path.to_string(),
        reason: format!("invalid path: {:?}", e),
    })
}

/// Derive the private key at `path` from a BIP39 seed for `curve`
pub fn derive_private_key(seed: &[u8], path: &str, curve: Curve) -> Result<Zeroizing<[u8; 32]>> {
    let parsed = parse_path(path)?;
    match curve {
        Curve::Secp256k1 => derive_with::<Secp256k1Hd>(seed, &parsed, path),
        Curve::P256 => derive_with::<P256Hd>(seed, &parsed, path),
    }
}
